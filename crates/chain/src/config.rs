//! Project and chain configuration.
//!
//! Chains are declared in `deplink.toml`:
//!
//! ```toml
//! [chains.local]
//! rpc_url = "http://127.0.0.1:8545"
//! registrar = "0x00000000000000000000000000000000000000aa"
//! tx_timeout_secs = 30
//! ```
//!
//! `DEPLINK_RPC_URL`, `DEPLINK_REGISTRAR` and `DEPLINK_PRIVATE_KEY` override
//! the file for whichever chain is selected.

use crate::cache::DEFAULT_FACTORY_CACHE_SIZE;
use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use serde::Deserialize;
use std::{collections::BTreeMap, env, fmt, fs, path::Path, str::FromStr, time::Duration};
use thiserror::Error;
use url::Url;

/// Overrides the RPC endpoint of the selected chain.
pub const RPC_URL_ENV: &str = "DEPLINK_RPC_URL";
/// Overrides the registrar address of the selected chain.
pub const REGISTRAR_ENV: &str = "DEPLINK_REGISTRAR";
/// Overrides the signing key of the selected chain.
pub const PRIVATE_KEY_ENV: &str = "DEPLINK_PRIVATE_KEY";

const DEFAULT_TX_TIMEOUT_SECS: u64 = 120;

/// Runtime knobs of one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// Seconds to wait for a transaction receipt.
    pub tx_timeout_secs: u64,
    /// Maximum number of cached factories.
    pub factory_cache_size: usize,
    /// Compare registered code with the compiled runtime code.
    pub validate_bytecode: bool,
    /// Consult installed package metadata after the registrar.
    pub installed_packages: bool,
}

impl ChainSettings {
    /// Receipt wait as a [`Duration`].
    pub const fn tx_timeout(&self) -> Duration {
        Duration::from_secs(self.tx_timeout_secs)
    }

    /// Sets the receipt wait.
    pub const fn with_tx_timeout(mut self, timeout: Duration) -> Self {
        self.tx_timeout_secs = timeout.as_secs();
        self
    }

    /// Sets the factory cache bound.
    pub const fn with_factory_cache_size(mut self, size: usize) -> Self {
        self.factory_cache_size = size;
        self
    }

    /// Turns bytecode validation on or off.
    pub const fn with_validate_bytecode(mut self, validate: bool) -> Self {
        self.validate_bytecode = validate;
        self
    }

    /// Turns the installed package layer on or off.
    pub const fn with_installed_packages(mut self, enabled: bool) -> Self {
        self.installed_packages = enabled;
        self
    }

    fn validate(&self, chain: &str) -> Result<(), ConfigError> {
        if self.factory_cache_size == 0 {
            return Err(ConfigError::InvalidSetting {
                chain: chain.to_string(),
                setting: "factory_cache_size",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.tx_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                chain: chain.to_string(),
                setting: "tx_timeout_secs",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            tx_timeout_secs: DEFAULT_TX_TIMEOUT_SECS,
            factory_cache_size: DEFAULT_FACTORY_CACHE_SIZE,
            validate_bytecode: true,
            installed_packages: false,
        }
    }
}

/// One `[chains.<name>]` table.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint.
    #[serde(default)]
    pub rpc_url: Option<Url>,
    /// Registrar contract address.
    #[serde(default)]
    pub registrar: Option<Address>,
    /// Sender for node managed accounts.
    #[serde(default)]
    pub default_account: Option<Address>,
    /// Hex private key for local signing.
    #[serde(default)]
    pub private_key: Option<String>,
    /// Runtime knobs.
    #[serde(flatten)]
    pub settings: ChainSettings,
}

impl ChainConfig {
    /// Applies the `DEPLINK_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|var| env::var(var).ok())
    }

    /// Applies overrides read through `lookup`, which maps a variable name to
    /// its value.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = non_empty(&lookup, RPC_URL_ENV)? {
            self.rpc_url = Some(parse_url(&raw)?);
        }
        if let Some(raw) = non_empty(&lookup, REGISTRAR_ENV)? {
            self.registrar = Some(parse_address(&raw)?);
        }
        if let Some(raw) = non_empty(&lookup, PRIVATE_KEY_ENV)? {
            self.private_key = Some(raw);
        }
        Ok(self)
    }

    /// The configured local signer, if a private key is set.
    pub fn signer(&self) -> Result<Option<PrivateKeySigner>, ConfigError> {
        self.private_key
            .as_deref()
            .map(|key| {
                PrivateKeySigner::from_str(key.trim())
                    .map_err(|err| ConfigError::InvalidPrivateKey(err.to_string()))
            })
            .transpose()
    }
}

impl fmt::Debug for ChainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainConfig")
            .field("rpc_url", &self.rpc_url.as_ref().map(Url::as_str))
            .field("registrar", &self.registrar)
            .field("default_account", &self.default_account)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("settings", &self.settings)
            .finish()
    }
}

/// The whole `deplink.toml` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectConfig {
    /// Chains by name.
    #[serde(default)]
    pub chains: BTreeMap<String, ChainConfig>,
}

impl ProjectConfig {
    /// Parses a configuration document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        for (name, chain) in &config.chains {
            chain.settings.validate(name)?;
        }
        Ok(config)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Chain `name` exactly as written in the file.
    pub fn chain(&self, name: &str) -> Result<&ChainConfig, ConfigError> {
        self.chains
            .get(name)
            .ok_or_else(|| ConfigError::UnknownChain {
                name: name.to_string(),
                available: self.chains.keys().cloned().collect(),
            })
    }

    /// Chain `name` with the environment overrides applied.
    pub fn resolved_chain(&self, name: &str) -> Result<ChainConfig, ConfigError> {
        self.chain(name)?.clone().with_env_overrides()
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    /// No chain with this name is configured.
    #[error("unknown chain '{name}'; configured chains are: {available}", available = .available.join(", "))]
    UnknownChain {
        /// Requested chain.
        name: String,
        /// Configured chain names.
        available: Vec<String>,
    },
    /// The chain has no RPC endpoint.
    #[error("chain '{chain}' has no rpc_url and DEPLINK_RPC_URL is not set")]
    MissingRpcUrl {
        /// Chain name.
        chain: String,
    },
    /// An override variable was set to an empty string.
    #[error("environment variable {var} is empty")]
    EmptyEnv {
        /// Name of the environment variable that evaluated to an empty string.
        var: String,
    },
    /// An address could not be parsed.
    #[error("invalid address {value:?}: {reason}")]
    InvalidAddress {
        /// The rejected input.
        value: String,
        /// Parser message.
        reason: String,
    },
    /// A URL could not be parsed.
    #[error("invalid rpc url {value:?}: {reason}")]
    InvalidUrl {
        /// The rejected input.
        value: String,
        /// Parser message.
        reason: String,
    },
    /// The private key is not a valid secp256k1 key.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),
    /// A setting is out of range.
    #[error("invalid {setting} for chain '{chain}': {reason}")]
    InvalidSetting {
        /// Chain name.
        chain: String,
        /// Offending setting.
        setting: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

fn non_empty<F>(lookup: &F, var: &str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(raw) if raw.trim().is_empty() => Err(ConfigError::EmptyEnv { var: var.into() }),
        Some(raw) => Ok(Some(raw.trim().to_string())),
        None => Ok(None),
    }
}

fn parse_address(value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value).map_err(|err| ConfigError::InvalidAddress {
        value: value.to_string(),
        reason: err.to_string(),
    })
}

fn parse_url(value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|err| ConfigError::InvalidUrl {
        value: value.to_string(),
        reason: err.to_string(),
    })
}
