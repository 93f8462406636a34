//! Project level entry point: configuration plus compiled artifacts.

use crate::{
    config::{ChainConfig, ConfigError, ProjectConfig},
    Chain, ChainBackend, ChainError, Registrar, RpcBackend,
};
use deplink_primitives::{ArtifactError, ArtifactSet};
use std::{path::Path, sync::Arc};
use tracing::info;

/// A loaded project.
#[derive(Debug, Clone)]
pub struct Project {
    config: ProjectConfig,
    artifacts: ArtifactSet,
}

impl Project {
    /// Project from already loaded parts.
    pub const fn new(config: ProjectConfig, artifacts: ArtifactSet) -> Self {
        Self { config, artifacts }
    }

    /// Reads `deplink.toml` from `config_path` and the compiled contracts
    /// JSON from `artifacts_path`.
    pub fn load(
        config_path: impl AsRef<Path>,
        artifacts_path: impl AsRef<Path>,
    ) -> Result<Self, ProjectLoadError> {
        let config = ProjectConfig::load(config_path)?;
        let artifacts = ArtifactSet::from_json_file(artifacts_path)?;
        Ok(Self::new(config, artifacts))
    }

    /// Project configuration.
    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Compiled artifacts.
    pub const fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Connects chain `name` over JSON-RPC, with environment overrides
    /// applied to its configuration.
    pub fn connect_chain(&self, name: &str) -> Result<Chain, ChainError> {
        let config = self.config.resolved_chain(name)?;
        let url = config
            .rpc_url
            .clone()
            .ok_or_else(|| ConfigError::MissingRpcUrl {
                chain: name.to_string(),
            })?;
        let backend = RpcBackend::connect(url, config.signer()?, config.default_account);
        info!(
            target: "deplink::project",
            chain = name,
            rpc_url = %backend.url(),
            "connected chain"
        );
        Ok(self.bind_chain(name, &config, Arc::new(backend)))
    }

    /// Binds chain `name` to `backend` instead of the configured endpoint.
    pub fn chain_with_backend(
        &self,
        name: &str,
        backend: Arc<dyn ChainBackend>,
    ) -> Result<Chain, ChainError> {
        let config = self.config.resolved_chain(name)?;
        Ok(self.bind_chain(name, &config, backend))
    }

    fn bind_chain(
        &self,
        name: &str,
        config: &ChainConfig,
        backend: Arc<dyn ChainBackend>,
    ) -> Chain {
        let chain = Chain::new(name, backend, self.artifacts.clone(), config.settings);
        match config.registrar {
            Some(address) => chain.with_registrar(Registrar::new(address)),
            None => chain,
        }
    }
}

/// Errors raised by [`Project::load`].
#[derive(Debug, thiserror::Error)]
pub enum ProjectLoadError {
    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The compiled contracts could not be loaded.
    #[error(transparent)]
    Artifacts(#[from] ArtifactError),
}
