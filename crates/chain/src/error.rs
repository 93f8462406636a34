use crate::config::ConfigError;
use alloy_primitives::{Address, Bytes, B256};
use deplink_linker::LinkError;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a [`ChainBackend`](crate::ChainBackend).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The node could not be reached or rejected the request.
    #[error("transport error: {0}")]
    Transport(String),
    /// A transaction was not confirmed within the allowed time.
    #[error("transaction was not confirmed within {timeout:?}")]
    Timeout {
        /// The wait that expired.
        timeout: Duration,
    },
    /// A transaction was mined but reverted.
    #[error("transaction {tx_hash} reverted")]
    Reverted {
        /// Hash of the failed transaction.
        tx_hash: B256,
    },
    /// A deployment receipt carried no contract address.
    #[error("deployment {tx_hash} produced no contract address")]
    MissingContractAddress {
        /// Hash of the deployment transaction.
        tx_hash: B256,
    },
    /// Return data could not be decoded.
    #[error("failed to decode call result: {0}")]
    Decode(String),
}

/// Errors raised while resolving, linking or fetching contracts on a chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The contract is not part of the compiled artifact set.
    #[error("no contract found with the name '{name}'; available contracts are: {available}", available = .available.join(", "))]
    UnknownContract {
        /// Requested name.
        name: String,
        /// Every contract the chain knows about.
        available: Vec<String>,
    },
    /// Every enabled address source was tried without a hit.
    #[error("no known address for '{name}': {reason}")]
    NoKnownAddress {
        /// Contract (or comma separated contracts) without an address.
        name: String,
        /// Which sources were consulted.
        reason: String,
    },
    /// The code at a registered address is not the compiled runtime code.
    #[error("bytecode at {address} does not match the compiled runtime code of '{name}'; expected {expected}, found {actual}")]
    BytecodeMismatch {
        /// Contract whose registration is stale.
        name: String,
        /// Registered address.
        address: Address,
        /// Linked runtime code of the compiled contract.
        expected: Bytes,
        /// Code currently deployed at `address`.
        actual: Bytes,
    },
    /// Linked code still contains placeholders, or is not valid hex.
    #[error("bytecode of '{name}' is not deployable: {reason}")]
    InvalidBytecode {
        /// Contract name.
        name: String,
        /// What is wrong with the code.
        reason: String,
    },
    /// A resolution layer that is enabled but not available in this build.
    #[error("{feature} is not supported")]
    Unsupported {
        /// The missing capability.
        feature: &'static str,
    },
    /// Name expansion, linking or dependency ordering failed.
    #[error(transparent)]
    Link(#[from] LinkError),
    /// The chain backend failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// The chain configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ChainError {
    /// Returns true for the failures that only mean "not deployed here".
    ///
    /// The boolean availability check turns exactly these into `false`.
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::NoKnownAddress { .. } | Self::BytecodeMismatch { .. }
        )
    }

    /// Returns true if the failure is a confirmation timeout.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Backend(BackendError::Timeout { .. }))
    }

    pub(crate) fn no_known_address(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NoKnownAddress {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
