//! Resolving, linking and verifying compiled contracts against a live chain.
//!
//! A [`Chain`] binds an [`ArtifactSet`](deplink_primitives::ArtifactSet) to a
//! [`ChainBackend`] and answers three questions for any contract name:
//! - which library addresses its bytecode must be linked against
//! - whether the registrar knows it and the code on chain is what was compiled
//! - which contracts are currently deployed
//!
//! [`LocalChain`] adds lazy deployment for disposable development chains.

/// Backend trait for chain round trips.
pub mod backend;
/// Per-chain cache of linked factories.
pub mod cache;
/// Contract resolution against one chain.
pub mod chain;
/// Project and chain configuration.
pub mod config;
/// Linked factories and deployed instances.
pub mod contracts;
/// Error types.
pub mod error;
/// Lazy deployment on local development chains.
pub mod local;
/// Project level entry point.
pub mod project;
/// On-chain name registry bindings.
pub mod registrar;
/// Layered address resolution.
pub mod resolver;
/// JSON-RPC backend.
pub mod rpc;
/// On-chain code verification.
pub mod verify;

/// In-memory backend and fixtures for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod test_spans;

pub use backend::ChainBackend;
pub use cache::{FactoryCache, FactoryKey, DEFAULT_FACTORY_CACHE_SIZE};
pub use chain::Chain;
pub use config::{ChainConfig, ChainSettings, ConfigError, ProjectConfig};
pub use contracts::{ContractFactory, ContractInstance, DeployedContracts};
pub use error::{BackendError, ChainError};
pub use local::LocalChain;
pub use project::{Project, ProjectLoadError};
pub use registrar::{registrar_key, Registrar, CONTRACT_KEY_PREFIX};
pub use resolver::{
    AddressBinding, AddressResolver, AddressSource, InstalledPackages, RegistrarLookup,
    ResolveAddress, StaticOverrides,
};
pub use rpc::RpcBackend;
pub use verify::verify_runtime_code;
