//! Layered address resolution.
//!
//! Each address source is one [`ResolveAddress`] strategy. The
//! [`AddressResolver`] asks them in order and stops at the first hit:
//!
//! 1. static overrides supplied by the caller
//! 2. the chain's registrar, if it has one
//! 3. installed package metadata, if enabled
//!
//! Running out of layers is [`ChainError::NoKnownAddress`].

use crate::{ChainBackend, ChainError, Registrar};
use async_trait::async_trait;
use deplink_primitives::{LinkOverrides, LinkValue};
use std::{fmt, sync::Arc};
use tracing::trace;

/// Where a resolved address came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressSource {
    /// Supplied by the caller.
    StaticOverride,
    /// Read from the on-chain registrar.
    Registrar,
    /// Taken from installed package metadata.
    InstalledPackage,
}

impl fmt::Display for AddressSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaticOverride => f.write_str("static overrides"),
            Self::Registrar => f.write_str("registrar"),
            Self::InstalledPackage => f.write_str("installed packages"),
        }
    }
}

/// The outcome of resolving one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBinding {
    /// Full contract name.
    pub name: String,
    /// Value to link in.
    pub value: LinkValue,
    /// Layer that produced the value.
    pub source: AddressSource,
}

/// One address source.
#[async_trait]
pub trait ResolveAddress: Send + Sync + fmt::Debug {
    /// The source this strategy reads from.
    fn source(&self) -> AddressSource;

    /// Looks `name` up. `Ok(None)` means "not here, ask the next layer".
    async fn resolve(&self, name: &str) -> Result<Option<LinkValue>, ChainError>;
}

/// Caller supplied bindings.
#[derive(Debug, Clone, Default)]
pub struct StaticOverrides {
    values: LinkOverrides,
}

impl StaticOverrides {
    /// Strategy over `values`.
    pub const fn new(values: LinkOverrides) -> Self {
        Self { values }
    }
}

#[async_trait]
impl ResolveAddress for StaticOverrides {
    fn source(&self) -> AddressSource {
        AddressSource::StaticOverride
    }

    async fn resolve(&self, name: &str) -> Result<Option<LinkValue>, ChainError> {
        Ok(self.values.get(name).cloned())
    }
}

/// Registrar lookup under `contract/<name>`.
///
/// Only answers whether and where the name is registered; checking the code
/// at that address is the caller's job.
#[derive(Debug, Clone)]
pub struct RegistrarLookup {
    registrar: Registrar,
    backend: Arc<dyn ChainBackend>,
}

impl RegistrarLookup {
    /// Strategy reading `registrar` through `backend`.
    pub fn new(registrar: Registrar, backend: Arc<dyn ChainBackend>) -> Self {
        Self { registrar, backend }
    }
}

#[async_trait]
impl ResolveAddress for RegistrarLookup {
    fn source(&self) -> AddressSource {
        AddressSource::Registrar
    }

    async fn resolve(&self, name: &str) -> Result<Option<LinkValue>, ChainError> {
        if !self.registrar.exists(self.backend.as_ref(), name).await? {
            return Ok(None);
        }
        let address = self
            .registrar
            .get_address(self.backend.as_ref(), name)
            .await?;
        Ok(Some(address.into()))
    }
}

/// Installed package metadata.
///
/// Package installation is not available, so an enabled layer fails loudly
/// instead of pretending the name is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstalledPackages;

#[async_trait]
impl ResolveAddress for InstalledPackages {
    fn source(&self) -> AddressSource {
        AddressSource::InstalledPackage
    }

    async fn resolve(&self, _name: &str) -> Result<Option<LinkValue>, ChainError> {
        Err(ChainError::Unsupported {
            feature: "address resolution from installed packages",
        })
    }
}

/// Ordered list of address sources.
#[derive(Debug, Default)]
pub struct AddressResolver {
    layers: Vec<Box<dyn ResolveAddress>>,
}

impl AddressResolver {
    /// Resolver with no layers; every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer, consulted after all earlier ones.
    pub fn with_layer(mut self, layer: impl ResolveAddress + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Sources in the order they are consulted.
    pub fn sources(&self) -> Vec<AddressSource> {
        self.layers.iter().map(|layer| layer.source()).collect()
    }

    /// Resolves `name` through the first layer that knows it.
    pub async fn resolve(&self, name: &str) -> Result<AddressBinding, ChainError> {
        for layer in &self.layers {
            if let Some(value) = layer.resolve(name).await? {
                trace!(
                    target: "deplink::resolve",
                    contract = name,
                    source = %layer.source(),
                    %value,
                    "resolved"
                );
                return Ok(AddressBinding {
                    name: name.to_string(),
                    value,
                    source: layer.source(),
                });
            }
        }

        let searched = self
            .sources()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let reason = if searched.is_empty() {
            "no address sources are enabled".to_string()
        } else {
            format!("searched {}", searched.join(", "))
        };
        Err(ChainError::no_known_address(name, reason))
    }
}
