//! Contract resolution against one chain.

use crate::{
    cache::{FactoryCache, FactoryKey},
    resolver::{
        AddressBinding, AddressResolver, AddressSource, InstalledPackages, RegistrarLookup,
        StaticOverrides,
    },
    verify::verify_runtime_code,
    ChainBackend, ChainError, ChainSettings, ContractFactory, ContractInstance, DeployedContracts,
    Registrar,
};
use alloy_primitives::Address;
use deplink_linker::{extract_link_reference_names, link_bytecode, DependencyGraph};
use deplink_primitives::{ArtifactSet, LinkOverrides};
use futures::future::BoxFuture;
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, instrument, warn};

/// A compiled artifact set bound to one chain.
///
/// Owns the per-chain factory cache. Every chain round trip is awaited before
/// the next one starts, so a `Chain` never has requests in flight
/// concurrently; share one instance per worker rather than across workers.
#[derive(Debug)]
pub struct Chain {
    name: String,
    backend: Arc<dyn ChainBackend>,
    artifacts: ArtifactSet,
    graph: DependencyGraph,
    registrar: Option<Registrar>,
    settings: ChainSettings,
    factories: FactoryCache,
}

impl Chain {
    /// Binds `artifacts` to `backend`.
    ///
    /// Placeholders that match no contract are accepted here; linking a
    /// contract that uses one fails unless an override supplies the name.
    pub fn new(
        name: impl Into<String>,
        backend: Arc<dyn ChainBackend>,
        artifacts: ArtifactSet,
        settings: ChainSettings,
    ) -> Self {
        let graph = DependencyGraph::from_link_references(&artifacts);
        Self {
            name: name.into(),
            backend,
            artifacts,
            graph,
            registrar: None,
            factories: FactoryCache::new(settings.factory_cache_size.max(1)),
            settings,
        }
    }

    /// Enables the registrar layer.
    pub fn with_registrar(mut self, registrar: Registrar) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Chain name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backend all round trips go through.
    pub const fn backend(&self) -> &Arc<dyn ChainBackend> {
        &self.backend
    }

    /// The compiled artifacts.
    pub const fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    /// Libraries each contract links against, from its deploy and runtime
    /// code.
    pub const fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Registrar, if the chain has one.
    pub const fn registrar(&self) -> Option<Registrar> {
        self.registrar
    }

    /// Returns true if the chain has a registrar.
    pub const fn has_registrar(&self) -> bool {
        self.registrar.is_some()
    }

    /// Runtime settings.
    pub const fn settings(&self) -> &ChainSettings {
        &self.settings
    }

    /// Linked factories built so far.
    pub const fn factory_cache(&self) -> &FactoryCache {
        &self.factories
    }

    /// Every contract name in the artifact set, in artifact order.
    pub fn all_contract_names(&self) -> Vec<&str> {
        self.artifacts.names().collect()
    }

    pub(crate) fn unknown_contract(&self, name: &str) -> ChainError {
        ChainError::UnknownContract {
            name: name.to_string(),
            available: self.artifacts.names().map(str::to_string).collect(),
        }
    }

    /// The ordered address sources used for a lookup with `overrides`.
    pub fn address_resolver(&self, overrides: &LinkOverrides) -> AddressResolver {
        let mut resolver =
            AddressResolver::new().with_layer(StaticOverrides::new(overrides.clone()));
        if let Some(registrar) = self.registrar {
            resolver =
                resolver.with_layer(RegistrarLookup::new(registrar, Arc::clone(&self.backend)));
        }
        if self.settings.installed_packages {
            resolver = resolver.with_layer(InstalledPackages);
        }
        resolver
    }

    /// Full names of the libraries referenced by any of `bytecodes`.
    ///
    /// Override names count as known names, so a library that only exists as
    /// an override can still be referenced.
    pub fn library_dependencies(
        &self,
        bytecodes: &[&str],
        overrides: &LinkOverrides,
    ) -> Result<BTreeSet<String>, ChainError> {
        let known: BTreeSet<&str> = overrides
            .keys()
            .map(String::as_str)
            .chain(self.artifacts.names())
            .collect();

        let mut dependencies = BTreeSet::new();
        for code in bytecodes {
            dependencies.extend(extract_link_reference_names(code, known.iter().copied())?);
        }
        Ok(dependencies)
    }

    /// Resolves the address of `name` through the layered sources.
    ///
    /// A registrar hit is checked against the compiled runtime code when
    /// `validate_bytecode` is set.
    #[instrument(skip_all, fields(contract = %name))]
    pub async fn resolve_address(
        &self,
        name: &str,
        overrides: &LinkOverrides,
        validate_bytecode: bool,
    ) -> Result<AddressBinding, ChainError> {
        let binding = self.address_resolver(overrides).resolve(name).await?;
        if binding.source == AddressSource::Registrar && validate_bytecode {
            if let Some(address) = binding.value.as_address() {
                self.verify_registered(name, address, overrides).await?;
            }
        }
        Ok(binding)
    }

    /// Links every bytecode in `bytecodes` against one resolution of their
    /// combined dependencies.
    ///
    /// Without a registrar, every dependency must be covered by `overrides`.
    #[instrument(skip_all, fields(chain = %self.name))]
    pub async fn link_code(
        &self,
        bytecodes: &[&str],
        overrides: &LinkOverrides,
        validate_bytecode: bool,
    ) -> Result<Vec<String>, ChainError> {
        let values = self
            .resolve_link_values(bytecodes, overrides, validate_bytecode)
            .await?;
        bytecodes
            .iter()
            .map(|code| link_bytecode(code, &values).map_err(ChainError::from))
            .collect()
    }

    async fn resolve_link_values(
        &self,
        bytecodes: &[&str],
        overrides: &LinkOverrides,
        validate_bytecode: bool,
    ) -> Result<LinkOverrides, ChainError> {
        let dependencies = self.library_dependencies(bytecodes, overrides)?;

        let missing: Vec<&str> = dependencies
            .iter()
            .map(String::as_str)
            .filter(|name| !overrides.contains_key(*name))
            .collect();
        if !missing.is_empty() && !self.has_registrar() && !self.settings.installed_packages {
            return Err(ChainError::no_known_address(
                missing.join(", "),
                "addresses were not provided and this chain has no registrar",
            ));
        }

        let mut values = LinkOverrides::new();
        for name in &dependencies {
            let binding = self
                .resolve_address(name, overrides, validate_bytecode)
                .await?;
            values.insert(binding.name, binding.value);
        }
        Ok(values)
    }

    /// The linked factory for `name`, built once per distinct `overrides`.
    ///
    /// A cached factory is returned as is, even if the registrar has changed
    /// since it was linked.
    #[instrument(skip_all, fields(contract = %name))]
    pub async fn get_contract_factory(
        &self,
        name: &str,
        overrides: &LinkOverrides,
    ) -> Result<Arc<ContractFactory>, ChainError> {
        self.factory(name, overrides).await
    }

    fn factory<'a>(
        &'a self,
        name: &'a str,
        overrides: &'a LinkOverrides,
    ) -> BoxFuture<'a, Result<Arc<ContractFactory>, ChainError>> {
        Box::pin(async move {
            let key = FactoryKey::new(name, overrides);
            if let Some(factory) = self.factories.get(&key) {
                debug!(target: "deplink::chain", contract = name, "factory cache hit");
                return Ok(factory);
            }

            let artifact = self
                .artifacts
                .get(name)
                .ok_or_else(|| self.unknown_contract(name))?;
            // lookups below recurse into registered libraries, so cycles stop here
            self.graph.transitive_dependencies(name)?;

            let values = self
                .resolve_link_values(
                    &[artifact.code.as_str(), artifact.code_runtime.as_str()],
                    overrides,
                    self.settings.validate_bytecode,
                )
                .await?;
            let factory = Arc::new(ContractFactory::new(
                artifact,
                link_bytecode(&artifact.code, &values)?,
                link_bytecode(&artifact.code_runtime, &values)?,
            ));

            debug!(
                target: "deplink::chain",
                contract = name,
                libraries = values.len(),
                "linked factory"
            );
            self.factories.insert(key, Arc::clone(&factory));
            Ok(factory)
        })
    }

    /// Returns true if `name` is registered, its libraries resolve and, when
    /// `validate_bytecode` is set, its on-chain code matches the compiled
    /// runtime code.
    ///
    /// Missing registrations, unresolvable libraries and code mismatches read
    /// as `false` unless `raise_on_error` is set. Other failures are always
    /// returned.
    #[instrument(skip_all, fields(contract = %name))]
    pub async fn is_contract_available(
        &self,
        name: &str,
        overrides: &LinkOverrides,
        validate_bytecode: bool,
        raise_on_error: bool,
    ) -> Result<bool, ChainError> {
        match self.registered_address(name, overrides, validate_bytecode).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_unavailable() && !raise_on_error => {
                if matches!(err, ChainError::BytecodeMismatch { .. }) {
                    warn!(
                        target: "deplink::chain",
                        contract = name,
                        %err,
                        "registered code does not match"
                    );
                } else {
                    debug!(target: "deplink::chain", contract = name, %err, "contract unavailable");
                }
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn registered_address(
        &self,
        name: &str,
        overrides: &LinkOverrides,
        validate_bytecode: bool,
    ) -> Result<Address, ChainError> {
        let registrar = self
            .registrar
            .ok_or_else(|| ChainError::no_known_address(name, "this chain has no registrar"))?;

        if !registrar.exists(self.backend.as_ref(), name).await? {
            return Err(ChainError::no_known_address(name, "not found in registrar"));
        }
        if !validate_bytecode {
            // libraries must still resolve, only the code comparison is skipped
            let artifact = self
                .artifacts
                .get(name)
                .ok_or_else(|| self.unknown_contract(name))?;
            self.resolve_link_values(
                &[artifact.code.as_str(), artifact.code_runtime.as_str()],
                overrides,
                false,
            )
            .await?;
            return Ok(registrar.get_address(self.backend.as_ref(), name).await?);
        }

        let factory = self.get_contract_factory(name, overrides).await?;
        let address = registrar.get_address(self.backend.as_ref(), name).await?;
        verify_runtime_code(self.backend.as_ref(), &factory, address).await?;
        Ok(address)
    }

    async fn verify_registered(
        &self,
        name: &str,
        address: Address,
        overrides: &LinkOverrides,
    ) -> Result<(), ChainError> {
        let factory = self.get_contract_factory(name, overrides).await?;
        verify_runtime_code(self.backend.as_ref(), &factory, address).await
    }

    /// The registered instance of `name`.
    ///
    /// Fails with [`ChainError::UnknownContract`] for names outside the
    /// artifact set, and with the availability errors otherwise swallowed by
    /// [`is_contract_available`](Self::is_contract_available).
    #[instrument(skip_all, fields(contract = %name))]
    pub async fn get_contract(
        &self,
        name: &str,
        overrides: &LinkOverrides,
    ) -> Result<ContractInstance, ChainError> {
        if !self.artifacts.contains(name) {
            return Err(self.unknown_contract(name));
        }
        let address = self
            .registered_address(name, overrides, self.settings.validate_bytecode)
            .await?;
        let factory = self.get_contract_factory(name, overrides).await?;
        Ok(factory.at(address))
    }

    /// Every contract that is currently available on this chain.
    #[instrument(skip_all, fields(chain = %self.name))]
    pub async fn deployed_contracts(&self) -> Result<DeployedContracts, ChainError> {
        let overrides = LinkOverrides::new();
        let mut deployed = Vec::new();
        for name in self.artifacts.names() {
            if self
                .is_contract_available(name, &overrides, self.settings.validate_bytecode, false)
                .await?
            {
                deployed.push(self.get_contract(name, &overrides).await?);
            }
        }
        Ok(deployed.into_iter().collect())
    }
}
