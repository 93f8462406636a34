//! Lazy deployment for disposable development chains.

use crate::{Chain, ChainBackend, ChainError, ChainSettings, ContractInstance, Registrar};
use alloy_primitives::Bytes;
use deplink_primitives::{ArtifactSet, LinkOverrides};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{info, instrument};

/// A [`Chain`] that deploys and registers whatever it is asked for.
///
/// Looking up a contract that is not registered yet deploys its missing
/// libraries depth first, then the contract itself, registering each one as
/// it lands. Nothing is shared between two lookups, so two callers asking for
/// the same missing contract at once can both deploy it; the registration
/// written last wins.
#[derive(Debug)]
pub struct LocalChain {
    chain: Chain,
    registrar: Registrar,
}

impl LocalChain {
    /// Deploys a fresh registrar from `registrar_init_code` and binds
    /// `artifacts` to it.
    pub async fn start(
        name: impl Into<String>,
        backend: Arc<dyn ChainBackend>,
        artifacts: ArtifactSet,
        settings: ChainSettings,
        registrar_init_code: Bytes,
    ) -> Result<Self, ChainError> {
        let name = name.into();
        let address = backend
            .deploy(registrar_init_code, settings.tx_timeout())
            .await?;
        info!(target: "deplink::local", chain = %name, %address, "deployed registrar");

        let registrar = Registrar::new(address);
        let chain = Chain::new(name, backend, artifacts, settings).with_registrar(registrar);
        Ok(Self { chain, registrar })
    }

    /// The underlying chain.
    pub const fn chain(&self) -> &Chain {
        &self.chain
    }

    /// The registrar deployed by [`start`](Self::start).
    pub const fn registrar(&self) -> Registrar {
        self.registrar
    }

    /// Unwraps the underlying chain.
    pub fn into_inner(self) -> Chain {
        self.chain
    }

    /// The registered instance of `name`, deploying it and its libraries
    /// first if they are not registered yet.
    ///
    /// Libraries named in `overrides` are never deployed.
    pub async fn get_contract(
        &self,
        name: &str,
        overrides: &LinkOverrides,
    ) -> Result<ContractInstance, ChainError> {
        self.get_contract_with_args(name, overrides, &[]).await
    }

    /// Like [`get_contract`](Self::get_contract), passing ABI encoded
    /// `constructor_args` if `name` itself has to be deployed.
    ///
    /// Libraries are always deployed without arguments, and the arguments are
    /// ignored when `name` is already registered.
    #[instrument(skip_all, fields(contract = %name))]
    pub async fn get_contract_with_args(
        &self,
        name: &str,
        overrides: &LinkOverrides,
        constructor_args: &[u8],
    ) -> Result<ContractInstance, ChainError> {
        if !self.chain.artifacts().contains(name) {
            return Err(self.chain.unknown_contract(name));
        }
        self.chain.graph().transitive_dependencies(name)?;

        self.ensure_deployed(name, overrides, constructor_args).await?;
        self.chain.get_contract(name, overrides).await
    }

    fn ensure_deployed<'a>(
        &'a self,
        name: &'a str,
        overrides: &'a LinkOverrides,
        constructor_args: &'a [u8],
    ) -> BoxFuture<'a, Result<(), ChainError>> {
        Box::pin(async move {
            let backend = self.chain.backend().as_ref();
            if self.registrar.exists(backend, name).await? {
                return Ok(());
            }

            let artifact = self
                .chain
                .artifacts()
                .get(name)
                .ok_or_else(|| self.chain.unknown_contract(name))?;
            let dependencies = self.chain.library_dependencies(
                &[artifact.code.as_str(), artifact.code_runtime.as_str()],
                overrides,
            )?;
            for dependency in dependencies.iter().filter(|dep| !overrides.contains_key(*dep)) {
                self.ensure_deployed(dependency, overrides, &[]).await?;
            }

            let factory = self.chain.get_contract_factory(name, overrides).await?;
            let timeout = self.chain.settings().tx_timeout();
            let address = backend.deploy(factory.deploy_code(constructor_args)?, timeout).await?;
            info!(target: "deplink::local", contract = name, %address, "deployed contract");

            self.registrar.register(backend, name, address, timeout).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{with_constructor_stub, MemoryBackend, REGISTRAR_INIT_CODE};
    use deplink_linker::link_marker;
    use deplink_primitives::ContractArtifact;

    fn artifacts() -> ArtifactSet {
        let runtime = format!("0x6080{}6013", link_marker("Library13", 40));
        [
            ContractArtifact::new("Library13", with_constructor_stub("0x6080600a"), "0x6080600a"),
            ContractArtifact::new("Multiply13", with_constructor_stub(&runtime), runtime),
        ]
        .into_iter()
        .collect()
    }

    async fn start(backend: &MemoryBackend) -> LocalChain {
        LocalChain::start(
            "local",
            Arc::new(backend.clone()),
            artifacts(),
            ChainSettings::default(),
            Bytes::from_static(&REGISTRAR_INIT_CODE),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn start_deploys_a_registrar() {
        let backend = MemoryBackend::new();
        let local = start(&backend).await;

        assert_eq!(backend.deployments(), vec![local.registrar().address()]);
        assert_eq!(local.chain().registrar(), Some(local.registrar()));
    }

    #[tokio::test]
    async fn libraries_are_deployed_before_dependents() {
        let backend = MemoryBackend::new();
        let local = start(&backend).await;

        let multiply = local
            .get_contract("Multiply13", &LinkOverrides::new())
            .await
            .unwrap();

        let registrar = local.registrar().address();
        let library = backend.registered(registrar, "Library13").unwrap();
        assert_eq!(backend.deployments(), vec![registrar, library, multiply.address()]);
        assert_eq!(backend.registered(registrar, "Multiply13"), Some(multiply.address()));
        assert_eq!(
            multiply.factory().code_runtime(),
            format!("0x6080{}6013", alloy_primitives::hex::encode(library))
        );

        local
            .get_contract("Multiply13", &LinkOverrides::new())
            .await
            .unwrap();
        assert_eq!(backend.deployments().len(), 3);
    }

    #[tokio::test]
    async fn overridden_libraries_are_not_deployed() {
        let backend = MemoryBackend::new();
        let local = start(&backend).await;
        let overrides = LinkOverrides::from([(
            "Library13".to_string(),
            alloy_primitives::Address::repeat_byte(0x13).into(),
        )]);

        local.get_contract("Multiply13", &overrides).await.unwrap();

        assert_eq!(backend.deployments().len(), 2);
        assert_eq!(backend.registered(local.registrar().address(), "Library13"), None);
    }

    #[tokio::test]
    async fn constructor_arguments_reach_the_deployment() {
        let backend = MemoryBackend::new();
        let local = LocalChain::start(
            "local",
            Arc::new(backend.clone()),
            artifacts(),
            ChainSettings::default().with_validate_bytecode(false),
            Bytes::from_static(&REGISTRAR_INIT_CODE),
        )
        .await
        .unwrap();

        let multiply = local
            .get_contract_with_args("Multiply13", &LinkOverrides::new(), &[0x00, 0x2a])
            .await
            .unwrap();

        // the in-memory backend keeps trailing constructor arguments as code
        let code = backend.code_at(multiply.address()).await.unwrap();
        assert!(code.ends_with(&[0x60, 0x13, 0x00, 0x2a]));
        let library = backend
            .registered(local.registrar().address(), "Library13")
            .unwrap();
        assert_eq!(
            backend.code_at(library).await.unwrap(),
            Bytes::from_static(&[0x60, 0x80, 0x60, 0x0a])
        );
    }

    #[tokio::test]
    async fn runtime_only_cycles_deploy_nothing() {
        let backend = MemoryBackend::new();
        let set: ArtifactSet = [
            ContractArtifact::new("A", "0x6001", format!("0x60{}", link_marker("B", 40))),
            ContractArtifact::new("B", "0x6002", format!("0x60{}", link_marker("A", 40))),
        ]
        .into_iter()
        .collect();
        let local = LocalChain::start(
            "local",
            Arc::new(backend.clone()),
            set,
            ChainSettings::default(),
            Bytes::from_static(&REGISTRAR_INIT_CODE),
        )
        .await
        .unwrap();

        let err = local
            .get_contract("A", &LinkOverrides::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChainError::Link(deplink_linker::LinkError::DependencyCycle { .. })
        ));
        assert_eq!(backend.deployments(), vec![local.registrar().address()]);
    }

    #[tokio::test]
    async fn confirmation_timeout_is_fatal() {
        let backend = MemoryBackend::new();
        let local = start(&backend).await;
        backend.set_fail_confirmations(true);

        let err = local
            .get_contract("Library13", &LinkOverrides::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(backend.deployments().len(), 1);
    }
}
