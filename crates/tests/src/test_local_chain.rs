use std::sync::Arc;

use alloy_primitives::Bytes;
use deplink_chain::{
    test_utils::{MemoryBackend, REGISTRAR_INIT_CODE},
    ChainBackend, ChainSettings, LocalChain,
};
use deplink_primitives::LinkOverrides;
use eyre::Result;

use crate::common::{math_artifacts, LIBRARY13_RUNTIME};

async fn start_local(backend: &MemoryBackend) -> Result<LocalChain> {
    Ok(LocalChain::start(
        "local",
        Arc::new(backend.clone()),
        math_artifacts(),
        ChainSettings::default(),
        Bytes::from_static(&REGISTRAR_INIT_CODE),
    )
    .await?)
}

#[tokio::test]
async fn test_local_chain_deploys_on_first_use() -> Result<()> {
    let backend = MemoryBackend::new();
    let local = start_local(&backend).await?;
    let chain = local.chain();

    assert!(chain.deployed_contracts().await?.is_empty());

    let multiply = local
        .get_contract("Multiply13", &LinkOverrides::new())
        .await?;
    let library = backend
        .registered(local.registrar().address(), "Library13")
        .expect("library registered before its dependent");

    assert_eq!(
        backend.code_at(library).await?,
        Bytes::from(alloy_primitives::hex::decode(LIBRARY13_RUNTIME)?)
    );
    assert!(multiply
        .factory()
        .code_runtime()
        .contains(&alloy_primitives::hex::encode(library)));

    let deployed = chain.deployed_contracts().await?;
    assert_eq!(
        deployed.names().collect::<Vec<_>>(),
        vec!["Library13", "Multiply13"]
    );

    // already registered, nothing new lands
    let deployments = backend.deployments().len();
    local
        .get_contract("Multiply13", &LinkOverrides::new())
        .await?;
    assert_eq!(backend.deployments().len(), deployments);

    Ok(())
}

#[tokio::test]
async fn test_local_chain_timeout_is_not_retried() -> Result<()> {
    let backend = MemoryBackend::new();
    let local = start_local(&backend).await?;
    backend.set_fail_confirmations(true);
    let round_trips = backend.round_trips();

    let err = local
        .get_contract("Math", &LinkOverrides::new())
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    // the existence check; the unconfirmed deployment leaves no trace
    assert_eq!(backend.round_trips(), round_trips + 1);
    assert_eq!(backend.registered(local.registrar().address(), "Math"), None);

    backend.set_fail_confirmations(false);
    let math = local.get_contract("Math", &LinkOverrides::new()).await?;
    assert_eq!(
        backend.registered(local.registrar().address(), "Math"),
        Some(math.address())
    );

    Ok(())
}
