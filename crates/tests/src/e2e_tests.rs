use std::sync::Arc;

use alloy_primitives::{hex, Address, B256};
use deplink_chain::{ChainError, ChainSettings};
use deplink_linker::{find_link_references, link_marker, LinkError, ADDRESS_SLOT_WIDTH};
use deplink_primitives::{strip_hex_prefix, LinkOverrides};
use eyre::Result;

use crate::common::{
    ab_artifacts, b_runtime, math_artifacts, multiply13_runtime, TestChain, A_RUNTIME,
    LIBRARY13_RUNTIME, MATH_RUNTIME,
};

#[tokio::test]
async fn test_e2e_dependent_resolves_once_library_is_registered() -> Result<()> {
    let test = TestChain::new(ab_artifacts());
    assert_eq!(test.chain.graph().deploy_order()?, vec!["A", "B"]);

    let err = test
        .chain
        .get_contract_factory("B", &LinkOverrides::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, ChainError::NoKnownAddress { ref name, .. } if name == "A"),
        "unexpected error: {err}"
    );

    let a = Address::repeat_byte(0xa1);
    test.register("A", a, A_RUNTIME);

    let factory = test
        .chain
        .get_contract_factory("B", &LinkOverrides::new())
        .await?;
    let marker = find_link_references(&b_runtime())
        .next()
        .expect("B links against A");
    let linked = strip_hex_prefix(factory.code_runtime());
    assert_eq!(linked.len(), strip_hex_prefix(&b_runtime()).len());
    assert_eq!(&linked[marker.offset..marker.end()], hex::encode(a));
    assert!(factory.is_linked());

    Ok(())
}

#[tokio::test]
async fn test_e2e_stale_registration_is_unavailable_but_lookup_fails() -> Result<()> {
    let test = TestChain::new(math_artifacts());
    let math = Address::repeat_byte(0x11);
    test.register("Math", math, "0x6080604052600160ff");

    let available = test
        .chain
        .is_contract_available("Math", &LinkOverrides::new(), true, false)
        .await?;
    assert!(!available);

    let err = test
        .chain
        .get_contract("Math", &LinkOverrides::new())
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            ChainError::BytecodeMismatch { ref name, address, .. }
                if name == "Math" && address == math
        ),
        "unexpected error: {err}"
    );

    // never corrected behind the caller's back
    assert_eq!(test.backend.registered(test.registrar, "Math"), Some(math));
    assert!(test.backend.deployments().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_e2e_get_contract_binds_the_registered_address() -> Result<()> {
    let test = TestChain::new(math_artifacts());

    let err = test
        .chain
        .get_contract("Math", &LinkOverrides::new())
        .await
        .unwrap_err();
    assert!(
        matches!(err, ChainError::NoKnownAddress { ref name, .. } if name == "Math"),
        "unexpected error: {err}"
    );
    assert!(err.is_unavailable());

    let math = Address::repeat_byte(0x11);
    test.register("Math", math, MATH_RUNTIME);
    let instance = test
        .chain
        .get_contract("Math", &LinkOverrides::new())
        .await?;
    assert_eq!(instance.address(), math);
    assert_eq!(instance.factory().code_runtime(), MATH_RUNTIME);
    let factory = test
        .chain
        .get_contract_factory("Math", &LinkOverrides::new())
        .await?;
    assert!(Arc::ptr_eq(instance.factory(), &factory));

    Ok(())
}

#[tokio::test]
async fn test_e2e_get_contract_links_registered_libraries() -> Result<()> {
    let test = TestChain::new(math_artifacts());
    let library = Address::repeat_byte(0x13);
    let multiply = Address::repeat_byte(0x12);
    test.register("Library13", library, LIBRARY13_RUNTIME);
    let linked_runtime = multiply13_runtime().replace(
        &link_marker("Library13", ADDRESS_SLOT_WIDTH),
        &hex::encode(library),
    );
    test.register("Multiply13", multiply, &linked_runtime);

    let instance = test
        .chain
        .get_contract("Multiply13", &LinkOverrides::new())
        .await?;
    assert_eq!(instance.address(), multiply);
    assert_eq!(instance.factory().code_runtime(), linked_runtime);
    assert!(instance.factory().is_linked());

    Ok(())
}

#[tokio::test]
async fn test_e2e_unvalidated_availability_trusts_registrar() -> Result<()> {
    let test = TestChain::new(math_artifacts());
    test.register("Math", Address::repeat_byte(0x11), "0x00");

    assert!(
        test.chain
            .is_contract_available("Math", &LinkOverrides::new(), false, false)
            .await?
    );

    // an unresolvable library still makes its dependent unavailable
    test.backend
        .set_registered(test.registrar, "Multiply13", Address::repeat_byte(0x12));
    assert!(
        !test
            .chain
            .is_contract_available("Multiply13", &LinkOverrides::new(), false, false)
            .await?
    );
    Ok(())
}

#[tokio::test]
async fn test_e2e_factory_is_cached_without_round_trips() -> Result<()> {
    let test = TestChain::new(math_artifacts());
    let library = Address::repeat_byte(0x13);
    test.register("Library13", library, LIBRARY13_RUNTIME);

    let math = test
        .chain
        .get_contract_factory("Math", &LinkOverrides::new())
        .await?;
    let again = test
        .chain
        .get_contract_factory("Math", &LinkOverrides::new())
        .await?;
    assert!(Arc::ptr_eq(&math, &again));

    let multiply = test
        .chain
        .get_contract_factory("Multiply13", &LinkOverrides::new())
        .await?;
    let round_trips = test.backend.round_trips();
    assert!(round_trips > 0);

    let again = test
        .chain
        .get_contract_factory("Multiply13", &LinkOverrides::new())
        .await?;
    assert!(Arc::ptr_eq(&multiply, &again));
    assert_eq!(test.backend.round_trips(), round_trips);

    // different overrides are a different cache entry
    let overrides =
        LinkOverrides::from([("Library13".to_string(), Address::repeat_byte(0x14).into())]);
    let overridden = test
        .chain
        .get_contract_factory("Multiply13", &overrides)
        .await?;
    assert!(!Arc::ptr_eq(&multiply, &overridden));
    assert_eq!(test.backend.round_trips(), round_trips);
    assert_eq!(test.chain.factory_cache().len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_e2e_overrides_bypass_stale_registrar() -> Result<()> {
    let test = TestChain::new(math_artifacts());
    test.register("Library13", Address::repeat_byte(0x13), "0xdead");

    let overrides =
        LinkOverrides::from([("Library13".to_string(), Address::repeat_byte(0x14).into())]);
    let factory = test
        .chain
        .get_contract_factory("Multiply13", &overrides)
        .await?;

    assert_eq!(
        factory.code_runtime(),
        multiply13_runtime().replace(
            &link_marker("Library13", ADDRESS_SLOT_WIDTH),
            &"14".repeat(20)
        )
    );
    assert_eq!(test.backend.code_reads(), 0);

    Ok(())
}

#[tokio::test]
async fn test_e2e_mis_sized_override_is_rejected() -> Result<()> {
    let test = TestChain::new(math_artifacts());
    let overrides =
        LinkOverrides::from([("Library13".to_string(), B256::repeat_byte(0x13).into())]);

    let err = test
        .chain
        .get_contract_factory("Multiply13", &overrides)
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            ChainError::Link(LinkError::LinkValueLengthMismatch { expected: 40, actual: 64, .. })
        ),
        "unexpected error: {err}"
    );

    Ok(())
}

#[tokio::test]
async fn test_e2e_deployed_contracts_skips_unlinkable_contracts() -> Result<()> {
    let test = TestChain::new(math_artifacts());
    let math = Address::repeat_byte(0x11);
    test.register("Math", math, MATH_RUNTIME);
    // registered, but its library is not
    test.backend
        .set_registered(test.registrar, "Multiply13", Address::repeat_byte(0x12));

    let deployed = test.chain.deployed_contracts().await?;

    assert_eq!(deployed.names().collect::<Vec<_>>(), vec!["Math"]);
    let instance = deployed.get("Math").expect("Math is deployed");
    assert_eq!(instance.address(), math);
    assert_eq!(instance.factory().source(), Some("contracts/Math.sol"));

    Ok(())
}

#[tokio::test]
async fn test_e2e_unknown_contract_is_not_an_availability_miss() -> Result<()> {
    let test = TestChain::with_settings(math_artifacts(), ChainSettings::default());

    let err = test
        .chain
        .get_contract("Division", &LinkOverrides::new())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "no contract found with the name 'Division'; available contracts are: Math, Library13, Multiply13"
    );
    assert!(!err.is_unavailable());

    Ok(())
}
