//! Shared fixtures for the resolution scenarios.
//!
//! Artifacts follow the in-memory backend's constructor stub convention, so
//! deploying one leaves exactly its runtime code on chain.

use std::sync::Arc;

use alloy_primitives::{hex, Address};
use deplink_chain::{
    test_utils::{with_constructor_stub, MemoryBackend},
    Chain, ChainSettings, Registrar,
};
use deplink_linker::{link_marker, ADDRESS_SLOT_WIDTH};
use deplink_primitives::{ArtifactSet, ContractArtifact};

/// Runtime code of the `Math` fixture.
pub const MATH_RUNTIME: &str = "0x608060405260016002";
/// Runtime code of the `Library13` fixture.
pub const LIBRARY13_RUNTIME: &str = "0x6080600a";
/// Runtime code of the `A` fixture.
pub const A_RUNTIME: &str = "0x60a0";

/// Runtime code of `Multiply13`, which links against `Library13`.
pub fn multiply13_runtime() -> String {
    format!("0x6080{}6013", link_marker("Library13", ADDRESS_SLOT_WIDTH))
}

/// Runtime code of `B`, which links against `A`.
pub fn b_runtime() -> String {
    format!("0x60b0{}60b1", link_marker("A", ADDRESS_SLOT_WIDTH))
}

fn artifact(name: &str, runtime: &str) -> ContractArtifact {
    ContractArtifact::new(name, with_constructor_stub(runtime), runtime)
        .with_source(format!("contracts/{name}.sol"))
}

/// `Math`, `Library13` and `Multiply13`.
pub fn math_artifacts() -> ArtifactSet {
    [
        artifact("Math", MATH_RUNTIME),
        artifact("Library13", LIBRARY13_RUNTIME),
        artifact("Multiply13", &multiply13_runtime()),
    ]
    .into_iter()
    .collect()
}

/// `A` and `B`, where `B` depends on `A`.
pub fn ab_artifacts() -> ArtifactSet {
    [artifact("B", &b_runtime()), artifact("A", A_RUNTIME)]
        .into_iter()
        .collect()
}

/// An in-memory chain with a registrar.
#[derive(Debug)]
pub struct TestChain {
    /// Backend shared with `chain`.
    pub backend: MemoryBackend,
    /// Registrar address.
    pub registrar: Address,
    /// Chain under test.
    pub chain: Chain,
}

impl TestChain {
    /// Chain over `artifacts` with default settings.
    pub fn new(artifacts: ArtifactSet) -> Self {
        Self::with_settings(artifacts, ChainSettings::default())
    }

    /// Chain over `artifacts` with `settings`.
    pub fn with_settings(artifacts: ArtifactSet, settings: ChainSettings) -> Self {
        let backend = MemoryBackend::new();
        let registrar = backend.install_registrar();
        let chain = Chain::new("test", Arc::new(backend.clone()), artifacts, settings)
            .with_registrar(Registrar::new(registrar));
        Self {
            backend,
            registrar,
            chain,
        }
    }

    /// Puts `runtime` at `address` and registers it as `name`.
    pub fn register(&self, name: &str, address: Address, runtime: &str) {
        self.backend.set_code(
            address,
            hex::decode(runtime).expect("fixture runtime code is valid hex"),
        );
        self.backend.set_registered(self.registrar, name, address);
    }
}
