//! Bytecode identity checks for registered addresses.

use crate::{ChainBackend, ChainError, ContractFactory};
use alloy_primitives::Address;
use tracing::debug;

/// Checks that the code deployed at `address` is exactly the linked runtime
/// code of `factory`.
///
/// The comparison is byte for byte. A stale registrar entry surfaces as
/// [`ChainError::BytecodeMismatch`] and is never corrected here.
pub async fn verify_runtime_code(
    backend: &dyn ChainBackend,
    factory: &ContractFactory,
    address: Address,
) -> Result<(), ChainError> {
    let expected = factory.runtime_bytes()?;
    let actual = backend.code_at(address).await?;

    if actual != expected {
        return Err(ChainError::BytecodeMismatch {
            name: factory.name().to_string(),
            address,
            expected,
            actual,
        });
    }
    debug!(target: "deplink::verify", contract = factory.name(), %address, "runtime code matches");
    Ok(())
}
