//! The seam between resolution logic and an actual node.

use crate::BackendError;
use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use std::{fmt, time::Duration};

/// Round trips the resolution layer needs from a chain.
///
/// Every method is one request; callers await them one after another, so an
/// implementation never sees concurrent use from a single [`Chain`](crate::Chain).
#[async_trait]
pub trait ChainBackend: Send + Sync + fmt::Debug {
    /// Runtime code currently stored at `address`, empty if there is none.
    async fn code_at(&self, address: Address) -> Result<Bytes, BackendError>;

    /// Executes a read-only call and returns the raw return data.
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, BackendError>;

    /// Sends a transaction and waits up to `timeout` for its receipt.
    async fn transact(
        &self,
        to: Address,
        input: Bytes,
        timeout: Duration,
    ) -> Result<B256, BackendError>;

    /// Deploys `code` and waits up to `timeout` for the contract address.
    async fn deploy(&self, code: Bytes, timeout: Duration) -> Result<Address, BackendError>;
}
