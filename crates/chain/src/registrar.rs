//! Access to the on-chain registrar contract.
//!
//! The registrar is a plain string to address store. This crate only ever
//! reads and writes keys of the form `contract/<name>`.

use crate::{BackendError, ChainBackend};
use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::{sol, SolCall};
use std::time::Duration;
use tracing::info;

sol! {
    /// Name to address registry contract.
    interface IRegistrar {
        function exists(string key) external view returns (bool);
        function getAddress(string key) external view returns (address);
        function setAddress(string key, address value) external;
    }
}

/// Prefix of every key written for a deployed contract.
pub const CONTRACT_KEY_PREFIX: &str = "contract/";

/// Registrar key holding the address of contract `name`.
pub fn registrar_key(name: &str) -> String {
    format!("{CONTRACT_KEY_PREFIX}{name}")
}

/// A registrar contract deployed at a known address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Registrar {
    address: Address,
}

impl Registrar {
    /// Registrar at `address`.
    pub const fn new(address: Address) -> Self {
        Self { address }
    }

    /// Address of the registrar contract.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns true if an address is registered for contract `name`.
    pub async fn exists(
        &self,
        backend: &dyn ChainBackend,
        name: &str,
    ) -> Result<bool, BackendError> {
        let input = IRegistrar::existsCall {
            key: registrar_key(name),
        }
        .abi_encode();
        let output = backend.call(self.address, Bytes::from(input)).await?;
        IRegistrar::existsCall::abi_decode_returns(&output)
            .map_err(|err| BackendError::Decode(err.to_string()))
    }

    /// Registered address of contract `name`.
    ///
    /// Unregistered names read as the zero address, so check
    /// [`exists`](Self::exists) first.
    pub async fn get_address(
        &self,
        backend: &dyn ChainBackend,
        name: &str,
    ) -> Result<Address, BackendError> {
        let input = IRegistrar::getAddressCall {
            key: registrar_key(name),
        }
        .abi_encode();
        let output = backend.call(self.address, Bytes::from(input)).await?;
        IRegistrar::getAddressCall::abi_decode_returns(&output)
            .map_err(|err| BackendError::Decode(err.to_string()))
    }

    /// Registers `address` for contract `name` and waits for the receipt.
    pub async fn register(
        &self,
        backend: &dyn ChainBackend,
        name: &str,
        address: Address,
        timeout: Duration,
    ) -> Result<B256, BackendError> {
        let input = IRegistrar::setAddressCall {
            key: registrar_key(name),
            value: address,
        }
        .abi_encode();
        let tx_hash = backend
            .transact(self.address, Bytes::from(input), timeout)
            .await?;
        info!(
            target: "deplink::registrar",
            contract = name,
            %address,
            %tx_hash,
            "registered contract"
        );
        Ok(tx_hash)
    }
}
