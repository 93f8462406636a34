//! In-memory chain used by tests.
//!
//! Deployments follow a simple convention instead of running the EVM: deploy
//! code is [`CONSTRUCTOR_STUB`] followed by the runtime code, and deploying it
//! stores the runtime code at a fresh address. Deploying
//! [`REGISTRAR_INIT_CODE`] creates a registrar that answers the real
//! `exists`/`getAddress`/`setAddress` ABI.

use crate::{registrar::IRegistrar, registrar_key, BackendError, ChainBackend};
use alloy_primitives::{address, hex, keccak256, Address, Bytes, B256};
use alloy_sol_types::{SolInterface, SolValue};
use async_trait::async_trait;
use deplink_primitives::strip_hex_prefix;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

/// Prefix marking deploy code; everything after it becomes runtime code.
pub const CONSTRUCTOR_STUB: [u8; 5] = hex!("600b380380");

/// Deploy code that creates a registrar.
pub const REGISTRAR_INIT_CODE: [u8; 6] = hex!("60806040deed");

/// Runtime code stored at every registrar the backend creates.
pub const REGISTRAR_RUNTIME_CODE: [u8; 4] = hex!("6080deed");

/// Account that owns every deployment.
pub const DEPLOYER: Address = address!("0x00000000000000000000000000000000000de910");

/// Prepends [`CONSTRUCTOR_STUB`] to runtime hex (placeholders allowed).
pub fn with_constructor_stub(runtime: &str) -> String {
    format!("0x{}{}", hex::encode(CONSTRUCTOR_STUB), strip_hex_prefix(runtime))
}

#[derive(Debug, Default)]
struct State {
    code: HashMap<Address, Bytes>,
    registrars: HashMap<Address, HashMap<String, Address>>,
    nonce: u64,
    code_reads: usize,
    calls: usize,
    transactions: usize,
    deployments: Vec<Address>,
    fail_confirmations: bool,
}

/// A [`ChainBackend`] that keeps all state in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registrar directly, without a deployment.
    pub fn install_registrar(&self) -> Address {
        let mut state = self.state.lock().unwrap();
        let address = state.next_address();
        state
            .code
            .insert(address, Bytes::from_static(&REGISTRAR_RUNTIME_CODE));
        state.registrars.insert(address, HashMap::new());
        address
    }

    /// Stores `code` at `address`, replacing whatever was there.
    pub fn set_code(&self, address: Address, code: impl Into<Bytes>) {
        self.state.lock().unwrap().code.insert(address, code.into());
    }

    /// Writes a registrar entry without a transaction.
    pub fn set_registered(&self, registrar: Address, name: &str, address: Address) {
        self.state
            .lock()
            .unwrap()
            .registrars
            .entry(registrar)
            .or_default()
            .insert(registrar_key(name), address);
    }

    /// Registered address of `name`, if any.
    pub fn registered(&self, registrar: Address, name: &str) -> Option<Address> {
        self.state
            .lock()
            .unwrap()
            .registrars
            .get(&registrar)?
            .get(&registrar_key(name))
            .copied()
    }

    /// Makes every later transaction and deployment time out unapplied.
    pub fn set_fail_confirmations(&self, fail: bool) {
        self.state.lock().unwrap().fail_confirmations = fail;
    }

    /// Number of `code_at` requests served.
    pub fn code_reads(&self) -> usize {
        self.state.lock().unwrap().code_reads
    }

    /// Number of read-only calls served.
    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    /// Number of confirmed transactions, deployments excluded.
    pub fn transactions(&self) -> usize {
        self.state.lock().unwrap().transactions
    }

    /// Every address created by a deployment, in order.
    pub fn deployments(&self) -> Vec<Address> {
        self.state.lock().unwrap().deployments.clone()
    }

    /// Total round trips of any kind.
    pub fn round_trips(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.code_reads + state.calls + state.transactions + state.deployments.len()
    }
}

impl State {
    fn next_address(&mut self) -> Address {
        let address = DEPLOYER.create(self.nonce);
        self.nonce += 1;
        address
    }

    fn tx_hash(&self) -> B256 {
        keccak256(self.nonce.to_be_bytes())
    }
}

fn decode_registrar_call(input: &[u8]) -> Result<IRegistrar::IRegistrarCalls, BackendError> {
    IRegistrar::IRegistrarCalls::abi_decode(input)
        .map_err(|err| BackendError::Decode(err.to_string()))
}

#[async_trait]
impl ChainBackend for MemoryBackend {
    async fn code_at(&self, address: Address) -> Result<Bytes, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.code_reads += 1;
        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, BackendError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        let Some(entries) = state.registrars.get(&to) else {
            return Ok(Bytes::new());
        };

        let output = match decode_registrar_call(&input)? {
            IRegistrar::IRegistrarCalls::exists(call) => {
                entries.contains_key(&call.key).abi_encode()
            }
            IRegistrar::IRegistrarCalls::getAddress(call) => entries
                .get(&call.key)
                .copied()
                .unwrap_or_default()
                .abi_encode(),
            IRegistrar::IRegistrarCalls::setAddress(_) => Vec::new(),
        };
        Ok(output.into())
    }

    async fn transact(
        &self,
        to: Address,
        input: Bytes,
        timeout: Duration,
    ) -> Result<B256, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_confirmations {
            return Err(BackendError::Timeout { timeout });
        }
        if let Some(entries) = state.registrars.get_mut(&to) {
            if let IRegistrar::IRegistrarCalls::setAddress(call) = decode_registrar_call(&input)? {
                entries.insert(call.key, call.value);
            }
        }
        state.transactions += 1;
        state.nonce += 1;
        Ok(state.tx_hash())
    }

    async fn deploy(&self, code: Bytes, timeout: Duration) -> Result<Address, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_confirmations {
            return Err(BackendError::Timeout { timeout });
        }

        let address = state.next_address();
        if code[..] == REGISTRAR_INIT_CODE {
            state.registrars.insert(address, HashMap::new());
            state
                .code
                .insert(address, Bytes::from_static(&REGISTRAR_RUNTIME_CODE));
        } else {
            let runtime = code.strip_prefix(&CONSTRUCTOR_STUB[..]).unwrap_or(&code[..]);
            state.code.insert(address, Bytes::copy_from_slice(runtime));
        }
        state.deployments.push(address);
        Ok(address)
    }
}
