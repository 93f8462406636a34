//! Linked contract factories, bound instances and the deployed contracts view.

use crate::ChainError;
use alloy_primitives::{hex, Address, Bytes};
use deplink_linker::find_link_references;
use deplink_primitives::ContractArtifact;
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

/// A compiled contract whose placeholders have been filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractFactory {
    name: String,
    code: String,
    code_runtime: String,
    abi: Value,
    source: Option<String>,
}

impl ContractFactory {
    /// Factory from already linked deploy and runtime code.
    pub fn new(artifact: &ContractArtifact, code: String, code_runtime: String) -> Self {
        Self {
            name: artifact.name.clone(),
            code,
            code_runtime,
            abi: artifact.abi.clone(),
            source: artifact.source.clone(),
        }
    }

    /// Factory carrying the artifact's code as is.
    pub fn unlinked(artifact: &ContractArtifact) -> Self {
        Self::new(artifact, artifact.code.clone(), artifact.code_runtime.clone())
    }

    /// Contract name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Linked deploy code as hex.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Linked runtime code as hex.
    pub fn code_runtime(&self) -> &str {
        &self.code_runtime
    }

    /// Contract ABI.
    pub const fn abi(&self) -> &Value {
        &self.abi
    }

    /// Source path the contract was compiled from.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Returns true if neither code string has a placeholder left.
    pub fn is_linked(&self) -> bool {
        find_link_references(&self.code).next().is_none()
            && find_link_references(&self.code_runtime).next().is_none()
    }

    /// Runtime code as bytes, which is what a deployment leaves on chain.
    pub fn runtime_bytes(&self) -> Result<Bytes, ChainError> {
        self.decode(&self.code_runtime)
    }

    /// Deploy code with ABI encoded constructor arguments appended.
    pub fn deploy_code(&self, constructor_args: &[u8]) -> Result<Bytes, ChainError> {
        let mut code = self.decode(&self.code)?.to_vec();
        if code.is_empty() {
            return Err(ChainError::InvalidBytecode {
                name: self.name.clone(),
                reason: "contract has no deploy code".to_string(),
            });
        }
        code.extend_from_slice(constructor_args);
        Ok(code.into())
    }

    /// Binds the factory to a deployed address.
    pub fn at(self: Arc<Self>, address: Address) -> ContractInstance {
        ContractInstance {
            factory: self,
            address,
        }
    }

    fn decode(&self, code: &str) -> Result<Bytes, ChainError> {
        let unlinked: Vec<String> = find_link_references(code)
            .map(|reference| reference.name)
            .collect();
        if !unlinked.is_empty() {
            return Err(ChainError::InvalidBytecode {
                name: self.name.clone(),
                reason: format!("unlinked references: {}", unlinked.join(", ")),
            });
        }
        hex::decode(code)
            .map(Bytes::from)
            .map_err(|err| ChainError::InvalidBytecode {
                name: self.name.clone(),
                reason: err.to_string(),
            })
    }
}

/// A contract factory bound to the address it is deployed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractInstance {
    factory: Arc<ContractFactory>,
    address: Address,
}

impl ContractInstance {
    /// Contract name.
    pub fn name(&self) -> &str {
        self.factory.name()
    }

    /// Deployed address.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The factory the instance was created from.
    pub const fn factory(&self) -> &Arc<ContractFactory> {
        &self.factory
    }
}

/// Read-only, name ordered view of the contracts available on a chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployedContracts {
    contracts: BTreeMap<String, ContractInstance>,
}

impl DeployedContracts {
    /// Contract `name`, if it is available.
    pub fn get(&self, name: &str) -> Option<&ContractInstance> {
        self.contracts.get(name)
    }

    /// Returns true if `name` is available.
    pub fn contains(&self, name: &str) -> bool {
        self.contracts.contains_key(name)
    }

    /// Number of available contracts.
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Returns true if no contract is available.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Available contract names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.contracts.keys().map(String::as_str)
    }

    /// Iterates over `(name, instance)` in name order.
    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, String, ContractInstance> {
        self.contracts.iter()
    }
}

impl FromIterator<ContractInstance> for DeployedContracts {
    fn from_iter<T: IntoIterator<Item = ContractInstance>>(iter: T) -> Self {
        Self {
            contracts: iter
                .into_iter()
                .map(|instance| (instance.name().to_string(), instance))
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DeployedContracts {
    type Item = (&'a String, &'a ContractInstance);
    type IntoIter = std::collections::btree_map::Iter<'a, String, ContractInstance>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
