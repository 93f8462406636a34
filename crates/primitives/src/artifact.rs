//! Compiled contract artifacts as handed over by the compiler.
//!
//! The linking subsystem never mutates an artifact. Bytecode is kept as hex
//! text because unlinked code still contains `__Name____` placeholders and is
//! therefore not decodable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::HashMap, fs, path::Path};
use thiserror::Error;

/// One compiled contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractArtifact {
    /// Contract name, unique within a compilation unit.
    pub name: String,
    /// Deploy (constructor) bytecode as hex, possibly with placeholders.
    #[serde(default)]
    pub code: String,
    /// Runtime bytecode as hex, possibly with placeholders.
    #[serde(default)]
    pub code_runtime: String,
    /// Contract ABI, opaque to the linker.
    #[serde(default)]
    pub abi: Value,
    /// Path of the source file the contract was compiled from.
    #[serde(default)]
    pub source: Option<String>,
}

impl ContractArtifact {
    /// Creates an artifact with an empty ABI and no source path.
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        code_runtime: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            code_runtime: code_runtime.into(),
            abi: Value::Array(Vec::new()),
            source: None,
        }
    }

    /// Sets the ABI.
    pub fn with_abi(mut self, abi: Value) -> Self {
        self.abi = abi;
        self
    }

    /// Sets the source path.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Returns true if the artifact carries deploy code.
    ///
    /// Interfaces and abstract contracts compile to nothing.
    pub fn has_code(&self) -> bool {
        !crate::strip_hex_prefix(&self.code).is_empty()
    }
}

/// On-disk shape of one entry in the compiled contracts JSON.
#[derive(Debug, Deserialize)]
struct RawArtifact {
    #[serde(default, alias = "bytecode", alias = "deploy_bytecode")]
    code: Option<String>,
    #[serde(default, alias = "runtime_bytecode", alias = "bytecode_runtime")]
    code_runtime: Option<String>,
    #[serde(default)]
    abi: Value,
    #[serde(default)]
    source: Option<String>,
}

/// The complete set of artifacts of one build, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    artifacts: Vec<ContractArtifact>,
    index: HashMap<String, usize>,
}

impl ArtifactSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact, replacing (in place) any artifact with the same name.
    pub fn insert(&mut self, artifact: ContractArtifact) -> Option<ContractArtifact> {
        if let Some(&position) = self.index.get(&artifact.name) {
            return Some(std::mem::replace(&mut self.artifacts[position], artifact));
        }
        self.index
            .insert(artifact.name.clone(), self.artifacts.len());
        self.artifacts.push(artifact);
        None
    }

    /// Looks up an artifact by exact name.
    pub fn get(&self, name: &str) -> Option<&ContractArtifact> {
        self.index.get(name).map(|&position| &self.artifacts[position])
    }

    /// Returns true if an artifact with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates over the artifacts in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, ContractArtifact> {
        self.artifacts.iter()
    }

    /// Iterates over the contract names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.artifacts.iter().map(|artifact| artifact.name.as_str())
    }

    /// Number of artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Parses the compiled contracts JSON document
    /// (`{"Name": {"code": .., "code_runtime": .., "abi": .., "source": ..}}`).
    ///
    /// Contracts keep the order they appear in the document.
    pub fn from_json_str(json: &str) -> Result<Self, ArtifactError> {
        let raw: serde_json::Map<String, Value> = serde_json::from_str(json)?;
        let mut set = Self::new();
        for (name, entry) in raw {
            let entry: RawArtifact = serde_json::from_value(entry).map_err(|source| {
                ArtifactError::InvalidEntry {
                    name: name.clone(),
                    source,
                }
            })?;
            set.insert(ContractArtifact {
                name,
                code: entry.code.unwrap_or_default(),
                code_runtime: entry.code_runtime.unwrap_or_default(),
                abi: entry.abi,
                source: entry.source,
            });
        }
        Ok(set)
    }

    /// Reads and parses a compiled contracts JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

impl FromIterator<ContractArtifact> for ArtifactSet {
    fn from_iter<T: IntoIterator<Item = ContractArtifact>>(iter: T) -> Self {
        let mut set = Self::new();
        for artifact in iter {
            set.insert(artifact);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ArtifactSet {
    type Item = &'a ContractArtifact;
    type IntoIter = std::slice::Iter<'a, ContractArtifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Errors raised while loading compiled artifacts.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The artifact file could not be read.
    #[error("failed to read compiled contracts from {path}: {source}")]
    Io {
        /// Path that failed to load.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The document is not a JSON object.
    #[error("invalid compiled contracts document: {0}")]
    Json(#[from] serde_json::Error),
    /// One contract entry has an unexpected shape.
    #[error("invalid compiled contract entry {name}: {source}")]
    InvalidEntry {
        /// Contract name of the bad entry.
        name: String,
        /// Deserialization error.
        source: serde_json::Error,
    },
}
