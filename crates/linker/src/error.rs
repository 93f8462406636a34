use thiserror::Error;

/// Errors raised while expanding, linking or ordering contracts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    /// A placeholder name matches none of the known contract names.
    #[error("unable to expand link reference '{name}'; searched: {searched}", searched = .searched.join(", "))]
    UnknownReference {
        /// Name as found in the bytecode.
        name: String,
        /// Every full name that was considered.
        searched: Vec<String>,
    },
    /// A placeholder name is a prefix of several known contract names.
    #[error("multiple candidates found expanding link reference '{name}': {candidates}", candidates = .candidates.join(", "))]
    AmbiguousReference {
        /// Name as found in the bytecode.
        name: String,
        /// The names it could stand for.
        candidates: Vec<String>,
    },
    /// A link value does not fit the placeholder slot it was bound to.
    #[error("link value for '{name}' is {actual} hex characters but the reference is {expected}")]
    LinkValueLengthMismatch {
        /// Name of the bound reference.
        name: String,
        /// Width of the placeholder in hex characters.
        expected: usize,
        /// Width of the supplied value in hex characters.
        actual: usize,
    },
    /// Library dependencies form a cycle and can never be deployed.
    #[error("cyclic library dependency: {cycle}", cycle = .cycle.join(" -> "))]
    DependencyCycle {
        /// Names along the cycle, first name repeated at the end.
        cycle: Vec<String>,
    },
}

impl LinkError {
    /// Returns true for the name expansion failures (unknown or ambiguous).
    pub const fn is_reference_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownReference { .. } | Self::AmbiguousReference { .. }
        )
    }
}
