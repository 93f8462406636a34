//! Primitive types for deplink: compiled contract artifacts and the values
//! that get spliced into bytecode at link time.

pub mod artifact;
pub mod value;

pub use artifact::{ArtifactError, ArtifactSet, ContractArtifact};
pub use value::{LinkOverrides, LinkValue, LinkValueError};

/// Returns `code` without a leading `0x`/`0X` prefix.
pub fn strip_hex_prefix(code: &str) -> &str {
    code.strip_prefix("0x")
        .or_else(|| code.strip_prefix("0X"))
        .unwrap_or(code)
}
