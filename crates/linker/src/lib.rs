//! Bytecode linking for compiled EVM contracts.
//!
//! Compilers leave `__Name______` placeholders in bytecode wherever a library
//! address has to be filled in before deployment. This crate finds those
//! placeholders, expands the (possibly truncated) names they carry, rewrites
//! them with concrete values, and orders contracts so libraries are deployed
//! before the contracts that link against them.

pub mod error;
pub mod graph;
pub mod link;
pub mod names;
pub mod scan;

pub use error::LinkError;
pub use graph::DependencyGraph;
pub use link::{link_bytecode, link_marker, ADDRESS_SLOT_WIDTH};
pub use names::{expand_reference_name, extract_link_reference_names};
pub use scan::{find_link_references, LinkReference, LinkReferences};
