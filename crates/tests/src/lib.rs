//! Integration tests for deplink
//!
//! End to end resolution scenarios run against the in-memory chain backend:
//! registrar lookups, bytecode verification, factory caching and lazy
//! deployment on local chains.

pub mod common;

#[cfg(test)]
mod e2e_tests;
#[cfg(test)]
mod test_local_chain;

pub use common::*;
