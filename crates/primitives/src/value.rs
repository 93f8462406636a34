//! Values substituted for link placeholders.

use alloy_primitives::{hex, Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use thiserror::Error;

/// Caller-supplied `name -> value` bindings that bypass every other address
/// source.
///
/// A `BTreeMap` keeps the entries sorted, which is what the factory cache key
/// relies on.
pub type LinkOverrides = BTreeMap<String, LinkValue>;

const ADDRESS_LEN: usize = 20;

/// A raw value written into a link placeholder.
///
/// Most placeholders are address sized (20 bytes, 40 hex characters) but
/// compilers also emit 32-byte value slots, so the value is kept as raw bytes
/// and its width is checked against the slot when linking.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkValue(Bytes);

impl LinkValue {
    /// Wraps raw bytes.
    pub const fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    pub const fn bytes(&self) -> &Bytes {
        &self.0
    }

    /// Returns the byte length of the value.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the value holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Width of the value once hex encoded, which is what a placeholder slot
    /// is measured in.
    pub fn hex_len(&self) -> usize {
        self.0.len() * 2
    }

    /// Lowercase hex digits without a `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Returns the value as an address if it is exactly 20 bytes long.
    pub fn as_address(&self) -> Option<Address> {
        (self.0.len() == ADDRESS_LEN).then(|| Address::from_slice(&self.0))
    }
}

impl From<Address> for LinkValue {
    fn from(address: Address) -> Self {
        Self(Bytes::copy_from_slice(address.as_slice()))
    }
}

impl From<B256> for LinkValue {
    fn from(word: B256) -> Self {
        Self(Bytes::copy_from_slice(word.as_slice()))
    }
}

impl From<Bytes> for LinkValue {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl FromStr for LinkValue {
    type Err = LinkValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if crate::strip_hex_prefix(trimmed).is_empty() {
            return Err(LinkValueError::Empty);
        }
        hex::decode(trimmed)
            .map(|bytes| Self(bytes.into()))
            .map_err(|err| LinkValueError::InvalidHex {
                value: trimmed.to_string(),
                reason: err.to_string(),
            })
    }
}

impl fmt::Display for LinkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// Errors raised while parsing a [`LinkValue`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkValueError {
    /// The input held no hex digits.
    #[error("link value is empty")]
    Empty,
    /// The input was not valid hex.
    #[error("invalid link value {value:?}: {reason}")]
    InvalidHex {
        /// The rejected input.
        value: String,
        /// Decoder message.
        reason: String,
    },
}
