//! Placeholder substitution.

use crate::{scan::find_link_references, LinkError};
use deplink_primitives::LinkValue;
use std::collections::BTreeMap;
use tracing::debug;

/// Width of an address slot in hex characters.
pub const ADDRESS_SLOT_WIDTH: usize = 40;

/// Returns the placeholder text the compiler emits for `name` in a slot of
/// `width` hex characters.
///
/// The name is cut to `width - 4` characters, padded with underscores to
/// `width - 2` and prefixed with `__`.
pub fn link_marker(name: &str, width: usize) -> String {
    let truncated: String = name.chars().take(width.saturating_sub(4)).collect();
    format!("__{truncated:_<pad$}", pad = width.saturating_sub(2))
}

/// Replaces every placeholder bound in `values` with the hex of its value.
///
/// Placeholders are located once on the input, so the inserted hex is never
/// rescanned and the result does not depend on binding order. Placeholders
/// with no binding are left in place. The output keeps the input's `0x`
/// prefix, if any, and its exact length.
pub fn link_bytecode(
    bytecode: &str,
    values: &BTreeMap<String, LinkValue>,
) -> Result<String, LinkError> {
    if values.is_empty() {
        return Ok(bytecode.to_string());
    }

    let prefix_len = bytecode.len() - deplink_primitives::strip_hex_prefix(bytecode).len();
    let (prefix, code) = bytecode.split_at(prefix_len);
    let mut linked = String::with_capacity(bytecode.len());
    linked.push_str(prefix);

    let mut copied = 0;
    for reference in find_link_references(code) {
        let slot = &code[reference.offset..reference.end()];
        let mut bound = values
            .iter()
            .filter(|(name, _)| link_marker(name, reference.length) == slot);

        let Some((name, value)) = bound.next() else {
            continue;
        };
        if let Some((other, _)) = bound.next() {
            return Err(LinkError::AmbiguousReference {
                name: reference.name,
                candidates: vec![name.clone(), other.clone()],
            });
        }
        if value.hex_len() != reference.length {
            return Err(LinkError::LinkValueLengthMismatch {
                name: name.clone(),
                expected: reference.length,
                actual: value.hex_len(),
            });
        }

        debug!(
            target: "deplink::link",
            library = %name,
            offset = reference.offset,
            value = %value,
            "linking reference"
        );
        linked.push_str(&code[copied..reference.offset]);
        linked.push_str(&value.to_hex());
        copied = reference.end();
    }
    linked.push_str(&code[copied..]);

    Ok(linked)
}
