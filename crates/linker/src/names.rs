//! Expansion of truncated placeholder names.
//!
//! A placeholder has room for at most 36 name characters, so the compiler cuts
//! longer names short. The full name is recovered by prefix match against
//! every contract name known to the build.

use crate::{scan::find_link_references, LinkError};
use std::collections::BTreeSet;

/// Expands `short_name` to the one known name it stands for.
///
/// An exact match wins outright. Otherwise exactly one known name must start
/// with `short_name`.
pub fn expand_reference_name<'a, I>(short_name: &str, known_names: I) -> Result<String, LinkError>
where
    I: IntoIterator<Item = &'a str>,
{
    let known: BTreeSet<&str> = known_names.into_iter().collect();
    if known.contains(short_name) {
        return Ok(short_name.to_string());
    }

    let mut candidates = known
        .iter()
        .filter(|full_name| full_name.starts_with(short_name))
        .map(|full_name| (*full_name).to_string());

    match (candidates.next(), candidates.next()) {
        (Some(only), None) => Ok(only),
        (Some(first), Some(second)) => {
            let mut all = vec![first, second];
            all.extend(candidates);
            Err(LinkError::AmbiguousReference {
                name: short_name.to_string(),
                candidates: all,
            })
        }
        _ => Err(LinkError::UnknownReference {
            name: short_name.to_string(),
            searched: known.iter().map(|name| (*name).to_string()).collect(),
        }),
    }
}

/// Returns the full names of every library `bytecode` links against.
pub fn extract_link_reference_names<'a, I>(
    bytecode: &str,
    known_names: I,
) -> Result<BTreeSet<String>, LinkError>
where
    I: IntoIterator<Item = &'a str>,
{
    let known: Vec<&str> = known_names.into_iter().collect();
    find_link_references(bytecode)
        .map(|reference| expand_reference_name(&reference.name, known.iter().copied()))
        .collect()
}
