//! Placeholder scanning.
//!
//! A placeholder is `__`, one letter or underscore, up to 59 further word
//! characters taken as few as possible, a greedy run of up to 59 underscores
//! and a closing `__`. Matching is left to right and never overlaps, so a
//! 40 character library slot is reported as one reference even though its
//! padding would also satisfy a shorter match.

use deplink_primitives::strip_hex_prefix;

/// Maximum number of word characters after the first name character.
const MAX_BODY: usize = 59;
/// Maximum number of padding underscores before the closing `__`.
const MAX_PADDING: usize = 59;

/// One placeholder found in a bytecode string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkReference {
    /// Name embedded in the placeholder with the underscores stripped. Long
    /// names are truncated by the compiler.
    pub name: String,
    /// Offset of the placeholder in the hex string, after any `0x` prefix.
    pub offset: usize,
    /// Width of the placeholder in hex characters.
    pub length: usize,
}

impl LinkReference {
    /// Offset one past the last character of the placeholder.
    pub const fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Lazy iterator over the placeholders of one bytecode string.
///
/// A clone continues from the same position; call [`find_link_references`]
/// again for a fresh pass.
#[derive(Debug, Clone)]
pub struct LinkReferences<'a> {
    code: &'a str,
    cursor: usize,
}

impl Iterator for LinkReferences<'_> {
    type Item = LinkReference;

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = self.code.as_bytes();
        while self.cursor < bytes.len() {
            let start = self.cursor;
            if bytes[start] == b'_' {
                if let Some(end) = match_placeholder(bytes, start) {
                    self.cursor = end;
                    let name = self.code[start..end].trim_matches('_').to_string();
                    return Some(LinkReference {
                        name,
                        offset: start,
                        length: end - start,
                    });
                }
            }
            self.cursor += 1;
        }
        None
    }
}

/// Returns every placeholder in `bytecode`, which may carry a `0x` prefix.
///
/// Offsets are relative to the unprefixed string. Empty input and a bare
/// `0x` yield nothing.
pub fn find_link_references(bytecode: &str) -> LinkReferences<'_> {
    LinkReferences {
        code: strip_hex_prefix(bytecode),
        cursor: 0,
    }
}

const fn is_word(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

const fn is_head(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_closing(bytes: &[u8], at: usize) -> bool {
    bytes.get(at) == Some(&b'_') && bytes.get(at + 1) == Some(&b'_')
}

/// Tries to match a placeholder starting at `start`, returning its end.
///
/// The body is lazy and the padding greedy, so for each body length the
/// longest padding that still leaves a closing `__` wins.
fn match_placeholder(bytes: &[u8], start: usize) -> Option<usize> {
    if !is_closing(bytes, start) {
        return None;
    }
    let head = start + 2;
    if !is_head(*bytes.get(head)?) {
        return None;
    }
    let body = head + 1;

    for body_len in 0..=MAX_BODY {
        let body_end = body + body_len;
        if body_len > 0 && !bytes.get(body_end - 1).copied().is_some_and(is_word) {
            break;
        }
        let padding = bytes[body_end.min(bytes.len())..]
            .iter()
            .take(MAX_PADDING)
            .take_while(|&&byte| byte == b'_')
            .count();
        for pad in (0..=padding).rev() {
            if is_closing(bytes, body_end + pad) {
                return Some(body_end + pad + 2);
            }
        }
    }
    None
}
