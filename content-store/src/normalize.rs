//! Byte normalization applied before hashing.
//!
//! Identity of a payload must not depend on line-ending style or a leading
//! byte-order mark, so both are stripped before the SHA-256 is taken and the
//! normalized form is what the store keeps.

use std::borrow::Cow;

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Strip a leading BOM and every CR byte. Returns a borrowed slice when the
/// input is already normalized.
pub fn normalize_bytes(raw: &[u8]) -> Cow<'_, [u8]> {
    let body = raw.strip_prefix(BOM).unwrap_or(raw);
    if !body.contains(&b'\r') {
        return Cow::Borrowed(body);
    }
    Cow::Owned(body.iter().copied().filter(|&b| b != b'\r').collect())
}
