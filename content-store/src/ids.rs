//! Stable row identifiers.
//!
//! UUID v5 (name-based) over a composite key, so re-ingesting the same
//! content yields the same ids on any machine.

use uuid::Uuid;

/// Compute a deterministic UUID v5 from a logical key.
#[inline]
pub fn uuid_v5_from_key(key: &str) -> String {
    Uuid::new_v5(&Uuid::nil(), key.as_bytes()).to_string()
}

/// Stable symbol row id: version + file + identity + position + ordinal.
pub fn symbol_row_id(
    version_id: i64,
    relpath: &str,
    symbol_type: &str,
    scope: &str,
    name: &str,
    line: u32,
    ordinal: usize,
) -> String {
    let key = format!("sym|{version_id}|{relpath}|{symbol_type}|{scope}|{name}|{line}|{ordinal}");
    uuid_v5_from_key(&key)
}

/// Stable reference row id, same shape as [`symbol_row_id`].
pub fn ref_row_id(
    version_id: i64,
    relpath: &str,
    ref_type: &str,
    name: &str,
    line: u32,
    ordinal: usize,
) -> String {
    let key = format!("ref|{version_id}|{relpath}|{ref_type}|{name}|{line}|{ordinal}");
    uuid_v5_from_key(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_deterministic() {
        let a = symbol_row_id(1, "common/traits/00_traits.txt", "trait", "traits", "brave", 4, 0);
        let b = symbol_row_id(1, "common/traits/00_traits.txt", "trait", "traits", "brave", 4, 0);
        assert_eq!(a, b);
        let c = symbol_row_id(1, "common/traits/00_traits.txt", "trait", "traits", "brave", 4, 1);
        assert_ne!(a, c);
    }
}
