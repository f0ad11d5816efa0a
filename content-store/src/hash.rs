//! Content, version-root, and playset hashing.
//!
//! All three identities are SHA-256 rendered as lowercase hex. The root hash
//! of a version covers the lexicographically sorted `(relpath, content_hash)`
//! pairs of its live files; the playset hash covers the ordered version
//! roots. Encodings are fixed so the same logical input always hashes the
//! same way.

use sha2::{Digest, Sha256};

/// SHA-256 of a payload, lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex(&hasher.finalize())
}

/// Root hash over `(relpath, content_hash)` pairs. The caller passes live
/// files only; pairs are sorted here so input order never matters.
pub fn version_root_hash(pairs: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (relpath, hash) in sorted {
        hasher.update(relpath.as_bytes());
        hasher.update([0]);
        hasher.update(hash.as_bytes());
        hasher.update([b'\n']);
    }
    hex(&hasher.finalize())
}

/// Playset hash over the ordered version roots. Order is significant.
pub fn playset_hash(roots: &[String]) -> String {
    let mut hasher = Sha256::new();
    for root in roots {
        hasher.update(root.as_bytes());
        hasher.update([b'\n']);
    }
    hex(&hasher.finalize())
}

fn hex(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }

    #[test]
    fn root_hash_ignores_input_order() {
        let a = vec![
            ("common/traits/one.txt".into(), "h1".into()),
            ("common/traits/two.txt".into(), "h2".into()),
        ];
        let b = vec![a[1].clone(), a[0].clone()];
        assert_eq!(version_root_hash(&a), version_root_hash(&b));
    }

    #[test]
    fn playset_hash_respects_order() {
        let roots = vec!["r1".to_string(), "r2".to_string()];
        let reversed = vec!["r2".to_string(), "r1".to_string()];
        assert_ne!(playset_hash(&roots), playset_hash(&reversed));
    }
}
