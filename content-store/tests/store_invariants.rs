//! Store-level invariants: content identity, version roots, idempotence,
//! deletion markers, playset hashing.

use content_store::{ContentStore, StoreError, hash, normalize::normalize_bytes};

fn store() -> ContentStore {
    ContentStore::open_in_memory().unwrap()
}

#[test]
fn recorded_hash_matches_stored_content() {
    let store = store();
    let (h, inserted) = store.put_content(b"brave = { index = 42 }\n").unwrap();
    assert!(inserted);
    let bytes = store.get_content(&h).unwrap().unwrap();
    assert_eq!(hash::content_hash(&bytes), h);
}

#[test]
fn put_content_is_idempotent() {
    let store = store();
    let (h1, first) = store.put_content(b"a = 1\n").unwrap();
    let (h2, second) = store.put_content(b"a = 1\n").unwrap();
    assert_eq!(h1, h2);
    assert!(first);
    assert!(!second);
}

#[test]
fn crlf_and_lf_content_share_one_hash() {
    let store = store();
    let (h1, _) = store.put_content(b"a = 1\r\nb = 2\r\n").unwrap();
    let (h2, inserted) = store.put_content(b"a = 1\nb = 2\n").unwrap();
    assert_eq!(h1, h2);
    assert!(!inserted);
    // Stored bytes are the normalized form.
    let bytes = store.get_content(&h1).unwrap().unwrap();
    assert_eq!(bytes, b"a = 1\nb = 2\n");
}

#[test]
fn bom_is_stripped_before_hashing() {
    let with_bom = b"\xEF\xBB\xBFkey = yes\n";
    let without = b"key = yes\n";
    assert_eq!(
        hash::content_hash(&normalize_bytes(with_bom)),
        hash::content_hash(&normalize_bytes(without))
    );
}

#[test]
fn version_root_covers_sorted_live_files() {
    let store = store();
    let v = store.create_or_refresh_version("base_game", "1.0").unwrap();
    let (h1, _) = store.put_content(b"one").unwrap();
    let (h2, _) = store.put_content(b"two").unwrap();
    store
        .record_file(v, "common/traits/00_traits.txt", Some(&h1))
        .unwrap();
    store
        .record_file(v, "common/traits/01_extra.txt", Some(&h2))
        .unwrap();
    let root = store.seal_version(v).unwrap();

    let expected = hash::version_root_hash(&[
        ("common/traits/00_traits.txt".to_string(), h1),
        ("common/traits/01_extra.txt".to_string(), h2),
    ]);
    assert_eq!(root, expected);
    assert_eq!(store.recompute_version_root(v).unwrap(), root);
}

#[test]
fn deleted_files_leave_the_root() {
    let store = store();
    let v = store.create_or_refresh_version("mod_a", "r1").unwrap();
    let (h1, _) = store.put_content(b"one").unwrap();
    let (h2, _) = store.put_content(b"two").unwrap();
    store.record_file(v, "common/traits/a.txt", Some(&h1)).unwrap();
    store.record_file(v, "common/traits/b.txt", Some(&h2)).unwrap();
    let root_both = store.seal_version(v).unwrap();

    let v = store.create_or_refresh_version("mod_a", "r1").unwrap();
    store.record_file(v, "common/traits/b.txt", None).unwrap();
    let root_one = store.seal_version(v).unwrap();

    assert_ne!(root_both, root_one);
    let files = store.version_files(v).unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].relpath, "common/traits/a.txt");
    // The marker row itself is still visible when asked for directly.
    let marker = store.file_record(v, "common/traits/b.txt").unwrap().unwrap();
    assert!(marker.deleted);
}

#[test]
fn sealed_versions_refuse_writes() {
    let store = store();
    let v = store.create_or_refresh_version("base_game", "1.0").unwrap();
    let (h, _) = store.put_content(b"x").unwrap();
    store.record_file(v, "common/traits/a.txt", Some(&h)).unwrap();
    store.seal_version(v).unwrap();
    let err = store.record_file(v, "common/traits/b.txt", Some(&h));
    assert!(matches!(err, Err(StoreError::VersionSealed(_))));
}

#[test]
fn ast_cache_is_keyed_by_parser_version() {
    let store = store();
    let (h, _) = store.put_content(b"a = 1").unwrap();
    store.ast_cache_put(&h, 2, b"old-shape", 0).unwrap();
    store.ast_cache_put(&h, 3, b"new-shape", 1).unwrap();
    assert_eq!(
        store.ast_cache_get(&h, 2).unwrap(),
        Some((b"old-shape".to_vec(), 0))
    );
    assert_eq!(
        store.ast_cache_get(&h, 3).unwrap(),
        Some((b"new-shape".to_vec(), 1))
    );
    assert_eq!(store.ast_cache_get(&h, 4).unwrap(), None);
    // First writer wins; a bump never mutates prior entries.
    store.ast_cache_put(&h, 2, b"imposter", 0).unwrap();
    assert_eq!(
        store.ast_cache_get(&h, 2).unwrap(),
        Some((b"old-shape".to_vec(), 0))
    );
}

#[test]
fn playset_hash_covers_ordered_roots() {
    let store = store();
    let mut ids = Vec::new();
    let mut roots = Vec::new();
    for (name, body) in [("base_game", "a = 1"), ("mod_a", "a = 2"), ("mod_b", "a = 3")] {
        let v = store.create_or_refresh_version(name, "1.0").unwrap();
        let (h, _) = store.put_content(body.as_bytes()).unwrap();
        store.record_file(v, "common/traits/t.txt", Some(&h)).unwrap();
        roots.push(store.seal_version(v).unwrap());
        ids.push(v);
    }
    let playset = store.create_playset("test", &ids).unwrap();
    assert_eq!(playset.playset_hash, hash::playset_hash(&roots));
    assert_eq!(playset.version_roots, roots);

    let loaded = store.get_playset(&playset.playset_id).unwrap();
    assert_eq!(loaded, playset);
}

#[test]
fn playset_requires_sealed_versions() {
    let store = store();
    let v = store.create_or_refresh_version("mod_a", "r1").unwrap();
    let err = store.create_playset("bad", &[v]);
    assert!(matches!(err, Err(StoreError::VersionNotSealed(_))));
}

#[test]
fn symbol_rows_replace_per_file() {
    use content_store::{RefRow, SymbolRow, ids};

    let store = store();
    let v = store.create_or_refresh_version("base_game", "1.0").unwrap();
    let sym = |name: &str, ordinal: usize| SymbolRow {
        symbol_id: ids::symbol_row_id(v, "common/traits/t.txt", "trait", "traits", name, 1, ordinal),
        content_version_id: v,
        relpath: "common/traits/t.txt".into(),
        symbol_type: "trait".into(),
        scope: "traits".into(),
        name: name.into(),
        line: 1,
    };
    store
        .replace_extractions(v, "common/traits/t.txt", &[sym("brave", 0), sym("craven", 1)], &[])
        .unwrap();
    assert_eq!(store.symbols_for_versions(&[v]).unwrap().len(), 2);

    // Refresh of the same file replaces, not appends.
    store
        .replace_extractions(v, "common/traits/t.txt", &[sym("brave", 0)], &[])
        .unwrap();
    let rows = store.symbols_for_versions(&[v]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "brave");

    let unbound = RefRow {
        ref_id: ids::ref_row_id(v, "common/traits/t.txt", "trait", "ghost", 3, 0),
        content_version_id: v,
        relpath: "common/traits/t.txt".into(),
        ref_type: "trait".into(),
        name: "ghost".into(),
        line: 3,
    };
    store
        .replace_extractions(v, "common/traits/t.txt", &[sym("brave", 0)], &[unbound])
        .unwrap();
    let dangling = store.unbound_references(&[v]).unwrap();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].name, "ghost");
}
