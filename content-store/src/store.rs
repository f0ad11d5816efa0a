//! SQLite persistence layer.
//!
//! One connection behind a mutex: readers and the single writer serialize
//! here, which is the store's whole concurrency story — pure computation
//! happens outside. Content and cache tables are append-only; symbol and
//! reference rows are replaced per `(version, relpath)` when a version is
//! refreshed.

use crate::errors::{Result, StoreError};
use crate::hash;
use crate::model::{FileRecord, PlaysetRecord, RefRow, SymbolRow, VersionRecord};
use crate::normalize::normalize_bytes;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS content (
    content_hash TEXT PRIMARY KEY,
    bytes        BLOB NOT NULL,
    created_at   INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS content_version (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    source_name  TEXT NOT NULL,
    version_tag  TEXT NOT NULL,
    root_hash    TEXT,
    sealed       INTEGER NOT NULL DEFAULT 0,
    created_at   INTEGER NOT NULL,
    UNIQUE (source_name, version_tag)
);
CREATE TABLE IF NOT EXISTS file (
    content_version_id INTEGER NOT NULL,
    relpath            TEXT NOT NULL,
    content_hash       TEXT,
    deleted            INTEGER NOT NULL DEFAULT 0,
    updated_seq        INTEGER NOT NULL,
    PRIMARY KEY (content_version_id, relpath)
);
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS ast_cache (
    content_hash   TEXT NOT NULL,
    parser_version INTEGER NOT NULL,
    serialized_ast BLOB NOT NULL,
    diag_count     INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (content_hash, parser_version)
);
CREATE TABLE IF NOT EXISTS symbol (
    symbol_id          TEXT PRIMARY KEY,
    content_version_id INTEGER NOT NULL,
    relpath            TEXT NOT NULL,
    symbol_type        TEXT NOT NULL,
    scope              TEXT NOT NULL,
    name               TEXT NOT NULL,
    line               INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_symbol_name ON symbol (name);
CREATE INDEX IF NOT EXISTS idx_symbol_version ON symbol (content_version_id, relpath);
CREATE TABLE IF NOT EXISTS reference (
    ref_id             TEXT PRIMARY KEY,
    content_version_id INTEGER NOT NULL,
    relpath            TEXT NOT NULL,
    ref_type           TEXT NOT NULL,
    name               TEXT NOT NULL,
    line               INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reference_name ON reference (name);
CREATE INDEX IF NOT EXISTS idx_reference_version ON reference (content_version_id, relpath);
CREATE TABLE IF NOT EXISTS playset (
    playset_id          TEXT PRIMARY KEY,
    name                TEXT NOT NULL,
    ordered_version_ids TEXT NOT NULL,
    version_roots       TEXT NOT NULL,
    playset_hash        TEXT NOT NULL,
    created_seq         INTEGER NOT NULL,
    created_at          INTEGER NOT NULL
);
";

pub struct ContentStore {
    conn: Mutex<Connection>,
}

impl ContentStore {
    /// Open (or create) the database file and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        // WAL keeps concurrent readers cheap. The pragma returns a row, so
        // query_row instead of execute.
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.execute_batch(SCHEMA)?;
        info!("store: opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Next value of the store-wide mutation sequence. Wall clocks cannot
    /// order same-second writes; this can.
    fn next_seq(conn: &Connection) -> rusqlite::Result<i64> {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('seq', 1)
             ON CONFLICT(key) DO UPDATE SET value = value + 1",
            [],
        )?;
        conn.query_row("SELECT value FROM meta WHERE key = 'seq'", [], |row| {
            row.get(0)
        })
    }

    /* ----------------------------- content ----------------------------- */

    /// Store a payload under its normalized SHA-256. Idempotent; returns the
    /// hash and whether the payload was newly inserted.
    pub fn put_content(&self, raw: &[u8]) -> Result<(String, bool)> {
        let normalized = normalize_bytes(raw);
        let content_hash = hash::content_hash(&normalized);
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO content (content_hash, bytes, created_at) VALUES (?1, ?2, ?3)",
            params![content_hash, normalized.as_ref(), Utc::now().timestamp()],
        )?;
        Ok((content_hash, inserted > 0))
    }

    pub fn get_content(&self, content_hash: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT bytes FROM content WHERE content_hash = ?1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?)
    }

    /* ----------------------------- versions ---------------------------- */

    /// Create a version for `(source_name, version_tag)`, or unseal the
    /// existing one for a refresh. Refreshing is the single-writer ingest
    /// path; resolution reads only sealed versions.
    pub fn create_or_refresh_version(&self, source_name: &str, version_tag: &str) -> Result<i64> {
        let conn = self.conn();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM content_version WHERE source_name = ?1 AND version_tag = ?2",
                params![source_name, version_tag],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            conn.execute(
                "UPDATE content_version SET sealed = 0, root_hash = NULL WHERE id = ?1",
                params![id],
            )?;
            debug!("store: refresh version {} ({source_name} {version_tag})", id);
            return Ok(id);
        }
        conn.execute(
            "INSERT INTO content_version (source_name, version_tag, created_at) VALUES (?1, ?2, ?3)",
            params![source_name, version_tag, Utc::now().timestamp()],
        )?;
        let id = conn.last_insert_rowid();
        debug!("store: new version {} ({source_name} {version_tag})", id);
        Ok(id)
    }

    pub fn version(&self, version_id: i64) -> Result<VersionRecord> {
        self.conn()
            .query_row(
                "SELECT id, source_name, version_tag, root_hash, sealed
                 FROM content_version WHERE id = ?1",
                params![version_id],
                version_from_row,
            )
            .optional()?
            .ok_or(StoreError::UnknownVersion(version_id))
    }

    pub fn find_version(&self, source_name: &str, version_tag: &str) -> Result<Option<VersionRecord>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT id, source_name, version_tag, root_hash, sealed
                 FROM content_version WHERE source_name = ?1 AND version_tag = ?2",
                params![source_name, version_tag],
                version_from_row,
            )
            .optional()?)
    }

    /// Declare a file membership. `content_hash = None` records a deletion
    /// marker. No-ops when the row already matches, so refreshes only touch
    /// rows that really changed.
    pub fn record_file(
        &self,
        version_id: i64,
        relpath: &str,
        content_hash: Option<&str>,
    ) -> Result<()> {
        let version = self.version(version_id)?;
        if version.sealed {
            return Err(StoreError::VersionSealed(version_id));
        }
        let conn = self.conn();
        let existing: Option<(Option<String>, bool)> = conn
            .query_row(
                "SELECT content_hash, deleted FROM file
                 WHERE content_version_id = ?1 AND relpath = ?2",
                params![version_id, relpath],
                |row| Ok((row.get(0)?, row.get::<_, i64>(1)? != 0)),
            )
            .optional()?;
        let desired_deleted = content_hash.is_none();
        if let Some((ref hash_now, deleted_now)) = existing {
            if hash_now.as_deref() == content_hash && deleted_now == desired_deleted {
                return Ok(());
            }
        }
        let seq = Self::next_seq(&conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO file (content_version_id, relpath, content_hash, deleted, updated_seq)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![version_id, relpath, content_hash, desired_deleted as i64, seq],
        )?;
        Ok(())
    }

    /// Live relpaths currently recorded for a version (deletion markers
    /// excluded), lexicographically ordered.
    pub fn version_files(&self, version_id: i64) -> Result<Vec<FileRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT content_version_id, relpath, content_hash, deleted FROM file
             WHERE content_version_id = ?1 AND deleted = 0
             ORDER BY relpath",
        )?;
        let rows = stmt.query_map(params![version_id], file_from_row)?;
        collect_rows(rows)
    }

    /// Live files under a folder prefix (must end with `/`), ordered by
    /// relpath — the intra-version load order.
    pub fn files_under(&self, version_id: i64, folder_prefix: &str) -> Result<Vec<FileRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT content_version_id, relpath, content_hash, deleted FROM file
             WHERE content_version_id = ?1 AND deleted = 0 AND relpath LIKE ?2 ESCAPE '\\'
             ORDER BY relpath",
        )?;
        let pattern = format!("{}%", folder_prefix.replace('%', "").replace('_', "\\_"));
        let rows = stmt.query_map(params![version_id, pattern], file_from_row)?;
        collect_rows(rows)
    }

    /// The row for one relpath, including deletion markers.
    pub fn file_record(&self, version_id: i64, relpath: &str) -> Result<Option<FileRecord>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT content_version_id, relpath, content_hash, deleted FROM file
                 WHERE content_version_id = ?1 AND relpath = ?2",
                params![version_id, relpath],
                file_from_row,
            )
            .optional()?)
    }

    /// Rows of a version touched after the given mutation sequence number,
    /// deletion markers included. Used by drift reporting.
    pub fn changed_files_since(&self, version_id: i64, since_seq: i64) -> Result<Vec<FileRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT content_version_id, relpath, content_hash, deleted FROM file
             WHERE content_version_id = ?1 AND updated_seq > ?2
             ORDER BY relpath",
        )?;
        let rows = stmt.query_map(params![version_id, since_seq], file_from_row)?;
        collect_rows(rows)
    }

    /// Seal a version: compute the root hash over its live files and mark it
    /// immutable. Returns the root hash.
    pub fn seal_version(&self, version_id: i64) -> Result<String> {
        let pairs: Vec<(String, String)> = self
            .version_files(version_id)?
            .into_iter()
            .filter_map(|f| f.content_hash.map(|h| (f.relpath, h)))
            .collect();
        let root = hash::version_root_hash(&pairs);
        let updated = self.conn().execute(
            "UPDATE content_version SET root_hash = ?1, sealed = 1 WHERE id = ?2",
            params![root, version_id],
        )?;
        if updated == 0 {
            return Err(StoreError::UnknownVersion(version_id));
        }
        info!("store: sealed version {} root={}", version_id, root);
        Ok(root)
    }

    /// Recompute the root hash from the file table without touching the
    /// stored value. Equal to the sealed root unless the version drifted.
    pub fn recompute_version_root(&self, version_id: i64) -> Result<String> {
        let pairs: Vec<(String, String)> = self
            .version_files(version_id)?
            .into_iter()
            .filter_map(|f| f.content_hash.map(|h| (f.relpath, h)))
            .collect();
        Ok(hash::version_root_hash(&pairs))
    }

    /* ----------------------------- ast cache ---------------------------- */

    pub fn ast_cache_get(
        &self,
        content_hash: &str,
        parser_version: u32,
    ) -> Result<Option<(Vec<u8>, u32)>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT serialized_ast, diag_count FROM ast_cache
                 WHERE content_hash = ?1 AND parser_version = ?2",
                params![content_hash, parser_version],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?)
    }

    /// Append-only: parsing is deterministic, so a second writer for the same
    /// key would write identical bytes. First writer wins.
    pub fn ast_cache_put(
        &self,
        content_hash: &str,
        parser_version: u32,
        serialized_ast: &[u8],
        diag_count: u32,
    ) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO ast_cache (content_hash, parser_version, serialized_ast, diag_count)
             VALUES (?1, ?2, ?3, ?4)",
            params![content_hash, parser_version, serialized_ast, diag_count],
        )?;
        Ok(())
    }

    /* ------------------------- symbols & references --------------------- */

    /// Replace the extracted rows for one `(version, relpath)`. Rows of other
    /// files are never touched.
    pub fn replace_extractions(
        &self,
        version_id: i64,
        relpath: &str,
        symbols: &[SymbolRow],
        references: &[RefRow],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM symbol WHERE content_version_id = ?1 AND relpath = ?2",
            params![version_id, relpath],
        )?;
        tx.execute(
            "DELETE FROM reference WHERE content_version_id = ?1 AND relpath = ?2",
            params![version_id, relpath],
        )?;
        for s in symbols {
            tx.execute(
                "INSERT OR REPLACE INTO symbol
                 (symbol_id, content_version_id, relpath, symbol_type, scope, name, line)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    s.symbol_id,
                    s.content_version_id,
                    s.relpath,
                    s.symbol_type,
                    s.scope,
                    s.name,
                    s.line
                ],
            )?;
        }
        for r in references {
            tx.execute(
                "INSERT OR REPLACE INTO reference
                 (ref_id, content_version_id, relpath, ref_type, name, line)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    r.ref_id,
                    r.content_version_id,
                    r.relpath,
                    r.ref_type,
                    r.name,
                    r.line
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn symbols_for_versions(&self, version_ids: &[i64]) -> Result<Vec<SymbolRow>> {
        if version_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let sql = format!(
            "SELECT symbol_id, content_version_id, relpath, symbol_type, scope, name, line
             FROM symbol WHERE content_version_id IN ({})
             ORDER BY content_version_id, relpath, line, symbol_id",
            id_list(version_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], symbol_from_row)?;
        collect_rows(rows)
    }

    pub fn references_for_versions(&self, version_ids: &[i64]) -> Result<Vec<RefRow>> {
        if version_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let sql = format!(
            "SELECT ref_id, content_version_id, relpath, ref_type, name, line
             FROM reference WHERE content_version_id IN ({})
             ORDER BY content_version_id, relpath, line, ref_id",
            id_list(version_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], ref_from_row)?;
        collect_rows(rows)
    }

    /// Reference rows whose name binds to no symbol within the given
    /// versions. Reported by query, never thrown.
    pub fn unbound_references(&self, version_ids: &[i64]) -> Result<Vec<RefRow>> {
        if version_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let ids = id_list(version_ids);
        let sql = format!(
            "SELECT r.ref_id, r.content_version_id, r.relpath, r.ref_type, r.name, r.line
             FROM reference r
             WHERE r.content_version_id IN ({ids})
               AND NOT EXISTS (
                   SELECT 1 FROM symbol s
                   WHERE s.name = r.name AND s.content_version_id IN ({ids})
               )
             ORDER BY r.content_version_id, r.relpath, r.line, r.ref_id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], ref_from_row)?;
        collect_rows(rows)
    }

    /* ----------------------------- playsets ----------------------------- */

    /// Record a playset over sealed versions. The playset hash covers the
    /// ordered version roots; the roots themselves are captured for drift
    /// detection.
    pub fn create_playset(&self, name: &str, version_ids: &[i64]) -> Result<PlaysetRecord> {
        let mut roots = Vec::with_capacity(version_ids.len());
        for &id in version_ids {
            let v = self.version(id)?;
            let root = v.root_hash.ok_or(StoreError::VersionNotSealed(id))?;
            roots.push(root);
        }
        let playset_hash = hash::playset_hash(&roots);
        let playset_id =
            crate::ids::uuid_v5_from_key(&format!("playset|{name}|{playset_hash}"));
        let conn = self.conn();
        let created_seq = Self::next_seq(&conn)?;
        let record = PlaysetRecord {
            playset_id: playset_id.clone(),
            name: name.to_string(),
            version_ids: version_ids.to_vec(),
            version_roots: roots,
            playset_hash,
            created_seq,
            created_at: Utc::now().timestamp(),
        };
        conn.execute(
            "INSERT OR REPLACE INTO playset
             (playset_id, name, ordered_version_ids, version_roots, playset_hash, created_seq, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.playset_id,
                record.name,
                serde_json::to_string(&record.version_ids)?,
                serde_json::to_string(&record.version_roots)?,
                record.playset_hash,
                record.created_seq,
                record.created_at
            ],
        )?;
        info!("store: playset {} hash={}", record.playset_id, record.playset_hash);
        Ok(record)
    }

    pub fn get_playset(&self, playset_id: &str) -> Result<PlaysetRecord> {
        let row: Option<(String, String, String, String, String, i64, i64)> = self
            .conn()
            .query_row(
                "SELECT playset_id, name, ordered_version_ids, version_roots, playset_hash,
                        created_seq, created_at
                 FROM playset WHERE playset_id = ?1",
                params![playset_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;
        let (id, name, ids_json, roots_json, playset_hash, created_seq, created_at) =
            row.ok_or_else(|| StoreError::UnknownPlayset(playset_id.to_string()))?;
        Ok(PlaysetRecord {
            playset_id: id,
            name,
            version_ids: serde_json::from_str(&ids_json)?,
            version_roots: serde_json::from_str(&roots_json)?,
            playset_hash,
            created_seq,
            created_at,
        })
    }
}

/* ------------------------------ row mapping ------------------------------ */

fn version_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRecord> {
    Ok(VersionRecord {
        id: row.get(0)?,
        source_name: row.get(1)?,
        version_tag: row.get(2)?,
        root_hash: row.get(3)?,
        sealed: row.get::<_, i64>(4)? != 0,
    })
}

fn file_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        content_version_id: row.get(0)?,
        relpath: row.get(1)?,
        content_hash: row.get(2)?,
        deleted: row.get::<_, i64>(3)? != 0,
    })
}

fn symbol_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SymbolRow> {
    Ok(SymbolRow {
        symbol_id: row.get(0)?,
        content_version_id: row.get(1)?,
        relpath: row.get(2)?,
        symbol_type: row.get(3)?,
        scope: row.get(4)?,
        name: row.get(5)?,
        line: row.get(6)?,
    })
}

fn ref_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RefRow> {
    Ok(RefRow {
        ref_id: row.get(0)?,
        content_version_id: row.get(1)?,
        relpath: row.get(2)?,
        ref_type: row.get(3)?,
        name: row.get(4)?,
        line: row.get(5)?,
    })
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Render an IN-clause id list. Ids are our own integers, never user text.
fn id_list(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
