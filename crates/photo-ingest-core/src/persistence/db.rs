use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::error::{CatalogError, CatalogResult};
use super::models::{
    from_unix, path_from_key, path_key, to_unix, CatalogRecord, CatalogStats, DuplicateGroup,
};
use crate::processing::PHash;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS media_records (
        id INTEGER PRIMARY KEY,
        path BLOB NOT NULL,
        name TEXT NOT NULL,
        size INTEGER NOT NULL,
        created INTEGER,
        modified INTEGER,
        hash INTEGER,
        metadata TEXT NOT NULL,
        deleted INTEGER NOT NULL DEFAULT 0
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_media_active_path
        ON media_records(path) WHERE deleted = 0;
    CREATE INDEX IF NOT EXISTS idx_media_hash ON media_records(hash);";

const COLUMNS: &str = "id, path, name, size, created, modified, hash, metadata, deleted";

/// Persistent record store of ingested media.
///
/// Each connection is owned by exactly one thread; stages that need the
/// catalog open their own handle on the same file.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open (or create) the catalog file at `path`
    pub fn open(path: &Path) -> CatalogResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| CatalogError::Path(parent.to_path_buf(), e.to_string()))?;
        }

        let conn = Connection::open(path)?;

        // Set pragmas for performance
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA busy_timeout = 10000;",
        )?;
        conn.execute_batch(SCHEMA)?;

        debug!("Catalog opened at {}", path.display());
        Ok(Self { conn })
    }

    /// Private catalog that lives only as long as the handle
    pub fn open_in_memory() -> CatalogResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert a new record and return its id
    pub fn insert(&self, record: &CatalogRecord) -> CatalogResult<i64> {
        insert_record(&self.conn, record)
    }

    /// Insert many records in a single transaction; all or nothing
    pub fn insert_batch(&mut self, records: &[CatalogRecord]) -> CatalogResult<usize> {
        let tx = self.conn.transaction()?;
        for record in records {
            insert_record(&tx, record)?;
        }
        tx.commit()?;

        debug!("Inserted batch of {} catalog records", records.len());
        Ok(records.len())
    }

    /// Overwrite the stored fields of an existing record
    pub fn update(&self, record: &CatalogRecord) -> CatalogResult<()> {
        let id = record.id.ok_or_else(|| {
            CatalogError::NotFound(format!("record for {} has no id", record.path.display()))
        })?;
        let metadata = serde_json::to_string(&record.metadata)?;

        let changed = self.conn.execute(
            "UPDATE media_records
             SET path = ?1, name = ?2, size = ?3, created = ?4, modified = ?5,
                 hash = ?6, metadata = ?7, deleted = ?8
             WHERE id = ?9",
            params![
                path_key(&record.path),
                record.name,
                record.size as i64,
                to_unix(record.created),
                to_unix(record.modified),
                record.hash.map(PHash::to_i64),
                metadata,
                record.deleted,
                id,
            ],
        )?;

        if changed == 0 {
            return Err(CatalogError::NotFound(format!("record id {}", id)));
        }
        Ok(())
    }

    /// Flag a record as deleted; it stays in the table
    pub fn mark_deleted(&self, id: i64) -> CatalogResult<()> {
        let changed = self.conn.execute(
            "UPDATE media_records SET deleted = 1 WHERE id = ?1 AND deleted = 0",
            params![id],
        )?;

        if changed == 0 {
            return Err(CatalogError::NotFound(format!("active record id {}", id)));
        }
        Ok(())
    }

    /// Active record stored under `path`
    pub fn find_by_path(&self, path: &Path) -> CatalogResult<Option<CatalogRecord>> {
        let sql = format!(
            "SELECT {} FROM media_records WHERE path = ?1 AND deleted = 0",
            COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![path_key(path)], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Oldest active record carrying exactly `hash`
    pub fn find_by_hash(&self, hash: PHash) -> CatalogResult<Option<CatalogRecord>> {
        let sql = format!(
            "SELECT {} FROM media_records WHERE hash = ?1 AND deleted = 0
             ORDER BY id LIMIT 1",
            COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![hash.to_i64()], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// Hash and path of every hashed active record, oldest first
    pub fn active_hashes(&self) -> CatalogResult<Vec<(PHash, PathBuf)>> {
        let mut stmt = self.conn.prepare(
            "SELECT hash, path FROM media_records
             WHERE hash IS NOT NULL AND deleted = 0 ORDER BY id",
        )?;
        let hashes = stmt
            .query_map([], |row| {
                let hash: i64 = row.get(0)?;
                let path: Vec<u8> = row.get(1)?;
                Ok((PHash::from_i64(hash), path_from_key(path)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hashes)
    }

    /// Every record not flagged as deleted
    pub fn active_records(&self) -> CatalogResult<Vec<CatalogRecord>> {
        let sql = format!(
            "SELECT {} FROM media_records WHERE deleted = 0 ORDER BY id",
            COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Active records grouped by shared hash, largest groups first
    pub fn duplicate_groups(&self) -> CatalogResult<Vec<DuplicateGroup>> {
        let sql = format!(
            "SELECT {} FROM media_records
             WHERE deleted = 0 AND hash IN (
                 SELECT hash FROM media_records
                 WHERE deleted = 0 AND hash IS NOT NULL
                 GROUP BY hash HAVING COUNT(*) > 1
             )
             ORDER BY hash, id",
            COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for row in rows {
            let record = row?;
            let Some(hash) = record.hash else { continue };
            match groups.last_mut() {
                Some(group) if group.hash == hash => group.records.push(record),
                _ => groups.push(DuplicateGroup {
                    hash,
                    records: vec![record],
                }),
            }
        }

        groups.sort_by(|a, b| b.records.len().cmp(&a.records.len()));
        Ok(groups)
    }

    pub fn stats(&self) -> CatalogResult<CatalogStats> {
        let (active, deleted, hashed): (i64, i64, i64) = self.conn.query_row(
            "SELECT
                 COALESCE(SUM(deleted = 0), 0),
                 COALESCE(SUM(deleted = 1), 0),
                 COALESCE(SUM(deleted = 0 AND hash IS NOT NULL), 0)
             FROM media_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let stats = CatalogStats {
            active: active as usize,
            deleted: deleted as usize,
            hashed: hashed as usize,
        };
        info!(
            "Catalog: {} active, {} deleted, {} hashed",
            stats.active, stats.deleted, stats.hashed
        );
        Ok(stats)
    }
}

fn insert_record(conn: &Connection, record: &CatalogRecord) -> CatalogResult<i64> {
    let metadata = serde_json::to_string(&record.metadata)?;
    conn.prepare_cached(
        "INSERT INTO media_records (path, name, size, created, modified, hash, metadata, deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?
    .execute(params![
        path_key(&record.path),
        record.name,
        record.size as i64,
        to_unix(record.created),
        to_unix(record.modified),
        record.hash.map(PHash::to_i64),
        metadata,
        record.deleted,
    ])?;
    Ok(conn.last_insert_rowid())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<CatalogRecord> {
    let path: Vec<u8> = row.get(1)?;
    let size: i64 = row.get(3)?;
    let hash: Option<i64> = row.get(6)?;
    let metadata: String = row.get(7)?;
    let metadata = serde_json::from_str(&metadata).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(CatalogRecord {
        id: Some(row.get(0)?),
        path: path_from_key(path),
        name: row.get(2)?,
        size: size.max(0) as u64,
        created: from_unix(row.get(4)?),
        modified: from_unix(row.get(5)?),
        hash: hash.map(PHash::from_i64),
        metadata,
        deleted: row.get(8)?,
    })
}
