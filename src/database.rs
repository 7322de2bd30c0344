// Embedded database backend: JSONL logs as source of truth, SQLite as query cache

use crate::document::IndexValue;
use crate::error::StoreError;
use crate::filter::{Filter, FilterOp};
use crate::index::{AUTO_INDEX, IndexDefinition};
use crate::jsonl::{self, LogEntry};
use eyre::{Context, Result, eyre};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CURRENT_VERSION: u32 = 1;
const DB_FILE: &str = "teastore.db";

/// A document as read back from the database
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub collection: String,
    pub data: serde_json::Value,
}

/// A staged write, applied by `Database::apply_batch`
#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    Put {
        id: String,
        collection: String,
        data: serde_json::Value,
        indexes: HashMap<String, IndexValue>,
    },
    Delete {
        id: String,
        collection: String,
    },
}

impl WriteOp {
    pub(crate) fn id(&self) -> &str {
        match self {
            WriteOp::Put { id, .. } | WriteOp::Delete { id, .. } => id,
        }
    }

    fn collection(&self) -> &str {
        match self {
            WriteOp::Put { collection, .. } | WriteOp::Delete { collection, .. } => collection,
        }
    }
}

/// One database: a directory of collection logs plus a SQLite cache
pub struct Database {
    name: String,
    base_path: PathBuf,
    db: Connection,
}

impl Database {
    /// Open or create the database stored in `path`
    pub fn open<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        // Create directory if it doesn't exist
        fs::create_dir_all(&base_path).context("Failed to create database directory")?;

        // Open SQLite database
        let db_path = base_path.join(DB_FILE);
        let db = Connection::open(&db_path).context("Failed to open SQLite database")?;

        let mut database = Self {
            name: name.to_string(),
            base_path,
            db,
        };

        // Initialize schema
        database.create_schema()?;

        // Write .gitignore
        database.create_gitignore()?;

        // Write/check version
        database.write_version()?;

        // Sync if stale
        if database.is_stale()? {
            info!(database = name, "Database is stale, syncing from JSONL files");
            database.sync()?;
        }

        Ok(database)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the directory holding this database
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            -- Documents; ids are unique across collections
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                data_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection, id);

            -- Index entries, one row per (index, document, field)
            CREATE TABLE IF NOT EXISTS record_indexes (
                index_name TEXT NOT NULL,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                field_name TEXT NOT NULL,
                field_value_str TEXT,
                field_value_int INTEGER,
                field_value_real REAL,
                field_value_bool INTEGER,
                PRIMARY KEY (index_name, id, field_name)
            );

            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_str ON record_indexes(index_name, field_name, field_value_str);
            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_int ON record_indexes(index_name, field_name, field_value_int);
            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_real ON record_indexes(index_name, field_name, field_value_real);
            CREATE INDEX IF NOT EXISTS idx_record_indexes_field_bool ON record_indexes(index_name, field_name, field_value_bool);

            -- Sync metadata for staleness detection
            CREATE TABLE IF NOT EXISTS sync_metadata (
                collection TEXT PRIMARY KEY,
                last_sync_time INTEGER NOT NULL,
                file_mtime INTEGER NOT NULL
            );

            -- Static indexes built in this database
            CREATE TABLE IF NOT EXISTS index_metadata (
                index_name TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                built_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }

    /// Create .gitignore file
    fn create_gitignore(&self) -> Result<()> {
        let gitignore_path = self.base_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "teastore.db\nteastore.db-shm\nteastore.db-wal\n")?;
        }
        Ok(())
    }

    /// Write version file
    fn write_version(&self) -> Result<()> {
        let version_path = self.base_path.join(".version");
        if !version_path.exists() {
            fs::write(version_path, CURRENT_VERSION.to_string())?;
        }
        Ok(())
    }

    /// Check if the SQLite cache needs syncing from JSONL
    ///
    /// Returns true if any JSONL file has been modified since the store last
    /// wrote or synced it, or if there are JSONL files that have never been synced.
    pub fn is_stale(&self) -> Result<bool> {
        for path in self.jsonl_files()? {
            let collection = match path.file_stem().and_then(|s| s.to_str()) {
                Some(c) => c,
                None => continue,
            };

            let file_mtime = file_mtime_ms(&path)?;

            let stored_mtime: Option<i64> = self
                .db
                .query_row(
                    "SELECT file_mtime FROM sync_metadata WHERE collection = ?1",
                    [collection],
                    |row| row.get(0),
                )
                .optional()?;

            match stored_mtime {
                None => return Ok(true),                              // Never synced
                Some(mtime) if file_mtime > mtime => return Ok(true), // File modified
                _ => continue,
            }
        }

        Ok(false)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Apply a batch of writes: append to the collection logs, then commit
    /// to SQLite in one transaction, keeping every matching index current
    pub(crate) fn apply_batch(&mut self, ops: &[WriteOp], indexes: &[Box<dyn IndexDefinition>]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        // A put or delete must target the collection the id already lives in
        for op in ops {
            validate_collection_name(op.collection())?;
            validate_id(op.id())?;
            self.check_collection(op.id(), op.collection())?;
        }

        let updated_at = now_ms();

        // 1. Append to JSONL, one locked append per collection
        let entries: Vec<LogEntry> = ops
            .iter()
            .map(|op| match op {
                WriteOp::Put {
                    id,
                    collection,
                    data,
                    indexes,
                } => LogEntry::put(id, collection, updated_at, data.clone(), indexes.clone()),
                WriteOp::Delete { id, collection } => LogEntry::tombstone(id, collection, updated_at),
            })
            .collect();

        let mut by_collection: BTreeMap<&str, Vec<&LogEntry>> = BTreeMap::new();
        for entry in &entries {
            by_collection.entry(entry.collection.as_str()).or_default().push(entry);
        }
        let mut file_mtimes = Vec::with_capacity(by_collection.len());
        for (collection, batch) in &by_collection {
            let path = self.jsonl_path(collection);
            jsonl::append_entries(&path, batch)?;
            file_mtimes.push((*collection, file_mtime_ms(&path)?));
        }

        // 2. Apply to SQLite with transaction
        let tx = self.db.transaction()?;

        for op in ops {
            match op {
                WriteOp::Put {
                    id,
                    collection,
                    data,
                    indexes: fields,
                } => {
                    let data_json = serde_json::to_string(data).context("Failed to serialize document")?;
                    tx.execute(
                        "INSERT OR REPLACE INTO records (id, collection, data_json, updated_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        rusqlite::params![id, collection, data_json, updated_at],
                    )?;

                    // 3. Update indexes
                    update_index_tx(&tx, AUTO_INDEX, collection, id, fields)?;
                    for index in indexes.iter().filter(|i| i.collection() == collection) {
                        match index.map_json(data) {
                            Ok(mapped) => update_index_tx(&tx, index.name(), collection, id, &mapped)?,
                            Err(e) => warn!(index = index.name(), id = id.as_str(), error = ?e, "Skipping document for index"),
                        }
                    }
                }
                WriteOp::Delete { id, collection } => {
                    tx.execute(
                        "DELETE FROM records WHERE id = ?1 AND collection = ?2",
                        rusqlite::params![id, collection],
                    )?;
                    tx.execute(
                        "DELETE FROM record_indexes WHERE id = ?1 AND collection = ?2",
                        rusqlite::params![id, collection],
                    )?;
                }
            }
        }

        // Our own appends don't make the cache stale
        for (collection, file_mtime) in &file_mtimes {
            tx.execute(
                "INSERT OR REPLACE INTO sync_metadata (collection, last_sync_time, file_mtime)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![collection, updated_at, file_mtime],
            )?;
        }

        tx.commit()?;

        debug!(database = self.name.as_str(), ops = ops.len(), "Applied batch");
        Ok(())
    }

    /// Fail if `id` already lives in a collection other than `collection`
    fn check_collection(&self, id: &str, collection: &str) -> Result<()> {
        let existing: Option<String> = self
            .db
            .query_row("SELECT collection FROM records WHERE id = ?1", [id], |row| row.get(0))
            .optional()?;

        match existing {
            Some(existing) if existing != collection => Err(StoreError::CollectionMismatch {
                id: id.to_string(),
                existing,
                requested: collection.to_string(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Get a document by ID, whatever its collection
    pub fn get(&self, id: &str) -> Result<Option<StoredDocument>> {
        Ok(self.get_many(&[id])?.into_iter().next())
    }

    /// Get every existing document among `ids`; missing ids are left out
    pub fn get_many(&self, ids: &[&str]) -> Result<Vec<StoredDocument>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
        let query = format!(
            "SELECT id, collection, data_json FROM records WHERE id IN ({}) ORDER BY id",
            placeholders.join(", ")
        );

        let mut stmt = self.db.prepare(&query)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), read_row)?;
        collect_documents(rows)
    }

    /// Documents of `collection` whose id starts with `prefix`, ordered by id
    pub fn starting_with(&self, collection: &str, prefix: &str, skip: usize, take: usize) -> Result<Vec<StoredDocument>> {
        let mut stmt = self.db.prepare(
            "SELECT id, collection, data_json FROM records
             WHERE collection = ?1 AND substr(id, 1, ?2) = ?3
             ORDER BY id
             LIMIT ?4 OFFSET ?5",
        )?;

        let rows = stmt.query_map(
            rusqlite::params![
                collection,
                prefix.chars().count() as i64,
                prefix,
                take as i64,
                skip as i64
            ],
            read_row,
        )?;
        collect_documents(rows)
    }

    /// Documents of `collection` matching every filter against `index_name`, ordered by id
    pub fn query(&self, collection: &str, index_name: &str, filters: &[Filter]) -> Result<Vec<StoredDocument>> {
        // If no filters, return the whole collection
        if filters.is_empty() {
            let mut stmt = self
                .db
                .prepare("SELECT id, collection, data_json FROM records WHERE collection = ?1 ORDER BY id")?;
            let rows = stmt.query_map([collection], read_row)?;
            return collect_documents(rows);
        }

        let mut query = String::from(
            "SELECT r.id, r.collection, r.data_json
             FROM records r
             WHERE r.collection = ?1",
        );

        let n = filters.len();
        for (i, filter) in filters.iter().enumerate() {
            validate_field_name(&filter.field)?;

            let alias = format!("idx{}", i);
            // Ints are stored as reals too, so numbers of either type compare on the real column
            let column = match (&filter.value, filter.op) {
                (IndexValue::String(_), _) => "field_value_str",
                (_, FilterOp::Contains) => {
                    return Err(StoreError::invalid_argument(format!(
                        "contains filter on {} needs a string value",
                        filter.field
                    ))
                    .into());
                }
                (IndexValue::Int(_), _) | (IndexValue::Float(_), _) => "field_value_real",
                (IndexValue::Bool(_), _) => "field_value_bool",
            };

            let value = i + 3 + n;
            let condition = match filter.op.to_sql() {
                Some(op) => format!("{alias}.{column} {op} ?{value}"),
                // Plain substring match: case-sensitive, no wildcards
                None => format!("instr({alias}.{column}, ?{value}) > 0"),
            };

            query.push_str(&format!(
                " AND EXISTS (
                    SELECT 1 FROM record_indexes {alias}
                    WHERE {alias}.index_name = ?2
                      AND {alias}.id = r.id
                      AND {alias}.field_name = ?{field}
                      AND {condition})",
                alias = alias,
                field = i + 3,
                condition = condition,
            ));
        }

        query.push_str(" ORDER BY r.id");

        let mut stmt = self.db.prepare(&query)?;

        // Bind parameters: collection, index, then field names, then values
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        params.push(Box::new(collection.to_string()));
        params.push(Box::new(index_name.to_string()));

        for filter in filters {
            params.push(Box::new(filter.field.clone()));
        }

        for filter in filters {
            match &filter.value {
                IndexValue::String(s) => params.push(Box::new(s.clone())),
                IndexValue::Int(i) => params.push(Box::new(*i)),
                IndexValue::Float(x) => params.push(Box::new(*x)),
                IndexValue::Bool(b) => params.push(Box::new(*b as i64)),
            }
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(params_refs.as_slice(), read_row)?;
        collect_documents(rows)
    }

    /// Number of documents per collection
    pub fn collection_stats(&self) -> Result<Vec<(String, usize)>> {
        let mut stmt = self
            .db
            .prepare("SELECT collection, COUNT(*) FROM records GROUP BY collection ORDER BY collection")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut stats = Vec::new();
        for row in rows {
            let (collection, count) = row?;
            stats.push((collection, count as usize));
        }
        Ok(stats)
    }

    // ========================================================================
    // Indexes
    // ========================================================================

    /// Whether a static index has been built in this database
    pub fn has_index(&self, index_name: &str) -> Result<bool> {
        let found: Option<String> = self
            .db
            .query_row(
                "SELECT index_name FROM index_metadata WHERE index_name = ?1",
                [index_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Build (or rebuild) a static index over its collection
    ///
    /// Returns the number of documents indexed. Documents that don't match
    /// the index's document type are skipped with a warning.
    pub(crate) fn rebuild_index(&mut self, index: &dyn IndexDefinition) -> Result<usize> {
        let collection = index.collection();

        // Use a block to ensure stmt is dropped before we start a transaction
        let records_data: Vec<(String, String)> = {
            let mut stmt = self
                .db
                .prepare("SELECT id, data_json FROM records WHERE collection = ?1")?;

            let rows = stmt.query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            rows.collect::<rusqlite::Result<_>>()?
        };

        let tx = self.db.transaction()?;
        tx.execute("DELETE FROM record_indexes WHERE index_name = ?1", [index.name()])?;

        let mut count = 0;
        for (id, data_json) in records_data {
            let data: serde_json::Value = serde_json::from_str(&data_json).context("Failed to parse stored document")?;
            let fields = match index.map_json(&data) {
                Ok(fields) => fields,
                Err(e) => {
                    warn!(
                        index = index.name(),
                        id = &id,
                        error = ?e,
                        "Skipping document that doesn't match index"
                    );
                    continue;
                }
            };

            update_index_tx(&tx, index.name(), collection, &id, &fields)?;
            count += 1;
        }

        tx.execute(
            "INSERT OR REPLACE INTO index_metadata (index_name, collection, built_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![index.name(), collection, now_ms()],
        )?;
        tx.commit()?;

        info!(index = index.name(), collection, count, "Built index");
        Ok(count)
    }

    // ========================================================================
    // Sync operations
    // ========================================================================

    /// Rebuild the SQLite cache from the JSONL logs
    ///
    /// Auto index entries are restored from the log. Static indexes are
    /// forgotten and rebuilt the next time a session opens this database.
    pub fn sync(&mut self) -> Result<()> {
        info!(database = self.name.as_str(), "Syncing database from JSONL files");

        let files = self.jsonl_files()?;
        let tx = self.db.transaction()?;

        // Clear all tables
        tx.execute("DELETE FROM record_indexes", [])?;
        tx.execute("DELETE FROM records", [])?;
        tx.execute("DELETE FROM index_metadata", [])?;
        tx.execute("DELETE FROM sync_metadata", [])?;

        for path in files {
            let collection = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| eyre!("Invalid JSONL filename: {:?}", path))?;

            debug!("Syncing collection: {}", collection);

            let file_mtime = file_mtime_ms(&path)?;
            let entries = jsonl::read_latest(&path)?;

            for (id, entry) in entries {
                // Skip tombstones
                let data = match (&entry.data, entry.deleted) {
                    (Some(data), false) => data,
                    _ => continue,
                };

                let data_json = serde_json::to_string(data)?;
                tx.execute(
                    "INSERT OR REPLACE INTO records (id, collection, data_json, updated_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![&id, collection, data_json, entry.updated_at],
                )?;
                update_index_tx(&tx, AUTO_INDEX, collection, &id, &entry.indexes)?;
            }

            tx.execute(
                "INSERT OR REPLACE INTO sync_metadata (collection, last_sync_time, file_mtime)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![collection, now_ms(), file_mtime],
            )?;
        }

        tx.commit()?;

        info!("Sync complete");
        Ok(())
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn jsonl_path(&self, collection: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", collection))
    }

    fn jsonl_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn collect_documents<I>(rows: I) -> Result<Vec<StoredDocument>>
where
    I: Iterator<Item = rusqlite::Result<(String, String, String)>>,
{
    let mut documents = Vec::new();
    for row in rows {
        let (id, collection, data_json) = row?;
        let data = serde_json::from_str(&data_json).context("Failed to deserialize document from database")?;
        documents.push(StoredDocument { id, collection, data });
    }
    Ok(documents)
}

fn update_index_tx(
    tx: &Transaction,
    index_name: &str,
    collection: &str,
    id: &str,
    fields: &HashMap<String, IndexValue>,
) -> Result<()> {
    debug!(index_name, id, field_count = fields.len(), "update_index_tx: called");

    // Delete old entries
    tx.execute(
        "DELETE FROM record_indexes WHERE index_name = ?1 AND id = ?2",
        rusqlite::params![index_name, id],
    )?;

    // Insert new entries; integers are also stored as reals so float filters match them
    for (field_name, value) in fields {
        validate_field_name(field_name)?;

        let (s, i, x, b): (Option<&str>, Option<i64>, Option<f64>, Option<i64>) = match value {
            IndexValue::String(s) => (Some(s), None, None, None),
            IndexValue::Int(i) => (None, Some(*i), Some(*i as f64), None),
            IndexValue::Float(x) => (None, None, Some(*x), None),
            IndexValue::Bool(b) => (None, None, None, Some(*b as i64)),
        };

        tx.execute(
            "INSERT INTO record_indexes (index_name, collection, id, field_name, field_value_str, field_value_int, field_value_real, field_value_bool)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![index_name, collection, id, field_name, s, i, x, b],
        )?;
    }

    Ok(())
}

pub(crate) fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::invalid_argument("Collection name cannot be empty").into());
    }
    if name.len() > 64 {
        return Err(StoreError::invalid_argument(format!("Collection name too long: {} (max 64 chars)", name)).into());
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(StoreError::invalid_argument(format!(
            "Invalid collection name: {} (must be alphanumeric with _/-)",
            name
        ))
        .into());
    }
    Ok(())
}

fn validate_field_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::invalid_argument("Field name cannot be empty").into());
    }
    if name.len() > 64 {
        return Err(StoreError::invalid_argument(format!("Field name too long: {} (max 64 chars)", name)).into());
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(StoreError::invalid_argument(format!("Invalid field name: {} (must be alphanumeric with _)", name)).into());
    }
    Ok(())
}

/// Validate document ID
fn validate_id(id: &str) -> Result<()> {
    // Check not empty or whitespace-only
    if id.trim().is_empty() {
        return Err(StoreError::invalid_argument("Document ID cannot be empty or whitespace-only").into());
    }

    // Check reasonable length (prevent DoS via huge IDs)
    if id.len() > 256 {
        return Err(StoreError::invalid_argument(format!("Document ID too long: {} chars (max 256)", id.len())).into());
    }

    Ok(())
}

fn file_mtime_ms(path: &Path) -> Result<i64> {
    Ok(fs::metadata(path)?
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0))
}

/// Milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::TeaProfilesByCaffeine;
    use serde_json::json;
    use tempfile::TempDir;

    fn put(id: &str, name: &str, caffeine: f64) -> WriteOp {
        let mut indexes = HashMap::new();
        indexes.insert("name".to_string(), IndexValue::String(name.to_string()));
        indexes.insert("caffeine_mg".to_string(), IndexValue::Float(caffeine));
        indexes.insert("color".to_string(), IndexValue::Int(2));
        WriteOp::Put {
            id: id.to_string(),
            collection: "TeaProfiles".to_string(),
            data: json!({ "name": name, "caffeine_mg": caffeine, "color": 2 }),
            indexes,
        }
    }

    fn delete(id: &str) -> WriteOp {
        WriteOp::Delete {
            id: id.to_string(),
            collection: "TeaProfiles".to_string(),
        }
    }

    fn open(temp: &TempDir) -> Database {
        Database::open(temp.path().join("Teas"), "Teas").unwrap()
    }

    #[test]
    fn test_open_creates_directory() {
        let temp = TempDir::new().unwrap();

        let db = open(&temp);
        let db_path = temp.path().join("Teas");
        assert_eq!(db.name(), "Teas");
        assert!(db_path.join(DB_FILE).exists());
        assert!(db_path.join(".gitignore").exists());
        assert!(db_path.join(".version").exists());
    }

    #[test]
    fn test_apply_batch_and_get() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(&[put("TeaProfiles/Matcha", "Matcha", 70.0)], &[]).unwrap();

        // Verify JSONL file was created
        assert!(temp.path().join("Teas/TeaProfiles.jsonl").exists());

        let doc = db.get("TeaProfiles/Matcha").unwrap().unwrap();
        assert_eq!(doc.collection, "TeaProfiles");
        assert_eq!(doc.data["name"], "Matcha");

        assert!(db.get("TeaProfiles/Sencha").unwrap().is_none());
    }

    #[test]
    fn test_delete_writes_tombstone() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(&[put("TeaProfiles/Matcha", "Matcha", 70.0)], &[]).unwrap();
        db.apply_batch(&[delete("TeaProfiles/Matcha")], &[]).unwrap();

        assert!(db.get("TeaProfiles/Matcha").unwrap().is_none());
        let content = fs::read_to_string(temp.path().join("Teas/TeaProfiles.jsonl")).unwrap();
        assert!(content.contains("\"deleted\":true"));
    }

    #[test]
    fn test_collection_mismatch() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(&[put("Matcha", "Matcha", 70.0)], &[]).unwrap();

        let serving = WriteOp::Put {
            id: "Matcha".to_string(),
            collection: "Servings".to_string(),
            data: json!({ "tea_id": "Matcha" }),
            indexes: HashMap::new(),
        };
        let err = db.apply_batch(&[serving], &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::CollectionMismatch { .. })
        ));
    }

    #[test]
    fn test_get_many_skips_missing() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(
            &[put("TeaProfiles/Matcha", "Matcha", 70.0), put("TeaProfiles/Earl Grey", "Earl Grey", 34.0)],
            &[],
        )
        .unwrap();

        let docs = db
            .get_many(&["TeaProfiles/Matcha", "TeaProfiles/Sencha", "TeaProfiles/Earl Grey"])
            .unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["TeaProfiles/Earl Grey", "TeaProfiles/Matcha"]);
        assert!(db.get_many(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_starting_with_pages_by_id() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        let ops: Vec<WriteOp> = ["Assam", "Darjeeling", "Keemun", "Lapsang"]
            .iter()
            .map(|name| put(&format!("TeaProfiles/{}", name), name, 40.0))
            .collect();
        db.apply_batch(&ops, &[]).unwrap();

        let page = db.starting_with("TeaProfiles", "TeaProfiles/", 1, 2).unwrap();
        let ids: Vec<&str> = page.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["TeaProfiles/Darjeeling", "TeaProfiles/Keemun"]);

        let narrow = db.starting_with("TeaProfiles", "TeaProfiles/L", 0, 10).unwrap();
        assert_eq!(narrow.len(), 1);
        assert_eq!(narrow[0].data["name"], "Lapsang");

        // Case-sensitive prefix
        assert!(db.starting_with("TeaProfiles", "teaprofiles/", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_query_auto_index() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(
            &[
                put("TeaProfiles/Matcha", "Matcha", 70.0),
                put("TeaProfiles/Earl Grey", "Earl Grey", 34.0),
                put("TeaProfiles/Rooibos", "Rooibos", 0.0),
            ],
            &[],
        )
        .unwrap();

        let caffeinated = db
            .query("TeaProfiles", AUTO_INDEX, &[Filter::gt("caffeine_mg", 0.0)])
            .unwrap();
        assert_eq!(caffeinated.len(), 2);
        assert_eq!(caffeinated[0].id, "TeaProfiles/Earl Grey");

        let both = db
            .query(
                "TeaProfiles",
                AUTO_INDEX,
                &[Filter::gt("caffeine_mg", 0.0), Filter::lt("caffeine_mg", 50.0)],
            )
            .unwrap();
        assert_eq!(both.len(), 1);

        let grey = db
            .query("TeaProfiles", AUTO_INDEX, &[Filter::new("name", FilterOp::Contains, "Grey")])
            .unwrap();
        assert_eq!(grey.len(), 1);
        assert_eq!(grey[0].data["name"], "Earl Grey");

        let all = db.query("TeaProfiles", AUTO_INDEX, &[]).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_numeric_filters_mix_int_and_float() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(
            &[
                put("TeaProfiles/Matcha", "Matcha", 70.0),
                put("TeaProfiles/Earl Grey", "Earl Grey", 34.0),
                put("TeaProfiles/Peach Oolong", "Peach Oolong", 28.5),
            ],
            &[],
        )
        .unwrap();

        // Int filter against a float field
        let int_filter = db
            .query("TeaProfiles", AUTO_INDEX, &[Filter::gt("caffeine_mg", 30_i64)])
            .unwrap();
        let float_filter = db
            .query("TeaProfiles", AUTO_INDEX, &[Filter::gt("caffeine_mg", 30.0)])
            .unwrap();
        assert_eq!(int_filter.len(), 2);
        assert_eq!(int_filter, float_filter);

        // Float filter against an int field
        let black = db.query("TeaProfiles", AUTO_INDEX, &[Filter::eq("color", 2.0)]).unwrap();
        assert_eq!(black.len(), 3);
        let none = db.query("TeaProfiles", AUTO_INDEX, &[Filter::eq("color", 2.5)]).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_contains_is_literal_and_case_sensitive() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(
            &[
                put("TeaProfiles/Earl Grey", "Earl Grey", 34.0),
                put("TeaProfiles/100% Matcha", "100% Matcha", 70.0),
                put("TeaProfiles/Lapsang_Souchong", "Lapsang_Souchong", 40.0),
            ],
            &[],
        )
        .unwrap();

        let contains = |value: &str| {
            db.query("TeaProfiles", AUTO_INDEX, &[Filter::new("name", FilterOp::Contains, value)])
                .unwrap()
                .into_iter()
                .map(|d| d.id)
                .collect::<Vec<_>>()
        };

        assert_eq!(contains("%"), vec!["TeaProfiles/100% Matcha"]);
        assert_eq!(contains("_"), vec!["TeaProfiles/Lapsang_Souchong"]);
        assert_eq!(contains("Grey"), vec!["TeaProfiles/Earl Grey"]);
        assert!(contains("earl grey").is_empty());
    }

    #[test]
    fn test_delete_in_other_collection_is_rejected() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(&[put("TeaProfiles/Matcha", "Matcha", 70.0)], &[]).unwrap();

        let wrong = WriteOp::Delete {
            id: "TeaProfiles/Matcha".to_string(),
            collection: "Servings".to_string(),
        };
        let err = db.apply_batch(&[wrong], &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::CollectionMismatch { .. })
        ));

        // Nothing was logged, so the cache and the log still agree
        assert!(db.get("TeaProfiles/Matcha").unwrap().is_some());
        assert!(!temp.path().join("Teas/Servings.jsonl").exists());
        db.sync().unwrap();
        assert!(db.get("TeaProfiles/Matcha").unwrap().is_some());

        // Deleting an id that doesn't exist anywhere is fine
        db.apply_batch(&[delete("TeaProfiles/Sencha")], &[]).unwrap();
    }

    #[test]
    fn test_query_rejects_bad_filters() {
        let temp = TempDir::new().unwrap();
        let db = open(&temp);

        assert!(db.query("TeaProfiles", AUTO_INDEX, &[Filter::eq("bad-field", 1_i64)]).is_err());
        assert!(
            db.query("TeaProfiles", AUTO_INDEX, &[Filter::new("color", FilterOp::Contains, 1_i64)])
                .is_err()
        );
    }

    #[test]
    fn test_static_index_built_and_maintained() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(&[put("TeaProfiles/Matcha", "Matcha", 70.0)], &[]).unwrap();
        assert!(!db.has_index("TeaProfiles/ByCaffeine").unwrap());

        let count = db.rebuild_index(&TeaProfilesByCaffeine).unwrap();
        assert_eq!(count, 1);
        assert!(db.has_index("TeaProfiles/ByCaffeine").unwrap());

        let indexes: Vec<Box<dyn IndexDefinition>> = vec![Box::new(TeaProfilesByCaffeine)];
        db.apply_batch(&[put("TeaProfiles/Earl Grey", "Earl Grey", 34.0)], &indexes)
            .unwrap();

        let hits = db
            .query("TeaProfiles", "TeaProfiles/ByCaffeine", &[Filter::gte("caffeine_mg", 30.0)])
            .unwrap();
        assert_eq!(hits.len(), 2);

        // name is only in the auto index
        let by_name = db
            .query("TeaProfiles", "TeaProfiles/ByCaffeine", &[Filter::eq("name", "Matcha")])
            .unwrap();
        assert!(by_name.is_empty());
    }

    #[test]
    fn test_sync_restores_documents_and_auto_index() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(
            &[put("TeaProfiles/Matcha", "Matcha", 70.0), put("TeaProfiles/Rooibos", "Rooibos", 0.0)],
            &[],
        )
        .unwrap();
        db.apply_batch(&[delete("TeaProfiles/Rooibos")], &[]).unwrap();
        assert!(!db.is_stale().unwrap());

        db.sync().unwrap();

        assert!(db.get("TeaProfiles/Matcha").unwrap().is_some());
        assert!(db.get("TeaProfiles/Rooibos").unwrap().is_none());
        let hits = db
            .query("TeaProfiles", AUTO_INDEX, &[Filter::eq("name", "Matcha")])
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_reopen_after_external_edit_resyncs() {
        let temp = TempDir::new().unwrap();
        {
            let mut db = open(&temp);
            db.apply_batch(&[put("TeaProfiles/Matcha", "Matcha", 70.0)], &[]).unwrap();
        }

        // Another writer appends directly to the log
        let entry = LogEntry::put(
            "TeaProfiles/Sencha",
            "TeaProfiles",
            now_ms(),
            json!({ "name": "Sencha", "caffeine_mg": 30.0, "color": 1 }),
            HashMap::new(),
        );
        let path = temp.path().join("Teas/TeaProfiles.jsonl");
        std::thread::sleep(std::time::Duration::from_millis(1100));
        jsonl::append_entries(&path, &[&entry]).unwrap();

        let db = open(&temp);
        assert!(db.get("TeaProfiles/Sencha").unwrap().is_some());
        assert!(db.get("TeaProfiles/Matcha").unwrap().is_some());
    }

    #[test]
    fn test_collection_stats() {
        let temp = TempDir::new().unwrap();
        let mut db = open(&temp);

        db.apply_batch(
            &[
                put("TeaProfiles/Matcha", "Matcha", 70.0),
                put("TeaProfiles/Earl Grey", "Earl Grey", 34.0),
                WriteOp::Put {
                    id: "Servings/1".to_string(),
                    collection: "Servings".to_string(),
                    data: json!({ "tea_id": "TeaProfiles/Matcha" }),
                    indexes: HashMap::new(),
                },
            ],
            &[],
        )
        .unwrap();

        let stats = db.collection_stats().unwrap();
        assert_eq!(stats, vec![("Servings".to_string(), 1), ("TeaProfiles".to_string(), 2)]);
    }

    #[test]
    fn test_validation_collection_name() {
        // Valid
        assert!(validate_collection_name("TeaProfiles").is_ok());
        assert!(validate_collection_name("valid-name").is_ok());

        // Invalid
        assert!(validate_collection_name("invalid/name").is_err());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validation_field_name() {
        // Valid
        assert!(validate_field_name("caffeine_mg").is_ok());

        // Invalid
        assert!(validate_field_name("invalid-field").is_err());
        assert!(validate_field_name("").is_err());
        assert!(validate_field_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validation_id() {
        assert!(validate_id("TeaProfiles/Earl Grey").is_ok());
        assert!(validate_id("  ").is_err());
        assert!(validate_id(&"a".repeat(257)).is_err());
    }
}
