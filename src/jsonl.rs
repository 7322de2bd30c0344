// JSONL log file operations

use crate::document::IndexValue;
use eyre::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// One line of a collection log: a document version or a tombstone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub collection: String,
    pub updated_at: i64,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Auto index fields at write time, so a resync can restore them
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub indexes: HashMap<String, IndexValue>,
}

impl LogEntry {
    pub fn put(
        id: &str,
        collection: &str,
        updated_at: i64,
        data: serde_json::Value,
        indexes: HashMap<String, IndexValue>,
    ) -> Self {
        Self {
            id: id.to_string(),
            collection: collection.to_string(),
            updated_at,
            deleted: false,
            data: Some(data),
            indexes,
        }
    }

    pub fn tombstone(id: &str, collection: &str, updated_at: i64) -> Self {
        Self {
            id: id.to_string(),
            collection: collection.to_string(),
            updated_at,
            deleted: true,
            data: None,
            indexes: HashMap::new(),
        }
    }
}

/// Append entries to a JSONL file under an exclusive lock
pub fn append_entries(path: &Path, entries: &[&LogEntry]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open JSONL file for appending")?;

    // Acquire exclusive lock before writing
    file.lock_exclusive().context("Failed to acquire file lock")?;

    let mut buf = String::new();
    for entry in entries {
        buf.push_str(&serde_json::to_string(entry)?);
        buf.push('\n');
    }
    file.write_all(buf.as_bytes())?;
    file.sync_all()?; // Ensure data is flushed to disk

    debug!(file = ?path, count = entries.len(), "Appended entries to JSONL");

    // Lock is released when file is dropped
    Ok(())
}

/// Read all entries from a JSONL file, returning latest version per ID
///
/// For entries with duplicate IDs, the one with the highest updated_at wins;
/// on equal timestamps the later line wins. Tombstones are returned too so
/// callers can tell deleted from never-written.
pub fn read_latest(path: &Path) -> Result<HashMap<String, LogEntry>> {
    if !path.exists() {
        // File doesn't exist yet, return empty map
        return Ok(HashMap::new());
    }

    let file = File::open(path).context("Failed to open JSONL file")?;
    let reader = BufReader::new(file);
    let mut entries: HashMap<String, LogEntry> = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to read line, skipping"
                );
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let entry: LogEntry = match serde_json::from_str(&line) {
            Ok(e) => e,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to parse JSON, skipping"
                );
                continue;
            }
        };

        match entries.get(&entry.id) {
            Some(existing) if existing.updated_at > entry.updated_at => {}
            _ => {
                entries.insert(entry.id.clone(), entry);
            }
        }
    }

    info!(
        file = ?path,
        count = entries.len(),
        "Loaded latest entries from JSONL"
    );

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn put(id: &str, name: &str, updated_at: i64) -> LogEntry {
        LogEntry::put(id, "TeaProfiles", updated_at, json!({ "name": name }), HashMap::new())
    }

    #[test]
    fn test_append_entries() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("TeaProfiles.jsonl");

        let entry = put("TeaProfiles/Matcha", "Matcha", 1000);
        append_entries(&jsonl_path, &[&entry]).unwrap();

        let content = fs::read_to_string(&jsonl_path).unwrap();
        assert!(content.contains("\"id\":\"TeaProfiles/Matcha\""));
        assert!(content.contains("\"deleted\":false"));
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_read_latest() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("TeaProfiles.jsonl");

        let v1 = put("TeaProfiles/Matcha", "Version 1", 1000);
        let v2 = put("TeaProfiles/Matcha", "Version 2", 2000);
        let stale = put("TeaProfiles/Matcha", "Stale", 1500);
        append_entries(&jsonl_path, &[&v1, &v2, &stale]).unwrap();

        let entries = read_latest(&jsonl_path).unwrap();
        assert_eq!(entries.len(), 1);

        let latest = entries.get("TeaProfiles/Matcha").unwrap();
        assert_eq!(latest.updated_at, 2000);
        assert_eq!(latest.data.as_ref().unwrap()["name"], "Version 2");
    }

    #[test]
    fn test_read_latest_tie_goes_to_later_line() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("TeaProfiles.jsonl");

        let first = put("TeaProfiles/Matcha", "First", 1000);
        let second = put("TeaProfiles/Matcha", "Second", 1000);
        append_entries(&jsonl_path, &[&first]).unwrap();
        append_entries(&jsonl_path, &[&second]).unwrap();

        let entries = read_latest(&jsonl_path).unwrap();
        assert_eq!(entries["TeaProfiles/Matcha"].data.as_ref().unwrap()["name"], "Second");
    }

    #[test]
    fn test_tombstone_is_latest() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("TeaProfiles.jsonl");

        let live = put("TeaProfiles/Matcha", "Matcha", 1000);
        let dead = LogEntry::tombstone("TeaProfiles/Matcha", "TeaProfiles", 2000);
        append_entries(&jsonl_path, &[&live, &dead]).unwrap();

        let entries = read_latest(&jsonl_path).unwrap();
        assert!(entries["TeaProfiles/Matcha"].deleted);
        assert!(entries["TeaProfiles/Matcha"].data.is_none());
    }

    #[test]
    fn test_read_latest_nonexistent_file() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("nonexistent.jsonl");

        let entries = read_latest(&jsonl_path).unwrap();
        assert_eq!(entries.len(), 0);
    }

    #[test]
    fn test_read_latest_malformed_line() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("TeaProfiles.jsonl");

        // Write valid entry, then malformed, then another valid
        fs::write(
            &jsonl_path,
            r#"{"id":"TeaProfiles/Matcha","collection":"TeaProfiles","updated_at":1000,"data":{"name":"Matcha"}}
{malformed json}
{"id":"TeaProfiles/Earl Grey","collection":"TeaProfiles","updated_at":1000,"data":{"name":"Earl Grey"}}
"#,
        )
        .unwrap();

        let entries = read_latest(&jsonl_path).unwrap();
        // Should skip malformed line and load the two valid entries
        assert_eq!(entries.len(), 2);
        assert!(entries.contains_key("TeaProfiles/Matcha"));
        assert!(entries.contains_key("TeaProfiles/Earl Grey"));
    }
}
