// Document store: database lifecycle, index registration and sessions

use crate::config::{Conventions, StoreConfig};
use crate::database::Database;
use crate::error::StoreError;
use crate::index::{Index, IndexDefinition};
use crate::session::Session;
use eyre::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Entry point for working with databases
///
/// Holds the configuration and the registered static indexes. Every
/// database lives in its own subdirectory of the configured data directory.
pub struct DocumentStore {
    config: StoreConfig,
    indexes: Vec<Box<dyn IndexDefinition>>,
}

impl DocumentStore {
    /// Initialize a store, creating the data directory if needed
    pub fn open(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data directory {}", config.data_dir.display()))?;

        info!(
            data_dir = ?config.data_dir,
            database = config.database.as_str(),
            naming = ?config.conventions.naming,
            "Document store initialized"
        );

        Ok(Self {
            config,
            indexes: Vec::new(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Name of the database sessions open by default
    pub fn database(&self) -> &str {
        &self.config.database
    }

    pub fn conventions(&self) -> &Conventions {
        &self.config.conventions
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub(crate) fn indexes(&self) -> &[Box<dyn IndexDefinition>] {
        &self.indexes
    }

    pub(crate) fn has_index(&self, name: &str) -> bool {
        self.indexes.iter().any(|i| i.name() == name)
    }

    // ========================================================================
    // Database lifecycle
    // ========================================================================

    pub fn database_exists(&self, name: &str) -> bool {
        self.config.data_dir.join(name).is_dir()
    }

    /// Names of all databases, sorted
    pub fn database_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.config.data_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Create an empty database
    pub fn create_database(&self, name: &str) -> Result<()> {
        let path = self.database_path(name)?;
        if path.exists() {
            return Err(StoreError::DatabaseAlreadyExists(name.to_string()).into());
        }

        Database::open(&path, name)?;
        info!(database = name, "Created database");
        Ok(())
    }

    /// Delete a database and all its files
    ///
    /// Returns false if there was nothing to delete.
    pub fn delete_database(&self, name: &str) -> Result<bool> {
        let path = self.database_path(name)?;
        if !path.exists() {
            debug!(database = name, "Database not found, nothing to delete");
            return Ok(false);
        }

        fs::remove_dir_all(&path).with_context(|| format!("Failed to delete database {}", name))?;
        info!(database = name, "Deleted database");
        Ok(true)
    }

    /// Open a database, building any registered index it doesn't have yet
    pub fn open_database(&self, name: &str) -> Result<Database> {
        let path = self.database_path(name)?;
        if !path.is_dir() {
            return Err(StoreError::DatabaseDoesNotExist(name.to_string()).into());
        }

        let mut db = Database::open(&path, name)?;
        for index in &self.indexes {
            if !db.has_index(index.name())? {
                db.rebuild_index(index.as_ref())?;
            }
        }
        Ok(db)
    }

    fn database_path(&self, name: &str) -> Result<PathBuf> {
        validate_database_name(name)?;
        Ok(self.config.data_dir.join(name))
    }

    // ========================================================================
    // Indexes and sessions
    // ========================================================================

    /// Register a static index and build it in the configured database
    ///
    /// Returns the number of documents indexed (0 if the database doesn't
    /// exist yet; it is built when a session first opens it).
    pub fn execute_index<I: Index>(&mut self, index: I) -> Result<usize> {
        let index: Box<dyn IndexDefinition> = Box::new(index);
        self.indexes.retain(|i| i.name() != index.name());

        let database = self.config.database.clone();
        let count = if self.database_exists(&database) {
            let mut db = Database::open(self.database_path(&database)?, &database)?;
            db.rebuild_index(index.as_ref())?
        } else {
            debug!(index = index.name(), database = database.as_str(), "Database missing, index build deferred");
            0
        };

        self.indexes.push(index);
        Ok(count)
    }

    /// Open a session on the configured database
    pub fn open_session(&self) -> Result<Session<'_>> {
        self.open_session_for(&self.config.database)
    }

    /// Open a session on a named database
    pub fn open_session_for(&self, name: &str) -> Result<Session<'_>> {
        let db = self.open_database(name)?;
        debug!(database = name, "Opened session");
        Ok(Session::new(self, db))
    }
}

fn validate_database_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::invalid_argument("Database name cannot be empty").into());
    }
    if name.len() > 64 {
        return Err(StoreError::invalid_argument(format!("Database name too long: {} (max 64 chars)", name)).into());
    }
    if !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
        return Err(StoreError::invalid_argument(format!(
            "Invalid database name: {} (must be alphanumeric with _/-)",
            name
        ))
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::TeaProfilesByCaffeine;
    use crate::tea::{TeaColor, TeaProfile};
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> DocumentStore {
        DocumentStore::open(StoreConfig::at(temp.path()).with_database("Teas")).unwrap()
    }

    #[test]
    fn test_open_creates_data_dir() {
        let temp = TempDir::new().unwrap();
        let data_dir = temp.path().join("nested/data");

        let store = DocumentStore::open(StoreConfig::at(&data_dir)).unwrap();
        assert!(data_dir.is_dir());
        assert_eq!(store.database(), "TeaCollection");
    }

    #[test]
    fn test_create_and_delete_database() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        assert!(!store.database_exists("Teas"));
        store.create_database("Teas").unwrap();
        assert!(store.database_exists("Teas"));
        assert_eq!(store.database_names().unwrap(), vec!["Teas".to_string()]);

        let err = store.create_database("Teas").unwrap_err();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::DatabaseAlreadyExists("Teas".to_string()))
        );

        assert!(store.delete_database("Teas").unwrap());
        assert!(!store.database_exists("Teas"));
        assert!(!store.delete_database("Teas").unwrap());
    }

    #[test]
    fn test_invalid_database_name() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let err = store.create_database("../escape").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::InvalidArgument(_))
        ));
        assert!(store.create_database("").is_err());
    }

    #[test]
    fn test_session_on_missing_database() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let err = store.open_session().err().unwrap();
        assert_eq!(
            err.downcast_ref::<StoreError>(),
            Some(&StoreError::DatabaseDoesNotExist("Teas".to_string()))
        );
    }

    #[test]
    fn test_execute_index_builds_existing_documents() {
        let temp = TempDir::new().unwrap();
        let mut store = store(&temp);
        store.create_database("Teas").unwrap();

        {
            let mut session = store.open_session().unwrap();
            session
                .store(&TeaProfile::with_caffeine(TeaColor::Green, "Matcha", 70.0).unwrap())
                .unwrap();
            session.save_changes().unwrap();
        }

        assert_eq!(store.execute_index(TeaProfilesByCaffeine).unwrap(), 1);
        assert!(store.has_index("TeaProfiles/ByCaffeine"));

        // Registering again replaces rather than duplicates
        store.execute_index(TeaProfilesByCaffeine).unwrap();
        assert_eq!(store.indexes().len(), 1);
    }

    #[test]
    fn test_index_deferred_until_database_exists() {
        let temp = TempDir::new().unwrap();
        let mut store = store(&temp);

        assert_eq!(store.execute_index(TeaProfilesByCaffeine).unwrap(), 0);

        store.create_database("Teas").unwrap();
        let db = store.open_database("Teas").unwrap();
        assert!(db.has_index("TeaProfiles/ByCaffeine").unwrap());
    }
}
