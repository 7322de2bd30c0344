// Session: a unit of work against one database

use crate::database::{Database, StoredDocument, WriteOp};
use crate::document::Document;
use crate::error::StoreError;
use crate::filter::Filter;
use crate::index::{AUTO_INDEX, Index};
use crate::store::DocumentStore;
use eyre::{Context, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Unit of work against one database
///
/// Writes are staged until `save_changes`, which commits them as one batch.
/// Loaded and stored documents are tracked by id, so repeated loads are
/// served from the session without another request. Every round trip to the
/// database counts against `max_requests_per_session`.
///
/// Dropping a session discards any unsaved changes.
pub struct Session<'a> {
    store: &'a DocumentStore,
    db: Database,
    pending: Vec<WriteOp>,
    tracked: HashMap<String, StoredDocument>,
    missing: HashSet<String>,
    includes: Vec<String>,
    request_count: u32,
}

impl<'a> Session<'a> {
    pub(crate) fn new(store: &'a DocumentStore, db: Database) -> Self {
        Self {
            store,
            db,
            pending: Vec::new(),
            tracked: HashMap::new(),
            missing: HashSet::new(),
            includes: Vec::new(),
            request_count: 0,
        }
    }

    pub fn database(&self) -> &str {
        self.db.name()
    }

    /// Round trips made so far
    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    /// Whether there are staged writes
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Whether `id` is tracked by this session
    pub fn is_loaded(&self, id: &str) -> bool {
        self.tracked.contains_key(id)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Stage a document under the id its naming convention derives
    pub fn store<T: Document>(&mut self, doc: &T) -> Result<String> {
        let id = doc.document_id(&self.store.conventions().naming)?;
        self.store_with_id(doc, &id)?;
        Ok(id)
    }

    /// Stage a document under an explicit id
    pub fn store_with_id<T: Document>(&mut self, doc: &T, id: &str) -> Result<()> {
        if id.trim().is_empty() {
            return Err(StoreError::invalid_argument("Document ID cannot be empty").into());
        }

        let collection = T::collection_name();
        let data = serde_json::to_value(doc).context("Failed to serialize document")?;

        self.pending.retain(|op| op.id() != id);
        self.pending.push(WriteOp::Put {
            id: id.to_string(),
            collection: collection.to_string(),
            data: data.clone(),
            indexes: doc.indexed_fields(),
        });

        self.missing.remove(id);
        self.tracked.insert(
            id.to_string(),
            StoredDocument {
                id: id.to_string(),
                collection: collection.to_string(),
                data,
            },
        );

        debug!(id, collection, "Staged document");
        Ok(())
    }

    /// Stage a delete
    ///
    /// The id must belong to `T`'s collection; `save_changes` rejects it
    /// otherwise, and a document this session already tracks is checked here.
    pub fn delete<T: Document>(&mut self, id: &str) -> Result<()> {
        if let Some(doc) = self.tracked.get(id) {
            if doc.collection != T::collection_name() {
                return Err(StoreError::CollectionMismatch {
                    id: id.to_string(),
                    existing: doc.collection.clone(),
                    requested: T::collection_name().to_string(),
                }
                .into());
            }
        }

        self.pending.retain(|op| op.id() != id);
        self.pending.push(WriteOp::Delete {
            id: id.to_string(),
            collection: T::collection_name().to_string(),
        });

        self.tracked.remove(id);
        self.missing.insert(id.to_string());

        debug!(id, "Staged delete");
        Ok(())
    }

    /// Commit every staged write as one batch
    ///
    /// Returns the number of writes committed. Makes no request when nothing
    /// is staged. On failure the writes stay staged.
    pub fn save_changes(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        self.begin_request()?;

        let ops = std::mem::take(&mut self.pending);
        if let Err(e) = self.db.apply_batch(&ops, self.store.indexes()) {
            self.pending = ops;
            return Err(e);
        }

        info!(database = self.db.name(), count = ops.len(), "Saved changes");
        Ok(ops.len())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Also fetch the documents referenced by `field` in the next load or
    /// query, in the same request
    pub fn include(&mut self, field: &str) -> &mut Self {
        self.includes.push(field.to_string());
        self
    }

    /// Load a document by id
    pub fn load<T: Document>(&mut self, id: &str) -> Result<Option<T>> {
        let mut found = self.load_many::<T>(&[id])?;
        Ok(found.remove(id).flatten())
    }

    /// Load several documents in one request; missing ids map to None
    pub fn load_many<T: Document>(&mut self, ids: &[&str]) -> Result<BTreeMap<String, Option<T>>> {
        let includes = std::mem::take(&mut self.includes);

        let mut to_fetch: Vec<&str> = ids
            .iter()
            .copied()
            .filter(|id| !self.tracked.contains_key(*id) && !self.missing.contains(*id))
            .collect();
        to_fetch.sort_unstable();
        to_fetch.dedup();

        let fetched = !to_fetch.is_empty();
        if fetched {
            self.begin_request()?;
            let docs = self.db.get_many(&to_fetch)?;
            let found: HashSet<String> = docs.iter().map(|d| d.id.clone()).collect();
            for doc in docs {
                self.track(doc);
            }
            for id in to_fetch.iter().filter(|id| !found.contains(**id)) {
                self.missing.insert(id.to_string());
            }
            debug!(requested = to_fetch.len(), found = found.len(), "Loaded documents");
        }

        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.fetch_includes(&includes, &ids, fetched)?;

        let mut results = BTreeMap::new();
        for id in ids {
            let doc = match self.tracked.get(&id) {
                Some(doc) => Some(materialize::<T>(doc)?),
                None => None,
            };
            results.insert(id, doc);
        }
        Ok(results)
    }

    /// Documents whose id starts with `prefix`, ordered by id
    pub fn load_starting_with<T: Document>(&mut self, prefix: &str, skip: usize, take: usize) -> Result<Vec<T>> {
        let includes = std::mem::take(&mut self.includes);

        self.begin_request()?;
        let docs = self.db.starting_with(T::collection_name(), prefix, skip, take)?;
        debug!(prefix, skip, take, found = docs.len(), "Loaded documents by prefix");

        self.collect_results(docs, &includes)
    }

    /// Query a collection's auto index; no filters returns the whole collection
    pub fn query<T: Document>(&mut self, filters: &[Filter]) -> Result<Vec<T>> {
        self.query_on::<T>(AUTO_INDEX, filters)
    }

    /// Query a registered static index; results are whole documents
    pub fn query_index<I: Index>(&mut self, index: &I, filters: &[Filter]) -> Result<Vec<I::Doc>> {
        let name = index.name();
        if !self.store.has_index(name) {
            return Err(StoreError::invalid_argument(format!("Index {} is not registered with the store", name)).into());
        }
        self.query_on::<I::Doc>(name, filters)
    }

    fn query_on<T: Document>(&mut self, index_name: &str, filters: &[Filter]) -> Result<Vec<T>> {
        let includes = std::mem::take(&mut self.includes);

        self.begin_request()?;
        let docs = self.db.query(T::collection_name(), index_name, filters)?;
        debug!(
            index = index_name,
            filters = filters.len(),
            found = docs.len(),
            "Queried documents"
        );

        self.collect_results(docs, &includes)
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn begin_request(&mut self) -> Result<()> {
        let limit = self.store.conventions().max_requests_per_session;
        if self.request_count >= limit {
            return Err(StoreError::TooManyRequests { limit }.into());
        }
        self.request_count += 1;
        Ok(())
    }

    /// Track a document read from the database, keeping any version the
    /// session already holds; ignores documents deleted in this session
    fn track(&mut self, doc: StoredDocument) {
        if self.is_deleted(&doc.id) {
            return;
        }
        self.missing.remove(&doc.id);
        self.tracked.entry(doc.id.clone()).or_insert(doc);
    }

    fn is_deleted(&self, id: &str) -> bool {
        self.pending
            .iter()
            .any(|op| matches!(op, WriteOp::Delete { id: deleted, .. } if deleted == id))
    }

    fn collect_results<T: Document>(&mut self, docs: Vec<StoredDocument>, includes: &[String]) -> Result<Vec<T>> {
        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        for doc in docs {
            self.track(doc);
        }

        self.fetch_includes(includes, &ids, true)?;

        let mut results = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(doc) = self.tracked.get(id) {
                results.push(materialize::<T>(doc)?);
            }
        }
        Ok(results)
    }

    /// Fetch the documents referenced by `includes` fields of the documents
    /// in `ids`; rides on the current request when one was already made
    fn fetch_includes(&mut self, includes: &[String], ids: &[String], in_request: bool) -> Result<()> {
        if includes.is_empty() {
            return Ok(());
        }

        let mut wanted = BTreeSet::new();
        for id in ids {
            let Some(doc) = self.tracked.get(id) else {
                continue;
            };
            for field in includes {
                let Some(reference) = doc.data.get(field).and_then(|v| v.as_str()) else {
                    continue;
                };
                if !self.tracked.contains_key(reference) && !self.missing.contains(reference) {
                    wanted.insert(reference.to_string());
                }
            }
        }

        if wanted.is_empty() {
            return Ok(());
        }

        if !in_request {
            self.begin_request()?;
        }

        let refs: Vec<&str> = wanted.iter().map(String::as_str).collect();
        let docs = self.db.get_many(&refs)?;
        let found = docs.len();
        for doc in docs {
            self.track(doc);
        }
        for reference in &wanted {
            if !self.tracked.contains_key(reference) {
                self.missing.insert(reference.clone());
            }
        }

        debug!(fields = ?includes, wanted = wanted.len(), found, "Included documents");
        Ok(())
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                database = self.db.name(),
                count = self.pending.len(),
                "Session dropped with unsaved changes, discarding"
            );
        }
    }
}

fn materialize<T: Document>(doc: &StoredDocument) -> Result<T> {
    if doc.collection != T::collection_name() {
        return Err(StoreError::CollectionMismatch {
            id: doc.id.clone(),
            existing: doc.collection.clone(),
            requested: T::collection_name().to_string(),
        }
        .into());
    }
    serde_json::from_value(doc.data.clone()).with_context(|| format!("Failed to deserialize document {}", doc.id))
}
