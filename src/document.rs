// Document trait for any type stored in the document store

use crate::error::StoreError;
use crate::identity::{NamingConvention, derive_identity};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;

/// Core trait that any storable document must implement
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name for this document type (e.g., "TeaProfiles")
    /// Determines the JSONL filename: {collection}.jsonl
    fn collection_name() -> &'static str
    where
        Self: Sized;

    /// Natural key the document's id is derived from
    fn natural_key(&self) -> &str;

    /// Fields to put in the collection's auto index for filtering
    /// Return empty HashMap if no fields should be indexed
    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        HashMap::new()
    }

    /// Id of this document under `convention`
    fn document_id(&self, convention: &NamingConvention) -> Result<String, StoreError>
    where
        Self: Sized,
    {
        derive_identity(convention, self)
    }
}

/// Value types that can be indexed for filtering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum IndexValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for IndexValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexValue::String(s) => write!(f, "{}", s),
            IndexValue::Int(i) => write!(f, "{}", i),
            IndexValue::Float(x) => write!(f, "{}", x),
            IndexValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        IndexValue::String(s.to_string())
    }
}

impl From<i64> for IndexValue {
    fn from(i: i64) -> Self {
        IndexValue::Int(i)
    }
}

impl From<f64> for IndexValue {
    fn from(x: f64) -> Self {
        IndexValue::Float(x)
    }
}

impl From<bool> for IndexValue {
    fn from(b: bool) -> Self {
        IndexValue::Bool(b)
    }
}
