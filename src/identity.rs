// Identity derivation: how a record's external id is built from its name

use crate::document::Document;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// Hardcoded collection prefix for tea profiles
pub const TEA_PROFILE_PREFIX: &str = "TeaProfiles";

/// Separator used by the prefixed and bare conventions, and by the collection convention unless configured otherwise
pub const DEFAULT_SEPARATOR: char = '/';

/// Policy controlling how a record's id is built from its natural key
///
/// Names may not contain the convention's separator, so an id always splits
/// back into exactly one prefix and one name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum NamingConvention {
    /// `"<prefix>/" + name` for records of `collection`; other collections
    /// fall back to `"<their collection>/" + name`
    Prefixed {
        #[serde(default = "default_prefixed_collection")]
        collection: String,
        prefix: String,
    },
    /// The name itself
    Bare,
    /// `"<collection><separator>" + name`, collection taken from the record type
    Collection {
        #[serde(default = "default_separator")]
        separator: char,
    },
}

fn default_prefixed_collection() -> String {
    TEA_PROFILE_PREFIX.to_string()
}

fn default_separator() -> char {
    DEFAULT_SEPARATOR
}

impl Default for NamingConvention {
    fn default() -> Self {
        NamingConvention::Collection {
            separator: DEFAULT_SEPARATOR,
        }
    }
}

impl NamingConvention {
    /// The `TeaProfiles/<name>` convention
    pub fn tea_profiles() -> Self {
        NamingConvention::Prefixed {
            collection: TEA_PROFILE_PREFIX.to_string(),
            prefix: TEA_PROFILE_PREFIX.to_string(),
        }
    }

    /// The character that ends the prefix; never allowed inside a name
    pub fn separator(&self) -> char {
        match self {
            NamingConvention::Prefixed { .. } | NamingConvention::Bare => DEFAULT_SEPARATOR,
            NamingConvention::Collection { separator } => *separator,
        }
    }

    /// Build the id for `name` in `collection`
    ///
    /// Fails with `InvalidArgument` when the name is empty, whitespace-only,
    /// or contains the separator.
    pub fn identity_for(&self, collection: &str, name: &str) -> Result<String, StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::invalid_argument(format!(
                "cannot derive an identity for an empty name in collection {}",
                collection
            )));
        }
        if name.contains(self.separator()) {
            return Err(StoreError::invalid_argument(format!(
                "name {:?} contains the id separator '{}'",
                name,
                self.separator()
            )));
        }

        Ok(format!("{}{}", self.id_prefix(collection), name))
    }

    /// The part of every id in `collection` that precedes the name, for prefix scans
    pub fn id_prefix(&self, collection: &str) -> String {
        match self {
            NamingConvention::Prefixed {
                collection: prefixed,
                prefix,
            } if prefixed == collection => format!("{}{}", prefix, DEFAULT_SEPARATOR),
            NamingConvention::Prefixed { .. } => format!("{}{}", collection, DEFAULT_SEPARATOR),
            NamingConvention::Bare => String::new(),
            NamingConvention::Collection { separator } => format!("{}{}", collection, separator),
        }
    }
}

/// Derive the id of `record` under `convention`
pub fn derive_identity<T: Document>(convention: &NamingConvention, record: &T) -> Result<String, StoreError> {
    convention.identity_for(T::collection_name(), record.natural_key())
}
