// Static indexes: named maps from a document to the fields it is queried by

use crate::document::{Document, IndexValue};
use crate::tea::TeaProfile;
use eyre::{Context, Result};
use std::collections::HashMap;

/// Name of the implicit per-collection index built from `Document::indexed_fields`
pub const AUTO_INDEX: &str = "auto";

/// A named index over one collection
///
/// `map` describes the indexed fields, not the query result: querying an
/// index returns whole documents.
pub trait Index: Send + Sync + 'static {
    type Doc: Document;

    fn name(&self) -> &str;

    fn map(&self, doc: &Self::Doc) -> HashMap<String, IndexValue>;
}

/// Type-erased index, so the store can keep every registered index in one list
pub(crate) trait IndexDefinition: Send + Sync {
    fn name(&self) -> &str;

    fn collection(&self) -> &'static str;

    fn map_json(&self, json: &serde_json::Value) -> Result<HashMap<String, IndexValue>>;
}

impl<I: Index> IndexDefinition for I {
    fn name(&self) -> &str {
        Index::name(self)
    }

    fn collection(&self) -> &'static str {
        I::Doc::collection_name()
    }

    fn map_json(&self, json: &serde_json::Value) -> Result<HashMap<String, IndexValue>> {
        let doc: I::Doc = serde_json::from_value(json.clone())
            .with_context(|| format!("Document does not match index {}", Index::name(self)))?;
        Ok(self.map(&doc))
    }
}

/// Tea profiles by caffeine content
#[derive(Debug, Clone, Copy, Default)]
pub struct TeaProfilesByCaffeine;

impl Index for TeaProfilesByCaffeine {
    type Doc = TeaProfile;

    fn name(&self) -> &str {
        "TeaProfiles/ByCaffeine"
    }

    fn map(&self, doc: &TeaProfile) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("caffeine_mg".to_string(), IndexValue::Float(doc.caffeine_mg()));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tea::TeaColor;

    #[test]
    fn test_caffeine_index_map() {
        let profile = TeaProfile::with_caffeine(TeaColor::Green, "Matcha", 70.0).unwrap();
        let fields = TeaProfilesByCaffeine.map(&profile);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("caffeine_mg"), Some(&IndexValue::Float(70.0)));
    }

    #[test]
    fn test_erased_index_maps_json() {
        let index: &dyn IndexDefinition = &TeaProfilesByCaffeine;
        assert_eq!(index.name(), "TeaProfiles/ByCaffeine");
        assert_eq!(index.collection(), "TeaProfiles");

        let json = serde_json::json!({ "name": "Matcha", "caffeine_mg": 70.0, "color": 1 });
        let fields = index.map_json(&json).unwrap();
        assert_eq!(fields.get("caffeine_mg"), Some(&IndexValue::Float(70.0)));

        let wrong = serde_json::json!({ "tea_id": "TeaProfiles/Matcha" });
        assert!(index.map_json(&wrong).is_err());
    }
}
