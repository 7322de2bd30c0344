// TeaStore - Tea profile samples against a document store

pub mod config;
pub mod console;
pub mod database;
pub mod document;
pub mod error;
pub mod filter;
pub mod identity;
pub mod index;
pub mod jsonl;
pub mod samples;
pub mod session;
pub mod store;
pub mod tea;

// Re-export main types for convenience
pub use config::{Conventions, StoreConfig};
pub use database::{Database, StoredDocument, now_ms};
pub use document::{Document, IndexValue};
pub use error::StoreError;
pub use filter::{Filter, FilterOp};
pub use identity::{NamingConvention, TEA_PROFILE_PREFIX, derive_identity};
pub use index::{Index, TeaProfilesByCaffeine};
pub use session::Session;
pub use store::DocumentStore;
pub use tea::{Serving, TeaColor, TeaProfile};
