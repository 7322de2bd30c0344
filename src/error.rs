// Domain error conditions raised by the store and the identity deriver

use thiserror::Error;

/// Errors callers may want to match on
///
/// Everything else (I/O, SQLite, serialization) is propagated as an
/// `eyre::Report` with context. These variants travel inside that report too
/// and can be recovered with `report.downcast_ref::<StoreError>()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// An argument failed validation (blank name, bad collection, negative caffeine)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Database does not exist: {0}")]
    DatabaseDoesNotExist(String),

    #[error("Database already exists: {0}")]
    DatabaseAlreadyExists(String),

    /// A document id is already used by another collection
    #[error("Document {id} belongs to collection {existing}, cannot store it as {requested}")]
    CollectionMismatch {
        id: String,
        existing: String,
        requested: String,
    },

    /// The session exceeded its request budget
    #[error("Session exceeded its limit of {limit} requests")]
    TooManyRequests { limit: u32 },
}

impl StoreError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        StoreError::InvalidArgument(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            StoreError::invalid_argument("name is empty").to_string(),
            "Invalid argument: name is empty"
        );
        assert_eq!(
            StoreError::TooManyRequests { limit: 30 }.to_string(),
            "Session exceeded its limit of 30 requests"
        );
    }

    #[test]
    fn test_downcast_from_report() {
        let report: eyre::Report = StoreError::DatabaseDoesNotExist("Teas".to_string()).into();
        assert_eq!(
            report.downcast_ref::<StoreError>(),
            Some(&StoreError::DatabaseDoesNotExist("Teas".to_string()))
        );
    }
}
