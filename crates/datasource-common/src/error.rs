//! Error types for datasource

use thiserror::Error;

/// Result type alias for datasource operations
pub type Result<T> = std::result::Result<T, DatasourceError>;

/// Unified error type for all datasource operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasourceError {
    /// The request id and the `_id` of both snapshots do not agree.
    ///
    /// A caller bug: retrying the same request will fail the same way.
    #[error("Identity mismatch: updating a record with a different id (id: {id}, old: {old_id}, new: {new_id})")]
    IdentityMismatch {
        id: String,
        old_id: String,
        new_id: String,
    },

    /// No stored document matched the expected prior state.
    ///
    /// For updates this is the optimistic-concurrency rejection; re-read and retry.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A conditional replace reported more than one modified document.
    #[error("Store integrity fault: conditional replace modified {modified} documents")]
    StoreIntegrityFault { modified: u64 },

    #[error("MongoDB error: {0}")]
    MongoDB(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Duplicate key on insert
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DatasourceError {
    /// Returns true if this is an optimistic-concurrency rejection
    pub fn is_conflict(&self) -> bool {
        matches!(self, DatasourceError::NotFound(_))
    }

    /// Returns true if the caller may succeed by re-reading state and retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DatasourceError::NotFound(_) | DatasourceError::Connection(_)
        )
    }

    /// Returns true if the request itself is malformed
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            DatasourceError::IdentityMismatch { .. } | DatasourceError::Validation(_)
        )
    }
}

impl From<serde_json::Error> for DatasourceError {
    fn from(err: serde_json::Error) -> Self {
        DatasourceError::Serialization(err.to_string())
    }
}

// MongoDB-specific error conversions (when mongodb-errors feature is enabled)
#[cfg(feature = "mongodb-errors")]
impl From<mongodb::error::Error> for DatasourceError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;
        match err.kind.as_ref() {
            ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::ConnectionPoolCleared { .. } => {
                DatasourceError::Connection(err.to_string())
            }
            ErrorKind::InvalidArgument { .. } => DatasourceError::Configuration(err.to_string()),
            _ => DatasourceError::MongoDB(err.to_string()),
        }
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::ser::Error> for DatasourceError {
    fn from(err: bson::ser::Error) -> Self {
        DatasourceError::Serialization(format!("BSON serialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::de::Error> for DatasourceError {
    fn from(err: bson::de::Error) -> Self {
        DatasourceError::Deserialization(format!("BSON deserialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::oid::Error> for DatasourceError {
    fn from(err: bson::oid::Error) -> Self {
        DatasourceError::Validation(format!("Invalid ObjectId: {}", err))
    }
}
