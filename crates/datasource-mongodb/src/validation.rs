//! Input validation for datasource operations
//!
//! Collection names come from configuration and query constraints come straight
//! from callers, so both are checked before they reach the driver.

use bson::{Bson, Document as BsonDocument};
use datasource_common::DatasourceError;
use tracing::warn;

use crate::Result;

/// Maximum allowed length for collection names (MongoDB limit is 255, we're more conservative)
const MAX_COLLECTION_NAME_LENGTH: usize = 120;

/// Operators that run server-side JavaScript
const DANGEROUS_OPERATORS: &[&str] = &["$where", "$function", "$accumulator"];

/// Collection name checked against reserved and malformed names
///
/// - Not empty
/// - Maximum 120 characters
/// - No null bytes
/// - No "system." prefix
/// - No $ characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCollectionName {
    name: String,
}

impl ValidatedCollectionName {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(DatasourceError::Validation(
                "Collection name cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_COLLECTION_NAME_LENGTH {
            return Err(DatasourceError::Validation(format!(
                "Collection name exceeds maximum length of {} characters: '{}'",
                MAX_COLLECTION_NAME_LENGTH, name
            )));
        }

        if name.contains('\0') {
            return Err(DatasourceError::Validation(
                "Collection name cannot contain null bytes".to_string(),
            ));
        }

        if name.starts_with("system.") {
            return Err(DatasourceError::Validation(format!(
                "Collection name cannot start with 'system.' (reserved): '{}'",
                name
            )));
        }

        if name.contains('$') {
            return Err(DatasourceError::Validation(format!(
                "Collection name cannot contain '$' character: '{}'",
                name
            )));
        }

        if name.contains("..") {
            warn!(collection = name, "Collection name contains suspicious pattern");
        }

        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl AsRef<str> for ValidatedCollectionName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for ValidatedCollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Rejects query constraints that would execute JavaScript on the server.
///
/// Constraints are otherwise passed to the store as-is.
pub fn validate_constraints(constraints: &BsonDocument) -> Result<()> {
    for (key, value) in constraints.iter() {
        if DANGEROUS_OPERATORS.contains(&key.as_str()) {
            return Err(DatasourceError::Validation(format!(
                "Operator '{}' is not allowed in query constraints",
                key
            )));
        }
        validate_value(value)?;
    }
    Ok(())
}

fn validate_value(value: &Bson) -> Result<()> {
    match value {
        Bson::Document(doc) => validate_constraints(doc),
        Bson::Array(items) => items.iter().try_for_each(validate_value),
        _ => Ok(()),
    }
}
