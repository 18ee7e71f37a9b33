//! In-process document store
//!
//! A single collection held behind a `RwLock`. Reads share the lock; every write,
//! including the match-and-replace of [`DocumentStore::replace_if_matching`], runs
//! under one exclusive guard, so conditional replaces are atomic with respect to
//! each other.
//!
//! Filters support field equality only. Query operators (`$gte`, `$or`, ...) are
//! rejected rather than silently misinterpreted.

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document as BsonDocument};
use datasource_common::DatasourceError;
use parking_lot::RwLock;
use tracing::debug;

use crate::id::ID_FIELD;
use crate::store::DocumentStore;
use crate::Result;

/// Collection stored in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: RwLock<Vec<BsonDocument>>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with documents (stored as given)
    pub fn with_documents(documents: Vec<BsonDocument>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }

    /// Copy of every stored document, in insertion order
    pub fn snapshot(&self) -> Vec<BsonDocument> {
        self.documents.read().clone()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_one(&self, filter: BsonDocument) -> Result<Option<BsonDocument>> {
        ensure_equality_filter(&filter)?;
        let guard = self.documents.read();
        Ok(guard.iter().find(|doc| matches_filter(doc, &filter)).cloned())
    }

    async fn find_matching(&self, filter: BsonDocument) -> Result<Vec<BsonDocument>> {
        ensure_equality_filter(&filter)?;
        let guard = self.documents.read();
        Ok(guard
            .iter()
            .filter(|doc| matches_filter(doc, &filter))
            .cloned()
            .collect())
    }

    async fn insert_one(&self, document: BsonDocument) -> Result<BsonDocument> {
        let stored = if document.contains_key(ID_FIELD) {
            document
        } else {
            let mut with_id = BsonDocument::new();
            with_id.insert(ID_FIELD, ObjectId::new());
            for (key, value) in document {
                with_id.insert(key, value);
            }
            with_id
        };

        let mut guard = self.documents.write();
        let id = stored.get(ID_FIELD).cloned().unwrap_or(Bson::Null);
        if guard
            .iter()
            .any(|doc| doc.get(ID_FIELD).map_or(false, |existing| bson_equal(existing, &id)))
        {
            return Err(DatasourceError::Conflict(format!(
                "Duplicate key: _id {} already exists",
                id
            )));
        }

        guard.push(stored.clone());
        debug!(id = %id, "Inserted document");
        Ok(stored)
    }

    async fn delete_one(&self, filter: BsonDocument) -> Result<u64> {
        ensure_equality_filter(&filter)?;
        let mut guard = self.documents.write();
        match guard.iter().position(|doc| matches_filter(doc, &filter)) {
            Some(index) => {
                guard.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn replace_if_matching(
        &self,
        filter: BsonDocument,
        replacement: BsonDocument,
    ) -> Result<u64> {
        let mut guard = self.documents.write();
        match guard.iter_mut().find(|doc| documents_equal(doc, &filter)) {
            Some(slot) => {
                *slot = replacement;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

/// Field-order-independent equality of two documents
pub fn documents_equal(a: &BsonDocument, b: &BsonDocument) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(key, value)| b.get(key).map_or(false, |other| bson_equal(value, other)))
}

/// Value equality with numbers compared by value, as the server does:
/// `Int32(1)`, `Int64(1)` and `Double(1.0)` are equal, and NaN equals NaN.
fn bson_equal(a: &Bson, b: &Bson) -> bool {
    match (a, b) {
        (Bson::Document(a), Bson::Document(b)) => documents_equal(a, b),
        (Bson::Array(a), Bson::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| bson_equal(x, y))
        }
        _ => match (integer_value(a), integer_value(b)) {
            (Some(x), Some(y)) => x == y,
            _ => match (number_value(a), number_value(b)) {
                (Some(x), Some(y)) => x == y || (x.is_nan() && y.is_nan()),
                _ => a == b,
            },
        },
    }
}

fn integer_value(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

fn number_value(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

fn matches_filter(document: &BsonDocument, filter: &BsonDocument) -> bool {
    filter.iter().all(|(key, expected)| {
        document
            .get(key)
            .map_or(false, |actual| bson_equal(actual, expected))
    })
}

fn ensure_equality_filter(filter: &BsonDocument) -> Result<()> {
    let uses_operator = filter.iter().any(|(key, value)| {
        key.starts_with('$')
            || matches!(value, Bson::Document(inner) if inner.keys().any(|k| k.starts_with('$')))
    });
    if uses_operator {
        return Err(DatasourceError::Validation(
            "In-memory store supports field equality filters only".to_string(),
        ));
    }
    Ok(())
}
