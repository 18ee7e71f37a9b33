//! MongoDB-backed document store
//!
//! Thin pass-through to a driver collection. `replace_if_matching` relies on the
//! server applying `replaceOne` atomically per document.
//!
//! A plain query document only checks the fields it names, so the conditional
//! replace adds a field-count guard: together with equality on every field of the
//! prior state, the stored document must have exactly those fields.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Document as BsonDocument};
use datasource_common::DatasourceError;
use futures::TryStreamExt;
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::Collection;
use tracing::{debug, instrument};

use crate::id::ID_FIELD;
use crate::store::DocumentStore;
use crate::Result;

/// Document store over one MongoDB collection
#[derive(Clone)]
pub struct MongoStore {
    collection: Collection<BsonDocument>,
}

impl MongoStore {
    pub fn new(collection: Collection<BsonDocument>) -> Self {
        Self { collection }
    }

    pub fn collection(&self) -> &Collection<BsonDocument> {
        &self.collection
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    #[instrument(skip(self, filter), fields(collection = %self.collection.name()))]
    async fn find_one(&self, filter: BsonDocument) -> Result<Option<BsonDocument>> {
        Ok(self.collection.find_one(filter).await?)
    }

    #[instrument(skip(self, filter), fields(collection = %self.collection.name()))]
    async fn find_matching(&self, filter: BsonDocument) -> Result<Vec<BsonDocument>> {
        let cursor = self.collection.find(filter).await?;
        let docs: Vec<BsonDocument> = cursor.try_collect().await?;
        debug!(count = docs.len(), "Find complete");
        Ok(docs)
    }

    #[instrument(skip(self, document), fields(collection = %self.collection.name()))]
    async fn insert_one(&self, document: BsonDocument) -> Result<BsonDocument> {
        // Assign _id up front so the stored document can be returned as-is
        let mut stored = document;
        if !stored.contains_key(ID_FIELD) {
            let mut with_id = BsonDocument::new();
            with_id.insert(ID_FIELD, ObjectId::new());
            for (key, value) in stored {
                with_id.insert(key, value);
            }
            stored = with_id;
        }

        let result = self
            .collection
            .insert_one(&stored)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    DatasourceError::Conflict(e.to_string())
                } else {
                    DatasourceError::from(e)
                }
            })?;

        debug!(id = %result.inserted_id, "Insert complete");
        Ok(stored)
    }

    #[instrument(skip(self, filter), fields(collection = %self.collection.name()))]
    async fn delete_one(&self, filter: BsonDocument) -> Result<u64> {
        let result = self.collection.delete_one(filter).await?;
        debug!(affected = result.deleted_count, "Delete complete");
        Ok(result.deleted_count)
    }

    #[instrument(skip(self, filter, replacement), fields(collection = %self.collection.name()))]
    async fn replace_if_matching(
        &self,
        filter: BsonDocument,
        replacement: BsonDocument,
    ) -> Result<u64> {
        let result = self
            .collection
            .replace_one(exact_match_filter(filter)?, replacement)
            .await?;
        debug!(
            matched = result.matched_count,
            modified = result.modified_count,
            "Replace complete"
        );
        // Identical replacements match without modifying
        Ok(result.matched_count)
    }
}

/// Turn a prior-state snapshot into a filter matching only an identical document.
///
/// Embedded documents are already compared whole by the server; top-level fields
/// are not, hence the `$expr` guard on the number of fields in `$$ROOT`.
pub fn exact_match_filter(snapshot: BsonDocument) -> Result<BsonDocument> {
    if let Some(key) = snapshot.keys().find(|key| key.starts_with('$')) {
        return Err(DatasourceError::Validation(format!(
            "Prior state cannot contain top-level operator '{}'",
            key
        )));
    }

    let field_count = snapshot.len() as i64;
    let mut filter = snapshot;
    filter.insert(
        "$expr",
        doc! { "$eq": [{ "$size": { "$objectToArray": "$$ROOT" } }, field_count] },
    );
    Ok(filter)
}

/// Duplicate key violations surface as write error 11000
fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
    )
}
