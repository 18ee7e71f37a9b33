//! Document store capability
//!
//! The datasource and the update coordinator never talk to a driver directly.
//! They are handed a [`DocumentStore`] at construction, which owns transport and
//! connection concerns. Documents cross this boundary as plain `bson::Document`s.

use async_trait::async_trait;
use bson::Document as BsonDocument;
use std::sync::Arc;

use crate::Result;

/// Primitive operations a collection-backed store must provide.
///
/// Implementations must be safe to share between concurrent tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find the first document matching the filter
    async fn find_one(&self, filter: BsonDocument) -> Result<Option<BsonDocument>>;

    /// Find all documents matching the filter
    async fn find_matching(&self, filter: BsonDocument) -> Result<Vec<BsonDocument>>;

    /// Insert a document, assigning an `ObjectId` `_id` when it has none.
    ///
    /// Returns the document as stored.
    async fn insert_one(&self, document: BsonDocument) -> Result<BsonDocument>;

    /// Delete at most one document matching the filter, returning the deleted count
    async fn delete_one(&self, filter: BsonDocument) -> Result<u64>;

    /// Atomically replace the document equal to `filter` with `replacement`.
    ///
    /// Returns the number of documents replaced. The match and the replace must be
    /// one indivisible step with respect to other writers.
    async fn replace_if_matching(
        &self,
        filter: BsonDocument,
        replacement: BsonDocument,
    ) -> Result<u64>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    async fn find_one(&self, filter: BsonDocument) -> Result<Option<BsonDocument>> {
        (**self).find_one(filter).await
    }

    async fn find_matching(&self, filter: BsonDocument) -> Result<Vec<BsonDocument>> {
        (**self).find_matching(filter).await
    }

    async fn insert_one(&self, document: BsonDocument) -> Result<BsonDocument> {
        (**self).insert_one(document).await
    }

    async fn delete_one(&self, filter: BsonDocument) -> Result<u64> {
        (**self).delete_one(filter).await
    }

    async fn replace_if_matching(
        &self,
        filter: BsonDocument,
        replacement: BsonDocument,
    ) -> Result<u64> {
        (**self).replace_if_matching(filter, replacement).await
    }
}
