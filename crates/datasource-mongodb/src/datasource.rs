//! Generic entity management for one collection
//!
//! Query, retrieve, insert, update and delete documents. Each operation is a single
//! store call; errors are returned to the caller unchanged. Wrap a `Datasource` to
//! add business rules for a particular entity.

use bson::{doc, Bson, Document as BsonDocument};
use tracing::{info, instrument};

use crate::connection::Connection;
use crate::coordinator::OptimisticUpdater;
use crate::id::{normalize_document_id, normalize_id};
use crate::mongo::MongoStore;
use crate::store::DocumentStore;
use crate::validation::validate_constraints;
use crate::Result;

/// Data-access object over an injected [`DocumentStore`]
pub struct Datasource<S> {
    updater: OptimisticUpdater<S>,
}

impl Datasource<MongoStore> {
    /// Datasource over the connection's configured collection
    pub fn from_connection(connection: &Connection) -> Self {
        Self::new(connection.store())
    }
}

impl<S: DocumentStore> Datasource<S> {
    pub fn new(store: S) -> Self {
        Self {
            updater: OptimisticUpdater::new(store),
        }
    }

    pub fn store(&self) -> &S {
        self.updater.store()
    }

    /// Delete a document by id.
    ///
    /// Returns true if a document was deleted
    #[instrument(skip(self, id))]
    pub async fn delete(&self, id: impl Into<Bson>) -> Result<bool> {
        let id = normalize_id(id.into());
        let deleted = self.store().delete_one(doc! { "_id": id }).await?;
        info!(affected = deleted, "Delete complete");
        Ok(deleted > 0)
    }

    /// Insert a new document.
    ///
    /// The store assigns an `ObjectId` `_id` when the document has none; the stored
    /// document is returned.
    #[instrument(skip(self, document))]
    pub async fn insert(&self, document: BsonDocument) -> Result<BsonDocument> {
        let stored = self
            .store()
            .insert_one(normalize_document_id(&document))
            .await?;
        info!("Insert complete");
        Ok(stored)
    }

    /// Query the collection.
    ///
    /// Constraints translate directly into a filter. An `_id` constraint given as
    /// ObjectId text is converted first.
    #[instrument(skip(self, constraints), fields(constraint_count = constraints.len()))]
    pub async fn query(&self, constraints: &BsonDocument) -> Result<Vec<BsonDocument>> {
        validate_constraints(constraints)?;
        let results = self
            .store()
            .find_matching(normalize_document_id(constraints))
            .await?;
        info!(count = results.len(), "Query complete");
        Ok(results)
    }

    /// Get an individual document by id
    #[instrument(skip(self, id))]
    pub async fn retrieve(&self, id: impl Into<Bson>) -> Result<Option<BsonDocument>> {
        let id = normalize_id(id.into());
        self.store().find_one(doc! { "_id": id }).await
    }

    /// Update an individual document using optimistic concurrency.
    ///
    /// If the stored document no longer equals `old_state` (same fields, same
    /// values), the update does not happen and `NotFound` is returned.
    pub async fn update(
        &self,
        id: impl Into<Bson>,
        old_state: &BsonDocument,
        new_state: &BsonDocument,
    ) -> Result<()> {
        self.updater.update(id.into(), old_state, new_state).await
    }
}
