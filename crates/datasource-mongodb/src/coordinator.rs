//! Optimistic-concurrency updates
//!
//! An update names the document it targets, the state the caller last saw, and the
//! state the caller wants. The store replaces the document only if it still equals
//! the state the caller saw; otherwise the caller lost a race (or read stale data)
//! and gets [`DatasourceError::NotFound`]. Nothing is retried here: whether to
//! re-read, merge, back off or give up is the caller's decision.
//!
//! Each call moves through [`UpdateState`]:
//!
//! ```text
//! Started -> Rejected                       (identities disagree, no store access)
//! Started -> Dispatched -> Committed        (exactly one document replaced)
//!                       -> Conflicted       (no document equal to the prior state)
//!                       -> Corrupted        (more than one document replaced)
//! ```

use bson::{Bson, Document as BsonDocument};
use datasource_common::DatasourceError;
use tracing::{debug, error, info, instrument, warn};

use crate::id::{document_id, normalize_document_id, normalize_id};
use crate::store::DocumentStore;
use crate::Result;

/// Progress of a single update call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Started,
    /// Precondition failed; the store was never contacted
    Rejected,
    /// Conditional replace sent to the store
    Dispatched,
    Committed,
    /// The prior state no longer matches what is stored
    Conflicted,
    /// The store replaced more than one document
    Corrupted,
}

impl UpdateState {
    /// Map the store's modified count to the terminal state it implies
    pub fn from_modified_count(modified: u64) -> Self {
        match modified {
            0 => UpdateState::Conflicted,
            1 => UpdateState::Committed,
            _ => UpdateState::Corrupted,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, UpdateState::Started | UpdateState::Dispatched)
    }
}

impl std::fmt::Display for UpdateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateState::Started => write!(f, "started"),
            UpdateState::Rejected => write!(f, "rejected"),
            UpdateState::Dispatched => write!(f, "dispatched"),
            UpdateState::Committed => write!(f, "committed"),
            UpdateState::Conflicted => write!(f, "conflicted"),
            UpdateState::Corrupted => write!(f, "corrupted"),
        }
    }
}

/// A checked update: all three identities agree and are in canonical form.
///
/// Built from caller snapshots without mutating them.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    id: Bson,
    old_state: BsonDocument,
    new_state: BsonDocument,
}

impl UpdateRequest {
    /// Normalize every identifier, then require them to be equal.
    ///
    /// # Errors
    /// - `IdentityMismatch` if `id`, `old_state._id` and `new_state._id` differ
    /// - `Validation` if all three are null
    pub fn new(id: Bson, old_state: &BsonDocument, new_state: &BsonDocument) -> Result<Self> {
        let id = normalize_id(id);
        let old_id = document_id(old_state);
        let new_id = document_id(new_state);
        if id != old_id || id != new_id {
            return Err(DatasourceError::IdentityMismatch {
                id: id.to_string(),
                old_id: old_id.to_string(),
                new_id: new_id.to_string(),
            });
        }

        if id == Bson::Null {
            return Err(DatasourceError::Validation(
                "Update requires a non-null id".to_string(),
            ));
        }

        Ok(Self {
            id,
            old_state: normalize_document_id(old_state),
            new_state: normalize_document_id(new_state),
        })
    }

    pub fn id(&self) -> &Bson {
        &self.id
    }

    /// Expected stored state, used as the replace filter
    pub fn old_state(&self) -> &BsonDocument {
        &self.old_state
    }

    /// Replacement document
    pub fn new_state(&self) -> &BsonDocument {
        &self.new_state
    }
}

/// Applies updates only when the stored document still equals the caller's prior state
pub struct OptimisticUpdater<S> {
    store: S,
}

impl<S: DocumentStore> OptimisticUpdater<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replace the document `id` with `new_state` if it currently equals `old_state`.
    ///
    /// Performs exactly one conditional write, or none if the identities disagree.
    ///
    /// # Errors
    /// - `IdentityMismatch`: the request is malformed; fix it, don't retry it
    /// - `NotFound`: the document changed or disappeared; re-read and retry if desired
    /// - `StoreIntegrityFault`: the store replaced several documents
    /// - store errors are passed through as-is
    #[instrument(skip_all, fields(id = %id))]
    pub async fn update(
        &self,
        id: Bson,
        old_state: &BsonDocument,
        new_state: &BsonDocument,
    ) -> Result<()> {
        debug!(state = %UpdateState::Started, "Updating document");
        let request = match UpdateRequest::new(id, old_state, new_state) {
            Ok(request) => request,
            Err(e) => {
                warn!(state = %UpdateState::Rejected, error = %e, "Update rejected");
                return Err(e);
            }
        };

        self.execute(request).await
    }

    /// Dispatch an already-checked request
    pub async fn execute(&self, request: UpdateRequest) -> Result<()> {
        debug!(state = %UpdateState::Dispatched, "Dispatching conditional replace");
        let UpdateRequest {
            id,
            old_state,
            new_state,
        } = request;

        let modified = self.store.replace_if_matching(old_state, new_state).await?;

        match UpdateState::from_modified_count(modified) {
            UpdateState::Committed => {
                info!(state = %UpdateState::Committed, "Update complete");
                Ok(())
            }
            UpdateState::Conflicted => {
                warn!(state = %UpdateState::Conflicted, "Stored document no longer matches prior state");
                Err(DatasourceError::NotFound(format!(
                    "no document with _id {} matches the expected prior state",
                    id
                )))
            }
            _ => {
                error!(state = %UpdateState::Corrupted, modified, "Conditional replace modified multiple documents");
                Err(DatasourceError::StoreIntegrityFault { modified })
            }
        }
    }
}
