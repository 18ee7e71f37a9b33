//! MongoDB datasource
//!
//! Generic data-access object for one document collection, with updates guarded by
//! optimistic concurrency.
//!
//! # Features
//! - Explicit identifier normalization (ObjectId text to canonical ObjectId)
//! - Conditional replace that rejects stale prior states
//! - Injected document store: MongoDB or in-process
//! - Async/await support via tokio

pub mod connection;
pub mod coordinator;
pub mod datasource;
pub mod id;
pub mod memory;
pub mod mongo;
pub mod store;
pub mod validation;

pub use connection::{Connection, DatasourceConfig};
pub use coordinator::{OptimisticUpdater, UpdateRequest, UpdateState};
pub use datasource::Datasource;
pub use datasource_common::{DatasourceError, Result};
pub use id::{is_object_id_hex, normalize_document_id, normalize_id};
pub use memory::InMemoryStore;
pub use mongo::MongoStore;
pub use store::DocumentStore;
pub use validation::{validate_constraints, ValidatedCollectionName};
