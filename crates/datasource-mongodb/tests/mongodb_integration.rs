//! Integration tests against a live MongoDB deployment.
//!
//! These tests require a MongoDB server to be running.
//! Set MONGODB_URI (default mongodb://localhost:27017) and run with --ignored.

use bson::{doc, oid::ObjectId};
use datasource_mongodb::{
    Connection, Datasource, DatasourceConfig, DatasourceError, DocumentStore,
};
use std::sync::Arc;

async fn connect(collection: &str) -> Connection {
    let uri = std::env::var("MONGODB_URI")
        .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let config = DatasourceConfig::new(uri, "datasource_test", collection);
    let connection = Connection::connect(&config).await.unwrap();
    connection.ping().await.unwrap();
    connection.store().collection().drop().await.unwrap();
    connection
}

#[tokio::test]
#[ignore] // Only run with --ignored flag when database is available
async fn test_crud_roundtrip() {
    let connection = connect("crud_roundtrip").await;
    let ds = Datasource::from_connection(&connection);

    let stored = ds.insert(doc! { "name": "Ada" }).await.unwrap();
    let id = stored.get_object_id("_id").unwrap();

    let found = ds.retrieve(id.to_hex()).await.unwrap().unwrap();
    assert_eq!(found.get_str("name").unwrap(), "Ada");

    let results = ds.query(&doc! { "_id": id.to_hex() }).await.unwrap();
    assert_eq!(results.len(), 1);

    assert!(ds.delete(id).await.unwrap());
    assert!(ds.retrieve(id).await.unwrap().is_none());

    connection.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_optimistic_update() {
    let connection = connect("optimistic_update").await;
    let ds = Datasource::from_connection(&connection);

    let stored = ds.insert(doc! { "name": "Ada", "version": 1 }).await.unwrap();
    let id = stored.get_object_id("_id").unwrap();

    let mut changed = stored.clone();
    changed.insert("version", 2);
    ds.update(id, &stored, &changed).await.unwrap();

    let err = ds.update(id, &stored, &changed).await.unwrap_err();
    assert!(err.is_conflict());

    // unchanged replacement still counts as a match
    ds.update(id, &changed, &changed).await.unwrap();

    connection.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_stale_writer_after_field_added_conflicts() {
    let connection = connect("stale_after_field_added").await;
    let ds = Datasource::from_connection(&connection);

    let original = ds.insert(doc! { "name": "Ada", "version": 1 }).await.unwrap();
    let id = original.get_object_id("_id").unwrap();

    let mut with_phone = original.clone();
    with_phone.insert("phone", "+44 20 7946 0000");
    ds.update(id, &original, &with_phone).await.unwrap();

    let mut renamed = original.clone();
    renamed.insert("name", "Ada Lovelace");
    let err = ds.update(id, &original, &renamed).await.unwrap_err();
    assert!(matches!(err, DatasourceError::NotFound(_)));

    let stored = ds.retrieve(id).await.unwrap().unwrap();
    assert_eq!(stored.get_str("phone").unwrap(), "+44 20 7946 0000");
    assert_eq!(stored.get_str("name").unwrap(), "Ada");

    connection.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_concurrent_updates_with_different_fields_single_winner() {
    let connection = connect("concurrent_field_updates").await;
    let ds = Arc::new(Datasource::from_connection(&connection));

    let id = ObjectId::new();
    let current = doc! { "_id": id, "name": "Ada", "version": 0 };
    ds.store().insert_one(current.clone()).await.unwrap();

    let mut handles = Vec::new();
    for writer in 1..=8 {
        let ds = ds.clone();
        let current = current.clone();
        let mut desired = current.clone();
        if writer % 2 == 0 {
            desired.insert("phone", format!("+44 20 7946 {:04}", writer));
        } else {
            desired.insert("version", writer);
        }
        handles.push(tokio::spawn(async move {
            let outcome = ds.update(id, &current, &desired).await;
            (desired, outcome)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (desired, outcome) = handle.await.unwrap();
        match outcome {
            Ok(()) => winners.push(desired),
            Err(err) => assert!(err.is_conflict(), "unexpected error: {:?}", err),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(ds.retrieve(id).await.unwrap().as_ref(), winners.first());

    connection.shutdown().await;
}

#[tokio::test]
#[ignore]
async fn test_concurrent_updates_single_winner() {
    let connection = connect("concurrent_updates").await;
    let ds = Arc::new(Datasource::from_connection(&connection));

    let id = ObjectId::new();
    let current = doc! { "_id": id, "version": 0 };
    ds.store().insert_one(current.clone()).await.unwrap();

    let mut handles = Vec::new();
    for version in 1..=8 {
        let ds = ds.clone();
        let current = current.clone();
        handles.push(tokio::spawn(async move {
            let desired = doc! { "_id": id, "version": version };
            ds.update(id, &current, &desired).await
        }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => committed += 1,
            Err(err) => assert!(err.is_conflict(), "unexpected error: {:?}", err),
        }
    }
    assert_eq!(committed, 1);

    connection.shutdown().await;
}
