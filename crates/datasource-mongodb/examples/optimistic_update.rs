//! Optimistic Update Example
//!
//! Two writers read the same contact and both try to save their change. The
//! second one is rejected, re-reads, and retries.
//!
//! Uses the in-process store by default. Set MONGODB_URI to run against MongoDB.
//!
//! Run with:
//! ```bash
//! cargo run -p datasource-mongodb --example optimistic_update
//! ```

use anyhow::Result;
use bson::doc;
use datasource_mongodb::{
    Connection, Datasource, DatasourceConfig, DocumentStore, InMemoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    if std::env::var("MONGODB_URI").is_ok() {
        let config = DatasourceConfig::from_env()?;
        let connection = Connection::connect(&config).await?;
        connection.ping().await?;
        run(Datasource::from_connection(&connection)).await?;
        connection.shutdown().await;
    } else {
        run(Datasource::new(InMemoryStore::new())).await?;
    }

    Ok(())
}

async fn run<S: DocumentStore>(contacts: Datasource<S>) -> Result<()> {
    let original = contacts
        .insert(doc! { "name": "Ada", "email": "ada@example.com" })
        .await?;
    let id = original.get_object_id("_id")?;
    println!("Inserted {}", id);

    let mut first = original.clone();
    first.insert("email", "ada@analytical.engine");
    contacts.update(id, &original, &first).await?;
    println!("First writer saved: {}", first);

    let mut second = original.clone();
    second.insert("phone", "+44 20 7946 0000");
    match contacts.update(id, &original, &second).await {
        Err(e) if e.is_conflict() => {
            println!("Second writer rejected: {}", e);

            let current = contacts
                .retrieve(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("contact {} disappeared", id))?;
            let mut merged = current.clone();
            merged.insert("phone", "+44 20 7946 0000");
            contacts.update(id, &current, &merged).await?;
            println!("Second writer saved after re-read: {}", merged);
        }
        other => other?,
    }

    contacts.delete(id).await?;
    Ok(())
}
