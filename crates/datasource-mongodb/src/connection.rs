//! MongoDB connection setup for a single datasource collection
//!
//! # Example
//! ```rust,ignore
//! use datasource_mongodb::{Connection, DatasourceConfig};
//!
//! // From environment
//! let config = DatasourceConfig::from_env()?;
//! let connection = Connection::connect(&config).await?;
//! let store = connection.store();
//! ```

use bson::{doc, Document as BsonDocument};
use datasource_common::DatasourceError;
use mongodb::{
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, Collection,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

use crate::mongo::MongoStore;
use crate::validation::ValidatedCollectionName;
use crate::Result;

/// Where a datasource reads and writes its documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasourceConfig {
    /// MongoDB connection string
    pub uri: String,
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Connection timeout (default: 10s)
    pub connect_timeout: Option<Duration>,
    /// Server selection timeout (default: 30s)
    pub server_selection_timeout: Option<Duration>,
    /// Application name for server logs
    pub app_name: Option<String>,
}

impl Default for DatasourceConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "datasource".to_string(),
            collection: "documents".to_string(),
            connect_timeout: Some(Duration::from_secs(10)),
            server_selection_timeout: Some(Duration::from_secs(30)),
            app_name: Some("datasource".to_string()),
        }
    }
}

impl DatasourceConfig {
    /// Create a configuration for one collection, other settings at their defaults
    pub fn new(
        uri: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// - `MONGODB_URI` (default `mongodb://localhost:27017`)
    /// - `MONGODB_DATABASE` (default `datasource`)
    /// - `MONGODB_COLLECTION` (default `documents`)
    /// - `MONGODB_CONNECT_TIMEOUT_SECS` (default 10)
    /// - `MONGODB_APP_NAME` (default `datasource`)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let connect_timeout = match std::env::var("MONGODB_CONNECT_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|_| {
                    DatasourceError::Configuration(format!(
                        "MONGODB_CONNECT_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                        raw
                    ))
                })?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => defaults.connect_timeout,
        };

        let config = Self {
            uri: std::env::var("MONGODB_URI").unwrap_or(defaults.uri),
            database: std::env::var("MONGODB_DATABASE").unwrap_or(defaults.database),
            collection: std::env::var("MONGODB_COLLECTION").unwrap_or(defaults.collection),
            connect_timeout,
            server_selection_timeout: defaults.server_selection_timeout,
            app_name: std::env::var("MONGODB_APP_NAME").ok().or(defaults.app_name),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration without contacting the server
    pub fn validate(&self) -> Result<ValidatedCollectionName> {
        if self.uri.is_empty() {
            return Err(DatasourceError::Configuration(
                "MongoDB URI cannot be empty".to_string(),
            ));
        }
        if self.database.is_empty() {
            return Err(DatasourceError::Configuration(
                "Database name cannot be empty".to_string(),
            ));
        }
        ValidatedCollectionName::new(&self.collection)
    }
}

/// MongoDB client bound to the configured collection
pub struct Connection {
    client: Client,
    collection: Collection<BsonDocument>,
    collection_name: ValidatedCollectionName,
}

impl Connection {
    /// Build a client for the configured deployment.
    ///
    /// The driver connects lazily; use [`Connection::ping`] to verify reachability.
    #[instrument(skip(config), fields(database = %config.database, collection = %config.collection))]
    pub async fn connect(config: &DatasourceConfig) -> Result<Self> {
        let collection_name = config.validate()?;
        let mut client_options = ClientOptions::parse(config.uri.as_str()).await?;

        if let Some(connect) = config.connect_timeout {
            client_options.connect_timeout = Some(connect);
        }
        if let Some(server_sel) = config.server_selection_timeout {
            client_options.server_selection_timeout = Some(server_sel);
        }
        if let Some(app) = &config.app_name {
            client_options.app_name = Some(app.clone());
        }

        // Set stable API version for compatibility
        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);

        let client = Client::with_options(client_options)?;
        let collection = client
            .database(&config.database)
            .collection(collection_name.as_str());

        info!("MongoDB client initialized");
        Ok(Self {
            client,
            collection,
            collection_name,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn collection_name(&self) -> &str {
        self.collection_name.as_str()
    }

    /// Document store over the configured collection
    pub fn store(&self) -> MongoStore {
        MongoStore::new(self.collection.clone())
    }

    /// Check if the deployment is reachable
    pub async fn ping(&self) -> Result<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| DatasourceError::Connection(format!("Ping failed: {}", e)))?;
        Ok(())
    }

    /// Close the client, waiting for in-flight operations to finish
    pub async fn shutdown(self) {
        self.client.shutdown().await;
        info!("MongoDB client shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DatasourceConfig::default();
        assert_eq!(config.uri, "mongodb://localhost:27017");
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.app_name, Some("datasource".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_config_keeps_defaults() {
        let config = DatasourceConfig::new("mongodb://db:27017", "crm", "contacts");
        assert_eq!(config.database, "crm");
        assert_eq!(config.collection, "contacts");
        assert_eq!(
            config.server_selection_timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_validate_rejects_bad_collection() {
        let config = DatasourceConfig::new("mongodb://db:27017", "crm", "system.users");
        assert!(matches!(
            config.validate(),
            Err(DatasourceError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_database() {
        let config = DatasourceConfig::new("mongodb://db:27017", "", "contacts");
        assert!(matches!(
            config.validate(),
            Err(DatasourceError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_env_rejects_bad_timeout() {
        let original = std::env::var("MONGODB_CONNECT_TIMEOUT_SECS").ok();
        std::env::set_var("MONGODB_CONNECT_TIMEOUT_SECS", "soon");

        let result = DatasourceConfig::from_env();
        assert!(matches!(result, Err(DatasourceError::Configuration(_))));

        match original {
            Some(val) => std::env::set_var("MONGODB_CONNECT_TIMEOUT_SECS", val),
            None => std::env::remove_var("MONGODB_CONNECT_TIMEOUT_SECS"),
        }
    }

    #[test]
    fn test_config_serde() {
        let config = DatasourceConfig::new("mongodb://db:27017", "crm", "contacts");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: DatasourceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
