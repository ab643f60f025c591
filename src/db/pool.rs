//! Database connection
//!
//! [`Backend`] is selected from configuration: a MongoDB database or the
//! process-local in-memory store.

use anyhow::{Context, Result};
use bson::doc;
use mongodb::{options::ClientOptions, Client, Database};

use super::indexes;
use super::repositories::Repositories;
use crate::config::{DatabaseConfig, DatabaseDriver};

/// Connected storage backend
#[derive(Clone)]
pub enum Backend {
    Mongo(Database),
    /// The repositories are created once so every clone shares the same data
    Memory(Repositories),
}

impl Backend {
    /// Connect according to configuration and verify the connection
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match config.driver {
            DatabaseDriver::Mongodb => {
                let mut options = ClientOptions::parse(&config.uri)
                    .await
                    .with_context(|| format!("Invalid MongoDB URI: {}", config.uri))?;
                options.app_name = Some("charity-hub".to_string());

                let client =
                    Client::with_options(options).context("Failed to create MongoDB client")?;
                let backend = Self::Mongo(client.database(&config.name));
                backend.ping().await.context("MongoDB is not reachable")?;
                Ok(backend)
            }
            DatabaseDriver::Memory => Ok(Self::in_memory()),
        }
    }

    /// Fresh in-memory backend
    pub fn in_memory() -> Self {
        Self::Memory(Repositories::in_memory())
    }

    /// Check that the backend answers
    pub async fn ping(&self) -> Result<()> {
        match self {
            Self::Mongo(db) => {
                db.run_command(doc! { "ping": 1 }, None)
                    .await
                    .context("Ping failed")?;
                Ok(())
            }
            Self::Memory(_) => Ok(()),
        }
    }

    /// Create the indexes entities declare (no-op in memory)
    pub async fn ensure_indexes(&self) -> Result<()> {
        match self {
            Self::Mongo(db) => indexes::ensure_all(db).await,
            Self::Memory(_) => Ok(()),
        }
    }

    pub fn repositories(&self) -> Repositories {
        match self {
            Self::Mongo(db) => Repositories::mongo(db),
            Self::Memory(repos) => repos.clone(),
        }
    }

    pub fn driver(&self) -> DatabaseDriver {
        match self {
            Self::Mongo(_) => DatabaseDriver::Mongodb,
            Self::Memory(_) => DatabaseDriver::Memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;

    #[tokio::test]
    async fn test_memory_backend_shares_data_between_clones() {
        let backend = Backend::in_memory();
        let clone = backend.clone();

        let user = User::new("Ada".into(), "ada@example.org".into(), "hash".into());
        backend.repositories().users.insert(&user).await.unwrap();

        let found = clone.repositories().users.get(user.id).await.unwrap();
        assert!(found.is_some());
        assert_eq!(clone.driver(), DatabaseDriver::Memory);
        clone.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_memory_driver() {
        let config = DatabaseConfig {
            driver: DatabaseDriver::Memory,
            ..Default::default()
        };
        let backend = Backend::connect(&config).await.unwrap();
        assert_eq!(backend.driver(), DatabaseDriver::Memory);
        backend.ensure_indexes().await.unwrap();
    }
}
