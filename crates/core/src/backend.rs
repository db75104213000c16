//! Storage backend selection
//!
//! The backend is chosen once at startup from `StorageConfig` and handed to
//! callers as an `Arc<dyn TaskRepository>`. If MongoDB is requested but cannot
//! be reached, the file backend is used for the rest of the process.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::task::{FileTaskStore, MongoConfig, MongoTaskStore, TaskRepository};
use crate::{Error, Result};

/// Which medium a repository persists to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    File,
    #[serde(rename = "mongodb")]
    Mongo,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Mongo => "mongodb",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Startup storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Requested backend
    pub backend: BackendKind,
    /// JSON document used by the file backend
    pub data_file: PathBuf,
    /// Connection settings, required when `backend` is `Mongo`
    pub mongo: Option<MongoConfig>,
}

impl StorageConfig {
    pub fn file(data_file: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::File,
            data_file: data_file.into(),
            mongo: None,
        }
    }

    pub fn mongo(data_file: impl Into<PathBuf>, mongo: Option<MongoConfig>) -> Self {
        Self {
            backend: BackendKind::Mongo,
            data_file: data_file.into(),
            mongo,
        }
    }
}

async fn open_mongo(config: &StorageConfig) -> Result<MongoTaskStore> {
    let mongo = config.mongo.as_ref().ok_or_else(|| {
        Error::InvalidInput("MongoDB selected but no connection string configured".to_string())
    })?;
    MongoTaskStore::connect(mongo).await
}

/// Resolve the configured backend
///
/// A MongoDB connection failure is logged and answered with the file backend;
/// file backend failures propagate.
pub async fn open_repository(config: &StorageConfig) -> Result<Arc<dyn TaskRepository>> {
    if config.backend == BackendKind::Mongo {
        match open_mongo(config).await {
            Ok(store) => return Ok(Arc::new(store)),
            Err(e) => {
                tracing::warn!("Could not connect to database: {}", e);
                tracing::warn!("Falling back to file-based storage at {:?}", config.data_file);
            }
        }
    } else {
        tracing::info!("Using file-based storage (MongoDB disabled)");
    }

    let store = FileTaskStore::new(&config.data_file).await?;
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::NewTask;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_backend_selected() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::file(temp_dir.path().join("data.json"));

        let repo = open_repository(&config).await.unwrap();
        assert_eq!(repo.kind(), BackendKind::File);
        repo.create(NewTask::new("works")).await.unwrap();
        assert!(temp_dir.path().join("data.json").exists());
    }

    #[tokio::test]
    async fn test_missing_mongo_config_falls_back_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::mongo(temp_dir.path().join("data.json"), None);

        let repo = open_repository(&config).await.unwrap();
        assert_eq!(repo.kind(), BackendKind::File);
    }

    #[tokio::test]
    async fn test_unparseable_connection_string_falls_back_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let config = StorageConfig::mongo(
            temp_dir.path().join("data.json"),
            Some(MongoConfig::new("definitely not a connection string")),
        );

        let repo = open_repository(&config).await.unwrap();
        assert_eq!(repo.kind(), BackendKind::File);
    }

    #[test]
    fn test_backend_kind_names() {
        assert_eq!(BackendKind::File.to_string(), "file");
        assert_eq!(
            serde_json::to_value(BackendKind::Mongo).unwrap(),
            serde_json::json!("mongodb")
        );
    }
}
