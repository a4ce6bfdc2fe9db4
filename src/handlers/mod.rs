use anyhow::Context;
use std::sync::Arc;

use crate::{
    auth::JwtService,
    config::{Config, MetadataBackend},
    database::{Database, MemoryMetadataStore, MetadataStore},
    services::{FileService, MetricsService},
    storage::{BlobStore, LocalStorage},
    utils::SizeFormatter,
};

pub mod auth;
pub mod docs;
pub mod files;
pub mod health;
pub mod metrics;
pub mod storage;

#[derive(Clone)]
pub struct AppState {
    pub files: Arc<FileService>,
    pub store: Arc<dyn MetadataStore>,
    pub jwt: Arc<JwtService>,
    pub config: Arc<Config>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    /// Wire services around the given store and blob backends.
    pub fn new(config: Config, store: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>) -> anyhow::Result<Self> {
        let metrics = Arc::new(MetricsService::new().context("failed to register metrics")?);
        let files = FileService::new(
            store.clone(),
            blobs,
            metrics.clone(),
            config.spool_dir(),
            config.store_timeout(),
        );
        let jwt = JwtService::new(&config.jwt_secret, config.jwt_expiration_hours);

        Ok(Self {
            files: Arc::new(files),
            store,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
            metrics,
        })
    }

    /// Connect the configured backends.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn MetadataStore> = match config.metadata_backend {
            MetadataBackend::Postgres => {
                let database = Database::new(&config.database_url, config.store_timeout())
                    .await
                    .context("failed to connect to database")?;
                database.migrate().await.context("failed to run migrations")?;
                tracing::info!("Connected to PostgreSQL metadata store");
                Arc::new(database)
            }
            MetadataBackend::Memory => {
                tracing::warn!("Using in-memory metadata store, records are lost on restart");
                Arc::new(MemoryMetadataStore::new())
            }
        };

        let blobs = LocalStorage::new(&config.storage_path).context("failed to prepare storage directory")?;
        std::fs::create_dir_all(config.spool_dir()).context("failed to prepare spool directory")?;
        tracing::info!("Storing files under {}", config.storage_path.display());

        Self::new(config, store, Arc::new(blobs))
    }

    pub fn formatter(&self) -> SizeFormatter {
        SizeFormatter::new(self.config.display_in_mb)
    }
}
