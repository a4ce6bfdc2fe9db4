use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub metadata_backend: MetadataBackend,
    pub storage_path: PathBuf,
    /// Directory for upload spools; the system temp dir when unset.
    pub spool_dir: Option<PathBuf>,
    pub default_storage_limit: i64,
    pub display_in_mb: bool,
    pub max_upload_size: usize,
    pub jwt_secret: String,
    pub jwt_expiration_hours: i64,
    pub bcrypt_cost: u32,
    pub store_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_concurrent_requests: usize,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: "postgresql://localhost/file_storage".to_string(),
            metadata_backend: MetadataBackend::Postgres,
            storage_path: PathBuf::from("./storage"),
            spool_dir: None,
            default_storage_limit: 104_857_600, // 100MB
            display_in_mb: false,
            max_upload_size: 32 * 1024 * 1024,
            jwt_secret: "default-insecure-jwt-secret-change-in-production".to_string(),
            jwt_expiration_hours: 24,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            store_timeout_secs: 5,
            request_timeout_secs: 60,
            max_concurrent_requests: 512,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Defaults, then the optional config file, then `FILESTORE_*` variables.
    /// A bare `DATABASE_URL` wins over everything else.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default".to_string());

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(&file).required(false))
            .add_source(config::Environment::with_prefix("FILESTORE").try_parsing(true))
            .set_override_option("database_url", env::var("DATABASE_URL").ok())?
            .build()
            .context("failed to assemble configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("invalid configuration")?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.default_storage_limit < 0 {
            anyhow::bail!("default_storage_limit must not be negative");
        }
        if self.store_timeout_secs == 0 {
            anyhow::bail!("store_timeout_secs must be at least 1");
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            anyhow::bail!("bcrypt_cost must be between 4 and 31");
        }
        if self.jwt_secret == Config::default().jwt_secret {
            tracing::warn!("jwt_secret not set, using an insecure default");
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn spool_dir(&self) -> PathBuf {
        self.spool_dir.clone().unwrap_or_else(env::temp_dir)
    }
}
