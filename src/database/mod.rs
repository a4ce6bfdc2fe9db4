use async_trait::async_trait;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{FileRecord, NewFileRecord, NewUser, User};

pub mod memory;
pub mod queries;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryMetadataStore;
pub use store::{bounded, MetadataStore, QuotaUpdate};

use queries::{FileQueries, UserQueries};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.into()))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for Database {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        UserQueries::create_user(&self.pool, &user).await
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserQueries::find_by_id(&self.pool, id).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        UserQueries::find_by_username(&self.pool, username).await
    }

    async fn adjust_storage_used(&self, user_id: Uuid, delta: i64) -> Result<QuotaUpdate> {
        if let Some(storage_used) = UserQueries::try_adjust_storage_used(&self.pool, user_id, delta).await? {
            return Ok(QuotaUpdate::Applied { storage_used });
        }

        // Nothing updated: either the user is gone or the limit held.
        let user = UserQueries::find_by_id(&self.pool, user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        Ok(QuotaUpdate::Rejected {
            storage_used: user.storage_used,
            storage_limit: user.storage_limit,
        })
    }

    async fn set_storage_used(&self, user_id: Uuid, storage_used: i64) -> Result<()> {
        if UserQueries::set_storage_used(&self.pool, user_id, storage_used).await? {
            Ok(())
        } else {
            Err(AppError::UserNotFound)
        }
    }

    async fn file_exists_by_name(&self, user_id: Uuid, file_name: &str) -> Result<bool> {
        FileQueries::exists_by_name(&self.pool, user_id, file_name).await
    }

    async fn create_file(&self, file: NewFileRecord) -> Result<FileRecord> {
        FileQueries::create_file(&self.pool, &file).await
    }

    async fn find_file(&self, file_id: Uuid, user_id: Uuid) -> Result<Option<FileRecord>> {
        FileQueries::find_by_id_and_owner(&self.pool, file_id, user_id).await
    }

    async fn list_files(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<FileRecord>> {
        FileQueries::list_by_owner(&self.pool, user_id, limit, offset).await
    }

    async fn count_files(&self, user_id: Uuid) -> Result<i64> {
        FileQueries::count_by_owner(&self.pool, user_id).await
    }

    async fn sum_file_sizes(&self, user_id: Uuid) -> Result<i64> {
        FileQueries::sum_sizes_by_owner(&self.pool, user_id).await
    }

    async fn delete_file(&self, file_id: Uuid, user_id: Uuid) -> Result<bool> {
        FileQueries::delete_by_id_and_owner(&self.pool, file_id, user_id).await
    }
}
