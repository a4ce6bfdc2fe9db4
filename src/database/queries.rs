use sqlx::PgPool;
use uuid::Uuid;
use crate::errors::{AppError, Result};
use crate::models::*;

const USER_COLUMNS: &str =
    "id, username, password_hash, storage_limit, storage_used, created_at, updated_at";
const FILE_COLUMNS: &str = "id, user_id, file_name, file_path, size, created_at, updated_at";

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub struct UserQueries;

impl UserQueries {
    pub async fn create_user(pool: &PgPool, user: &NewUser) -> Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, password_hash, storage_limit, storage_used)
            VALUES ($1, $2, $3, $4, 0)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.storage_limit)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Validation("User already exists".to_string())
                } else {
                    e.into()
                }
            })
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    /// Conditional increment: returns the new usage, or `None` when the row
    /// is missing or the increment would cross the limit.
    pub async fn try_adjust_storage_used(pool: &PgPool, id: Uuid, delta: i64) -> Result<Option<i64>> {
        let used = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE users
            SET storage_used = GREATEST(storage_used + $2, 0), updated_at = NOW()
            WHERE id = $1 AND ($2 <= 0 OR storage_used + $2 <= storage_limit)
            RETURNING storage_used
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(pool)
        .await?;

        Ok(used)
    }

    pub async fn set_storage_used(pool: &PgPool, id: Uuid, storage_used: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET storage_used = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(storage_used)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct FileQueries;

impl FileQueries {
    pub async fn exists_by_name(pool: &PgPool, user_id: Uuid, file_name: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM files WHERE user_id = $1 AND file_name = $2)",
        )
        .bind(user_id)
        .bind(file_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    pub async fn create_file(pool: &PgPool, file: &NewFileRecord) -> Result<FileRecord> {
        let sql = format!(
            r#"
            INSERT INTO files (id, user_id, file_name, file_path, size)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {FILE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, FileRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(file.user_id)
            .bind(&file.file_name)
            .bind(&file.file_path)
            .bind(file.size)
            .fetch_one(pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::DuplicateFile
                } else {
                    e.into()
                }
            })
    }

    pub async fn find_by_id_and_owner(pool: &PgPool, file_id: Uuid, user_id: Uuid) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = $1 AND user_id = $2");
        let file = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(file_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(file)
    }

    pub async fn list_by_owner(pool: &PgPool, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<FileRecord>> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE user_id = $1 ORDER BY created_at DESC, id LIMIT $2 OFFSET $3"
        );
        let files = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(files)
    }

    pub async fn count_by_owner(pool: &PgPool, user_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM files WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn sum_sizes_by_owner(pool: &PgPool, user_id: Uuid) -> Result<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(size), 0)::BIGINT FROM files WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(total)
    }

    pub async fn delete_by_id_and_owner(pool: &PgPool, file_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1 AND user_id = $2")
            .bind(file_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
