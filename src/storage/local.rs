use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
};
use tokio::{
    fs,
    io::{AsyncRead, AsyncWriteExt},
};
use uuid::Uuid;

use crate::{
    errors::{AppError, Result},
    storage::{BlobStore, Spool},
};

pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        std::fs::create_dir_all(&base_path)
            .map_err(|e| AppError::Storage(format!("Failed to create storage directory: {}", e)))?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a location to a path under the base directory. Anything that could
    /// leave it is refused.
    fn resolve(&self, location: &str) -> Result<PathBuf> {
        let relative = Path::new(location);
        let is_plain = !location.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));

        if !is_plain {
            return Err(AppError::Storage(format!("Invalid storage location: {}", location)));
        }

        Ok(self.base_path.join(relative))
    }

    async fn write_part(part: &Path, spool: &mut Spool) -> Result<u64> {
        let mut out = fs::File::create(part).await?;
        let written = tokio::io::copy(spool.reader().await?, &mut out).await?;

        if written != spool.len() {
            return Err(AppError::Storage(format!(
                "Short write: {} of {} bytes",
                written,
                spool.len()
            )));
        }

        out.flush().await?;
        out.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
        let dir = self.resolve(namespace)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create directory: {}", e)))
    }

    fn locate(&self, namespace: &str, name: &str) -> String {
        format!("{}/{}", namespace, name)
    }

    async fn write(&self, location: &str, spool: &mut Spool) -> Result<u64> {
        let target = self.resolve(location)?;
        let parent = target
            .parent()
            .ok_or_else(|| AppError::Storage(format!("Invalid storage location: {}", location)))?;
        let part = parent.join(format!(".{}.part", Uuid::new_v4()));

        match Self::write_part(&part, spool).await {
            Ok(written) => {
                // Linking never replaces an existing blob, unlike rename.
                let placed = fs::hard_link(&part, &target).await;
                if let Err(e) = fs::remove_file(&part).await {
                    tracing::warn!("Failed to remove part file {}: {}", part.display(), e);
                }
                match placed {
                    Ok(()) => Ok(written),
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(AppError::DuplicateFile),
                    Err(e) => Err(AppError::Storage(format!("Failed to move file into place: {}", e))),
                }
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&part).await {
                    if cleanup.kind() != ErrorKind::NotFound {
                        tracing::warn!("Failed to remove partial file {}: {}", part.display(), cleanup);
                    }
                }
                Err(match e {
                    AppError::Io(io) => AppError::Storage(format!("Failed to write file: {}", io)),
                    other => other,
                })
            }
        }
    }

    async fn open(&self, location: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let path = self.resolve(location)?;

        match fs::File::open(&path).await {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Blob missing for recorded file at {}", location);
                Err(AppError::FileNotFound)
            }
            Err(e) => Err(AppError::Storage(format!("Failed to open file: {}", e))),
        }
    }

    async fn remove(&self, location: &str) -> Result<bool> {
        let path = self.resolve(location)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(format!("Failed to delete file: {}", e))),
        }
    }
}
