use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{io::AsyncRead, sync::oneshot};
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    database::{bounded, MetadataStore},
    errors::{AppError, Result},
    models::{FileRecord, NewFileRecord, ReconcileReport, StorageSummary, User},
    services::{
        compensation::{Compensations, Undo, UploadStage},
        metrics::MetricsService,
        quota_manager::QuotaLedger,
    },
    storage::{BlobStore, Spool},
    utils::validate_file_name,
};

/// Upload, download and delete with the user's usage kept in step with the
/// bytes on disk.
pub struct FileService {
    store: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    ledger: Arc<QuotaLedger>,
    metrics: Arc<MetricsService>,
    spool_dir: PathBuf,
    store_timeout: Duration,
}

impl FileService {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        metrics: Arc<MetricsService>,
        spool_dir: PathBuf,
        store_timeout: Duration,
    ) -> Self {
        let ledger = Arc::new(QuotaLedger::new(store.clone(), store_timeout, metrics.clone()));

        Self {
            store,
            blobs,
            ledger,
            metrics,
            spool_dir,
            store_timeout,
        }
    }

    async fn resolve_user(&self, user_id: Uuid) -> Result<User> {
        bounded(self.store_timeout, self.store.find_user_by_id(user_id))
            .await?
            .ok_or(AppError::UserNotFound)
    }

    /// Everything up to the spool can be abandoned freely. From the
    /// reservation on, the work runs in its own task so a dropped request
    /// cannot skip the compensations.
    pub async fn upload<R>(&self, user_id: Uuid, file_name: &str, content: &mut R) -> Result<FileRecord>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
    {
        validate_file_name(file_name)?;
        let user = self.resolve_user(user_id).await?;

        if bounded(self.store_timeout, self.store.file_exists_by_name(user.id, file_name)).await? {
            tracing::warn!(%user_id, file_name, "Upload rejected, name already in use");
            return Err(AppError::DuplicateFile);
        }

        self.blobs.ensure_namespace(&user.username).await?;

        let spool = Spool::capture(content, &self.spool_dir).await?;
        if spool.is_empty() {
            tracing::debug!(%user_id, file_name, "Empty upload");
        }

        let commit = UploadCommit {
            store: self.store.clone(),
            blobs: self.blobs.clone(),
            ledger: self.ledger.clone(),
            metrics: self.metrics.clone(),
            store_timeout: self.store_timeout,
        };
        let file_name = file_name.to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(
            async move {
                let result = commit.run(user, file_name, spool, &tx).await;
                if let Err(Ok(record)) = tx.send(result) {
                    tracing::warn!(file_id = %record.id, "Upload committed after the caller went away");
                }
            }
            .in_current_span(),
        );

        rx.await
            .map_err(|_| AppError::Internal(anyhow::anyhow!("upload task ended without a result")))?
    }

    /// Owner-scoped; a file owned by someone else is `FileNotFound`.
    pub async fn get(&self, file_id: Uuid, user_id: Uuid) -> Result<FileRecord> {
        bounded(self.store_timeout, self.store.find_file(file_id, user_id))
            .await?
            .ok_or(AppError::FileNotFound)
    }

    pub async fn download(
        &self,
        file_id: Uuid,
        user_id: Uuid,
    ) -> Result<(String, Box<dyn AsyncRead + Send + Unpin>)> {
        let record = self.get(file_id, user_id).await?;
        let reader = self.blobs.open(&record.file_path).await?;
        self.metrics.record_download();

        Ok((record.file_name, reader))
    }

    pub async fn delete(&self, file_id: Uuid, user_id: Uuid) -> Result<()> {
        let record = self.get(file_id, user_id).await?;

        if !self.blobs.remove(&record.file_path).await? {
            tracing::warn!(%user_id, %file_id, "Blob already missing on delete");
        }

        self.ledger.reserve(user_id, -record.size).await?;

        if !bounded(self.store_timeout, self.store.delete_file(file_id, user_id)).await? {
            return Err(AppError::FileNotFound);
        }

        self.metrics.record_delete();
        tracing::info!(%user_id, %file_id, size = record.size, "File deleted");

        Ok(())
    }

    /// One page of the user's files, newest first, with the total count.
    pub async fn list(&self, user_id: Uuid, page: i64, page_size: i64) -> Result<(Vec<FileRecord>, i64)> {
        let offset = (page.max(1) - 1).saturating_mul(page_size);

        let total = bounded(self.store_timeout, self.store.count_files(user_id)).await?;
        let files = bounded(self.store_timeout, self.store.list_files(user_id, page_size, offset)).await?;

        Ok((files, total))
    }

    pub async fn storage_summary(&self, user_id: Uuid) -> Result<StorageSummary> {
        let user = self.resolve_user(user_id).await?;

        Ok(StorageSummary {
            total: user.storage_limit,
            used: user.storage_used,
        })
    }

    pub async fn reconcile(&self, user_id: Uuid) -> Result<ReconcileReport> {
        self.ledger.reconcile(user_id).await
    }
}

/// The part of an upload that must run to completion once quota is reserved.
struct UploadCommit {
    store: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    ledger: Arc<QuotaLedger>,
    metrics: Arc<MetricsService>,
    store_timeout: Duration,
}

impl UploadCommit {
    async fn unwind(&self, undo: Compensations) {
        undo.unwind(&self.ledger, self.blobs.as_ref(), &self.metrics).await;
    }

    async fn run(
        self,
        user: User,
        file_name: String,
        mut spool: Spool,
        caller: &oneshot::Sender<Result<FileRecord>>,
    ) -> Result<FileRecord> {
        let user_id = user.id;
        let size = i64::try_from(spool.len())
            .map_err(|_| AppError::Validation("File is too large".to_string()))?;

        let mut stage = UploadStage::Pending;
        let mut undo = Compensations::default();

        if let Err(e) = self.ledger.reserve(user_id, size).await {
            tracing::warn!(%user_id, %file_name, size, %stage, "Upload stopped before reservation: {}", e);
            return Err(e);
        }
        undo.push(Undo::Release { user_id, bytes: size });
        stage = UploadStage::Reserved;

        let location = self.blobs.locate(&user.username, &file_name);
        if let Err(e) = self.blobs.write(&location, &mut spool).await {
            tracing::error!(%user_id, %file_name, %stage, "Blob write failed: {}", e);
            self.unwind(undo).await;
            return Err(e);
        }
        undo.push(Undo::RemoveBlob { location: location.clone() });
        stage = UploadStage::Written;

        if caller.is_closed() {
            tracing::warn!(%user_id, %file_name, %stage, "Caller went away, rolling upload back");
            self.unwind(undo).await;
            return Err(AppError::Storage("Upload abandoned by caller".to_string()));
        }

        let new_record = NewFileRecord {
            user_id,
            file_name: file_name.clone(),
            file_path: location,
            size,
        };
        let record = match bounded(self.store_timeout, self.store.create_file(new_record)).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(%user_id, %file_name, %stage, "Saving file record failed: {}", e);
                self.unwind(undo).await;
                return Err(match e {
                    AppError::DuplicateFile => AppError::DuplicateFile,
                    AppError::StoreTimeout(limit) => AppError::StoreTimeout(limit),
                    other => AppError::Metadata(other.to_string()),
                });
            }
        };

        undo.disarm();
        stage = UploadStage::Committed;
        self.metrics.record_upload(spool.len());
        tracing::info!(%user_id, file_id = %record.id, size, %stage, "File uploaded");

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        database::{testing::FaultyStore, MemoryMetadataStore},
        models::NewUser,
        storage::{LocalStorage, MockBlobStore},
    };
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    struct Harness {
        service: Arc<FileService>,
        store: Arc<dyn MetadataStore>,
        user_id: Uuid,
        dir: TempDir,
    }

    impl Harness {
        async fn used(&self) -> i64 {
            self.store.find_user_by_id(self.user_id).await.unwrap().unwrap().storage_used
        }

        async fn file_count(&self) -> i64 {
            self.store.count_files(self.user_id).await.unwrap()
        }

        fn blob_path(&self, name: &str) -> PathBuf {
            self.dir.path().join("blobs").join("testuser").join(name)
        }
    }

    async fn harness_with(store: Arc<dyn MetadataStore>, blobs: Option<Arc<dyn BlobStore>>, limit: i64) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let blobs = match blobs {
            Some(blobs) => blobs,
            None => Arc::new(LocalStorage::new(dir.path().join("blobs")).unwrap()),
        };
        let user = store
            .create_user(NewUser {
                username: "testuser".to_string(),
                password_hash: "hash".to_string(),
                storage_limit: limit,
            })
            .await
            .unwrap();
        let metrics = Arc::new(MetricsService::new().unwrap());
        let service = FileService::new(
            store.clone(),
            blobs,
            metrics,
            dir.path().to_path_buf(),
            Duration::from_secs(1),
        );

        Harness {
            service: Arc::new(service),
            store,
            user_id: user.id,
            dir,
        }
    }

    async fn harness(limit: i64) -> Harness {
        harness_with(Arc::new(MemoryMetadataStore::new()), None, limit).await
    }

    #[tokio::test]
    async fn test_over_quota_upload_changes_nothing() {
        let h = harness(512).await;
        let mut content: &[u8] = &[0u8; 1024];

        let result = h.service.upload(h.user_id, "big.bin", &mut content).await;

        assert!(matches!(result, Err(AppError::QuotaExceeded)));
        assert_eq!(h.used().await, 0);
        assert_eq!(h.file_count().await, 0);
        assert!(!h.blob_path("big.bin").exists());
    }

    #[tokio::test]
    async fn test_upload_then_delete_round_trip() {
        let h = harness(1_048_576).await;
        let mut content: &[u8] = &[b'x'; 1024];

        let record = h.service.upload(h.user_id, "test-file.txt", &mut content).await.unwrap();
        assert_eq!(record.size, 1024);
        assert_eq!(record.file_path, "testuser/test-file.txt");
        assert_eq!(h.used().await, 1024);

        let (files, total) = h.service.list(h.user_id, 1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(files[0].file_name, "test-file.txt");

        h.service.delete(record.id, h.user_id).await.unwrap();
        assert_eq!(h.used().await, 0);
        assert_eq!(h.file_count().await, 0);
        assert!(!h.blob_path("test-file.txt").exists());

        assert!(matches!(
            h.service.delete(record.id, h.user_id).await,
            Err(AppError::FileNotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_name_leaves_original_untouched() {
        let h = harness(10_000).await;
        let mut first: &[u8] = b"original";
        let mut second: &[u8] = b"replacement content";

        let record = h.service.upload(h.user_id, "notes.txt", &mut first).await.unwrap();
        let result = h.service.upload(h.user_id, "notes.txt", &mut second).await;

        assert!(matches!(result, Err(AppError::DuplicateFile)));
        assert_eq!(h.used().await, 8);
        assert_eq!(std::fs::read(h.blob_path("notes.txt")).unwrap(), b"original");

        let (_, mut reader) = h.service.download(record.id, h.user_id).await.unwrap();
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"original");
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected_before_any_work() {
        let h = harness(10_000).await;
        let mut content: &[u8] = b"data";

        let result = h.service.upload(h.user_id, "../escape.txt", &mut content).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(h.used().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_user_upload() {
        let h = harness(10_000).await;
        let mut content: &[u8] = b"data";

        let result = h.service.upload(Uuid::new_v4(), "a.txt", &mut content).await;
        assert!(matches!(result, Err(AppError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_cross_user_access_is_not_found() {
        let h = harness(10_000).await;
        let mut content: &[u8] = b"secret";
        let record = h.service.upload(h.user_id, "private.txt", &mut content).await.unwrap();

        let intruder = h
            .store
            .create_user(NewUser {
                username: "intruder".to_string(),
                password_hash: "hash".to_string(),
                storage_limit: 10_000,
            })
            .await
            .unwrap();

        assert!(matches!(
            h.service.download(record.id, intruder.id).await,
            Err(AppError::FileNotFound)
        ));
        assert!(matches!(
            h.service.delete(record.id, intruder.id).await,
            Err(AppError::FileNotFound)
        ));
        assert!(h.blob_path("private.txt").exists());
        assert_eq!(h.used().await, 6);
    }

    #[tokio::test]
    async fn test_blob_write_failure_releases_reservation() {
        let mut blobs = MockBlobStore::new();
        blobs.expect_ensure_namespace().returning(|_| Ok(()));
        blobs
            .expect_locate()
            .returning(|namespace, name| format!("{}/{}", namespace, name));
        blobs
            .expect_write()
            .times(1)
            .returning(|_, _| Err(AppError::Storage("disk full".to_string())));
        blobs.expect_remove().never();

        let h = harness_with(Arc::new(MemoryMetadataStore::new()), Some(Arc::new(blobs)), 10_000).await;
        let mut content: &[u8] = &[1u8; 300];

        let result = h.service.upload(h.user_id, "a.bin", &mut content).await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(h.used().await, 0);
        assert_eq!(h.file_count().await, 0);
    }

    #[tokio::test]
    async fn test_metadata_failure_removes_blob_and_releases_reservation() {
        let store = Arc::new(FaultyStore::default());
        store.fail_file_inserts(true);
        let h = harness_with(store, None, 10_000).await;
        let mut content: &[u8] = &[1u8; 300];

        let result = h.service.upload(h.user_id, "a.bin", &mut content).await;

        assert!(matches!(result, Err(AppError::Metadata(_))));
        assert_eq!(h.used().await, 0);
        assert_eq!(h.file_count().await, 0);
        assert!(!h.blob_path("a.bin").exists());
    }

    #[tokio::test]
    async fn test_record_timeout_removes_blob_and_releases_reservation() {
        let store = Arc::new(FaultyStore::default());
        store.delay_file_inserts(Duration::from_millis(1_500));
        let h = harness_with(store, None, 10_000).await;
        let mut content: &[u8] = &[1u8; 300];

        let result = h.service.upload(h.user_id, "a.bin", &mut content).await;

        assert!(matches!(result, Err(AppError::StoreTimeout(_))));
        assert_eq!(h.used().await, 0);
        assert_eq!(h.file_count().await, 0);
        assert!(!h.blob_path("a.bin").exists());
    }

    /// Blob store whose writes stall before reaching disk.
    struct SlowBlobs {
        inner: LocalStorage,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl BlobStore for SlowBlobs {
        async fn ensure_namespace(&self, namespace: &str) -> Result<()> {
            self.inner.ensure_namespace(namespace).await
        }

        fn locate(&self, namespace: &str, name: &str) -> String {
            self.inner.locate(namespace, name)
        }

        async fn write(&self, location: &str, spool: &mut Spool) -> Result<u64> {
            tokio::time::sleep(self.delay).await;
            self.inner.write(location, spool).await
        }

        async fn open(&self, location: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
            self.inner.open(location).await
        }

        async fn remove(&self, location: &str) -> Result<bool> {
            self.inner.remove(location).await
        }
    }

    #[tokio::test]
    async fn test_dropped_upload_is_rolled_back() {
        let blob_dir = tempfile::tempdir().unwrap();
        let blobs = SlowBlobs {
            inner: LocalStorage::new(blob_dir.path()).unwrap(),
            delay: Duration::from_millis(300),
        };
        let h = harness_with(Arc::new(MemoryMetadataStore::new()), Some(Arc::new(blobs)), 10_000).await;
        let mut content: &[u8] = &[9u8; 400];

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            h.service.upload(h.user_id, "a.bin", &mut content),
        )
        .await;
        assert!(result.is_err());

        let mut used = h.used().await;
        for _ in 0..100 {
            if used == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            used = h.used().await;
        }

        assert_eq!(used, 0);
        assert_eq!(h.file_count().await, 0);
        let leftovers = std::fs::read_dir(blob_dir.path().join("testuser")).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_failed_usage_update_on_delete_can_be_retried() {
        let store = Arc::new(FaultyStore::default());
        let h = harness_with(store.clone(), None, 10_000).await;

        let mut first: &[u8] = &[1u8; 11];
        let mut second: &[u8] = &[2u8; 5];
        let record = h.service.upload(h.user_id, "a.bin", &mut first).await.unwrap();
        h.service.upload(h.user_id, "b.bin", &mut second).await.unwrap();
        assert_eq!(h.used().await, 16);

        store.fail_next_adjustments(1);
        let result = h.service.delete(record.id, h.user_id).await;

        assert!(matches!(result, Err(AppError::Metadata(_))));
        assert!(!h.blob_path("a.bin").exists());
        assert!(h.store.find_file(record.id, h.user_id).await.unwrap().is_some());
        assert_eq!(h.used().await, 16);

        h.service.delete(record.id, h.user_id).await.unwrap();
        assert_eq!(h.used().await, 5);
        assert_eq!(h.file_count().await, 1);
        assert!(h.blob_path("b.bin").exists());
    }

    #[tokio::test]
    async fn test_concurrent_uploads_cannot_exceed_limit() {
        let h = harness(500).await;

        let tasks: Vec<_> = (0..12)
            .map(|i| {
                let service = h.service.clone();
                let user_id = h.user_id;
                tokio::spawn(async move {
                    let data = vec![7u8; 100];
                    let mut reader = data.as_slice();
                    service.upload(user_id, &format!("part-{i}.bin"), &mut reader).await
                })
            })
            .collect();

        let mut committed = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => committed += 1,
                Err(e) => assert!(matches!(e, AppError::QuotaExceeded)),
            }
        }

        assert_eq!(committed, 5);
        assert_eq!(h.used().await, 500);
        assert_eq!(h.file_count().await, 5);
    }

    #[tokio::test]
    async fn test_delete_clamps_usage_at_zero() {
        let h = harness(10_000).await;
        let mut content: &[u8] = &[0u8; 200];
        let record = h.service.upload(h.user_id, "a.bin", &mut content).await.unwrap();

        h.store.set_storage_used(h.user_id, 50).await.unwrap();
        h.service.delete(record.id, h.user_id).await.unwrap();

        assert_eq!(h.used().await, 0);
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let h = harness(10_000).await;
        for i in 0..3 {
            let mut content: &[u8] = b"abc";
            h.service.upload(h.user_id, &format!("f{i}.txt"), &mut content).await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let (first_page, total) = h.service.list(h.user_id, 1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(first_page.len(), 2);
        assert_eq!(first_page[0].file_name, "f2.txt");

        let (second_page, _) = h.service.list(h.user_id, 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].file_name, "f0.txt");
    }

    #[tokio::test]
    async fn test_storage_summary_and_reconcile() {
        let h = harness(1000).await;
        let mut content: &[u8] = &[0u8; 120];
        h.service.upload(h.user_id, "a.bin", &mut content).await.unwrap();

        let summary = h.service.storage_summary(h.user_id).await.unwrap();
        assert_eq!(summary, StorageSummary { total: 1000, used: 120 });
        assert_eq!(summary.remaining(), 880);

        h.store.set_storage_used(h.user_id, 700).await.unwrap();
        let report = h.service.reconcile(h.user_id).await.unwrap();
        assert_eq!(report, ReconcileReport { previous: 700, current: 120 });
        assert_eq!(h.used().await, 120);
    }
}
