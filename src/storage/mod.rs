use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::errors::Result;

pub mod local;
pub mod spool;

pub use local::LocalStorage;
pub use spool::Spool;

/// Byte storage with one isolated namespace per user.
///
/// Locations are opaque to callers: they come from `locate` and are stored
/// verbatim in file records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Idempotent.
    async fn ensure_namespace(&self, namespace: &str) -> Result<()>;

    fn locate(&self, namespace: &str, name: &str) -> String;

    /// Durably persist the whole spool at `location`, returning the byte count.
    async fn write(&self, location: &str, spool: &mut Spool) -> Result<u64>;

    async fn open(&self, location: &str) -> Result<Box<dyn AsyncRead + Send + Unpin>>;

    /// Returns whether anything was removed. A missing blob is not an error.
    async fn remove(&self, location: &str) -> Result<bool>;
}
