use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use crate::{
    database::{bounded, MetadataStore, QuotaUpdate},
    errors::{AppError, Result},
    models::ReconcileReport,
    services::metrics::MetricsService,
};

pub const RELEASE_ATTEMPTS: u32 = 3;
const RELEASE_BACKOFF: Duration = Duration::from_millis(25);

/// Sole writer of `storage_used`.
pub struct QuotaLedger {
    store: Arc<dyn MetadataStore>,
    store_timeout: Duration,
    metrics: Arc<MetricsService>,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn MetadataStore>, store_timeout: Duration, metrics: Arc<MetricsService>) -> Self {
        Self {
            store,
            store_timeout,
            metrics,
        }
    }

    /// Apply `delta` to the user's usage and return the new value. Usage
    /// never drops below zero; a positive delta past the limit is refused.
    pub async fn reserve(&self, user_id: Uuid, delta: i64) -> Result<i64> {
        let update = bounded(self.store_timeout, self.store.adjust_storage_used(user_id, delta)).await?;

        match update {
            QuotaUpdate::Applied { storage_used } => Ok(storage_used),
            QuotaUpdate::Rejected {
                storage_used,
                storage_limit,
            } => {
                tracing::warn!(
                    %user_id,
                    requested = delta,
                    storage_used,
                    storage_limit,
                    "Reservation refused by storage limit"
                );
                self.metrics.record_quota_rejection();
                Err(AppError::QuotaExceeded)
            }
        }
    }

    /// Give back `bytes` previously reserved. Retries with backoff and
    /// reports success; failures are logged, never returned.
    pub async fn release(&self, user_id: Uuid, bytes: i64) -> bool {
        let mut delay = RELEASE_BACKOFF;

        for attempt in 1..=RELEASE_ATTEMPTS {
            match self.reserve(user_id, -bytes).await {
                Ok(_) => return true,
                Err(e) if attempt < RELEASE_ATTEMPTS => {
                    tracing::warn!(%user_id, bytes, attempt, "Quota release failed, retrying: {}", e);
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!(
                        %user_id,
                        bytes,
                        "Quota release failed after {} attempts, usage is overstated until reconciled: {}",
                        RELEASE_ATTEMPTS,
                        e
                    );
                }
            }
        }

        false
    }

    /// Recompute usage from the sizes of the user's live files.
    pub async fn reconcile(&self, user_id: Uuid) -> Result<ReconcileReport> {
        let user = bounded(self.store_timeout, self.store.find_user_by_id(user_id))
            .await?
            .ok_or(AppError::UserNotFound)?;
        let current = bounded(self.store_timeout, self.store.sum_file_sizes(user_id)).await?;

        bounded(self.store_timeout, self.store.set_storage_used(user_id, current)).await?;

        if current != user.storage_used {
            tracing::info!(
                %user_id,
                previous = user.storage_used,
                current,
                "Storage usage reconciled"
            );
        }
        if current > user.storage_limit {
            tracing::warn!(%user_id, current, limit = user.storage_limit, "Live files exceed storage limit");
        }

        Ok(ReconcileReport {
            previous: user.storage_used,
            current,
        })
    }
}
