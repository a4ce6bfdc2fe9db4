use std::fmt;
use uuid::Uuid;

use crate::{
    services::{metrics::MetricsService, quota_manager::QuotaLedger},
    storage::BlobStore,
};

/// How far an upload got before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Pending,
    Reserved,
    Written,
    Committed,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStage::Pending => "pending",
            UploadStage::Reserved => "reserved",
            UploadStage::Written => "written",
            UploadStage::Committed => "committed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Undo {
    Release { user_id: Uuid, bytes: i64 },
    RemoveBlob { location: String },
}

impl Undo {
    pub fn kind(&self) -> &'static str {
        match self {
            Undo::Release { .. } => "release_quota",
            Undo::RemoveBlob { .. } => "remove_blob",
        }
    }
}

/// Undo steps for side effects already applied, run newest first.
#[derive(Debug, Default)]
pub struct Compensations {
    steps: Vec<Undo>,
}

impl Compensations {
    pub fn push(&mut self, step: Undo) {
        self.steps.push(step);
    }

    #[cfg(test)]
    pub(crate) fn steps(&self) -> &[Undo] {
        &self.steps
    }

    /// The operation committed; nothing to undo.
    pub fn disarm(&mut self) {
        self.steps.clear();
    }

    /// Best effort. Returns the number of steps that failed.
    pub async fn unwind(self, ledger: &QuotaLedger, blobs: &dyn BlobStore, metrics: &MetricsService) -> usize {
        let mut failed = 0;

        for step in self.steps.into_iter().rev() {
            let succeeded = match &step {
                Undo::Release { user_id, bytes } => ledger.release(*user_id, *bytes).await,
                Undo::RemoveBlob { location } => match blobs.remove(location).await {
                    Ok(_) => true,
                    Err(e) => {
                        tracing::error!("Failed to remove orphaned blob {}: {}", location, e);
                        false
                    }
                },
            };

            metrics.record_compensation(step.kind(), succeeded);
            if !succeeded {
                failed += 1;
            }
        }

        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disarm_drops_pending_steps() {
        let mut undo = Compensations::default();
        undo.push(Undo::Release { user_id: Uuid::nil(), bytes: 10 });
        undo.push(Undo::RemoveBlob { location: "alice/a.txt".to_string() });
        assert_eq!(undo.steps().len(), 2);

        undo.disarm();
        assert!(undo.steps().is_empty());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(UploadStage::Reserved.to_string(), "reserved");
        assert_eq!(UploadStage::Committed.to_string(), "committed");
        assert_eq!(Undo::RemoveBlob { location: String::new() }.kind(), "remove_blob");
    }
}
