use serde::Serialize;
use utoipa::ToSchema;

use crate::utils::format::DisplaySize;

/// Accounted usage for one user, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSummary {
    pub total: i64,
    pub used: i64,
}

impl StorageSummary {
    pub fn remaining(&self) -> i64 {
        (self.total - self.used).max(0)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StorageResponse {
    #[schema(value_type = f64)]
    pub total_storage: DisplaySize,
    #[schema(value_type = f64)]
    pub storage_used: DisplaySize,
    #[schema(value_type = f64)]
    pub remaining_storage: DisplaySize,
    pub unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub previous: i64,
    pub current: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileResponse {
    #[schema(value_type = f64)]
    pub previous_storage_used: DisplaySize,
    #[schema(value_type = f64)]
    pub storage_used: DisplaySize,
    pub unit: String,
}
