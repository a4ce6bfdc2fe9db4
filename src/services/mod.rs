pub mod compensation;
pub mod file_service;
pub mod metrics;
pub mod quota_manager;

pub use file_service::FileService;
pub use metrics::MetricsService;
pub use quota_manager::QuotaLedger;
