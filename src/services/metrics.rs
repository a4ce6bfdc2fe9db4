use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

use crate::errors::{AppError, Result};

pub struct MetricsService {
    registry: Registry,
    uploads: IntCounter,
    downloads: IntCounter,
    deletes: IntCounter,
    uploaded_bytes: IntCounter,
    quota_rejections: IntCounter,
    compensations: IntCounterVec,
    errors: IntCounterVec,
    request_duration: HistogramVec,
}

impl MetricsService {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let uploads = IntCounter::new("uploads_total", "Committed uploads")?;
        let downloads = IntCounter::new("downloads_total", "Downloads started")?;
        let deletes = IntCounter::new("deletes_total", "Committed deletes")?;
        let uploaded_bytes = IntCounter::new("uploaded_bytes_total", "Bytes accepted by committed uploads")?;
        let quota_rejections =
            IntCounter::new("quota_rejections_total", "Reservations refused by the storage limit")?;
        let compensations = IntCounterVec::new(
            Opts::new("compensations_total", "Undo steps run after a failed upload"),
            &["kind", "outcome"],
        )?;
        let errors = IntCounterVec::new(Opts::new("errors_total", "Request errors by class"), &["type"])?;
        let request_duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Request latency by route"),
            &["endpoint"],
        )?;

        registry.register(Box::new(uploads.clone()))?;
        registry.register(Box::new(downloads.clone()))?;
        registry.register(Box::new(deletes.clone()))?;
        registry.register(Box::new(uploaded_bytes.clone()))?;
        registry.register(Box::new(quota_rejections.clone()))?;
        registry.register(Box::new(compensations.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            uploads,
            downloads,
            deletes,
            uploaded_bytes,
            quota_rejections,
            compensations,
            errors,
            request_duration,
        })
    }

    pub fn record_upload(&self, bytes: u64) {
        self.uploads.inc();
        self.uploaded_bytes.inc_by(bytes);
    }

    pub fn record_download(&self) {
        self.downloads.inc();
    }

    pub fn record_delete(&self) {
        self.deletes.inc();
    }

    pub fn record_quota_rejection(&self) {
        self.quota_rejections.inc();
    }

    pub fn record_compensation(&self, kind: &str, succeeded: bool) {
        let outcome = if succeeded { "ok" } else { "failed" };
        self.compensations.with_label_values(&[kind, outcome]).inc();
    }

    pub fn record_error(&self, error_type: &str) {
        self.errors.with_label_values(&[error_type]).inc();
    }

    pub fn start_timer(&self, endpoint: &str) -> RequestTimer {
        RequestTimer {
            start: Instant::now(),
            histogram: self.request_duration.clone(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| AppError::Internal(e.into()))?;

        String::from_utf8(buffer).map_err(|e| AppError::Internal(e.into()))
    }
}

pub struct RequestTimer {
    start: Instant,
    histogram: HistogramVec,
    endpoint: String,
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        self.histogram
            .with_label_values(&[self.endpoint.as_str()])
            .observe(duration.as_secs_f64());
    }
}
