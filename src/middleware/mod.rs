pub mod auth;
pub mod metrics;

pub use auth::AuthenticatedUser;
pub use metrics::metrics_middleware;
