//! API layer
//!
//! HTTP handlers for:
//! - The local actor document (so remote servers can verify signatures)
//! - WebFinger
//! - Metrics (Prometheus)

mod actor;
mod metrics;
mod wellknown;

pub use actor::{ACTOR_CONTENT_TYPE, actor_document, actor_router};
pub use metrics::metrics_router;
pub use wellknown::wellknown_router;
