//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway and upload handlers produce:
//!     → logging.rs (structured log events, request_id in the span)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```

pub mod logging;
pub mod metrics;
