//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log output (stdout, filtered by RUST_LOG / config)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request
//! - Metric updates are cheap; without an installed recorder they are no-ops

pub mod logging;
pub mod metrics;
