//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Structured fields everywhere, never formatted-in values
//! - Request ID flows through the RPC layer
//! - Metric updates are fire-and-forget; no recorder means no-ops

pub mod logging;
pub mod metrics;
