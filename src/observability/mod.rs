//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Server and client produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (method, path, service, protocol, session)
//! - Request ID flows through the HTTP trace span
//! - Metrics recorder is optional; macros are no-ops without one

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
