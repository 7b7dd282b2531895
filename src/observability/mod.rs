//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! connection / router / keyring / topology
//!     → logging.rs (structured tracing events, one span per connection)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`connection_id`, `target`, `method`, `status`) on
//!   every request event
//! - No metrics exporter: the daemon exposes nothing beyond its socket

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
