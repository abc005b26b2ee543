//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pool / handler / requester produce:
//!     → tracing events (structured fields: route, connection_id, entry_id)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!     → events (listener callbacks, see crate::events)
//!
//! Consumers:
//!     → logging.rs subscriber (optional, host-installed)
//!     → any metrics exporter the host installs
//! ```

pub mod logging;
pub mod metrics;
