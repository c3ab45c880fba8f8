//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine, transports, timeouts produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms via the `metrics` facade)
//!
//! Consumers:
//!     → Any tracing subscriber (fmt to stdout by default)
//!     → Any metrics recorder the host application installs
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing subscribers and recorders is left to the binary
//! - Metrics are cheap no-ops when no recorder is installed

pub mod logging;
pub mod metrics;
