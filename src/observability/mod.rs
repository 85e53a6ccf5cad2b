//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Traversal item:
//!     → registry.rs (category lookup, labelled request/success/failure)
//!     → metrics.rs (meter and instruments over a metrics::Recorder)
//!
//! Process diagnostics:
//!     → logging.rs (tracing subscriber, env filter, fmt output)
//! ```
//!
//! # Design Decisions
//! - Instruments are optional; a declined meter turns recording into no-ops
//! - Metrics are cheap on the hot path (map read, atomic increments)
//! - The recorder is pluggable so hosts choose the exporter

pub mod logging;
pub mod metrics;
pub mod registry;

pub use self::metrics::{
    CounterInstrument, HistogramInstrument, Meter, MeterProvider, MetricsMeterProvider,
    NoopMeterProvider,
};
pub use registry::{CategoryMetricsRegistry, CategoryMetricsSet};
