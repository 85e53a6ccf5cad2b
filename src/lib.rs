//! Trace-context propagation, category metrics and observed serial traversal.

pub mod config;
pub mod context;
pub mod engine;
pub mod observability;
pub mod trace;
pub mod traversal;

pub use config::EngineConfig;
pub use context::{determine_parent, ContextStack, ScopeHandle, TraceContext};
pub use engine::Engine;
pub use observability::CategoryMetricsRegistry;
pub use trace::{InMemoryTracer, NoopTracer, Tracer};
pub use traversal::{traverse_serial, SerialTraversal};
