//! Span creation and collection.
//!
//! # Data Flow
//! ```text
//! Traversal item:
//!     → tracer.rs (start span under resolved parent, or decline)
//!     → span.rs (tags, status, elapsed time)
//!     → SpanSink (finished span handed over exactly once)
//! ```

pub mod span;
pub mod tracer;

pub use span::{FinishedSpan, Span, SpanKind, SpanSink, SpanStatus, Tag, TagValue};
pub use tracer::{InMemoryTracer, NoopTracer, Tracer};
