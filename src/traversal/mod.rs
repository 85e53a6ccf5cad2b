//! Sequential traversal of items through an asynchronous, fallible step.
//!
//! # Data Flow
//! ```text
//! items ──► next item (pulled lazily)
//!             → context::determine_parent (current scope > explicit > root)
//!             → Tracer::start_span("<operation> <id>")   (may decline)
//!             → ContextStack::enter(span context)
//!             → registry.record_request
//!             → f(item).await                            (only suspension point)
//!             → Ok:  span Ok,    record_success, exit scope, next item
//!             → Err: span Error, record_failure, return Err
//! ```
//!
//! # Design Decisions
//! - Exactly one `f(item)` is in flight per traversal; item i+1 starts after
//!   item i has fully settled
//! - The first failure ends the traversal; later items are never pulled
//! - Span and metric calls are absence-safe, so a declining tracer or meter
//!   never changes the result
//! - Dropping the traversal mid-item counts as a failure of that item

pub mod serial;

pub use serial::{traverse_serial, SerialTraversal};
