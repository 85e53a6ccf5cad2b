//! Trace context propagation subsystem.
//!
//! # Data Flow
//! ```text
//! New span requested:
//!     → propagation.rs (current scope > explicit parent > new root)
//!     → trace_context.rs (child context under the chosen parent)
//!     → stack.rs (enter scope, restore previous context on exit)
//! ```
//!
//! # Design Decisions
//! - Contexts are plain `Copy` values compared by value
//! - The stack belongs to the logical flow, never to a worker thread
//! - Scope exit is tied to a handle, so pushes and pops cannot be unbalanced

pub mod propagation;
pub mod stack;
pub mod trace_context;

pub use propagation::{determine_parent, resolve_parent};
pub use stack::{ContextStack, ScopeHandle};
pub use trace_context::{SpanId, TraceContext, TraceId};
