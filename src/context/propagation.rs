//! Parent selection for new spans.

use crate::context::{ContextStack, TraceContext};

/// Pick the parent for a new span.
///
/// Priority, highest first:
/// 1. `current`, the context of the innermost active scope
/// 2. `explicit`, a parent captured by the caller
/// 3. the empty context, which makes the next span a trace root
///
/// The active scope wins over an explicit parent: it is always at least as
/// deep in the tree as any ancestor the caller captured. Invalid contexts are
/// treated as absent.
pub fn resolve_parent(
    current: Option<TraceContext>,
    explicit: Option<TraceContext>,
) -> TraceContext {
    current
        .filter(TraceContext::is_valid)
        .or_else(|| explicit.filter(TraceContext::is_valid))
        .unwrap_or_default()
}

/// [`resolve_parent`] against the context current for this flow.
pub fn determine_parent(explicit: Option<TraceContext>) -> TraceContext {
    resolve_parent(ContextStack::current(), explicit)
}
