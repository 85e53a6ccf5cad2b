//! Tracer implementations.
//!
//! # Responsibilities
//! - Start spans under a resolved parent context
//! - Collect finished spans for inspection
//!
//! # Design Decisions
//! - `start_span` returns `Option<Span>`; a tracer may decline and callers
//!   must carry on without a span
//! - No sampling or export: spans are either kept in memory or dropped

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::context::TraceContext;
use crate::trace::span::{FinishedSpan, Span, SpanKind, SpanSink, Tag};

/// Starts spans.
pub trait Tracer: Send + Sync {
    /// Start a span named `name` under `parent`, or decline with `None`.
    fn start_span(
        &self,
        name: &str,
        kind: SpanKind,
        parent: TraceContext,
        tags: Vec<Tag>,
    ) -> Option<Span>;
}

/// A tracer that never produces spans.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn start_span(
        &self,
        _name: &str,
        _kind: SpanKind,
        _parent: TraceContext,
        _tags: Vec<Tag>,
    ) -> Option<Span> {
        None
    }
}

#[derive(Default)]
struct SpanBuffer {
    spans: Mutex<Vec<FinishedSpan>>,
}

impl SpanSink for SpanBuffer {
    fn on_end(&self, span: FinishedSpan) {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(span);
    }
}

/// A tracer that keeps finished spans in memory.
///
/// Cloning shares the underlying buffer. While disabled it declines every
/// span, which is how hosts switch tracing off without changing call sites.
#[derive(Clone)]
pub struct InMemoryTracer {
    buffer: Arc<SpanBuffer>,
    enabled: Arc<AtomicBool>,
}

impl InMemoryTracer {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(SpanBuffer::default()),
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Snapshot of the spans finished so far, in the order they ended.
    pub fn finished_spans(&self) -> Vec<FinishedSpan> {
        self.buffer
            .spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return every finished span.
    pub fn drain(&self) -> Vec<FinishedSpan> {
        std::mem::take(
            &mut *self
                .buffer
                .spans
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl Default for InMemoryTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer for InMemoryTracer {
    fn start_span(
        &self,
        name: &str,
        kind: SpanKind,
        parent: TraceContext,
        tags: Vec<Tag>,
    ) -> Option<Span> {
        if !self.is_enabled() {
            return None;
        }
        let sink: Arc<dyn SpanSink> = self.buffer.clone();
        Some(Span::start(name, kind, parent, tags, Some(sink)))
    }
}
