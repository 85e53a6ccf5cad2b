//! Span types.
//!
//! A [`Span`] is started by a [`Tracer`](crate::trace::Tracer), mutated by the
//! region that owns it, and ended exactly once. Ending hands an immutable
//! [`FinishedSpan`] to the tracer's sink.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::TraceContext;

/// Role of a span in the request flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

/// Terminal status of a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanStatus {
    /// No outcome recorded yet.
    Unset,
    Ok,
    Error(String),
    /// The owning computation was dropped before it finished.
    Aborted,
}

impl SpanStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error(_))
    }
}

/// Value of a span tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Str(String),
    I64(i64),
    F64(f64),
    Bool(bool),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Str(s) => write!(f, "{}", s),
            TagValue::I64(v) => write!(f, "{}", v),
            TagValue::F64(v) => write!(f, "{}", v),
            TagValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for TagValue {
    fn from(value: &str) -> Self {
        TagValue::Str(value.to_string())
    }
}

impl From<String> for TagValue {
    fn from(value: String) -> Self {
        TagValue::Str(value)
    }
}

impl From<i64> for TagValue {
    fn from(value: i64) -> Self {
        TagValue::I64(value)
    }
}

impl From<usize> for TagValue {
    fn from(value: usize) -> Self {
        TagValue::I64(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for TagValue {
    fn from(value: f64) -> Self {
        TagValue::F64(value)
    }
}

impl From<bool> for TagValue {
    fn from(value: bool) -> Self {
        TagValue::Bool(value)
    }
}

/// A key/value pair attached to a span.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub key: String,
    pub value: TagValue,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Receives spans as they end.
pub trait SpanSink: Send + Sync {
    fn on_end(&self, span: FinishedSpan);
}

/// Immutable record of an ended span.
#[derive(Debug, Clone)]
pub struct FinishedSpan {
    pub context: TraceContext,
    pub parent: TraceContext,
    pub name: String,
    pub kind: SpanKind,
    pub tags: Vec<Tag>,
    pub status: SpanStatus,
    pub duration: Duration,
}

impl FinishedSpan {
    /// Look up a tag by key.
    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags.iter().find(|t| t.key == key).map(|t| &t.value)
    }
}

/// A started unit of work.
pub struct Span {
    context: TraceContext,
    parent: TraceContext,
    name: String,
    kind: SpanKind,
    started_at: Instant,
    tags: Vec<Tag>,
    status: SpanStatus,
    sink: Option<Arc<dyn SpanSink>>,
    ended: bool,
}

impl Span {
    /// Start a span under `parent`. Tracer implementations call this; the new
    /// span gets a child context of `parent` (or a new trace when `parent` is
    /// empty).
    pub fn start(
        name: impl Into<String>,
        kind: SpanKind,
        parent: TraceContext,
        tags: Vec<Tag>,
        sink: Option<Arc<dyn SpanSink>>,
    ) -> Self {
        Self {
            context: parent.child(),
            parent,
            name: name.into(),
            kind,
            started_at: Instant::now(),
            tags,
            status: SpanStatus::Unset,
            sink,
            ended: false,
        }
    }

    pub fn context(&self) -> TraceContext {
        self.context
    }

    pub fn parent(&self) -> TraceContext {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> &SpanStatus {
        &self.status
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Set a tag, replacing any previous value under the same key.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<TagValue>) {
        if self.ended {
            return;
        }
        let tag = Tag::new(key, value);
        match self.tags.iter_mut().find(|t| t.key == tag.key) {
            Some(existing) => existing.value = tag.value,
            None => self.tags.push(tag),
        }
    }

    pub fn set_status(&mut self, status: SpanStatus) {
        if !self.ended {
            self.status = status;
        }
    }

    /// End the span. Only the first call has an effect.
    pub fn stop(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        let finished = FinishedSpan {
            context: self.context,
            parent: self.parent,
            name: self.name.clone(),
            kind: self.kind,
            tags: self.tags.clone(),
            status: self.status.clone(),
            duration: self.started_at.elapsed(),
        };

        tracing::debug!(
            trace_id = %finished.context.trace_id(),
            span_id = %finished.context.span_id(),
            parent_span_id = %finished.parent.span_id(),
            span_name = %finished.name,
            status = ?finished.status,
            duration_ms = finished.duration.as_secs_f64() * 1000.0,
            "Span finished"
        );

        if let Some(sink) = &self.sink {
            sink.on_end(finished);
        }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("context", &self.context)
            .field("parent", &self.parent)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("ended", &self.ended)
            .finish()
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if !self.ended {
            if self.status == SpanStatus::Unset {
                self.status = SpanStatus::Aborted;
            }
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<FinishedSpan>>);

    impl SpanSink for Collect {
        fn on_end(&self, span: FinishedSpan) {
            self.0.lock().unwrap().push(span);
        }
    }

    fn start(sink: &Arc<Collect>) -> Span {
        let sink: Arc<dyn SpanSink> = sink.clone();
        Span::start(
            "load",
            SpanKind::Internal,
            TraceContext::empty(),
            vec![Tag::new("index", 0usize)],
            Some(sink),
        )
    }

    #[test]
    fn test_stop_is_idempotent() {
        let sink = Arc::new(Collect::default());
        let mut span = start(&sink);
        span.set_status(SpanStatus::Ok);
        span.stop();
        span.stop();
        drop(span);

        let spans = sink.0.lock().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, SpanStatus::Ok);
        assert_eq!(spans[0].name, "load");
    }

    #[test]
    fn test_drop_without_stop_is_aborted() {
        let sink = Arc::new(Collect::default());
        drop(start(&sink));

        let spans = sink.0.lock().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].status, SpanStatus::Aborted);
    }

    #[test]
    fn test_set_tag_replaces_existing() {
        let sink = Arc::new(Collect::default());
        let mut span = start(&sink);
        span.set_tag("index", 7usize);
        span.set_tag("error.message", "boom");
        span.stop();
        span.set_tag("late", true);

        let spans = sink.0.lock().unwrap();
        assert_eq!(spans[0].tag("index"), Some(&TagValue::I64(7)));
        assert_eq!(spans[0].tag("error.message"), Some(&TagValue::from("boom")));
        assert!(spans[0].tag("late").is_none());
    }

    #[test]
    fn test_root_span_gets_new_trace() {
        let span = Span::start("root", SpanKind::Server, TraceContext::empty(), vec![], None);
        assert!(span.context().is_valid());
        assert!(!span.parent().is_valid());
    }
}
