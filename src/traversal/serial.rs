//! Serial traversal: plain and observed variants.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use crate::context::{determine_parent, ContextStack, ScopeHandle, TraceContext};
use crate::observability::CategoryMetricsRegistry;
use crate::trace::{Span, SpanKind, SpanStatus, Tag, Tracer};

/// Error label recorded when a traversal is dropped mid-item.
pub const CANCELLED: &str = "cancelled";

/// Run `f` over `items` one at a time, collecting the results in order.
///
/// Stops at the first `Err`, which is returned as is; items after it are
/// never pulled from the iterator.
pub async fn traverse_serial<I, A, F, Fut, B, E>(items: I, mut f: F) -> Result<Vec<B>, E>
where
    I: IntoIterator<Item = A>,
    F: FnMut(A) -> Fut,
    Fut: Future<Output = Result<B, E>>,
{
    let items = items.into_iter();
    let mut results = Vec::with_capacity(items.size_hint().0);
    for item in items {
        results.push(f(item).await?);
    }
    Ok(results)
}

type IdentifierFn<A> = Box<dyn Fn(&A) -> String + Send + Sync>;

struct MetricsTarget {
    registry: Arc<CategoryMetricsRegistry>,
    category: String,
    handler: String,
    method: String,
}

/// Observed serial traversal.
///
/// Every item gets its own span named `"<operation> <identifier>"`, entered
/// as the current context while the item runs, and, when a registry is
/// attached, one request metric plus one success or failure metric.
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use pipeline_observe::trace::InMemoryTracer;
/// # use pipeline_observe::traversal::SerialTraversal;
/// # async fn demo() -> Result<(), String> {
/// let tracer = Arc::new(InMemoryTracer::new());
/// let doubled = SerialTraversal::new(tracer, "double")
///     .run(vec![1, 2, 3], |x| async move { Ok::<_, String>(x * 2) })
///     .await?;
/// assert_eq!(doubled, vec![2, 4, 6]);
/// # Ok(())
/// # }
/// ```
pub struct SerialTraversal<A> {
    tracer: Arc<dyn Tracer>,
    operation: String,
    identifier: Option<IdentifierFn<A>>,
    metrics: Option<MetricsTarget>,
    parent: Option<TraceContext>,
    record_item_type: bool,
}

impl<A> SerialTraversal<A> {
    pub fn new(tracer: Arc<dyn Tracer>, operation: impl Into<String>) -> Self {
        Self {
            tracer,
            operation: operation.into(),
            identifier: None,
            metrics: None,
            parent: None,
            record_item_type: true,
        }
    }

    /// Derive each item's identifier with `extractor` instead of its index.
    pub fn with_identifier<X>(mut self, extractor: X) -> Self
    where
        X: Fn(&A) -> String + Send + Sync + 'static,
    {
        self.identifier = Some(Box::new(extractor));
        self
    }

    /// Record request/success/failure metrics into `registry`.
    pub fn with_metrics(
        mut self,
        registry: Arc<CategoryMetricsRegistry>,
        category: impl Into<String>,
        handler: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.metrics = Some(MetricsTarget {
            registry,
            category: category.into(),
            handler: handler.into(),
            method: method.into(),
        });
        self
    }

    /// Parent for item spans when no scope is current.
    pub fn with_parent(mut self, parent: TraceContext) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Whether item spans carry a `traversal.item_type` tag.
    pub fn record_item_type(mut self, enabled: bool) -> Self {
        self.record_item_type = enabled;
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Run `f` over `items` one at a time.
    ///
    /// Returns every result in input order, or the first error. The caller's
    /// current context is the same after this returns as before, whatever the
    /// outcome.
    ///
    /// A failure is counted under `error_type` set to the error's type name
    /// (e.g. `String`); the message itself only goes on the span.
    pub async fn run<I, F, Fut, B, E>(&self, items: I, f: F) -> Result<Vec<B>, E>
    where
        I: IntoIterator<Item = A>,
        F: FnMut(A) -> Fut,
        Fut: Future<Output = Result<B, E>>,
        E: Display,
    {
        self.run_classified(items, f, |_: &E| error_kind::<E>())
            .await
    }

    /// [`run`](Self::run), with `classify` choosing the `error_type` label of
    /// a failure. Labels should come from a small fixed set.
    pub async fn run_classified<I, F, Fut, B, E, C>(
        &self,
        items: I,
        f: F,
        classify: C,
    ) -> Result<Vec<B>, E>
    where
        I: IntoIterator<Item = A>,
        F: FnMut(A) -> Fut,
        Fut: Future<Output = Result<B, E>>,
        E: Display,
        C: Fn(&E) -> &'static str,
    {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "traverse_serial",
            operation = %self.operation,
            run_id = %run_id
        );
        let body = self.drive(items.into_iter(), f, classify).instrument(span);

        if ContextStack::is_in_flow() {
            body.await
        } else {
            ContextStack::in_flow(body).await
        }
    }

    async fn drive<It, F, Fut, B, E, C>(
        &self,
        items: It,
        mut f: F,
        classify: C,
    ) -> Result<Vec<B>, E>
    where
        It: Iterator<Item = A>,
        F: FnMut(A) -> Fut,
        Fut: Future<Output = Result<B, E>>,
        E: Display,
        C: Fn(&E) -> &'static str,
    {
        // Only a known length is tagged; adapters like `filter` report a range.
        let (lower, upper) = items.size_hint();
        let count = (upper == Some(lower)).then_some(lower);
        let enclosing = self.parent.or_else(ContextStack::current);
        let mut results = Vec::with_capacity(lower);

        tracing::debug!(count = ?count, "Traversal started");

        for (index, item) in items.enumerate() {
            let id = match &self.identifier {
                Some(extract) => extract(&item),
                None => index.to_string(),
            };
            let scope = self.begin_item(index, count, &id, enclosing);

            match f(item).await {
                Ok(value) => {
                    results.push(value);
                    scope.succeed();
                }
                Err(err) => {
                    let message = err.to_string();
                    let error_type = classify(&err);
                    tracing::debug!(
                        item = %id,
                        index,
                        error_type,
                        error = %message,
                        "Traversal item failed"
                    );
                    scope.fail(&message, error_type);
                    return Err(err);
                }
            }
        }

        tracing::debug!(completed = results.len(), "Traversal completed");
        Ok(results)
    }

    fn begin_item(
        &self,
        index: usize,
        count: Option<usize>,
        id: &str,
        enclosing: Option<TraceContext>,
    ) -> ItemScope<'_> {
        let mut tags = vec![
            Tag::new("traversal.index", index),
            Tag::new("traversal.item_id", id),
        ];
        if let Some(count) = count {
            tags.push(Tag::new("traversal.count", count));
        }
        if self.record_item_type {
            tags.push(Tag::new("traversal.item_type", std::any::type_name::<A>()));
        }

        let parent = determine_parent(enclosing);
        let span = self.tracer.start_span(
            &format!("{} {}", self.operation, id),
            SpanKind::Internal,
            parent,
            tags,
        );
        if span.is_none() {
            tracing::trace!(item = %id, "Tracer declined item span");
        }

        let scope = ContextStack::enter(span.as_ref().map(Span::context));
        if let Some(target) = &self.metrics {
            target
                .registry
                .record_request(&target.category, &target.handler, &target.method);
        }

        ItemScope {
            span,
            scope,
            metrics: self.metrics.as_ref(),
            started: Instant::now(),
            settled: false,
        }
    }
}

/// Span, context scope and metrics of the item in flight.
///
/// Settled explicitly on success or failure; dropping it unsettled means the
/// traversal was cancelled.
struct ItemScope<'a> {
    span: Option<Span>,
    scope: ScopeHandle,
    metrics: Option<&'a MetricsTarget>,
    started: Instant,
    settled: bool,
}

impl ItemScope<'_> {
    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn succeed(mut self) {
        self.settled = true;
        let elapsed_ms = self.elapsed_ms();
        self.close(SpanStatus::Ok, elapsed_ms);
        if let Some(target) = self.metrics {
            target.registry.record_success(
                &target.category,
                &target.handler,
                &target.method,
                elapsed_ms,
            );
        }
        self.scope.exit();
    }

    fn fail(mut self, message: &str, error_type: &str) {
        self.settled = true;
        let elapsed_ms = self.elapsed_ms();
        if let Some(span) = self.span.as_mut() {
            span.set_tag("error.message", message);
            span.set_tag("error.type", error_type);
        }
        self.close(SpanStatus::Error(message.to_string()), elapsed_ms);
        self.record_failure(elapsed_ms, error_type);
        self.scope.exit();
    }

    fn close(&mut self, status: SpanStatus, elapsed_ms: f64) {
        if let Some(span) = self.span.as_mut() {
            span.set_tag("elapsed_ms", elapsed_ms);
            span.set_status(status);
            span.stop();
        }
    }

    fn record_failure(&self, elapsed_ms: f64, error_info: &str) {
        if let Some(target) = self.metrics {
            target.registry.record_failure(
                &target.category,
                &target.handler,
                &target.method,
                elapsed_ms,
                error_info,
            );
        }
    }
}

/// Unqualified type name of `E` without generic arguments, e.g. `String`.
fn error_kind<E>() -> &'static str {
    let name = std::any::type_name::<E>();
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base)
}

impl Drop for ItemScope<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let elapsed_ms = self.elapsed_ms();
        tracing::debug!(elapsed_ms, "Traversal cancelled mid-item");
        self.close(SpanStatus::Aborted, elapsed_ms);
        self.record_failure(elapsed_ms, CANCELLED);
        self.scope.exit();
    }
}
