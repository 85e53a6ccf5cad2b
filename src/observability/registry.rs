//! Per-category request/success/failure metrics.
//!
//! # Metrics
//! For each category, under the registry's layer:
//! - `<layer>_<category>_requests_total` (counter)
//! - `<layer>_<category>_successes_total` (counter)
//! - `<layer>_<category>_failures_total` (counter)
//! - `<layer>_<category>_duration_seconds` (histogram)
//!
//! Every point is labelled with `layer`, `category`, `handler` and
//! `handler_method`; failures also carry `error_type`, which should come from
//! a small fixed set.
//!
//! Categories are normalized (lowercase ASCII alphanumerics, everything else
//! `_`) before lookup, so `Orders` and `orders` share one set and one series.
//!
//! # Design Decisions
//! - Instrument sets are created lazily, at most once per category, through
//!   an atomic get-or-create on a sharded map
//! - The shard lock is only taken on a miss; recording reads the map and
//!   never holds a lock while touching instruments
//! - Callers pass milliseconds; durations are stored in seconds

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use metrics::{Label, Unit};

use crate::observability::metrics::{
    CounterInstrument, HistogramInstrument, Meter, MeterProvider,
};

/// Instruments owned by one category.
pub struct CategoryMetricsSet {
    meter: Option<Arc<dyn Meter>>,
    requests: Option<Arc<dyn CounterInstrument>>,
    successes: Option<Arc<dyn CounterInstrument>>,
    failures: Option<Arc<dyn CounterInstrument>>,
    duration: Option<Arc<dyn HistogramInstrument>>,
}

impl CategoryMetricsSet {
    /// `category` is already normalized.
    fn create(provider: &dyn MeterProvider, layer: &str, category: &str) -> Self {
        let scope = format!("{}.{}", layer, category);
        let Some(meter) = provider.meter(&scope) else {
            tracing::debug!(scope = %scope, "Meter provider declined, category metrics disabled");
            return Self::empty();
        };

        let prefix = format!("{}_{}", sanitize(layer), category);
        let requests = meter.create_counter(
            &format!("{}_requests_total", prefix),
            &format!("Requests handled in the {} {} category", layer, category),
            Unit::Count,
        );
        let successes = meter.create_counter(
            &format!("{}_successes_total", prefix),
            &format!("Successful requests in the {} {} category", layer, category),
            Unit::Count,
        );
        let failures = meter.create_counter(
            &format!("{}_failures_total", prefix),
            &format!("Failed requests in the {} {} category", layer, category),
            Unit::Count,
        );
        let duration = meter.create_histogram(
            &format!("{}_duration_seconds", prefix),
            &format!("Request duration in the {} {} category", layer, category),
            Unit::Seconds,
        );

        Self {
            meter: Some(meter),
            requests,
            successes,
            failures,
            duration,
        }
    }

    fn empty() -> Self {
        Self {
            meter: None,
            requests: None,
            successes: None,
            failures: None,
            duration: None,
        }
    }

    /// Whether a meter backs this set.
    pub fn is_instrumented(&self) -> bool {
        self.meter.is_some()
    }

    fn release(&self) {
        if let Some(meter) = &self.meter {
            meter.shutdown();
        }
    }
}

/// Thread-safe registry of [`CategoryMetricsSet`]s keyed by normalized category.
pub struct CategoryMetricsRegistry {
    provider: Arc<dyn MeterProvider>,
    layer: String,
    sets: DashMap<String, Arc<CategoryMetricsSet>>,
    shut_down: AtomicBool,
}

impl CategoryMetricsRegistry {
    pub fn new(provider: Arc<dyn MeterProvider>, layer: impl Into<String>) -> Self {
        Self {
            provider,
            layer: layer.into(),
            sets: DashMap::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Number of categories with an instrument set.
    pub fn category_count(&self) -> usize {
        self.sets.len()
    }

    pub fn contains_category(&self, category: &str) -> bool {
        self.sets.contains_key(&*sanitize(category))
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub fn record_request(&self, category: &str, handler: &str, method: &str) {
        let category = sanitize(category);
        let Some(set) = self.set_for(&category) else {
            return;
        };
        if let Some(requests) = &set.requests {
            requests.add(1, &self.labels(&category, handler, method));
        }
    }

    pub fn record_success(&self, category: &str, handler: &str, method: &str, elapsed_ms: f64) {
        let category = sanitize(category);
        let Some(set) = self.set_for(&category) else {
            return;
        };
        let labels = self.labels(&category, handler, method);
        if let Some(successes) = &set.successes {
            successes.add(1, &labels);
        }
        if let Some(duration) = &set.duration {
            duration.record(ms_to_seconds(elapsed_ms), &labels);
        }
    }

    pub fn record_failure(
        &self,
        category: &str,
        handler: &str,
        method: &str,
        elapsed_ms: f64,
        error_info: &str,
    ) {
        let category = sanitize(category);
        let Some(set) = self.set_for(&category) else {
            return;
        };
        let labels = self.labels(&category, handler, method);
        if let Some(duration) = &set.duration {
            duration.record(ms_to_seconds(elapsed_ms), &labels);
        }
        if let Some(failures) = &set.failures {
            let mut labels = labels;
            labels.push(Label::new("error_type", error_info.to_string()));
            failures.add(1, &labels);
        }
    }

    /// Release every owned meter and clear the registry.
    ///
    /// Each meter is shut down exactly once; later calls do nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut released = 0usize;
        self.sets.retain(|_, set| {
            set.release();
            released += 1;
            false
        });
        tracing::info!(layer = %self.layer, categories = released, "Category metrics registry shut down");
    }

    /// `category` is already normalized.
    fn set_for(&self, category: &str) -> Option<Arc<CategoryMetricsSet>> {
        if self.is_shut_down() {
            tracing::debug!(category = %category, "Metrics registry is shut down, dropping point");
            return None;
        }

        if let Some(set) = self.sets.get(category) {
            return Some(set.value().clone());
        }

        let set = self
            .sets
            .entry(category.to_string())
            .or_insert_with(|| {
                tracing::debug!(layer = %self.layer, category = %category, "Creating category instruments");
                Arc::new(CategoryMetricsSet::create(
                    self.provider.as_ref(),
                    &self.layer,
                    category,
                ))
            })
            .value()
            .clone();

        // A shutdown that raced with creation may have missed this entry.
        if self.is_shut_down() {
            if let Some((_, orphan)) = self.sets.remove(category) {
                orphan.release();
            }
            return None;
        }

        Some(set)
    }

    fn labels(&self, category: &str, handler: &str, method: &str) -> Vec<Label> {
        vec![
            Label::new("layer", self.layer.clone()),
            Label::new("category", category.to_string()),
            Label::new("handler", handler.to_string()),
            Label::new("handler_method", method.to_string()),
        ]
    }
}

impl Drop for CategoryMetricsRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn ms_to_seconds(elapsed_ms: f64) -> f64 {
    elapsed_ms / 1000.0
}

/// Make a name part usable inside an instrument name.
fn sanitize(part: &str) -> Cow<'_, str> {
    let clean = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_';
    if part.chars().all(clean) {
        return Cow::Borrowed(part);
    }
    Cow::Owned(
        part.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect(),
    )
}
