//! Meter abstraction and its `metrics`-crate backend.
//!
//! # Responsibilities
//! - Create named counters and histograms with description and unit
//! - Record labelled points into a `metrics::Recorder`
//! - Let a provider decline, so instrumentation can be switched off
//!
//! # Design Decisions
//! - Every factory returns `Option`; absent instruments are silent no-ops
//! - Labels are supplied per point, not fixed at creation
//! - The global recorder is looked up on each point, so a recorder installed
//!   after instruments were created is still honoured

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use metrics::{Key, Label, Level, Metadata, Recorder, Unit};

static METADATA: Metadata<'static> =
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()));

/// A monotonically increasing counter.
pub trait CounterInstrument: Send + Sync {
    fn add(&self, value: u64, labels: &[Label]);
}

/// A distribution of observed values.
pub trait HistogramInstrument: Send + Sync {
    fn record(&self, value: f64, labels: &[Label]);
}

/// Creates instruments for one scope.
pub trait Meter: Send + Sync {
    fn scope(&self) -> &str;

    fn create_counter(
        &self,
        name: &str,
        description: &str,
        unit: Unit,
    ) -> Option<Arc<dyn CounterInstrument>>;

    fn create_histogram(
        &self,
        name: &str,
        description: &str,
        unit: Unit,
    ) -> Option<Arc<dyn HistogramInstrument>>;

    /// Release the meter. Instruments created by it stop recording.
    fn shutdown(&self) {}
}

/// Hands out meters by scope name.
pub trait MeterProvider: Send + Sync {
    fn meter(&self, scope: &str) -> Option<Arc<dyn Meter>>;
}

/// A provider that declines every meter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMeterProvider;

impl MeterProvider for NoopMeterProvider {
    fn meter(&self, _scope: &str) -> Option<Arc<dyn Meter>> {
        None
    }
}

#[derive(Clone)]
enum Target {
    Global,
    Explicit(Arc<dyn Recorder + Send + Sync>),
}

impl Target {
    fn with<T>(&self, f: impl FnOnce(&dyn Recorder) -> T) -> T {
        match self {
            Target::Global => metrics::with_recorder(f),
            Target::Explicit(recorder) => f(recorder.as_ref()),
        }
    }
}

/// Meter provider backed by the `metrics` facade.
#[derive(Clone)]
pub struct MetricsMeterProvider {
    target: Target,
}

impl MetricsMeterProvider {
    /// Record into whatever recorder is installed for the process.
    pub fn global() -> Self {
        Self {
            target: Target::Global,
        }
    }

    /// Record into `recorder` only.
    pub fn with_recorder<R>(recorder: Arc<R>) -> Self
    where
        R: Recorder + Send + Sync + 'static,
    {
        Self {
            target: Target::Explicit(recorder),
        }
    }
}

impl Default for MetricsMeterProvider {
    fn default() -> Self {
        Self::global()
    }
}

impl MeterProvider for MetricsMeterProvider {
    fn meter(&self, scope: &str) -> Option<Arc<dyn Meter>> {
        Some(Arc::new(MetricsMeter {
            scope: scope.to_string(),
            target: self.target.clone(),
            open: Arc::new(AtomicBool::new(true)),
        }))
    }
}

struct MetricsMeter {
    scope: String,
    target: Target,
    open: Arc<AtomicBool>,
}

impl Meter for MetricsMeter {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn create_counter(
        &self,
        name: &str,
        description: &str,
        unit: Unit,
    ) -> Option<Arc<dyn CounterInstrument>> {
        if !self.open.load(Ordering::Acquire) {
            return None;
        }
        let name = name.to_string();
        let description = description.to_string();
        self.target
            .with(|r| r.describe_counter(name.clone().into(), Some(unit), description.into()));
        Some(Arc::new(MetricsCounter {
            name,
            target: self.target.clone(),
            open: self.open.clone(),
        }))
    }

    fn create_histogram(
        &self,
        name: &str,
        description: &str,
        unit: Unit,
    ) -> Option<Arc<dyn HistogramInstrument>> {
        if !self.open.load(Ordering::Acquire) {
            return None;
        }
        let name = name.to_string();
        let description = description.to_string();
        self.target
            .with(|r| r.describe_histogram(name.clone().into(), Some(unit), description.into()));
        Some(Arc::new(MetricsHistogram {
            name,
            target: self.target.clone(),
            open: self.open.clone(),
        }))
    }

    fn shutdown(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            tracing::debug!(scope = %self.scope, "Meter shut down");
        }
    }
}

struct MetricsCounter {
    name: String,
    target: Target,
    open: Arc<AtomicBool>,
}

impl CounterInstrument for MetricsCounter {
    fn add(&self, value: u64, labels: &[Label]) {
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        let key = Key::from_parts(self.name.clone(), labels.to_vec());
        self.target
            .with(|r| r.register_counter(&key, &METADATA).increment(value));
    }
}

struct MetricsHistogram {
    name: String,
    target: Target,
    open: Arc<AtomicBool>,
}

impl HistogramInstrument for MetricsHistogram {
    fn record(&self, value: f64, labels: &[Label]) {
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        let key = Key::from_parts(self.name.clone(), labels.to_vec());
        self.target
            .with(|r| r.register_histogram(&key, &METADATA).record(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    fn provider() -> (MetricsMeterProvider, metrics_exporter_prometheus::PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (MetricsMeterProvider::with_recorder(Arc::new(recorder)), handle)
    }

    #[test]
    fn test_noop_provider_declines() {
        assert!(NoopMeterProvider.meter("app.orders").is_none());
    }

    #[test]
    fn test_counter_records_labels() {
        let (provider, handle) = provider();
        let meter = provider.meter("app.orders").unwrap();
        assert_eq!(meter.scope(), "app.orders");

        let counter = meter
            .create_counter("orders_requests_total", "Requests", Unit::Count)
            .unwrap();
        let labels = [Label::new("handler", "load")];
        counter.add(1, &labels);
        counter.add(2, &labels);

        let text = handle.render();
        assert!(text.contains("orders_requests_total{handler=\"load\"} 3"), "{text}");
    }

    #[test]
    fn test_histogram_records() {
        let (provider, handle) = provider();
        let meter = provider.meter("app.orders").unwrap();
        let histogram = meter
            .create_histogram("orders_duration_seconds", "Duration", Unit::Seconds)
            .unwrap();
        histogram.record(0.25, &[Label::new("handler", "load")]);

        let text = handle.render();
        assert!(text.contains("orders_duration_seconds_count{handler=\"load\"} 1"), "{text}");
    }

    #[test]
    fn test_shutdown_stops_recording() {
        let (provider, handle) = provider();
        let meter = provider.meter("app.orders").unwrap();
        let counter = meter
            .create_counter("orders_closed_total", "Requests", Unit::Count)
            .unwrap();

        counter.add(1, &[]);
        meter.shutdown();
        meter.shutdown();
        counter.add(5, &[]);

        assert!(handle.render().contains("orders_closed_total 1"));
        assert!(meter
            .create_counter("orders_late_total", "Late", Unit::Count)
            .is_none());
    }
}
