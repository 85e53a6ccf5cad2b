//! Shared utilities for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use metrics::{Label, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use pipeline_observe::observability::{
    CategoryMetricsRegistry, CounterInstrument, HistogramInstrument, Meter, MeterProvider,
    MetricsMeterProvider,
};

/// Registry recording into a private Prometheus recorder.
#[allow(dead_code)]
pub fn prometheus_registry(layer: &str) -> (Arc<CategoryMetricsRegistry>, PrometheusHandle) {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let provider = Arc::new(MetricsMeterProvider::with_recorder(Arc::new(recorder)));
    (Arc::new(CategoryMetricsRegistry::new(provider, layer)), handle)
}

/// Value of the first rendered series named `name` carrying every label in
/// `labels`, if any.
#[allow(dead_code)]
pub fn series_value(text: &str, name: &str, labels: &[&str]) -> Option<String> {
    let prefix = format!("{}{{", name);
    text.lines()
        .filter(|line| line.starts_with(&prefix))
        .find(|line| labels.iter().all(|label| line.contains(label)))
        .and_then(|line| line.rsplit(' ').next())
        .map(str::to_string)
}

/// Meter provider that counts meters and instruments it hands out.
#[derive(Default)]
#[allow(dead_code)]
pub struct CountingProvider {
    pub meters: AtomicUsize,
    pub instruments: Arc<AtomicUsize>,
    pub shutdowns: Arc<AtomicUsize>,
}

impl MeterProvider for CountingProvider {
    fn meter(&self, scope: &str) -> Option<Arc<dyn Meter>> {
        self.meters.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(CountingMeter {
            scope: scope.to_string(),
            instruments: self.instruments.clone(),
            shutdowns: self.shutdowns.clone(),
        }))
    }
}

struct CountingMeter {
    scope: String,
    instruments: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

struct Discard;

impl CounterInstrument for Discard {
    fn add(&self, _value: u64, _labels: &[Label]) {}
}

impl HistogramInstrument for Discard {
    fn record(&self, _value: f64, _labels: &[Label]) {}
}

impl Meter for CountingMeter {
    fn scope(&self) -> &str {
        &self.scope
    }

    fn create_counter(
        &self,
        _name: &str,
        _description: &str,
        _unit: Unit,
    ) -> Option<Arc<dyn CounterInstrument>> {
        self.instruments.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(Discard))
    }

    fn create_histogram(
        &self,
        _name: &str,
        _description: &str,
        _unit: Unit,
    ) -> Option<Arc<dyn HistogramInstrument>> {
        self.instruments.fetch_add(1, Ordering::SeqCst);
        Some(Arc::new(Discard))
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
