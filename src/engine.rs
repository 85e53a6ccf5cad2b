//! Engine facade.
//!
//! # Responsibilities
//! - Turn an [`EngineConfig`] into a tracer and a category metrics registry
//! - Hand out [`SerialTraversal`]s preconfigured with both
//! - Release instruments on shutdown
//!
//! # Design Decisions
//! - Disabled tracing swaps in [`NoopTracer`]; disabled metrics leave the
//!   registry out entirely, so traversals skip recording
//! - Hosts may supply their own tracer and meter provider

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::observability::{CategoryMetricsRegistry, MeterProvider, MetricsMeterProvider};
use crate::trace::{InMemoryTracer, NoopTracer, Tracer};
use crate::traversal::SerialTraversal;

pub struct Engine {
    config: EngineConfig,
    tracer: Arc<dyn Tracer>,
    registry: Option<Arc<CategoryMetricsRegistry>>,
}

impl Engine {
    /// Build an engine around a host-supplied tracer and meter provider.
    pub fn new(
        config: EngineConfig,
        tracer: Arc<dyn Tracer>,
        provider: Arc<dyn MeterProvider>,
    ) -> Self {
        let tracer: Arc<dyn Tracer> = if config.tracing.enabled {
            tracer
        } else {
            Arc::new(NoopTracer)
        };
        let registry = config
            .metrics
            .enabled
            .then(|| Arc::new(CategoryMetricsRegistry::new(provider, config.metrics.layer.clone())));

        tracing::info!(
            tracing_enabled = config.tracing.enabled,
            metrics_enabled = config.metrics.enabled,
            layer = %config.metrics.layer,
            "Engine created"
        );

        Self {
            config,
            tracer,
            registry,
        }
    }

    /// Build an engine with an in-memory tracer and the process-global
    /// `metrics` recorder.
    pub fn from_config(config: EngineConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryTracer::new()),
            Arc::new(MetricsMeterProvider::global()),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tracer(&self) -> &Arc<dyn Tracer> {
        &self.tracer
    }

    /// The metrics registry, absent when metrics are disabled.
    pub fn registry(&self) -> Option<&Arc<CategoryMetricsRegistry>> {
        self.registry.as_ref()
    }

    /// A traversal named after the configured default operation.
    pub fn traversal<A>(&self) -> SerialTraversal<A> {
        self.named_traversal(self.config.traversal.default_operation.clone())
    }

    /// A traversal named `operation`, without metrics.
    pub fn named_traversal<A>(&self, operation: impl Into<String>) -> SerialTraversal<A> {
        SerialTraversal::new(self.tracer.clone(), operation)
            .record_item_type(self.config.traversal.record_item_type)
    }

    /// A traversal named `operation` that records metrics under `category`
    /// when metrics are enabled.
    pub fn observed_traversal<A>(
        &self,
        operation: impl Into<String>,
        category: &str,
        handler: &str,
        method: &str,
    ) -> SerialTraversal<A> {
        let traversal = self.named_traversal(operation);
        match &self.registry {
            Some(registry) => traversal.with_metrics(registry.clone(), category, handler, method),
            None => traversal,
        }
    }

    /// Release every instrument owned by the registry.
    pub fn shutdown(&self) {
        if let Some(registry) = &self.registry {
            registry.shutdown();
        }
    }
}
