//! Engine wiring from configuration.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use pipeline_observe::observability::MetricsMeterProvider;
use pipeline_observe::trace::{InMemoryTracer, TagValue};
use pipeline_observe::{Engine, EngineConfig};

mod common;

#[tokio::test]
async fn test_engine_from_toml() {
    let config = EngineConfig::from_toml_str(
        r#"
        [metrics]
        layer = "domain"

        [traversal]
        default_operation = "sync"
        record_item_type = false
        "#,
    )
    .unwrap();

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let tracer = Arc::new(InMemoryTracer::new());
    let engine = Engine::new(
        config,
        tracer.clone(),
        Arc::new(MetricsMeterProvider::with_recorder(Arc::new(recorder))),
    );

    let out = engine
        .observed_traversal("sync", "accounts", "SyncAccounts", "run")
        .with_identifier(|id: &u32| format!("acct-{id}"))
        .run(vec![7u32, 9], |id| async move { Ok::<_, String>(id * 2) })
        .await
        .unwrap();
    assert_eq!(out, vec![14, 18]);

    let spans = tracer.finished_spans();
    assert_eq!(spans[0].name, "sync acct-7");
    assert_eq!(spans[1].tag("traversal.item_id"), Some(&TagValue::from("acct-9")));
    assert!(spans[1].tag("traversal.item_type").is_none());

    let text = handle.render();
    assert_eq!(
        common::series_value(
            &text,
            "domain_accounts_successes_total",
            &["layer=\"domain\"", "category=\"accounts\"", "handler_method=\"run\""]
        )
        .as_deref(),
        Some("2"),
        "{text}"
    );

    engine.shutdown();
    engine
        .observed_traversal("sync", "accounts", "SyncAccounts", "run")
        .run(vec![1u32], |id| async move { Ok::<_, String>(id) })
        .await
        .unwrap();
    assert!(engine.registry().is_some_and(|r| r.is_shut_down()));
}

#[test]
fn test_invalid_config_is_rejected() {
    let err = EngineConfig::from_toml_str("[metrics]\nlayer = \"has space\"\n").unwrap_err();
    assert!(err.to_string().contains("has space"), "{err}");
}
