//! Concurrency tests for the context stack and the metrics registry.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use pipeline_observe::trace::InMemoryTracer;
use pipeline_observe::{CategoryMetricsRegistry, ContextStack, SerialTraversal, TraceContext};
use tokio::sync::Notify;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_first_use_race_creates_one_set() {
    let provider = Arc::new(common::CountingProvider::default());
    let registry = Arc::new(CategoryMetricsRegistry::new(provider.clone(), "application"));
    let barrier = Arc::new(tokio::sync::Barrier::new(32));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                registry.record_request("orders", "LoadOrders", "execute");
                registry.record_success("orders", "LoadOrders", "execute", 1.0);
            })
        })
        .collect();
    for result in futures_util::future::join_all(tasks).await {
        result.unwrap();
    }

    assert_eq!(registry.category_count(), 1);
    assert_eq!(provider.meters.load(Ordering::SeqCst), 1);
    assert_eq!(provider.instruments.load(Ordering::SeqCst), 4);

    registry.shutdown();
    registry.shutdown();
    assert_eq!(provider.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(registry.category_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_flows_do_not_see_each_other() {
    let tasks: Vec<_> = (0..16)
        .map(|_| {
            tokio::spawn(ContextStack::in_flow(async {
                let mine = TraceContext::new_root();
                let mut scope = ContextStack::enter(Some(mine));
                for _ in 0..10 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    assert_eq!(ContextStack::current(), Some(mine));
                }
                scope.exit();
                ContextStack::current()
            }))
        })
        .collect();

    for result in futures_util::future::join_all(tasks).await {
        assert_eq!(result.unwrap(), None);
    }
}

#[tokio::test]
async fn test_spawned_flow_inherits_current_context() {
    let outer = TraceContext::new_root();

    let seen = ContextStack::in_flow(async move {
        let _scope = ContextStack::enter(Some(outer));
        tokio::spawn(ContextStack::in_flow(async { ContextStack::current() }))
            .await
            .unwrap()
    })
    .await;

    assert_eq!(seen, Some(outer));
}

#[tokio::test]
async fn test_scope_outside_flow_is_invisible_to_sibling_tasks() {
    let foreign = TraceContext::new_root();
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let holder = {
        let entered = entered.clone();
        let release = release.clone();
        tokio::spawn(async move {
            let scope = ContextStack::enter(Some(foreign));
            entered.notify_one();
            release.notified().await;
            drop(scope);
        })
    };
    entered.notified().await;

    let tracer = Arc::new(InMemoryTracer::new());
    let sibling = tokio::spawn({
        let tracer = tracer.clone();
        async move {
            let before = ContextStack::current();
            SerialTraversal::new(tracer, "load")
                .run(vec![1], |x| async move { Ok::<_, String>(x) })
                .await
                .unwrap();
            before
        }
    });

    assert_eq!(sibling.await.unwrap(), None);
    let spans = tracer.finished_spans();
    assert_eq!(spans.len(), 1);
    assert_ne!(spans[0].parent, foreign);
    assert_ne!(spans[0].context.trace_id(), foreign.trace_id());

    release.notify_one();
    holder.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scopes_follow_tasks_across_workers() {
    let tasks: Vec<_> = (0..200)
        .map(|_| {
            tokio::spawn(ContextStack::in_flow(async {
                let mine = TraceContext::new_root();
                let _scope = ContextStack::enter(Some(mine));
                tokio::time::sleep(Duration::from_micros(50)).await;
                ContextStack::current() == Some(mine)
            }))
        })
        .collect();

    let kept = futures_util::future::join_all(tasks)
        .await
        .into_iter()
        .filter(|result| matches!(result, Ok(true)))
        .count();
    assert_eq!(kept, 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scope_outside_flow_never_lands_on_a_worker() {
    let tasks: Vec<_> = (0..200)
        .map(|_| {
            tokio::spawn(async {
                let scope = ContextStack::enter(Some(TraceContext::new_root()));
                tokio::time::sleep(Duration::from_micros(50)).await;
                (scope.is_active(), ContextStack::current())
            })
        })
        .collect();

    for result in futures_util::future::join_all(tasks).await {
        assert_eq!(result.unwrap(), (false, None));
    }
}
