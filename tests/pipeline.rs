//! End to end: controller → memory queue → index worker → search index

mod common;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use plansync::concurrency::{to_entity_tag, MergeOutcome, PlanController, Preconditions};
use plansync::nats::{memory_queue, MemoryQueueStats};
use plansync::projection::{MemorySearchIndex, NodeKind, SearchIndex};
use plansync::store::MemoryPlanStore;
use plansync::worker::{spawn_index_worker, ChangeProcessor, RetryPolicy, WorkerConfig, WorkerHandle};

const INDEX: &str = "plans";

struct Pipeline {
    controller: PlanController,
    index: Arc<MemorySearchIndex>,
    stats: Arc<MemoryQueueStats>,
    worker: WorkerHandle,
}

fn pipeline() -> Pipeline {
    let index = Arc::new(MemorySearchIndex::new());
    let (publisher, source) = memory_queue();
    let stats = publisher.stats();

    let worker = spawn_index_worker(
        Box::new(source),
        Arc::new(ChangeProcessor::new(index.clone())),
        WorkerConfig {
            worker_id: "pipeline-test".into(),
            retry: RetryPolicy::new(3, 1),
        },
    );
    let controller = PlanController::new(Arc::new(MemoryPlanStore::new()), Arc::new(publisher), INDEX);

    Pipeline {
        controller,
        index,
        stats,
        worker,
    }
}

/// Wait until every published event has been settled by the worker
async fn settled(stats: &MemoryQueueStats) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while stats.pending() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("worker did not settle");
}

#[tokio::test]
async fn create_and_delete_round_trip_through_index() {
    let p = pipeline();

    let record = p.controller.create(common::plan("p1", &["e1", "e2"])).await.unwrap();
    settled(&p.stats).await;
    assert_eq!(p.index.count(INDEX).await.unwrap(), 8);

    let entry = p.index.get(INDEX, "e1-svc").await.unwrap().unwrap();
    assert_eq!(entry.kind(), NodeKind::LinkedService);
    assert_eq!(entry.relation.parent.as_deref(), Some("e1"));

    p.controller
        .delete("p1", &Preconditions::if_match(to_entity_tag(&record.etag)))
        .await
        .unwrap();
    settled(&p.stats).await;
    assert_eq!(p.index.count(INDEX).await.unwrap(), 0);
    assert_eq!(p.stats.terminated(), 0);

    p.worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn merge_extends_derived_tree() {
    let p = pipeline();

    let record = p
        .controller
        .create(common::plan("p1", &["a", "b", "c"]))
        .await
        .unwrap();
    settled(&p.stats).await;
    assert_eq!(p.index.count(INDEX).await.unwrap(), 11);

    let mut renamed = common::linked("b");
    renamed["linkedService"]["name"] = json!("Renamed");
    let update = json!({ "linkedPlanServices": [renamed, common::linked("d")] });

    let outcome = p
        .controller
        .merge("p1", &update, &Preconditions::if_match(to_entity_tag(&record.etag)))
        .await
        .unwrap();
    assert!(matches!(outcome, MergeOutcome::Updated(_)));
    settled(&p.stats).await;

    assert_eq!(p.index.count(INDEX).await.unwrap(), 14);
    let svc = p.index.get(INDEX, "b-svc").await.unwrap().unwrap();
    assert_eq!(svc.fields["name"], "Renamed");

    p.worker.shutdown().await.unwrap();
}

#[tokio::test]
async fn reindex_is_idempotent() {
    let p = pipeline();

    p.controller.create(common::plan("p1", &["e1", "e2"])).await.unwrap();
    p.controller.create(common::plan("p2", &[])).await.unwrap();
    settled(&p.stats).await;
    assert_eq!(p.index.count(INDEX).await.unwrap(), 10);

    assert_eq!(p.controller.reindex_all().await.unwrap(), 2);
    settled(&p.stats).await;

    // Redelivered writes land on the same documents.
    assert_eq!(p.index.count(INDEX).await.unwrap(), 10);
    assert_eq!(p.stats.acked(), 4);

    p.worker.shutdown().await.unwrap();
}
