//! Integration tests for queue health reports.

mod helpers;

use serde_json::{Value, json};

use chartjob_queue::{NewQueueJob, QueueProvider};
use chartjob_scheduler::{QueueHealth, SchedulerError};

use helpers::{TestApp, concrete};

async fn add(app: &TestApp, name: &str) -> String {
    app.queue
        .add(
            &concrete("render"),
            NewQueueJob {
                name: name.into(),
                data: json!({}),
                priority: 0,
            },
        )
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_unreachable_queue() {
    let app = TestApp::distributed(&["render"]);
    app.queue.set_connected(false);

    let health = app.scheduler.get_queue_health("render", 10).await.unwrap();
    assert_eq!(
        health,
        QueueHealth {
            connected: false,
            ..QueueHealth::default()
        }
    );
}

#[tokio::test]
async fn test_no_workers_short_circuits() {
    let app = TestApp::distributed(&["render"]);
    app.queue.set_paused(&concrete("render"), true);
    add(&app, "runTasks").await;

    let health = app.scheduler.get_queue_health("render", 10).await.unwrap();
    assert_eq!(
        serde_json::to_value(&health).unwrap(),
        json!({ "connected": true, "paused": true, "numWorkers": 0 })
    );
}

#[tokio::test]
async fn test_idle_queue_without_history() {
    let app = TestApp::distributed(&["render"]);
    app.queue.set_workers(&concrete("render"), 2);

    let health = app.scheduler.get_queue_health("render", 10).await.unwrap();
    assert_eq!(health.num_workers, Some(2));
    assert_eq!(health.idle, Some(true));
    assert_eq!(health.num_finished, Some(0));
    assert_eq!(health.last_job_finished_ago_ms, None);
    assert_eq!(health.ratio_completed, None);
}

#[tokio::test]
async fn test_full_report() {
    let app = TestApp::distributed(&["render"]);
    let queue = concrete("render");
    app.queue.set_workers(&queue, 3);

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(add(&app, "runTasks").await);
    }
    for id in &ids[..3] {
        app.queue.complete(&queue, id, Value::Null).unwrap();
    }
    app.queue.fail(&queue, &ids[3], "renderer crashed").unwrap();
    app.queue.start(&queue, &ids[4]).unwrap();

    let health = app.scheduler.get_queue_health("render", 100).await.unwrap();
    assert!(health.connected);
    assert_eq!(health.paused, Some(false));
    assert_eq!(health.num_workers, Some(3));
    assert_eq!(health.idle, Some(false));
    assert_eq!(health.num_finished, Some(4));
    assert_eq!(health.num_completed, Some(3));
    assert_eq!(health.ratio_completed, Some(4.0 / 3.0));
    assert!(health.last_job_finished_ago_ms.is_some_and(|ms| ms >= 0));

    let sampled = app.scheduler.get_queue_health("render", 2).await.unwrap();
    assert_eq!(sampled.num_finished, Some(2));
}

#[tokio::test]
async fn test_all_failed_has_no_ratio() {
    let app = TestApp::distributed(&["render"]);
    let queue = concrete("render");
    app.queue.set_workers(&queue, 1);
    let id = add(&app, "runTasks").await;
    app.queue.fail(&queue, &id, "boom").unwrap();

    let health = app.scheduler.get_queue_health("render", 10).await.unwrap();
    assert_eq!(health.num_finished, Some(1));
    assert_eq!(health.num_completed, Some(0));
    assert_eq!(health.ratio_completed, None);
}

#[tokio::test]
async fn test_unregistered_queue() {
    let app = TestApp::distributed(&["render"]);
    let err = app.scheduler.get_queue_health("compute", 10).await.unwrap_err();
    assert!(matches!(err, SchedulerError::UnsupportedQueue(q) if q == "compute"));

    let relational = TestApp::relational();
    assert!(relational.scheduler.get_queue_health("render", 10).await.is_err());
}
