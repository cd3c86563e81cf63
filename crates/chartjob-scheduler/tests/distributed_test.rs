//! Integration tests for the distributed backend and backend selection.

mod helpers;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;

use chartjob_entity::export::ExportRequest;
use chartjob_entity::job::Task;
use chartjob_queue::memory::MemoryJobState;
use chartjob_scheduler::{
    CompletionCode, JobBackend, JobRef, JobSpec, ScheduleOptions, SchedulerError,
};

use helpers::{TestApp, concrete, entry, invalidate, queue_job, record_id};

/// Let spawned background work run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_failure_event_rejects_before_deadline() {
    let app = TestApp::distributed(&["render", "compute"]);
    let spec = JobSpec::new(vec![Task::Compress {
        image: "a.png".into(),
    }])
    .unwrap();
    let handle = app
        .scheduler
        .schedule_job("render", spec, ScheduleOptions::default())
        .await
        .unwrap();
    assert_eq!(handle.backend_name(), "distributed");
    let (queue, id) = queue_job(handle.job());
    assert_eq!(queue, concrete("render"));

    let worker = app.queue.clone();
    let (q, i) = (queue.clone(), id.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        worker.start(&q, &i).unwrap();
        worker.fail(&q, &i, "renderer crashed").unwrap();
    });

    let started = Instant::now();
    let err = handle
        .get_result(Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.completion_code(), Some(CompletionCode::Failed));
    assert!(err.to_string().contains("renderer crashed"));
    assert!(elapsed >= Duration::from_millis(500));
    assert!(elapsed < Duration::from_secs(1), "rejected after {elapsed:?}");

    settle().await;
    assert!(app.queue.job(&queue, &id).unwrap().discarded);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_wins_race() {
    let app = TestApp::distributed(&["compute"]);
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap();
    let (queue, id) = queue_job(handle.job());

    let started = Instant::now();
    let err = handle
        .get_result(Some(Duration::from_secs(2)))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.completion_code(), Some(CompletionCode::Timeout));
    assert!(elapsed < Duration::from_millis(2100), "timed out after {elapsed:?}");

    settle().await;
    let job = app.queue.job(&queue, &id).unwrap();
    assert!(job.discarded);
    assert_eq!(job.state, MemoryJobState::Waiting);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_counts_from_enqueue_time() {
    let app = TestApp::distributed(&["compute"]);
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap();
    let (queue, id) = queue_job(handle.job());
    let backdated = JobRef::Distributed {
        queue: queue.clone(),
        id: id.clone(),
        created_at: chrono::Utc::now() - chrono::Duration::seconds(4),
    };

    let started = Instant::now();
    let err = app
        .scheduler
        .backend_for("compute")
        .wait(&backdated, Some(Duration::from_secs(5)))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.completion_code(), Some(CompletionCode::Timeout));
    assert!(elapsed >= Duration::from_millis(900), "timed out after {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "timed out after {elapsed:?}");

    settle().await;
    assert!(app.queue.job(&queue, &id).unwrap().discarded);
}

#[tokio::test(start_paused = true)]
async fn test_completion_event_resolves() {
    let app = TestApp::distributed(&["compute"]);
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap();
    let (queue, id) = queue_job(handle.job());

    let job = app.queue.job(&queue, &id).unwrap();
    assert_eq!(job.job.name, "invalidateCloudflareCache");
    assert_eq!(
        job.job.data,
        json!({ "urls": ["https://charts.example.com/abc12/"] })
    );

    let worker = app.queue.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        worker.complete(&queue, &id, json!({ "purged": 1 })).unwrap();
    });

    handle.get_result(None).await.unwrap();
}

#[tokio::test]
async fn test_already_finished_job_resolves_immediately() {
    let app = TestApp::distributed(&["compute"]);
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap();
    let (queue, id) = queue_job(handle.job());
    app.queue.complete(&queue, &id, json!(null)).unwrap();

    handle
        .get_result(Some(Duration::from_secs(1)))
        .await
        .unwrap();
}

#[test]
fn test_empty_queue_map_is_rejected() {
    let app = TestApp::relational();
    let result = app
        .scheduler
        .with_distributed(Arc::new(app.queue.clone()), BTreeMap::new());

    assert!(matches!(result, Err(SchedulerError::MissingWorkerConfig(_))));
}

#[tokio::test]
async fn test_bulk_jobs_keep_order() {
    let app = TestApp::distributed(&["compute"]);
    let bulk = app
        .scheduler
        .schedule_invalidate_cloudflare_jobs(
            &[invalidate("a"), invalidate("b")],
            ScheduleOptions::with_priority(1),
        )
        .await
        .unwrap();

    let jobs: Vec<_> = bulk
        .handles()
        .iter()
        .map(|h| {
            let (queue, id) = queue_job(h.job());
            app.queue.job(&queue, &id).unwrap()
        })
        .collect();
    assert_eq!(jobs[0].job.data["urls"][0], "https://charts.example.com/a/");
    assert_eq!(jobs[1].job.data["urls"][0], "https://charts.example.com/b/");
    assert!(jobs.iter().all(|job| job.job.priority == 1));
}

#[tokio::test]
async fn test_unregistered_queue_falls_back_to_job_table() {
    let app = TestApp::distributed(&["render"]);
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap();

    assert_eq!(handle.backend_name(), "relational");
    let record = app.jobs.get(record_id(handle.job())).unwrap();
    assert_eq!(record.key, "cloudflare");
    assert_eq!(record.chart_id.as_deref(), Some("abc12"));
}

#[tokio::test]
async fn test_export_request_compiled_onto_queue() {
    let app = TestApp::distributed(&["render"]);
    let request = ExportRequest {
        chart_id: "abc12".into(),
        user_id: Some(7),
        exports: vec![entry("png", "a.png"), entry("pdf", "a.pdf")],
        publish: None,
        save: None,
        upload: None,
    };
    let handle = app
        .scheduler
        .schedule_export(&request, ScheduleOptions::default())
        .await
        .unwrap();

    let (queue, id) = queue_job(handle.job());
    let job = app.queue.job(&queue, &id).unwrap();
    assert_eq!(job.job.name, "runTasks");
    assert_eq!(job.job.data["chartId"], "abc12");
    let actions: Vec<_> = job.job.data["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|task| task["action"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(actions, ["png", "pdf"]);
}
