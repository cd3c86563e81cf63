//! Integration tests for the polling completion waiter.

mod helpers;

use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;

use chartjob_entity::job::JobStatus;
use chartjob_entity::job::model::ABANDONED_PRIORITY;
use chartjob_scheduler::{CompletionCode, ScheduleOptions, SchedulerError};

use helpers::{TestApp, invalidate, record_id};

#[tokio::test(start_paused = true)]
async fn test_queued_job_times_out_and_is_forced_done() {
    let app = TestApp::relational();
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap();
    assert_eq!(handle.backend_name(), "relational");

    let started = Instant::now();
    let err = handle
        .get_result(Some(Duration::from_secs(2)))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.completion_code(), Some(CompletionCode::Timeout));
    assert!(elapsed >= Duration::from_secs(2), "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "gave up after {elapsed:?}");

    let record = app.jobs.get(record_id(handle.job())).unwrap();
    assert_eq!(record.status, JobStatus::Done);
    assert!(record.done_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_within_one_interval_of_deadline() {
    for secs in [1, 3, 5] {
        let app = TestApp::relational();
        let handle = app
            .scheduler
            .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
            .await
            .unwrap();

        let started = Instant::now();
        let err = handle
            .get_result(Some(Duration::from_secs(secs)))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(err.completion_code(), Some(CompletionCode::Timeout));
        assert!(elapsed <= Duration::from_secs(secs + 1), "T={secs}s took {elapsed:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_done_job_resolves() {
    let app = TestApp::relational();
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap();
    let id = record_id(handle.job());

    let jobs = app.jobs.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        jobs.start(id);
        tokio::time::sleep(Duration::from_millis(500)).await;
        jobs.finish(id);
    });

    handle.get_result(None).await.unwrap();
    assert_eq!(app.jobs.get(id).unwrap().status, JobStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_rejects() {
    let app = TestApp::relational();
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap();
    app.jobs.fail(record_id(handle.job()));

    let err = handle
        .get_result(Some(Duration::from_secs(30)))
        .await
        .unwrap_err();
    assert_eq!(err.completion_code(), Some(CompletionCode::Failed));
}

#[tokio::test(start_paused = true)]
async fn test_running_job_is_downgraded_and_never_times_out() {
    let app = TestApp::relational();
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(
            &invalidate("abc12"),
            ScheduleOptions::with_priority(5),
        )
        .await
        .unwrap();
    let id = record_id(handle.job());
    app.jobs.start(id);

    let jobs = app.jobs.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(4)).await;
        jobs.finish(id);
    });

    handle.get_result(Some(Duration::from_secs(1))).await.unwrap();
    assert_eq!(app.jobs.get(id).unwrap().priority, ABANDONED_PRIORITY);
}

#[tokio::test(start_paused = true)]
async fn test_priority_untouched_without_deadline() {
    let app = TestApp::relational();
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap();
    let id = record_id(handle.job());
    app.jobs.start(id);

    let jobs = app.jobs.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        jobs.finish(id);
    });

    handle.get_result(None).await.unwrap();
    assert_eq!(app.jobs.get(id).unwrap().priority, 0);
}

#[tokio::test(start_paused = true)]
async fn test_old_record_times_out_on_first_poll() {
    let app = TestApp::relational();
    let handle = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap();
    let id = record_id(handle.job());
    app.jobs.backdate(id, chrono::Duration::seconds(60));

    let record = app.jobs.get(id).unwrap();
    let started = Instant::now();
    let stale = chartjob_scheduler::JobRef::Relational {
        id,
        created_at: record.created_at,
    };
    let backend = app.scheduler.backend_for("compute");
    let err = backend
        .wait(&stale, Some(Duration::from_secs(30)))
        .await
        .unwrap_err();

    assert_eq!(err.completion_code(), Some(CompletionCode::Timeout));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_bulk_invalidation_results() {
    let app = TestApp::relational();
    let bulk = app
        .scheduler
        .schedule_invalidate_cloudflare_jobs(
            &[invalidate("a"), invalidate("b"), invalidate("c")],
            ScheduleOptions {
                priority: 2,
                key: Some("purge".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(bulk.handles().len(), 3);

    let ids: Vec<_> = bulk.handles().iter().map(|h| record_id(h.job())).collect();
    for id in &ids {
        let record = app.jobs.get(*id).unwrap();
        assert_eq!(record.key, "purge");
        assert_eq!(record.priority, 2);
        assert_eq!(record.status, JobStatus::Queued);
    }
    app.jobs.finish(ids[0]);
    app.jobs.fail(ids[1]);

    let results = join_all(bulk.get_results(Some(Duration::from_secs(2)))).await;
    assert!(results[0].is_ok());
    assert!(matches!(
        &results[1],
        Err(SchedulerError::Completion(e)) if e.code == CompletionCode::Failed
    ));
    assert_eq!(
        results[2].as_ref().unwrap_err().completion_code(),
        Some(CompletionCode::Timeout)
    );
}

#[tokio::test]
async fn test_unavailable_store_surfaces_internal_error() {
    let app = TestApp::relational();
    app.jobs.set_unavailable(true);
    let err = app
        .scheduler
        .schedule_invalidate_cloudflare_job(&invalidate("abc12"), ScheduleOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Internal(_)));
}
