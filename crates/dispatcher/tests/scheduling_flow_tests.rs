use std::sync::Arc;

use chrono::Duration;
use serde_json::json;
use tempfile::TempDir;

use batchsync_dispatcher::{JobLifecycleService, JobScheduler, SchedulerConfig, TimeoutSweeper};
use batchsync_domain::{JobCreationRequest, JobOptions, JobStatus, ManualClock};
use batchsync_errors::SchedulerError;
use batchsync_infrastructure::{DatabaseManager, MetricsCollector, Repositories};
use batchsync_testing_utils::{utc, JobDefinitionBuilder, ScheduleDefinitionBuilder};

struct Harness {
    repositories: Repositories,
    clock: ManualClock,
    scheduler: JobScheduler,
    sweeper: TimeoutSweeper,
    lifecycle: Arc<JobLifecycleService>,
}

impl Harness {
    async fn new(repositories: Repositories) -> Self {
        let clock = ManualClock::new(utc(2024, 1, 1, 6, 30, 0));
        let metrics = Arc::new(MetricsCollector::new());

        let jobdef = JobDefinitionBuilder::new("import-users")
            .with_timeout(Duration::minutes(30))
            .with_properties(json!({"containDeletion": true, "limitOfDeletion": 10}))
            .build();
        repositories.jobdefs.save(&jobdef, None).await.unwrap();
        repositories
            .schedefs
            .save(
                &ScheduleDefinitionBuilder::new("daily", "import-users").build(),
                None,
            )
            .await
            .unwrap();

        Self {
            scheduler: JobScheduler::new(
                repositories.clone(),
                Arc::new(clock.clone()),
                metrics.clone(),
                SchedulerConfig::default(),
            ),
            sweeper: TimeoutSweeper::new(
                repositories.jobs.clone(),
                Arc::new(clock.clone()),
                metrics.clone(),
            ),
            lifecycle: Arc::new(JobLifecycleService::new(
                repositories.clone(),
                Arc::new(clock.clone()),
                metrics,
            )),
            repositories,
            clock,
        }
    }
}

async fn sqlite_harness() -> (TempDir, Harness) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("flow.db").display());
    let manager = DatabaseManager::new(&url, 4).await.unwrap();
    let harness = Harness::new(manager.repositories()).await;
    (dir, harness)
}

async fn check_scheduled_job_runs_to_success(h: &Harness) {
    let report = h.scheduler.scan_and_schedule().await.unwrap();
    assert_eq!(report.created.len(), 1);
    let job = &report.created[0];

    let options = JobOptions::of_job(job);
    assert!(options.contain_deletion());
    assert_eq!(options.limit_of_deletion(), 10);
    assert!(!options.allow_implicit_deletion());

    h.clock.set(utc(2024, 1, 1, 7, 0, 0));
    let running = h.lifecycle.start(&job.id, job.version).await.unwrap();
    h.clock.advance(Duration::minutes(10));
    let done = h
        .lifecycle
        .succeed(&job.id, running.version, vec!["ok".into()])
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Success);

    h.clock.advance(Duration::hours(1));
    let sweep = h.sweeper.sweep().await.unwrap();
    assert_eq!(sweep.overdue, 0);
}

async fn check_concurrent_start_has_one_winner(h: &Harness) {
    h.clock.set(utc(2024, 1, 1, 7, 0, 0));
    let job = h
        .lifecycle
        .request_job(&JobCreationRequest::new("import-users"))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        h.lifecycle.start(&job.id, job.version),
        h.lifecycle.start(&job.id, job.version)
    );
    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(loser.unwrap_err().is_state_conflict());

    let stored = h.lifecycle.find(&job.id).await.unwrap();
    assert_eq!(stored.status, JobStatus::Running);
    assert_eq!(stored.version, job.version + 1);
}

#[tokio::test]
async fn test_memory_scheduled_job_runs_to_success() {
    let h = Harness::new(Repositories::in_memory()).await;
    check_scheduled_job_runs_to_success(&h).await;
}

#[tokio::test]
async fn test_sqlite_scheduled_job_runs_to_success() {
    let (_dir, h) = sqlite_harness().await;
    check_scheduled_job_runs_to_success(&h).await;
}

#[tokio::test]
async fn test_memory_concurrent_start_has_one_winner() {
    let h = Harness::new(Repositories::in_memory()).await;
    check_concurrent_start_has_one_winner(&h).await;
}

#[tokio::test]
async fn test_sqlite_concurrent_start_has_one_winner() {
    let (_dir, h) = sqlite_harness().await;
    check_concurrent_start_has_one_winner(&h).await;
}

#[tokio::test]
async fn test_sweep_and_late_completion_race() {
    let h = Harness::new(Repositories::in_memory()).await;
    let report = h.scheduler.scan_and_schedule().await.unwrap();
    let job = report.created[0].clone();

    h.clock.set(utc(2024, 1, 1, 7, 0, 0));
    let running = h.lifecycle.start(&job.id, job.version).await.unwrap();

    // 截止时间之后执行方的完成通知与清扫同时到达
    h.clock.set(utc(2024, 1, 1, 7, 30, 0));
    let lifecycle = h.lifecycle.clone();
    let id = job.id.clone();
    let version = running.version;
    let (completion, sweep) = tokio::join!(
        async move { lifecycle.succeed(&id, version, vec![]).await },
        h.sweeper.sweep()
    );
    let sweep = sweep.unwrap();

    let stored = h.lifecycle.find(&job.id).await.unwrap();
    match completion {
        Ok(done) => {
            assert_eq!(stored.status, JobStatus::Success);
            assert_eq!(done, stored);
            assert!(sweep.aborted.is_empty());
        }
        Err(e) => {
            assert!(e.is_state_conflict());
            assert_eq!(stored.status, JobStatus::Abort);
            assert_eq!(sweep.aborted.len(), 1);
        }
    }
    assert_eq!(stored.version, running.version + 1);
}

#[tokio::test]
async fn test_duplicate_scan_from_two_schedulers() {
    let h = Harness::new(Repositories::in_memory()).await;
    let second = JobScheduler::new(
        h.repositories.clone(),
        Arc::new(h.clock.clone()),
        Arc::new(MetricsCollector::new()),
        SchedulerConfig::default(),
    );

    let (a, b) = tokio::join!(h.scheduler.scan_and_schedule(), second.scan_and_schedule());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.created.len() + b.created.len(), 1);
    assert_eq!(a.existing + b.existing, 1);
    assert_eq!(
        h.repositories
            .jobs
            .find_by_status(JobStatus::Schedule)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_request_overrides_apply() {
    let h = Harness::new(Repositories::in_memory()).await;
    let mut properties = serde_json::Map::new();
    properties.insert("limitOfDeletion".into(), json!(3));
    let request = JobCreationRequest::new("import-users")
        .with_schedule_time(utc(2024, 2, 1, 0, 0, 0))
        .with_timeout(Duration::hours(2))
        .with_job_properties(properties);

    let job = h.lifecycle.request_job(&request).await.unwrap();
    assert_eq!(job.limit_time, utc(2024, 2, 1, 2, 0, 0));
    let options = JobOptions::of_job(&job);
    assert_eq!(options.limit_of_deletion(), 3);
    assert!(options.contain_deletion());

    let invalid = JobCreationRequest::new("import-users").with_timeout(Duration::hours(30));
    let err = h.lifecycle.request_job(&invalid).await.unwrap_err();
    assert!(matches!(err, SchedulerError::Validation { .. }));
}
