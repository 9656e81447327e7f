use batchsync_domain::{JobStatus, ScheduleDefinition};
use batchsync_errors::SchedulerError;
use batchsync_infrastructure::{DatabaseManager, DatabaseType, Repositories};
use batchsync_testing_utils::{utc, JobBuilder, JobDefinitionBuilder, ScheduleDefinitionBuilder};
use chrono::Duration;
use tempfile::TempDir;

async fn sqlite_repositories() -> (TempDir, DatabaseManager) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("batchsync.db").display());
    let manager = DatabaseManager::new(&url, 2).await.unwrap();
    assert_eq!(manager.database_type(), DatabaseType::SQLite);
    (dir, manager)
}

async fn check_definition_versioning(repos: &Repositories) {
    let jobdef = JobDefinitionBuilder::new("import-users").build();
    repos.jobdefs.save(&jobdef, None).await.unwrap();

    let err = repos.jobdefs.save(&jobdef, None).await.unwrap_err();
    assert!(matches!(err, SchedulerError::AlreadyExists { .. }));

    let revised = jobdef
        .revise("admin", utc(2024, 2, 1, 0, 0, 0), |d| d.timeout = Duration::minutes(5))
        .unwrap();
    repos.jobdefs.save(&revised, Some(1)).await.unwrap();

    let stale = repos.jobdefs.save(&revised, Some(1)).await.unwrap_err();
    assert!(matches!(stale, SchedulerError::VersionConflict { expected: 1, actual: 2, .. }));

    let loaded = repos.jobdefs.find_by_id("import-users").await.unwrap().unwrap();
    assert_eq!(loaded, revised);
    assert!(repos.jobdefs.find_by_id("missing").await.unwrap().is_none());

    let schedef = ScheduleDefinitionBuilder::new("nightly", "import-users").build();
    repos.schedefs.save(&schedef, None).await.unwrap();
    let missing = ScheduleDefinitionBuilder::new("ghost", "import-users").build();
    assert!(repos.schedefs.save(&missing, Some(1)).await.unwrap_err().is_not_found());

    let all: Vec<ScheduleDefinition> = repos.schedefs.find_all().await.unwrap();
    assert_eq!(all, vec![schedef]);
}

async fn check_job_lifecycle_storage(repos: &Repositories) {
    let jobdef = JobDefinitionBuilder::new("import-users").build();
    let schedef = ScheduleDefinitionBuilder::new("nightly", "import-users").build();
    let at = utc(2024, 1, 1, 7, 0, 0);

    let mut job = JobBuilder::new(&jobdef, at).for_schedef(&schedef).build();
    repos.jobs.create(&job).await.unwrap();

    assert!(repos.jobs.exists_for_occurrence("nightly", at).await.unwrap());
    assert!(!repos
        .jobs
        .exists_for_occurrence("nightly", at + Duration::days(1))
        .await
        .unwrap());

    let duplicate = JobBuilder::new(&jobdef, at).for_schedef(&schedef).build();
    let err = repos.jobs.create(&duplicate).await.unwrap_err();
    assert!(matches!(err, SchedulerError::AlreadyExists { .. }));

    // 手工作业不受触发时刻唯一约束
    let manual_a = JobBuilder::new(&jobdef, at).build();
    let manual_b = JobBuilder::new(&jobdef, at).build();
    repos.jobs.create(&manual_a).await.unwrap();
    repos.jobs.create(&manual_b).await.unwrap();

    job.start(at, 1).unwrap();
    repos.jobs.update(&job, 1).await.unwrap();

    let mut competing = repos.jobs.find_by_id(&job.id).await.unwrap().unwrap();
    assert_eq!(competing.status, JobStatus::Running);
    assert_eq!(competing.version, 2);

    competing.status = JobStatus::Schedule;
    let err = repos.jobs.update(&competing, 1).await.unwrap_err();
    assert!(matches!(err, SchedulerError::VersionConflict { expected: 1, actual: 2, .. }));

    let overdue = repos.jobs.find_overdue(at + Duration::hours(1)).await.unwrap();
    assert_eq!(overdue.len(), 3);
    assert!(repos
        .jobs
        .find_overdue(at + Duration::minutes(59))
        .await
        .unwrap()
        .is_empty());

    let running = repos.jobs.find_by_status(JobStatus::Running).await.unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].id, job.id);

    let ghost = JobBuilder::new(&jobdef, at).build();
    assert!(repos.jobs.update(&ghost, 1).await.unwrap_err().is_not_found());
}

async fn check_overdue_uses_time_order(repos: &Repositories) {
    let jobdef = JobDefinitionBuilder::new("import-users").build();
    let now = utc(2024, 1, 1, 12, 0, 0);

    let far = JobBuilder::new(&jobdef, utc(10000, 1, 1, 0, 0, 0)).build();
    let late = JobBuilder::new(&jobdef, utc(2024, 1, 1, 10, 0, 0)).build();
    let early = JobBuilder::new(&jobdef, utc(2023, 12, 31, 9, 0, 0)).build();
    for job in [&far, &late, &early] {
        repos.jobs.create(job).await.unwrap();
    }

    let overdue: Vec<String> = repos
        .jobs
        .find_overdue(now)
        .await
        .unwrap()
        .into_iter()
        .map(|job| job.id)
        .collect();
    assert_eq!(overdue, vec![early.id.clone(), late.id.clone()]);

    let scheduled = repos.jobs.find_by_status(JobStatus::Schedule).await.unwrap();
    assert_eq!(scheduled.last().map(|job| job.id.as_str()), Some(far.id.as_str()));
}

#[tokio::test]
async fn test_memory_definition_versioning() {
    check_definition_versioning(&Repositories::in_memory()).await;
}

#[tokio::test]
async fn test_memory_job_storage() {
    check_job_lifecycle_storage(&Repositories::in_memory()).await;
}

#[tokio::test]
async fn test_sqlite_definition_versioning() {
    let (_dir, manager) = sqlite_repositories().await;
    check_definition_versioning(&manager.repositories()).await;
    manager.close().await;
}

#[tokio::test]
async fn test_sqlite_job_storage() {
    let (_dir, manager) = sqlite_repositories().await;
    manager.health_check().await.unwrap();
    check_job_lifecycle_storage(&manager.repositories()).await;
    manager.close().await;
}

#[tokio::test]
async fn test_memory_overdue_ignores_far_future_jobs() {
    check_overdue_uses_time_order(&Repositories::in_memory()).await;
}

#[tokio::test]
async fn test_sqlite_overdue_ignores_far_future_jobs() {
    let (_dir, manager) = sqlite_repositories().await;
    check_overdue_uses_time_order(&manager.repositories()).await;
    manager.close().await;
}

#[tokio::test]
async fn test_sqlite_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("batchsync.db").display());
    let jobdef = JobDefinitionBuilder::new("export-groups").build();

    let manager = DatabaseManager::new(&url, 1).await.unwrap();
    manager.repositories().jobdefs.save(&jobdef, None).await.unwrap();
    manager.close().await;

    let reopened = DatabaseManager::new(&url, 1).await.unwrap();
    let loaded = reopened.repositories().jobdefs.find_all().await.unwrap();
    assert_eq!(loaded, vec![jobdef]);
    reopened.close().await;
}

#[tokio::test]
async fn test_memory_url_selects_memory_backend() {
    let manager = DatabaseManager::new("memory://", 1).await.unwrap();
    assert_eq!(manager.database_type(), DatabaseType::Memory);
    assert!(DatabaseManager::new("mysql://localhost", 1).await.is_err());
}
