//! 面向执行方的作业服务
//!
//! 手工提交作业，以及 `start` / `succeed` / `fail` / `abort` 状态迁移。每次迁移都读取作业、
//! 用调用方观察到的版本做纯函数迁移，再通过比较并交换写回；版本不一致时返回
//! [`SchedulerError::VersionConflict`]，由调用方决定重新读取或放弃。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use batchsync_domain::{Clock, Job, JobCreationRequest, JobFactory, JobOutcome};
use batchsync_errors::{SchedulerError, SchedulerResult};
use batchsync_infrastructure::{MetricsCollector, Repositories, StructuredLogger};

pub struct JobLifecycleService {
    repositories: Repositories,
    factory: JobFactory,
    clock: Arc<dyn Clock>,
    metrics: Arc<MetricsCollector>,
}

impl JobLifecycleService {
    pub fn new(
        repositories: Repositories,
        clock: Arc<dyn Clock>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            repositories,
            factory: JobFactory::new(clock.clone()),
            clock,
            metrics,
        }
    }

    /// 手工提交一个不关联调度定义的作业
    #[instrument(skip_all, fields(jobdef.id = %request.jobdef_id))]
    pub async fn request_job(&self, request: &JobCreationRequest) -> SchedulerResult<Job> {
        let jobdef = self
            .repositories
            .jobdefs
            .find_by_id(&request.jobdef_id)
            .await?
            .ok_or_else(|| SchedulerError::jobdef_not_found(&request.jobdef_id))?;

        let job = self.factory.create_requested(&jobdef, request)?;
        let job = self.repositories.jobs.create(&job).await?;

        StructuredLogger::log_job_created(&job);
        self.metrics.record_job_created(job.kind, false);
        Ok(job)
    }

    pub async fn find(&self, job_id: &str) -> SchedulerResult<Job> {
        self.repositories
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| SchedulerError::job_not_found(job_id))
    }

    pub async fn start(&self, job_id: &str, expected_version: i64) -> SchedulerResult<Job> {
        let job = self
            .transition(job_id, expected_version, "start", |job, now| {
                job.start(now, expected_version)
            })
            .await?;
        StructuredLogger::log_job_started(&job);
        Ok(job)
    }

    pub async fn finish(
        &self,
        job_id: &str,
        expected_version: i64,
        outcome: JobOutcome,
        messages: Vec<String>,
    ) -> SchedulerResult<Job> {
        let job = self
            .transition(job_id, expected_version, "finish", |job, now| {
                job.finish(now, expected_version, outcome, messages)
            })
            .await?;
        StructuredLogger::log_job_finished(&job);
        self.metrics.record_job_finished(&job);
        Ok(job)
    }

    pub async fn succeed(
        &self,
        job_id: &str,
        expected_version: i64,
        messages: Vec<String>,
    ) -> SchedulerResult<Job> {
        self.finish(job_id, expected_version, JobOutcome::Success, messages)
            .await
    }

    pub async fn fail(
        &self,
        job_id: &str,
        expected_version: i64,
        messages: Vec<String>,
    ) -> SchedulerResult<Job> {
        self.finish(job_id, expected_version, JobOutcome::Failure, messages)
            .await
    }

    /// 截止时间之后由外部强制中止
    pub async fn abort(
        &self,
        job_id: &str,
        expected_version: i64,
        reason: Option<String>,
    ) -> SchedulerResult<Job> {
        let job = self
            .transition(job_id, expected_version, "abort", |job, now| {
                job.abort(now, expected_version, reason)
            })
            .await?;
        StructuredLogger::log_job_aborted(&job, job.end_time.unwrap_or(job.limit_time));
        self.metrics.record_job_aborted(job.kind);
        Ok(job)
    }

    #[instrument(skip(self, apply))]
    async fn transition<F>(
        &self,
        job_id: &str,
        expected_version: i64,
        action: &'static str,
        apply: F,
    ) -> SchedulerResult<Job>
    where
        F: FnOnce(&mut Job, DateTime<Utc>) -> SchedulerResult<()>,
    {
        let mut job = self.find(job_id).await?;
        let now = self.clock.now();

        let result = match apply(&mut job, now) {
            Ok(()) => self.repositories.jobs.update(&job, expected_version).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(job) => {
                debug!(job.id = %job.id, job.version = job.version, "作业状态已更新");
                Ok(job)
            }
            Err(e) if e.is_state_conflict() => {
                StructuredLogger::log_transition_conflict(job_id, action, &e.to_string());
                self.metrics.record_transition_conflict(action);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }
}
