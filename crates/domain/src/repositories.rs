//! 领域仓储抽象
//!
//! 持久化端口。所有写操作都带乐观版本检查，版本不一致时返回
//! [`SchedulerError::VersionConflict`](batchsync_errors::SchedulerError::VersionConflict)。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use batchsync_errors::SchedulerResult;

use crate::job::{Job, JobStatus};
use crate::jobdef::JobDefinition;
use crate::schedule::ScheduleDefinition;

/// 调度定义仓储
///
/// `save` 的 `expected_version` 为 `None` 表示新增（id 已存在则冲突），
/// 否则要求存储中的版本与之相等。
#[async_trait]
pub trait ScheduleDefinitionRepository: Send + Sync {
    async fn save(
        &self,
        schedef: &ScheduleDefinition,
        expected_version: Option<i64>,
    ) -> SchedulerResult<ScheduleDefinition>;
    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<ScheduleDefinition>>;
    async fn find_all(&self) -> SchedulerResult<Vec<ScheduleDefinition>>;
}

/// 作业定义仓储，`save` 语义同上
#[async_trait]
pub trait JobDefinitionRepository: Send + Sync {
    async fn save(
        &self,
        jobdef: &JobDefinition,
        expected_version: Option<i64>,
    ) -> SchedulerResult<JobDefinition>;
    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<JobDefinition>>;
    async fn find_all(&self) -> SchedulerResult<Vec<JobDefinition>>;
}

/// 作业仓储
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> SchedulerResult<Job>;
    async fn find_by_id(&self, id: &str) -> SchedulerResult<Option<Job>>;
    /// 比较并交换：存储中的版本必须等于 `expected_version`
    async fn update(&self, job: &Job, expected_version: i64) -> SchedulerResult<Job>;
    async fn exists_for_occurrence(
        &self,
        schedef_id: &str,
        schedule_time: DateTime<Utc>,
    ) -> SchedulerResult<bool>;
    /// 非终止状态且 `limitTime <= now` 的作业
    async fn find_overdue(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<Job>>;
    async fn find_by_status(&self, status: JobStatus) -> SchedulerResult<Vec<Job>>;
}
