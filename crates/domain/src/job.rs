use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use batchsync_errors::{SchedulerError, SchedulerResult};

use crate::jobdef::{ContentKind, JobDefinition, JobKind};
use crate::schedule::ScheduleDefinition;

/// 作业状态
///
/// `SCHEDULE` 为初始状态，`SUCCESS`/`FAILURE`/`ABORT` 为终止状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Schedule,
    Running,
    Success,
    Failure,
    Abort,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure | JobStatus::Abort)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Schedule => "SCHEDULE",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failure => "FAILURE",
            JobStatus::Abort => "ABORT",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULE" => Ok(JobStatus::Schedule),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCESS" => Ok(JobStatus::Success),
            "FAILURE" => Ok(JobStatus::Failure),
            "ABORT" => Ok(JobStatus::Abort),
            _ => Err(SchedulerError::validation(
                "status",
                format!("未知的作业状态: {s}"),
            )),
        }
    }
}

/// 执行器上报的结束结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Success,
    Failure,
}

impl From<JobOutcome> for JobStatus {
    fn from(outcome: JobOutcome) -> Self {
        match outcome {
            JobOutcome::Success => JobStatus::Success,
            JobOutcome::Failure => JobStatus::Failure,
        }
    }
}

/// 作业实例
///
/// 由 [`crate::JobFactory`] 以 `SCHEDULE` 状态创建，之后只能通过状态迁移方法修改。
/// 每次成功迁移版本号加一；迁移方法要求调用方传入其观察到的版本号。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub kind: JobKind,
    pub target: ContentKind,
    pub schedule_time: DateTime<Utc>,
    pub limit_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trnsdef: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtdef: Option<Value>,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub jobdef_id: String,
    pub jobdef: JobDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedef_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedef: Option<ScheduleDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_messages: Option<Vec<String>>,
    pub version: i64,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 非终止状态且已到达截止时间
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_terminal() && now >= self.limit_time
    }

    /// 已运行时长；未开始时为 `None`，未结束时按 `now` 计算
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        let begin = self.begin_time?;
        Some(self.end_time.unwrap_or(now) - begin)
    }

    /// 调度生成作业的幂等键 `(schedefId, scheduleTime)`；手工请求的作业没有
    pub fn idempotency_key(&self) -> Option<(&str, DateTime<Utc>)> {
        self.schedef_id
            .as_deref()
            .map(|schedef_id| (schedef_id, self.schedule_time))
    }

    /// `SCHEDULE → RUNNING`
    pub fn start(&mut self, now: DateTime<Utc>, expected_version: i64) -> SchedulerResult<()> {
        self.check_transition(expected_version, "start", &[JobStatus::Schedule])?;
        if now < self.schedule_time {
            return Err(self.ineligible(format!(
                "尚未到达调度时间 {}",
                self.schedule_time.to_rfc3339()
            )));
        }
        if now >= self.limit_time {
            return Err(self.ineligible(format!(
                "已超过截止时间 {}",
                self.limit_time.to_rfc3339()
            )));
        }
        self.status = JobStatus::Running;
        self.begin_time = Some(now);
        self.version += 1;
        Ok(())
    }

    /// `RUNNING → SUCCESS | FAILURE`，与截止时间无关
    pub fn finish(
        &mut self,
        now: DateTime<Utc>,
        expected_version: i64,
        outcome: JobOutcome,
        messages: Vec<String>,
    ) -> SchedulerResult<()> {
        self.check_transition(expected_version, "finish", &[JobStatus::Running])?;
        self.status = outcome.into();
        self.end_time = Some(now);
        self.result_messages = Some(messages);
        self.version += 1;
        Ok(())
    }

    pub fn succeed(
        &mut self,
        now: DateTime<Utc>,
        expected_version: i64,
        messages: Vec<String>,
    ) -> SchedulerResult<()> {
        self.finish(now, expected_version, JobOutcome::Success, messages)
    }

    pub fn fail(
        &mut self,
        now: DateTime<Utc>,
        expected_version: i64,
        messages: Vec<String>,
    ) -> SchedulerResult<()> {
        self.finish(now, expected_version, JobOutcome::Failure, messages)
    }

    /// `SCHEDULE | RUNNING → ABORT`，只在截止时间之后允许
    pub fn abort(
        &mut self,
        now: DateTime<Utc>,
        expected_version: i64,
        reason: Option<String>,
    ) -> SchedulerResult<()> {
        self.check_transition(
            expected_version,
            "abort",
            &[JobStatus::Schedule, JobStatus::Running],
        )?;
        if now < self.limit_time {
            return Err(self.ineligible(format!(
                "尚未到达截止时间 {}",
                self.limit_time.to_rfc3339()
            )));
        }
        self.status = JobStatus::Abort;
        self.end_time = Some(now);
        if let Some(reason) = reason {
            self.result_messages
                .get_or_insert_with(Vec::new)
                .push(reason);
        }
        self.version += 1;
        Ok(())
    }

    fn check_transition(
        &self,
        expected_version: i64,
        action: &'static str,
        allowed: &[JobStatus],
    ) -> SchedulerResult<()> {
        if expected_version != self.version {
            return Err(SchedulerError::VersionConflict {
                entity: "Job",
                id: self.id.clone(),
                expected: expected_version,
                actual: self.version,
            });
        }
        if self.is_terminal() || !allowed.contains(&self.status) {
            return Err(SchedulerError::InvalidState {
                job_id: self.id.clone(),
                status: self.status.to_string(),
                action,
            });
        }
        Ok(())
    }

    fn ineligible(&self, reason: String) -> SchedulerError {
        SchedulerError::IneligibleTransition {
            job_id: self.id.clone(),
            reason,
        }
    }
}
