use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单条校验违规
///
/// `path` 使用类似 JSON Pointer 的写法（如 `trigger.months[0]`），便于调用方定位字段。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("数据校验失败: {}", join_violations(.violations))]
    Validation { violations: Vec<Violation> },
    #[error("版本冲突: {entity} {id} 期望版本 {expected}, 当前版本 {actual}")]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: i64,
        actual: i64,
    },
    #[error("无效的作业状态: 作业 {job_id} 处于 {status}, 无法执行 {action}")]
    InvalidState {
        job_id: String,
        status: String,
        action: &'static str,
    },
    #[error("作业 {job_id} 当前不满足状态迁移条件: {reason}")]
    IneligibleTransition { job_id: String, reason: String },
    #[error("{entity} 已存在: {id}")]
    AlreadyExists { entity: &'static str, id: String },
    #[error("作业未找到: {id}")]
    JobNotFound { id: String },
    #[error("作业定义未找到: {id}")]
    JobDefinitionNotFound { id: String },
    #[error("调度定义未找到: {id}")]
    ScheduleDefinitionNotFound { id: String },
    #[error("数据库操作错误: {0}")]
    Database(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn validation<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::Validation {
            violations: vec![Violation::new(path, message)],
        }
    }
    pub fn from_violations(violations: Vec<Violation>) -> Self {
        Self::Validation { violations }
    }
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn job_not_found<S: Into<String>>(id: S) -> Self {
        Self::JobNotFound { id: id.into() }
    }
    pub fn jobdef_not_found<S: Into<String>>(id: S) -> Self {
        Self::JobDefinitionNotFound { id: id.into() }
    }
    pub fn schedef_not_found<S: Into<String>>(id: S) -> Self {
        Self::ScheduleDefinitionNotFound { id: id.into() }
    }
    pub fn violations(&self) -> &[Violation] {
        match self {
            SchedulerError::Validation { violations } => violations,
            _ => &[],
        }
    }
    pub fn is_validation(&self) -> bool {
        matches!(self, SchedulerError::Validation { .. })
    }
    /// 状态冲突由调用方决定重新读取后重试或放弃，核心不会自动重试
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            SchedulerError::VersionConflict { .. }
                | SchedulerError::AlreadyExists { .. }
                | SchedulerError::InvalidState { .. }
                | SchedulerError::IneligibleTransition { .. }
        )
    }
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchedulerError::JobNotFound { .. }
                | SchedulerError::JobDefinitionNotFound { .. }
                | SchedulerError::ScheduleDefinitionNotFound { .. }
        )
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SchedulerError::Internal(_) | SchedulerError::Configuration(_)
        )
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for SchedulerError {
    fn from(err: anyhow::Error) -> Self {
        SchedulerError::Internal(err.to_string())
    }
}
