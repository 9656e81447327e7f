//! Error mapping for repository operations
//!
//! Converts `sqlx` errors into [`SchedulerError`] with operation context and logs the failure.

use std::fmt;

use batchsync_errors::SchedulerError;
use sqlx::Error as SqlxError;
use tracing::{error, warn};

use crate::versioning::Entity;

/// Operation context for repository operations
#[derive(Debug, Clone, Copy)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Query,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Query => write!(f, "批量查询"),
        }
    }
}

pub(crate) fn is_unique_violation(err: &SqlxError) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

/// Unique violations become [`SchedulerError::AlreadyExists`]; everything else is a database error
pub(crate) fn map_sqlx_error(
    operation: RepositoryOperation,
    entity: Entity,
    id: &str,
    err: SqlxError,
) -> SchedulerError {
    if matches!(operation, RepositoryOperation::Create) && is_unique_violation(&err) {
        warn!(
            entity = entity.name(),
            entity.id = id,
            "{operation}{} 失败: 记录已存在",
            entity.name()
        );
        return entity.already_exists(id);
    }

    error!(
        entity = entity.name(),
        entity.id = id,
        error = %err,
        "{operation}{} 失败",
        entity.name()
    );
    SchedulerError::database_error(format!("{operation}{} {id} 失败: {err}", entity.name()))
}
