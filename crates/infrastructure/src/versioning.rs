//! Optimistic version checks shared by all repository backends

use chrono::{DateTime, Utc};

use batchsync_errors::{SchedulerError, SchedulerResult};

/// Identifier reported when a second job is created for the same occurrence
pub(crate) fn occurrence_key(schedef_id: &str, schedule_time: DateTime<Utc>) -> String {
    format!("{schedef_id}@{}", schedule_time.to_rfc3339())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entity {
    ScheduleDefinition,
    JobDefinition,
    Job,
}

impl Entity {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Entity::ScheduleDefinition => "ScheduleDefinition",
            Entity::JobDefinition => "JobDefinition",
            Entity::Job => "Job",
        }
    }

    pub(crate) fn not_found(self, id: &str) -> SchedulerError {
        match self {
            Entity::ScheduleDefinition => SchedulerError::schedef_not_found(id),
            Entity::JobDefinition => SchedulerError::jobdef_not_found(id),
            Entity::Job => SchedulerError::job_not_found(id),
        }
    }

    pub(crate) fn already_exists(self, id: &str) -> SchedulerError {
        SchedulerError::AlreadyExists {
            entity: self.name(),
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(self, id: &str, expected: i64, actual: i64) -> SchedulerError {
        SchedulerError::VersionConflict {
            entity: self.name(),
            id: id.to_string(),
            expected,
            actual,
        }
    }

    /// `expected == None` inserts, otherwise the stored version must match
    pub(crate) fn check_save(
        self,
        id: &str,
        stored: Option<i64>,
        expected: Option<i64>,
    ) -> SchedulerResult<()> {
        match (stored, expected) {
            (None, None) => Ok(()),
            (Some(_), None) => Err(self.already_exists(id)),
            (None, Some(_)) => Err(self.not_found(id)),
            (Some(actual), Some(expected)) if actual != expected => {
                Err(self.conflict(id, expected, actual))
            }
            (Some(_), Some(_)) => Ok(()),
        }
    }
}
