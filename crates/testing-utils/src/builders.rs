//! Test data builders
//!
//! Builders assemble records directly, without validation, so tests can also produce
//! deliberately invalid data.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use batchsync_domain::{
    Audit, CancelTrigger, ContentKind, DaysTrigger, Job, JobDefinition, JobKind, JobStatus,
    OnceTrigger, Priority, ScheduleDefinition, TriggerRule, ValidityPeriod,
};

use crate::helpers::utc;

fn test_audit() -> Audit {
    Audit::registered("test", utc(2024, 1, 1, 0, 0, 0))
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Builder for creating test JobDefinition records
pub struct JobDefinitionBuilder {
    jobdef: JobDefinition,
}

impl JobDefinitionBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            jobdef: JobDefinition {
                id: id.to_string(),
                job_kind: JobKind::Import,
                job_target: ContentKind::User,
                timeout: Duration::hours(1),
                plugin_name: None,
                transform_def: None,
                filter_def: None,
                job_properties: Map::new(),
                validity_period: ValidityPeriod::default(),
                version: 1,
                audit: test_audit(),
                note: None,
            },
        }
    }

    pub fn with_kind(mut self, job_kind: JobKind, job_target: ContentKind) -> Self {
        self.jobdef.job_kind = job_kind;
        self.jobdef.job_target = job_target;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.jobdef.timeout = timeout;
        self
    }

    pub fn with_plugin(mut self, plugin_name: &str) -> Self {
        self.jobdef.plugin_name = Some(plugin_name.to_string());
        self
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.jobdef.job_properties = object(properties);
        self
    }

    pub fn with_validity(mut self, validity_period: ValidityPeriod) -> Self {
        self.jobdef.validity_period = validity_period;
        self
    }

    pub fn build(self) -> JobDefinition {
        self.jobdef
    }
}

/// Builder for creating test ScheduleDefinition records
pub struct ScheduleDefinitionBuilder {
    schedef: ScheduleDefinition,
}

impl ScheduleDefinitionBuilder {
    /// Defaults to a daily trigger at 07:00
    pub fn new(id: &str, jobdef_id: &str) -> Self {
        Self {
            schedef: ScheduleDefinition {
                id: id.to_string(),
                jobdef_id: jobdef_id.to_string(),
                priority: Priority::default(),
                trigger: TriggerRule::Days(DaysTrigger {
                    anchor_time: utc(2024, 1, 1, 7, 0, 0),
                    months: Default::default(),
                    days: Default::default(),
                }),
                validity_period: ValidityPeriod::default(),
                version: 1,
                audit: test_audit(),
                note: None,
            },
        }
    }

    pub fn with_trigger(mut self, trigger: TriggerRule) -> Self {
        self.schedef.trigger = trigger;
        self
    }

    pub fn once_at(self, anchor_time: DateTime<Utc>) -> Self {
        self.with_trigger(TriggerRule::Once(OnceTrigger { anchor_time }))
    }

    pub fn cancel(self, anchor_time: DateTime<Utc>, duration: Duration) -> Self {
        self.with_trigger(TriggerRule::Cancel(CancelTrigger {
            anchor_time,
            duration,
        }))
    }

    pub fn with_priority(mut self, priority: char) -> Self {
        self.schedef.priority = Priority::new(priority).expect("valid test priority");
        self
    }

    pub fn with_validity(mut self, validity_period: ValidityPeriod) -> Self {
        self.schedef.validity_period = validity_period;
        self
    }

    pub fn ignored(mut self) -> Self {
        self.schedef.validity_period.ignored = true;
        self
    }

    pub fn build(self) -> ScheduleDefinition {
        self.schedef
    }
}

/// Builder for creating test Job records
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    /// A `SCHEDULE` job for `jobdef` with limit time derived from the jobdef timeout
    pub fn new(jobdef: &JobDefinition, schedule_time: DateTime<Utc>) -> Self {
        Self {
            job: Job {
                id: uuid::Uuid::new_v4().to_string(),
                status: JobStatus::Schedule,
                kind: jobdef.job_kind,
                target: jobdef.job_target,
                schedule_time,
                limit_time: schedule_time + jobdef.timeout,
                begin_time: None,
                end_time: None,
                plugin_name: jobdef.plugin_name.clone(),
                trnsdef: jobdef.transform_def.clone(),
                filtdef: jobdef.filter_def.clone(),
                properties: jobdef.job_properties.clone(),
                jobdef_id: jobdef.id.clone(),
                jobdef: jobdef.clone(),
                schedef_id: None,
                schedef: None,
                result_messages: None,
                version: 1,
            },
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.job.id = id.to_string();
        self
    }

    pub fn for_schedef(mut self, schedef: &ScheduleDefinition) -> Self {
        self.job.schedef_id = Some(schedef.id.clone());
        self.job.schedef = Some(schedef.clone());
        self
    }

    pub fn with_limit_time(mut self, limit_time: DateTime<Utc>) -> Self {
        self.job.limit_time = limit_time;
        self
    }

    /// Mark as `RUNNING` since `begin_time`, bumping the version like a real transition
    pub fn running(mut self, begin_time: DateTime<Utc>) -> Self {
        self.job.status = JobStatus::Running;
        self.job.begin_time = Some(begin_time);
        self.job.version += 1;
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.job.status = status;
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}
