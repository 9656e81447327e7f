use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use batchsync_errors::{SchedulerError, SchedulerResult};

use crate::clock::Clock;
use crate::job::{Job, JobStatus};
use crate::jobdef::JobDefinition;
use crate::request::JobCreationRequest;
use crate::schedule::ScheduleDefinition;
use crate::validation::ensure_valid;

/// 作业工厂
///
/// 合并作业定义、可选的调度定义和请求覆盖，生成 `SCHEDULE` 状态的新作业：
///
/// - `scheduleTime` 取请求值，否则取触发时刻，否则取当前时间
/// - `timeout` 取请求值，否则取作业定义值；`limitTime = scheduleTime + timeout`
/// - `jobProperties` 以请求的顶层键覆盖作业定义的同名键
#[derive(Debug, Clone)]
pub struct JobFactory {
    clock: Arc<dyn Clock>,
}

impl JobFactory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn create(
        &self,
        jobdef: &JobDefinition,
        schedef: Option<&ScheduleDefinition>,
        occurrence_time: Option<DateTime<Utc>>,
        request: Option<&JobCreationRequest>,
    ) -> SchedulerResult<Job> {
        if let Some(request) = request {
            ensure_valid(request)?;
            if request.jobdef_id != jobdef.id {
                return Err(SchedulerError::validation(
                    "jobdefId",
                    format!(
                        "请求的作业定义 {} 与实际作业定义 {} 不一致",
                        request.jobdef_id, jobdef.id
                    ),
                ));
            }
        }
        if let Some(schedef) = schedef {
            if schedef.jobdef_id != jobdef.id {
                return Err(SchedulerError::validation(
                    "schedef.jobdefId",
                    format!(
                        "调度定义 {} 指向作业定义 {}, 而不是 {}",
                        schedef.id, schedef.jobdef_id, jobdef.id
                    ),
                ));
            }
        }

        let schedule_time = request
            .and_then(|r| r.schedule_time)
            .or(occurrence_time)
            .unwrap_or_else(|| self.clock.now());
        let timeout = request.and_then(|r| r.timeout).unwrap_or(jobdef.timeout);
        let limit_time = schedule_time.checked_add_signed(timeout).ok_or_else(|| {
            SchedulerError::validation("timeout", "截止时间超出可表示范围")
        })?;

        let plugin_name = request
            .and_then(|r| r.plugin_name.clone())
            .or_else(|| jobdef.plugin_name.clone());
        let trnsdef = request
            .and_then(|r| r.transform_def.clone())
            .or_else(|| jobdef.transform_def.clone());
        let filtdef = request
            .and_then(|r| r.filter_def.clone())
            .or_else(|| jobdef.filter_def.clone());

        let mut properties = jobdef.job_properties.clone();
        if let Some(overrides) = request.and_then(|r| r.job_properties.as_ref()) {
            for (key, value) in overrides {
                properties.insert(key.clone(), value.clone());
            }
        }

        Ok(Job {
            id: Uuid::new_v4().to_string(),
            status: JobStatus::Schedule,
            kind: jobdef.job_kind,
            target: jobdef.job_target,
            schedule_time,
            limit_time,
            begin_time: None,
            end_time: None,
            plugin_name,
            trnsdef,
            filtdef,
            properties,
            jobdef_id: jobdef.id.clone(),
            jobdef: jobdef.clone(),
            schedef_id: schedef.map(|s| s.id.clone()),
            schedef: schedef.cloned(),
            result_messages: None,
            version: 1,
        })
    }

    /// 调度触发的作业
    pub fn create_scheduled(
        &self,
        jobdef: &JobDefinition,
        schedef: &ScheduleDefinition,
        occurrence_time: DateTime<Utc>,
    ) -> SchedulerResult<Job> {
        self.create(jobdef, Some(schedef), Some(occurrence_time), None)
    }

    /// 手工请求的作业，不关联调度定义
    pub fn create_requested(
        &self,
        jobdef: &JobDefinition,
        request: &JobCreationRequest,
    ) -> SchedulerResult<Job> {
        self.create(jobdef, None, None, Some(request))
    }
}
