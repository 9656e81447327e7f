use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use batchsync_errors::{SchedulerError, SchedulerResult, Violation};

use crate::jobdef::{check_filter_def, check_plugin_name, check_timeout, check_transform_def};
use crate::time::iso_duration;
use crate::validation::{check_accuracy, check_not_blank, ensure_valid, Validate};

/// 作业创建请求：对作业定义的可选覆盖
///
/// 只在构造作业时使用，不单独持久化。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreationRequest {
    pub jobdef_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_time: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "iso_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    #[serde(default, rename = "trnsdef", skip_serializing_if = "Option::is_none")]
    pub transform_def: Option<BTreeMap<String, String>>,
    #[serde(default, rename = "filtdef", skip_serializing_if = "Option::is_none")]
    pub filter_def: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_properties: Option<Map<String, Value>>,
}

impl JobCreationRequest {
    pub fn new<S: Into<String>>(jobdef_id: S) -> Self {
        Self {
            jobdef_id: jobdef_id.into(),
            ..Default::default()
        }
    }

    pub fn parse(value: Value) -> SchedulerResult<Self> {
        let request: Self = serde_json::from_value(value)
            .map_err(|e| SchedulerError::validation("jobCreationRequest", e.to_string()))?;
        ensure_valid(&request)?;
        Ok(request)
    }

    pub fn with_schedule_time(mut self, schedule_time: DateTime<Utc>) -> Self {
        self.schedule_time = Some(schedule_time);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_plugin_name<S: Into<String>>(mut self, plugin_name: S) -> Self {
        self.plugin_name = Some(plugin_name.into());
        self
    }

    pub fn with_transform_def(mut self, transform_def: BTreeMap<String, String>) -> Self {
        self.transform_def = Some(transform_def);
        self
    }

    pub fn with_filter_def(mut self, filter_def: Value) -> Self {
        self.filter_def = Some(filter_def);
        self
    }

    pub fn with_job_properties(mut self, properties: Map<String, Value>) -> Self {
        self.job_properties = Some(properties);
        self
    }
}

impl Validate for JobCreationRequest {
    fn validate(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        check_not_blank("jobdefId", &self.jobdef_id, &mut out);
        if let Some(schedule_time) = &self.schedule_time {
            check_accuracy("scheduleTime", schedule_time, &mut out);
        }
        if let Some(timeout) = &self.timeout {
            check_timeout("timeout", timeout, &mut out);
        }
        check_plugin_name("pluginName", self.plugin_name.as_ref(), &mut out);
        check_transform_def("trnsdef", self.transform_def.as_ref(), &mut out);
        check_filter_def("filtdef", self.filter_def.as_ref(), &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_request() {
        let request = JobCreationRequest::parse(json!({
            "jobdefId": "import-users",
            "scheduleTime": "2024-01-01T00:00:00Z",
            "timeout": "PT30M",
            "pluginName": "csv",
            "trnsdef": {"name": "upper(name)"},
            "filtdef": {"op": "eq", "field": "dept", "value": "sales"},
            "jobProperties": {"limitOfDeletion": 10}
        }))
        .unwrap();

        assert_eq!(request.timeout, Some(Duration::minutes(30)));
        assert_eq!(request.plugin_name.as_deref(), Some("csv"));
        assert_eq!(request.transform_def.unwrap()["name"], "upper(name)");
        assert!(request.filter_def.is_some());
        assert_eq!(request.job_properties.unwrap()["limitOfDeletion"], json!(10));
    }

    #[test]
    fn test_parse_minimal_request() {
        let request = JobCreationRequest::parse(json!({"jobdefId": "x"})).unwrap();
        assert_eq!(request, JobCreationRequest::new("x"));
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"jobdefId": "x"}));
    }

    #[test]
    fn test_rejects_invalid_overrides() {
        let err = JobCreationRequest::parse(json!({
            "jobdefId": "x",
            "scheduleTime": "2024-01-01T00:00:00.500Z",
            "timeout": "PT25H",
            "filtdef": "dept = sales"
        }))
        .unwrap_err();
        let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["scheduleTime", "timeout", "filtdef"]);

        assert!(JobCreationRequest::parse(json!({"jobdefId": "x", "timeout": "1 hour"})).is_err());
        assert!(JobCreationRequest::parse(json!({"scheduleTime": "2024-01-01T00:00:00Z"})).is_err());
    }
}
