use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use batchsync_errors::{SchedulerError, SchedulerResult, Violation};

use crate::schedule::Audit;
use crate::time::{duration_has_second_accuracy, iso_duration};
use crate::validation::{check_not_blank, ensure_valid, nested, Validate};
use crate::validity::ValidityPeriod;

/// 作业超时上限 23:59:59
pub const MAX_JOB_TIMEOUT_SECONDS: i64 = 24 * 3_600 - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    Import,
    Export,
    Rebuild,
    Archive,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Import => "IMPORT",
            JobKind::Export => "EXPORT",
            JobKind::Rebuild => "REBUILD",
            JobKind::Archive => "ARCHIVE",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 作业处理的内容种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentKind {
    User,
    Organization,
    Group,
    Membership,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::User => "USER",
            ContentKind::Organization => "ORGANIZATION",
            ContentKind::Group => "GROUP",
            ContentKind::Membership => "MEMBERSHIP",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 作业定义：一类作业的静态配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinition {
    pub id: String,
    pub job_kind: JobKind,
    pub job_target: ContentKind,
    #[serde(with = "iso_duration")]
    pub timeout: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_def: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_def: Option<Value>,
    #[serde(default)]
    pub job_properties: Map<String, Value>,
    #[serde(default)]
    pub validity_period: ValidityPeriod,
    #[serde(default = "initial_version")]
    pub version: i64,
    pub audit: Audit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

fn initial_version() -> i64 {
    1
}

impl JobDefinition {
    pub fn new<S: Into<String>>(
        id: S,
        job_kind: JobKind,
        job_target: ContentKind,
        timeout: Duration,
        audit: Audit,
    ) -> SchedulerResult<Self> {
        let jobdef = Self {
            id: id.into(),
            job_kind,
            job_target,
            timeout,
            plugin_name: None,
            transform_def: None,
            filter_def: None,
            job_properties: Map::new(),
            validity_period: ValidityPeriod::default(),
            version: initial_version(),
            audit,
            note: None,
        };
        ensure_valid(&jobdef)?;
        Ok(jobdef)
    }

    pub fn parse(value: Value) -> SchedulerResult<Self> {
        let jobdef: Self = serde_json::from_value(value)
            .map_err(|e| SchedulerError::validation("jobDefinition", e.to_string()))?;
        ensure_valid(&jobdef)?;
        Ok(jobdef)
    }

    pub fn revise<S, F>(&self, updated_by: S, at: DateTime<Utc>, change: F) -> SchedulerResult<Self>
    where
        S: Into<String>,
        F: FnOnce(&mut Self),
    {
        let mut next = self.clone();
        change(&mut next);
        next.id = self.id.clone();
        next.version = self.version + 1;
        next.audit = self.audit.touched(updated_by, at);
        ensure_valid(&next)?;
        Ok(next)
    }

    pub fn is_effective_at(&self, instant: DateTime<Utc>) -> bool {
        self.validity_period.contains(instant)
    }
}

pub(crate) fn check_timeout(path: &str, timeout: &Duration, out: &mut Vec<Violation>) {
    if *timeout < Duration::zero() || timeout.num_seconds() > MAX_JOB_TIMEOUT_SECONDS {
        out.push(Violation::new(
            path,
            format!(
                "超时时间必须在 0..=23:59:59 范围内, 实际为 {}",
                iso_duration::format(timeout)
            ),
        ));
    } else if !duration_has_second_accuracy(timeout) {
        out.push(Violation::new(path, "超时时间精度必须为整秒"));
    }
}

pub(crate) fn check_plugin_name(path: &str, plugin_name: Option<&String>, out: &mut Vec<Violation>) {
    if let Some(name) = plugin_name {
        check_not_blank(path, name, out);
    }
}

pub(crate) fn check_transform_def(
    path: &str,
    transform_def: Option<&BTreeMap<String, String>>,
    out: &mut Vec<Violation>,
) {
    if let Some(def) = transform_def {
        if def.keys().any(|key| key.trim().is_empty()) {
            out.push(Violation::new(path, "转换定义的字段名不能为空"));
        }
    }
}

/// 过滤条件的语法树由外部求值器解释，这里只要求它是 JSON 对象
pub(crate) fn check_filter_def(path: &str, filter_def: Option<&Value>, out: &mut Vec<Violation>) {
    match filter_def {
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(_) => out.push(Violation::new(path, "过滤条件必须是JSON对象")),
    }
}

impl Validate for JobDefinition {
    fn validate(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        check_not_blank("id", &self.id, &mut out);
        check_timeout("timeout", &self.timeout, &mut out);
        check_plugin_name("pluginName", self.plugin_name.as_ref(), &mut out);
        check_transform_def("transformDef", self.transform_def.as_ref(), &mut out);
        check_filter_def("filterDef", self.filter_def.as_ref(), &mut out);
        out.extend(nested("validityPeriod", self.validity_period.validate()));
        out.extend(nested("audit", self.audit.validate()));
        if self.version < 1 {
            out.push(Violation::new("version", "版本号必须从 1 开始"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn audit() -> Audit {
        Audit::registered("operator", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_timeout_bounds() {
        let ok = JobDefinition::new("d", JobKind::Import, ContentKind::User, Duration::zero(), audit());
        assert!(ok.is_ok());

        let max = Duration::seconds(MAX_JOB_TIMEOUT_SECONDS);
        assert!(JobDefinition::new("d", JobKind::Import, ContentKind::User, max, audit()).is_ok());

        let err = JobDefinition::new("d", JobKind::Import, ContentKind::User, Duration::hours(24), audit())
            .unwrap_err();
        assert_eq!(err.violations()[0].path, "timeout");

        assert!(
            JobDefinition::new("d", JobKind::Import, ContentKind::User, Duration::seconds(-1), audit())
                .is_err()
        );
    }

    #[test]
    fn test_parse_json_shape() {
        let jobdef = JobDefinition::parse(json!({
            "id": "import-users",
            "jobKind": "IMPORT",
            "jobTarget": "USER",
            "timeout": "PT1H",
            "pluginName": "ldap",
            "transformDef": {"mail": "lower(mail)"},
            "jobProperties": {"allowImplicitDeletion": true},
            "audit": {
                "registeredAt": "2024-01-01T00:00:00Z", "registeredBy": "api",
                "updatedAt": "2024-01-01T00:00:00Z", "updatedBy": "api"
            }
        }))
        .unwrap();

        assert_eq!(jobdef.job_kind, JobKind::Import);
        assert_eq!(jobdef.job_target, ContentKind::User);
        assert_eq!(jobdef.timeout, Duration::hours(1));
        assert_eq!(jobdef.plugin_name.as_deref(), Some("ldap"));
        assert_eq!(jobdef.job_properties["allowImplicitDeletion"], json!(true));
        assert_eq!(jobdef.version, 1);

        let value = serde_json::to_value(&jobdef).unwrap();
        assert_eq!(value["timeout"], json!("PT1H"));
        assert!(value.get("filterDef").is_none());
    }

    #[test]
    fn test_parse_rejects_unknown_enum_and_bad_fields() {
        let err = JobDefinition::parse(json!({
            "id": "x", "jobKind": "DELETE", "jobTarget": "USER", "timeout": "PT1H",
            "audit": {
                "registeredAt": "2024-01-01T00:00:00Z", "registeredBy": "api",
                "updatedAt": "2024-01-01T00:00:00Z", "updatedBy": "api"
            }
        }))
        .unwrap_err();
        assert!(err.is_validation());

        let err = JobDefinition::parse(json!({
            "id": "x", "jobKind": "EXPORT", "jobTarget": "GROUP", "timeout": "PT1H",
            "pluginName": "  ", "filterDef": [1, 2], "transformDef": {"": "x"},
            "audit": {
                "registeredAt": "2024-01-01T00:00:00Z", "registeredBy": "api",
                "updatedAt": "2024-01-01T00:00:00Z", "updatedBy": "api"
            }
        }))
        .unwrap_err();
        let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["pluginName", "transformDef", "filterDef"]);
    }

    #[test]
    fn test_revise_bumps_version() {
        let jobdef =
            JobDefinition::new("d", JobKind::Rebuild, ContentKind::Group, Duration::minutes(5), audit())
                .unwrap();
        let at = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let next = jobdef
            .revise("admin", at, |d| d.timeout = Duration::minutes(10))
            .unwrap();
        assert_eq!(next.version, 2);
        assert_eq!(next.timeout, Duration::minutes(10));
        assert_eq!(jobdef.timeout, Duration::minutes(5));
        assert!(jobdef
            .revise("admin", at, |d| d.timeout = Duration::days(2))
            .is_err());
    }
}
