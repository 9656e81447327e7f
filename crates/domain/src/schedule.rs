use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use batchsync_errors::{SchedulerError, SchedulerResult, Violation};

use crate::trigger::TriggerRule;
use crate::validation::{check_accuracy, check_not_blank, ensure_valid, nested, Validate};
use crate::validity::ValidityPeriod;

/// 调度优先级：单个字符，越小越靠前
///
/// 同一时刻多个调度定义同时触发时只影响排序，不影响是否触发。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(char);

impl Priority {
    pub fn new(value: char) -> SchedulerResult<Self> {
        let priority = Priority(value);
        ensure_valid(&priority)?;
        Ok(priority)
    }

    pub fn as_char(&self) -> char {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority('5')
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Validate for Priority {
    fn validate(&self) -> Vec<Violation> {
        if self.0.is_ascii_alphanumeric() {
            Vec::new()
        } else {
            vec![Violation::new(
                "priority",
                format!("优先级必须是单个ASCII字母或数字, 实际为 {:?}", self.0),
            )]
        }
    }
}

impl Serialize for Priority {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Priority(c)),
            _ => Err(de::Error::custom(format!(
                "优先级必须是单个字符, 实际为 {text:?}"
            ))),
        }
    }
}

/// 登记与更新审计信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    pub registered_at: DateTime<Utc>,
    pub registered_by: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl Audit {
    pub fn registered<S: Into<String>>(by: S, at: DateTime<Utc>) -> Self {
        let by = by.into();
        Self {
            registered_at: at,
            registered_by: by.clone(),
            updated_at: at,
            updated_by: by,
        }
    }

    pub fn touched<S: Into<String>>(&self, by: S, at: DateTime<Utc>) -> Self {
        Self {
            registered_at: self.registered_at,
            registered_by: self.registered_by.clone(),
            updated_at: at,
            updated_by: by.into(),
        }
    }
}

impl Validate for Audit {
    fn validate(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        check_accuracy("registeredAt", &self.registered_at, &mut out);
        check_accuracy("updatedAt", &self.updated_at, &mut out);
        check_not_blank("registeredBy", &self.registered_by, &mut out);
        check_not_blank("updatedBy", &self.updated_by, &mut out);
        if self.updated_at < self.registered_at {
            out.push(Violation::new("updatedAt", "更新时间不能早于登记时间"));
        }
        out
    }
}

/// 调度定义：把触发规则绑定到作业定义
///
/// 构造后不可变，修改通过 [`ScheduleDefinition::revise`] 生成新版本。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDefinition {
    pub id: String,
    pub jobdef_id: String,
    #[serde(default)]
    pub priority: Priority,
    pub trigger: TriggerRule,
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

impl ScheduleDefinition {
    pub fn new<I: Into<String>, J: Into<String>>(
        id: I,
        jobdef_id: J,
        priority: Priority,
        trigger: TriggerRule,
        validity_period: ValidityPeriod,
        audit: Audit,
    ) -> SchedulerResult<Self> {
        let schedef = Self {
            id: id.into(),
            jobdef_id: jobdef_id.into(),
            priority,
            trigger,
            validity_period,
            version: initial_version(),
            audit,
            note: None,
        };
        ensure_valid(&schedef)?;
        Ok(schedef)
    }

    /// 解码并校验外部输入
    pub fn parse(value: Value) -> SchedulerResult<Self> {
        let schedef: Self = serde_json::from_value(value)
            .map_err(|e| SchedulerError::validation("scheduleDefinition", e.to_string()))?;
        ensure_valid(&schedef)?;
        Ok(schedef)
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }

    /// 生成下一个版本；原值保持不变
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

    /// 在给定时刻是否生效
    pub fn is_effective_at(&self, instant: DateTime<Utc>) -> bool {
        self.validity_period.contains(instant)
    }
}

impl Validate for ScheduleDefinition {
    fn validate(&self) -> Vec<Violation> {
        let mut out = Vec::new();
        check_not_blank("id", &self.id, &mut out);
        check_not_blank("jobdefId", &self.jobdef_id, &mut out);
        out.extend(self.priority.validate());
        out.extend(nested("trigger", self.trigger.validate()));
        out.extend(nested("validityPeriod", self.validity_period.validate()));
        out.extend(nested("audit", self.audit.validate()));
        if self.version < 1 {
            out.push(Violation::new("version", "版本号必须从 1 开始"));
        }
        out
    }
}
