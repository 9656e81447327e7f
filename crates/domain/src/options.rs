//! 作业选项视图
//!
//! 对作业属性对象的只读访问器。缺失或格式错误的值一律回落到默认值，不视为错误。

use chrono::Duration;
use serde_json::{Map, Value};

use crate::filter::FilterCondition;
use crate::job::Job;
use crate::time::iso_duration;

const ALLOW_IMPLICIT_DELETION: &str = "allowImplicitDeletion";
const CONTAIN_ADDITION: &str = "containAddition";
const CONTAIN_UPDATE: &str = "containUpdate";
const CONTAIN_DELETION: &str = "containDeletion";
const CONTAIN_UNCHANGING: &str = "containUnchanging";
const LIMIT_OF_DELETION: &str = "limitOfDeletion";
const CONDITION_OF_IMPLICIT_DELETION: &str = "conditionOfImplicitDeletion";
const PERIOD_OF_UNTIL_DELETION: &str = "periodOfUntilDeletion";

#[derive(Debug, Clone, Copy)]
pub struct JobOptions<'a> {
    properties: &'a Map<String, Value>,
}

impl<'a> JobOptions<'a> {
    pub fn new(properties: &'a Map<String, Value>) -> Self {
        Self { properties }
    }

    pub fn of_job(job: &'a Job) -> Self {
        Self::new(&job.properties)
    }

    pub fn allow_implicit_deletion(&self) -> bool {
        self.flag(ALLOW_IMPLICIT_DELETION, false)
    }

    pub fn contain_addition(&self) -> bool {
        self.flag(CONTAIN_ADDITION, true)
    }

    pub fn contain_update(&self) -> bool {
        self.flag(CONTAIN_UPDATE, true)
    }

    pub fn contain_deletion(&self) -> bool {
        self.flag(CONTAIN_DELETION, false)
    }

    pub fn contain_unchanging(&self) -> bool {
        self.flag(CONTAIN_UNCHANGING, false)
    }

    /// 单次作业允许删除的最大条数，默认不限
    pub fn limit_of_deletion(&self) -> u64 {
        self.properties
            .get(LIMIT_OF_DELETION)
            .and_then(Value::as_u64)
            .unwrap_or(u64::MAX)
    }

    pub fn condition_of_implicit_deletion(&self) -> FilterCondition {
        self.properties
            .get(CONDITION_OF_IMPLICIT_DELETION)
            .map(FilterCondition::from_value)
            .unwrap_or_else(FilterCondition::always)
    }

    /// 隐式删除前的宽限期；接受 ISO-8601 时长或整数秒
    pub fn period_of_until_deletion(&self) -> Duration {
        let period = match self.properties.get(PERIOD_OF_UNTIL_DELETION) {
            Some(Value::String(text)) => iso_duration::parse(text).ok(),
            Some(Value::Number(number)) => number.as_i64().and_then(Duration::try_seconds),
            _ => None,
        };
        period
            .filter(|period| *period >= Duration::zero())
            .unwrap_or_else(Duration::zero)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.properties
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options_of(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_defaults_over_empty_properties() {
        let properties = Map::new();
        let options = JobOptions::new(&properties);

        assert!(!options.allow_implicit_deletion());
        assert!(options.contain_addition());
        assert!(options.contain_update());
        assert!(!options.contain_deletion());
        assert!(!options.contain_unchanging());
        assert_eq!(options.limit_of_deletion(), u64::MAX);
        assert!(options.condition_of_implicit_deletion().is_always());
        assert_eq!(options.period_of_until_deletion(), Duration::zero());
    }

    #[test]
    fn test_reads_explicit_values() {
        let properties = options_of(json!({
            "allowImplicitDeletion": true,
            "containAddition": false,
            "containDeletion": true,
            "limitOfDeletion": 100,
            "conditionOfImplicitDeletion": {"op": "eq", "field": "status", "value": "left"},
            "periodOfUntilDeletion": "P7D"
        }));
        let options = JobOptions::new(&properties);

        assert!(options.allow_implicit_deletion());
        assert!(!options.contain_addition());
        assert!(options.contain_deletion());
        assert_eq!(options.limit_of_deletion(), 100);
        assert!(!options.condition_of_implicit_deletion().is_always());
        assert_eq!(options.period_of_until_deletion(), Duration::days(7));

        let properties = options_of(json!({"periodOfUntilDeletion": 3600}));
        assert_eq!(
            JobOptions::new(&properties).period_of_until_deletion(),
            Duration::hours(1)
        );
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let properties = options_of(json!({
            "allowImplicitDeletion": "yes",
            "containAddition": 0,
            "limitOfDeletion": -5,
            "conditionOfImplicitDeletion": [1, 2],
            "periodOfUntilDeletion": "-PT1H"
        }));
        let options = JobOptions::new(&properties);

        assert!(!options.allow_implicit_deletion());
        assert!(options.contain_addition());
        assert_eq!(options.limit_of_deletion(), u64::MAX);
        assert!(options.condition_of_implicit_deletion().is_always());
        assert_eq!(options.period_of_until_deletion(), Duration::zero());

        let properties = options_of(json!({"limitOfDeletion": 2.5, "periodOfUntilDeletion": "soon"}));
        let options = JobOptions::new(&properties);
        assert_eq!(options.limit_of_deletion(), u64::MAX);
        assert_eq!(options.period_of_until_deletion(), Duration::zero());
    }
}
