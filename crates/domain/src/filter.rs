use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 过滤条件
///
/// 条件的语法树由外部求值器解释，这里只负责携带。空条件等价于"总是为真"。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterCondition(Option<Value>);

impl FilterCondition {
    pub fn always() -> Self {
        Self(None)
    }

    /// `null`、空对象和非对象值都视为空条件
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) if !map.is_empty() => Self(Some(value.clone())),
            _ => Self::always(),
        }
    }

    pub fn is_always(&self) -> bool {
        self.0.is_none()
    }

    pub fn expression(&self) -> Option<&Value> {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_conditions_are_always_true() {
        assert!(FilterCondition::always().is_always());
        assert!(FilterCondition::from_value(&json!(null)).is_always());
        assert!(FilterCondition::from_value(&json!({})).is_always());
        assert!(FilterCondition::from_value(&json!("x")).is_always());

        let condition = FilterCondition::from_value(&json!({"op": "eq"}));
        assert!(!condition.is_always());
        assert_eq!(condition.expression(), Some(&json!({"op": "eq"})));
    }
}
