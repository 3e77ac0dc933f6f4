//! Rule tests attached to form fields
//!
//! A field may carry a `conditional` test (the field only applies when the
//! test passes) and a list of `rules`, each with a `test` and a `set` of
//! properties that take effect when the test passes.

use crate::{FormError, FormResult};
use serde_json::{Map, Value};

/// Comparison applied by a rule test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Condition {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Filled,
    NotFilled,
}

impl Condition {
    pub fn from_name(name: &str) -> FormResult<Self> {
        match name.to_ascii_uppercase().as_str() {
            "EQUALS" => Ok(Condition::Equals),
            "NOT_EQUALS" => Ok(Condition::NotEquals),
            "GREATER_THAN" => Ok(Condition::GreaterThan),
            "LESS_THAN" => Ok(Condition::LessThan),
            "FILLED" => Ok(Condition::Filled),
            "NOT_FILLED" => Ok(Condition::NotFilled),
            other => Err(FormError::InvalidSchema(format!("Unknown condition: {}", other))),
        }
    }

    /// Compare the expected value of a test with the submitted value
    pub fn assert(&self, expected: &Value, actual: Option<&Value>) -> bool {
        let actual = actual.unwrap_or(&Value::Null);
        match self {
            Condition::Equals => loosely_equal(expected, actual),
            Condition::NotEquals => !loosely_equal(expected, actual),
            Condition::GreaterThan => match (as_number(actual), as_number(expected)) {
                (Some(a), Some(e)) => a > e,
                _ => false,
            },
            Condition::LessThan => match (as_number(actual), as_number(expected)) {
                (Some(a), Some(e)) => a < e,
                _ => false,
            },
            Condition::Filled => !is_empty_value(actual),
            Condition::NotFilled => is_empty_value(actual),
        }
    }
}

/// `{ "key": ..., "condition": ..., "value": ... }`
#[derive(Clone, Debug, PartialEq)]
pub struct RuleTest {
    pub key: String,
    pub condition: Condition,
    pub value: Value,
}

impl RuleTest {
    pub fn from_value(value: &Value) -> FormResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| FormError::InvalidSchema("rule test must be an object".into()))?;
        let key = obj
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| FormError::InvalidSchema("rule test has no key".into()))?;
        let condition = obj
            .get("condition")
            .and_then(Value::as_str)
            .ok_or_else(|| FormError::InvalidSchema(format!("rule test on {} has no condition", key)))?;
        Ok(Self {
            key: key.to_string(),
            condition: Condition::from_name(condition)?,
            value: obj.get("value").cloned().unwrap_or(Value::Null),
        })
    }

    /// Evaluate against a lookup of submitted values
    pub fn passes<'a>(&self, lookup: impl Fn(&str) -> Option<&'a Value>) -> bool {
        self.condition.assert(&self.value, lookup(&self.key))
    }
}

/// A field rule: properties in `set` apply while `test` passes
#[derive(Clone, Debug, PartialEq)]
pub struct FieldRule {
    pub test: Option<RuleTest>,
    pub set: Map<String, Value>,
}

impl FieldRule {
    pub fn from_value(value: &Value) -> FormResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| FormError::InvalidSchema("field rule must be an object".into()))?;
        let test = match obj.get("test") {
            Some(Value::Null) | None => None,
            Some(t) => Some(RuleTest::from_value(t)?),
        };
        let set = obj
            .get("set")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Ok(Self { test, set })
    }
}

// ── Value helpers ────────────────────────────────────────────────────

/// Null, false, empty string, empty array and empty object are empty.
/// `"0"` and `0` are values.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Number(_) => false,
    }
}

/// Loose truthiness of a schema flag
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Scalar rendering used for comparisons and choice keys
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn loosely_equal(expected: &Value, actual: &Value) -> bool {
    match (as_number(expected), as_number(actual)) {
        (Some(e), Some(a)) => e == a,
        _ => value_to_string(expected) == value_to_string(actual),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_condition_names() {
        assert_eq!(Condition::from_name("EQUALS").unwrap(), Condition::Equals);
        assert_eq!(Condition::from_name("not_filled").unwrap(), Condition::NotFilled);
        assert!(Condition::from_name("MATCHES").is_err());
    }

    #[test]
    fn test_equals_is_loose() {
        assert!(Condition::Equals.assert(&json!("yes"), Some(&json!("yes"))));
        assert!(Condition::Equals.assert(&json!("5"), Some(&json!(5))));
        assert!(!Condition::Equals.assert(&json!("yes"), None));
        assert!(Condition::NotEquals.assert(&json!("yes"), Some(&json!("no"))));
    }

    #[test]
    fn test_numeric_comparisons() {
        assert!(Condition::GreaterThan.assert(&json!(100), Some(&json!("250"))));
        assert!(!Condition::GreaterThan.assert(&json!(100), Some(&json!("abc"))));
        assert!(Condition::LessThan.assert(&json!("10"), Some(&json!(2.5))));
    }

    #[test]
    fn test_filled() {
        assert!(Condition::Filled.assert(&Value::Null, Some(&json!("0"))));
        assert!(Condition::NotFilled.assert(&Value::Null, Some(&json!(""))));
        assert!(Condition::NotFilled.assert(&Value::Null, None));
    }

    #[test]
    fn test_empty_values() {
        for v in [json!(null), json!(false), json!(""), json!([]), json!({})] {
            assert!(is_empty_value(&v), "{} should be empty", v);
        }
        for v in [json!("0"), json!(0), json!(true), json!("a"), json!([0])] {
            assert!(!is_empty_value(&v), "{} should not be empty", v);
        }
    }

    #[test]
    fn test_parse_rule() {
        let rule = FieldRule::from_value(&json!({
            "test": {"key": "kia", "condition": "EQUALS", "value": "yes"},
            "set": {"required": true}
        }))
        .unwrap();
        let test = rule.test.unwrap();
        assert_eq!(test.key, "kia");
        assert_eq!(test.condition, Condition::Equals);
        assert_eq!(rule.set.get("required"), Some(&json!(true)));

        assert!(RuleTest::from_value(&json!({"condition": "EQUALS"})).is_err());
    }
}
