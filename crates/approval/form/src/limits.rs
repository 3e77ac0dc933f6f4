use crate::{FormError, FormResult};
use serde::{Deserialize, Serialize};

/// Deepest nesting `serde_json` accepts for any document; it refuses a
/// 128th nested container.
pub const MAX_JSON_DEPTH: usize = 127;

/// Parsing limits and field classification for forms
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormLimits {
    /// Maximum nesting depth of submitted form data, at most [`MAX_JSON_DEPTH`]
    pub max_data_depth: usize,
    /// Maximum nesting depth of a form schema, at most [`MAX_JSON_DEPTH`]
    pub max_schema_depth: usize,
    /// Field types that display content but take no response
    pub non_respondable_types: Vec<String>,
}

impl Default for FormLimits {
    fn default() -> Self {
        Self {
            max_data_depth: MAX_JSON_DEPTH,
            max_schema_depth: 32,
            non_respondable_types: vec!["label".into(), "total".into()],
        }
    }
}

impl FormLimits {
    pub fn is_respondable(&self, field_type: Option<&str>) -> bool {
        match field_type {
            Some(t) => !self.non_respondable_types.iter().any(|n| n == t),
            None => true,
        }
    }

    /// Reject depth limits the JSON parser can not honour
    pub fn validate(&self) -> FormResult<()> {
        for (name, limit) in [
            ("max_data_depth", self.max_data_depth),
            ("max_schema_depth", self.max_schema_depth),
        ] {
            if limit == 0 || limit > MAX_JSON_DEPTH {
                return Err(FormError::InvalidLimit(format!(
                    "{} must be between 1 and {}, got {}",
                    name, MAX_JSON_DEPTH, limit
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = FormLimits::default();
        assert_eq!(limits.max_data_depth, MAX_JSON_DEPTH);
        assert_eq!(limits.max_schema_depth, 32);
        assert!(limits.validate().is_ok());
        assert!(!limits.is_respondable(Some("label")));
        assert!(!limits.is_respondable(Some("total")));
        assert!(limits.is_respondable(Some("text")));
        assert!(limits.is_respondable(None));
    }

    #[test]
    fn test_validate_rejects_unparseable_depths() {
        let too_deep = FormLimits {
            max_data_depth: MAX_JSON_DEPTH + 1,
            ..FormLimits::default()
        };
        assert_eq!(
            too_deep.validate().unwrap_err().to_string(),
            "Invalid form limit: max_data_depth must be between 1 and 127, got 128"
        );

        let zero = FormLimits {
            max_schema_depth: 0,
            ..FormLimits::default()
        };
        assert!(matches!(zero.validate(), Err(FormError::InvalidLimit(_))));
    }
}
