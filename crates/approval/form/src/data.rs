//! Submitted form data: a flat JSON object of field key to value

use crate::{
    check_depth, is_empty_value, FormError, FormLimits, FormResult, FormSchema, FormSchemaField,
};
use crate::condition::truthy;
use approval_types::Formview;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

const MALICIOUS: &str = "Malicious form data detected";

/// Field values submitted for an application
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormData {
    data: Map<String, Value>,
}

impl FormData {
    pub fn create_empty() -> Self {
        Self::default()
    }

    pub fn from_map(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// Parse with the default nesting limit
    pub fn from_json(json: &str) -> FormResult<Self> {
        Self::parse(json, &FormLimits::default())
    }

    /// Parse submitted JSON. Only a bare JSON object is accepted; trailing
    /// line breaks are ignored, any other surrounding text is rejected.
    pub fn parse(json: &str, limits: &FormLimits) -> FormResult<Self> {
        let json = json.trim_end_matches(['\r', '\n']);
        if json.is_empty() {
            return Err(FormError::malicious("no data"));
        }
        if !json.starts_with('{') || !json.ends_with('}') {
            return Err(FormError::malicious(MALICIOUS));
        }
        let value: Value = serde_json::from_str(json).map_err(|e| {
            tracing::warn!(error = %e, "rejected form data");
            FormError::malicious(MALICIOUS)
        })?;
        check_depth(&value, limits.max_data_depth).map_err(|_| FormError::malicious(MALICIOUS))?;
        match value {
            Value::Object(data) => Ok(Self { data }),
            _ => Err(FormError::malicious(MALICIOUS)),
        }
    }

    pub fn to_json(&self) -> String {
        Value::Object(self.data.clone()).to_string()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when the key is present, even with a null value
    pub fn has_value(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// The stored value (possibly null) or `default` when the key is absent
    pub fn value_or(&self, key: &str, default: Option<&Value>) -> Value {
        match self.data.get(key) {
            Some(v) => v.clone(),
            None => default.cloned().unwrap_or(Value::Null),
        }
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Keep only the keys that have a formview
    pub fn filter_field_keys(&self, formviews: &[Formview]) -> Self {
        let data = self
            .data
            .iter()
            .filter(|(k, _)| formviews.iter().any(|f| &f.field_key == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { data }
    }

    /// Merge `other` over this data; keys present in both take `other`'s value
    pub fn concat(&self, other: &FormData) -> Self {
        let mut data = self.data.clone();
        for (k, v) in &other.data {
            data.insert(k.clone(), v.clone());
        }
        Self { data }
    }

    /// One entry per schema field, taken from this data. Missing values are
    /// null, or the schema default when `set_default` is set.
    pub fn apply_form_schema(&self, schema: &FormSchema, set_default: bool) -> Self {
        let data = schema
            .fields()
            .into_iter()
            .map(|field| {
                let default = if set_default {
                    field.default_value()
                } else {
                    None
                };
                (field.key().to_string(), self.value_or(field.key(), default))
            })
            .collect();
        Self { data }
    }

    // ── Readiness ────────────────────────────────────────────────────

    /// Check the data can be submitted at a stage with the given formviews.
    ///
    /// Every key must have a formview, and every field that is required
    /// (after evaluating hidden flags, conditionals and rules) must be
    /// filled.
    pub fn check_readiness(&self, formviews: &[Formview], schema: &FormSchema) -> FormResult<()> {
        let invalid: Vec<&str> = self
            .keys()
            .filter(|k| !formviews.iter().any(|f| f.field_key == *k))
            .collect();
        if !invalid.is_empty() {
            return Err(FormError::malicious(format!(
                "Invalid field(s): {}",
                invalid.join(" ")
            )));
        }

        let mut missing = Vec::new();
        for formview in formviews.iter().filter(|f| f.active) {
            let field = schema.field(&formview.field_key);
            if self.field_is_required(formview, field.as_ref())? {
                let filled = self
                    .get_value(&formview.field_key)
                    .map(|v| !is_empty_value(v))
                    .unwrap_or(false);
                if !filled {
                    missing.push(formview.field_key.as_str());
                }
            }
        }
        if !missing.is_empty() {
            return Err(FormError::malicious(format!(
                "Required field(s) are not set: {}",
                missing.join(" ")
            )));
        }
        Ok(())
    }

    /// Whether a field must be filled, given the values in this data
    pub fn field_is_required(
        &self,
        formview: &Formview,
        field: Option<&FormSchemaField<'_>>,
    ) -> FormResult<bool> {
        let mut required = formview.required;
        let Some(field) = field else {
            return Ok(required);
        };

        if field.hidden() {
            return Ok(false);
        }
        if let Some(test) = field.conditional()? {
            if !test.passes(|k| self.get_value(k)) {
                return Ok(false);
            }
        }
        for rule in field.rules()? {
            let sets_visibility = rule.set.contains_key("required") || rule.set.contains_key("hidden");
            let Some(test) = rule.test.as_ref() else {
                continue;
            };
            if sets_visibility && test.passes(|k| self.get_value(k)) {
                if rule.set.get("hidden").map(truthy).unwrap_or(false) {
                    return Ok(false);
                }
                if rule.set.get("required").map(truthy).unwrap_or(false) {
                    required = true;
                }
            }
        }
        Ok(required)
    }
}

impl Serialize for FormData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}
