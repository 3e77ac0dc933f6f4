//! JSON form schema
//!
//! ```json
//! {
//!   "version": "2021030200",
//!   "fields":   [ { "key": "agency_code", "type": "text", ... } ],
//!   "sections": [ { "key": "A", "label": "...", "line": "...", "fields": [ ... ] } ]
//! }
//! ```
//!
//! Every field is addressed by an index string: `top/<key>` for top-level
//! fields and `<section number>/<key>` for fields inside a section, where
//! the section number is its position in `sections`. Top-level properties
//! other than `fields` and `sections` are carried through untouched.

use crate::condition::{truthy, value_to_string};
use crate::{check_depth, FieldRule, FormError, FormLimits, FormResult, RuleTest};
use approval_types::Formview;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Index string segment used for top-level fields
pub const TOP_SECTION: &str = "top";

#[derive(Clone, Debug, PartialEq)]
struct RawSection {
    /// Section properties, without `fields`
    props: Map<String, Value>,
    fields: Vec<Map<String, Value>>,
}

impl RawSection {
    fn key(&self) -> &str {
        self.props.get("key").and_then(Value::as_str).unwrap_or("")
    }

    fn to_value(&self) -> Value {
        let mut obj = self.props.clone();
        obj.insert(
            "fields".into(),
            Value::Array(self.fields.iter().cloned().map(Value::Object).collect()),
        );
        Value::Object(obj)
    }
}

/// A parsed form schema
#[derive(Clone, Debug, PartialEq)]
pub struct FormSchema {
    props: Map<String, Value>,
    fields: Vec<Map<String, Value>>,
    sections: Vec<RawSection>,
}

impl FormSchema {
    /// Parse with the default nesting limit
    pub fn from_json(json: &str) -> FormResult<Self> {
        Self::parse(json, &FormLimits::default())
    }

    pub fn parse(json: &str, limits: &FormLimits) -> FormResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| FormError::InvalidSchema(format!("not valid JSON: {}", e)))?;
        Self::from_value(value, limits.max_schema_depth)
    }

    pub fn from_value(value: Value, max_depth: usize) -> FormResult<Self> {
        check_depth(&value, max_depth)?;
        let Value::Object(mut root) = value else {
            return Err(FormError::InvalidSchema("schema must be a JSON object".into()));
        };

        let fields = match root.shift_remove("fields") {
            Some(v) => parse_field_list(v, "top-level")?,
            None => Vec::new(),
        };

        let mut sections = Vec::new();
        if let Some(v) = root.shift_remove("sections") {
            let Value::Array(items) = v else {
                return Err(FormError::InvalidSchema("sections must be an array".into()));
            };
            for (sx, item) in items.into_iter().enumerate() {
                let Value::Object(mut props) = item else {
                    return Err(FormError::InvalidSchema(format!("section {} is not an object", sx)));
                };
                if !props.get("key").map(Value::is_string).unwrap_or(false) {
                    return Err(FormError::InvalidSchema(format!("section {} has no key", sx)));
                }
                let section_fields = match props.shift_remove("fields") {
                    Some(v) => parse_field_list(v, &format!("section {}", sx))?,
                    None => Vec::new(),
                };
                sections.push(RawSection {
                    props,
                    fields: section_fields,
                });
            }
        }

        Ok(Self {
            props: root,
            fields,
            sections,
        })
    }

    /// A schema with the same top-level properties and no fields or sections
    pub fn create_empty(&self) -> Self {
        Self {
            props: self.props.clone(),
            fields: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn version(&self) -> Option<&str> {
        self.props.get("version").and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.sections.iter().all(|s| s.fields.is_empty())
    }

    // ── Queries ──────────────────────────────────────────────────────

    fn raw_fields(&self) -> impl Iterator<Item = (Option<usize>, &Map<String, Value>)> {
        self.fields.iter().map(|f| (None, f)).chain(
            self.sections
                .iter()
                .enumerate()
                .flat_map(|(sx, s)| s.fields.iter().map(move |f| (Some(sx), f))),
        )
    }

    /// All fields in schema order. A key defined twice keeps its first
    /// position and its last definition.
    pub fn fields(&self) -> Vec<FormSchemaField<'_>> {
        let mut out: Vec<FormSchemaField<'_>> = Vec::new();
        for (section, raw) in self.raw_fields() {
            let field = FormSchemaField::new(section, raw);
            match out.iter_mut().find(|f| f.key() == field.key()) {
                Some(existing) => *existing = field,
                None => out.push(field),
            }
        }
        out
    }

    pub fn field_keys(&self) -> Vec<&str> {
        self.fields().into_iter().map(|f| f.key).collect()
    }

    pub fn field(&self, key: &str) -> Option<FormSchemaField<'_>> {
        self.raw_fields()
            .filter(|(_, raw)| field_key(raw) == key)
            .last()
            .map(|(section, raw)| FormSchemaField::new(section, raw))
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.raw_fields().any(|(_, raw)| field_key(raw) == key)
    }

    pub fn fields_of_type(&self, field_type: &str) -> Vec<FormSchemaField<'_>> {
        self.fields()
            .into_iter()
            .filter(|f| f.field_type() == Some(field_type))
            .collect()
    }

    /// Fields that take a response, skipping display-only types
    pub fn respondable_fields(&self, limits: &FormLimits) -> Vec<FormSchemaField<'_>> {
        self.fields()
            .into_iter()
            .filter(|f| limits.is_respondable(f.field_type()))
            .collect()
    }

    pub fn top_level_fields(&self) -> Vec<FormSchemaField<'_>> {
        self.fields()
            .into_iter()
            .filter(|f| f.section.is_none())
            .collect()
    }

    pub fn section_fields(&self, section_key: &str) -> Vec<FormSchemaField<'_>> {
        let Some(sx) = self.section_number(section_key) else {
            return Vec::new();
        };
        self.fields()
            .into_iter()
            .filter(|f| f.section == Some(sx))
            .collect()
    }

    pub fn sections(&self) -> Vec<FormSchemaSection> {
        self.sections.iter().map(FormSchemaSection::from_raw).collect()
    }

    /// Section of a field, or `None` for top-level and unknown fields
    pub fn field_section(&self, key: &str) -> Option<FormSchemaSection> {
        let sx = self.field(key)?.section?;
        self.sections.get(sx).map(FormSchemaSection::from_raw)
    }

    fn section_number(&self, section_key: &str) -> Option<usize> {
        self.sections.iter().rposition(|s| s.key() == section_key)
    }

    /// Choice labels of a field keyed by choice key, including choices
    /// only declared inside the field's rules
    pub fn field_choices(&self, key: &str) -> Vec<(String, String)> {
        let Some(field) = self.field(key) else {
            return Vec::new();
        };
        let mut choices: Vec<(String, String)> = Vec::new();

        let declared = field
            .raw
            .get("attrs")
            .and_then(|a| a.get("choices"))
            .and_then(Value::as_array);
        for choice in declared.into_iter().flatten() {
            if let Some((k, label)) = choice_entry(choice) {
                match choices.iter_mut().find(|(ck, _)| *ck == k) {
                    Some(existing) => existing.1 = label,
                    None => choices.push((k, label)),
                }
            }
        }

        let rules = field.raw.get("rules").and_then(Value::as_array);
        for rule in rules.into_iter().flatten() {
            let rule_choices = rule
                .get("set")
                .and_then(|s| s.get("attrs"))
                .and_then(|a| a.get("choices"))
                .and_then(Value::as_array);
            for choice in rule_choices.into_iter().flatten() {
                if let Some((k, label)) = choice_entry(choice) {
                    match choices.iter_mut().find(|(ck, _)| *ck == k) {
                        Some(existing) if existing.1.is_empty() => existing.1 = label,
                        Some(_) => {}
                        None => choices.push((k, label)),
                    }
                }
            }
        }
        choices
    }

    // ── Derivations ──────────────────────────────────────────────────

    /// Rebuild the schema from a stage's formviews.
    ///
    /// Only fields with an active formview are kept, in formview order,
    /// with `required`, `disabled` and (when set) `default` taken from the
    /// formview. Sections are recreated as their fields are added.
    pub fn apply_formviews(&self, formviews: &[Formview]) -> Self {
        let mut schema = self.create_empty();
        for formview in formviews.iter().filter(|f| f.active) {
            let Some(field) = self.field(&formview.field_key) else {
                tracing::debug!(field_key = %formview.field_key, "formview has no schema field");
                continue;
            };
            let mut raw = field.raw.clone();
            raw.insert("required".into(), Value::Bool(formview.required));
            raw.insert("disabled".into(), Value::Bool(formview.disabled));
            if let Some(default) = formview.default_value.as_deref().filter(|d| !d.is_empty()) {
                raw.insert("default".into(), Value::String(default.to_string()));
            }
            schema.add_field(field.section.and_then(|sx| self.sections.get(sx)), raw);
        }
        schema
    }

    fn add_field(&mut self, source_section: Option<&RawSection>, raw: Map<String, Value>) {
        match source_section {
            None => self.fields.push(raw),
            Some(source) => {
                let pos = match self.sections.iter().position(|s| s.key() == source.key()) {
                    Some(pos) => pos,
                    None => {
                        self.sections.push(RawSection {
                            props: source.props.clone(),
                            fields: Vec::new(),
                        });
                        self.sections.len() - 1
                    }
                };
                self.sections[pos].fields.push(raw);
            }
        }
    }

    /// Append `other` onto this schema. Fields replace same-key fields of
    /// the same container, sections merge by key.
    pub fn concat(&self, other: &FormSchema) -> Self {
        let mut acc = self.clone();
        for field in &other.fields {
            add_or_update_field(&mut acc.fields, field);
        }
        for section in &other.sections {
            match acc.sections.iter_mut().find(|s| s.key() == section.key()) {
                Some(existing) => {
                    for field in &section.fields {
                        add_or_update_field(&mut existing.fields, field);
                    }
                }
                None => acc.sections.push(section.clone()),
            }
        }
        acc
    }

    // ── Field properties ─────────────────────────────────────────────

    fn set_field_property(&mut self, key: &str, property: &str, value: Value) {
        let Some(section) = self.field(key).map(|f| f.section) else {
            return;
        };
        let container = match section {
            None => &mut self.fields,
            Some(sx) => match self.sections.get_mut(sx) {
                Some(s) => &mut s.fields,
                None => return,
            },
        };
        if let Some(raw) = container.iter_mut().find(|f| field_key(f) == key) {
            raw.insert(property.to_string(), value);
        }
    }

    pub fn set_field_default(&mut self, key: &str, value: &str) {
        self.set_field_property(key, "default", Value::String(value.to_string()));
    }

    pub fn set_field_disabled(&mut self, key: &str, disabled: bool) {
        self.set_field_property(key, "disabled", Value::Bool(disabled));
    }

    pub fn set_field_help(&mut self, key: &str, help: &str) {
        self.set_field_property(key, "help", Value::String(help.to_string()));
    }

    pub fn set_field_help_html(&mut self, key: &str, help_html: &str) {
        self.set_field_property(key, "help_html", Value::String(help_html.to_string()));
    }

    pub fn set_field_meta(&mut self, key: &str, meta: Value) {
        self.set_field_property(key, "meta", meta);
    }

    pub fn set_field_validations(&mut self, key: &str, validations: Value) {
        self.set_field_property(key, "validations", validations);
    }

    // ── Output ───────────────────────────────────────────────────────

    pub fn to_value(&self) -> Value {
        let mut obj = self.props.clone();
        obj.insert(
            "fields".into(),
            Value::Array(self.fields.iter().cloned().map(Value::Object).collect()),
        );
        obj.insert(
            "sections".into(),
            Value::Array(self.sections.iter().map(RawSection::to_value).collect()),
        );
        Value::Object(obj)
    }

    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }
}

impl Serialize for FormSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn parse_field_list(value: Value, location: &str) -> FormResult<Vec<Map<String, Value>>> {
    let Value::Array(items) = value else {
        return Err(FormError::InvalidSchema(format!("{} fields must be an array", location)));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(fx, item)| match item {
            Value::Object(obj) if obj.get("key").map(Value::is_string).unwrap_or(false) => Ok(obj),
            _ => Err(FormError::InvalidSchema(format!(
                "{} field {} is not an object with a key",
                location, fx
            ))),
        })
        .collect()
}

fn field_key(raw: &Map<String, Value>) -> &str {
    raw.get("key").and_then(Value::as_str).unwrap_or("")
}

fn add_or_update_field(fields: &mut Vec<Map<String, Value>>, field: &Map<String, Value>) {
    let key = field_key(field);
    match fields.iter_mut().find(|f| field_key(f) == key) {
        Some(existing) => *existing = field.clone(),
        None => fields.push(field.clone()),
    }
}

fn choice_entry(choice: &Value) -> Option<(String, String)> {
    let key = choice.get("key").filter(|k| !k.is_null())?;
    let label = choice.get("label").map(value_to_string).unwrap_or_default();
    Some((value_to_string(key), label))
}

// ── Fields and sections ──────────────────────────────────────────────

/// Read-only view of one schema field
#[derive(Clone, Debug, PartialEq)]
pub struct FormSchemaField<'a> {
    key: &'a str,
    section: Option<usize>,
    raw: &'a Map<String, Value>,
}

impl<'a> FormSchemaField<'a> {
    fn new(section: Option<usize>, raw: &'a Map<String, Value>) -> Self {
        Self {
            key: field_key(raw),
            section,
            raw,
        }
    }

    pub fn key(&self) -> &'a str {
        self.key
    }

    /// `top/<key>` or `<section number>/<key>`
    pub fn index(&self) -> String {
        format!("{}/{}", self.section_index(), self.key)
    }

    pub fn section_index(&self) -> String {
        match self.section {
            Some(sx) => sx.to_string(),
            None => TOP_SECTION.to_string(),
        }
    }

    pub fn section_number(&self) -> Option<usize> {
        self.section
    }

    /// Raw property lookup
    pub fn get(&self, property: &str) -> Option<&'a Value> {
        self.raw.get(property)
    }

    pub fn field_type(&self) -> Option<&'a str> {
        self.raw.get("type").and_then(Value::as_str)
    }

    pub fn label(&self) -> Option<&'a str> {
        self.raw.get("label").and_then(Value::as_str)
    }

    pub fn required(&self) -> bool {
        self.raw.get("required").map(truthy).unwrap_or(false)
    }

    pub fn disabled(&self) -> bool {
        self.raw.get("disabled").map(truthy).unwrap_or(false)
    }

    pub fn hidden(&self) -> bool {
        self.raw.get("hidden").map(truthy).unwrap_or(false)
    }

    /// Default value, `None` when absent or null
    pub fn default_value(&self) -> Option<&'a Value> {
        self.raw.get("default").filter(|v| !v.is_null())
    }

    pub fn conditional(&self) -> FormResult<Option<RuleTest>> {
        match self.raw.get("conditional") {
            Some(v @ Value::Object(_)) => Ok(Some(RuleTest::from_value(v)?)),
            _ => Ok(None),
        }
    }

    pub fn rules(&self) -> FormResult<Vec<FieldRule>> {
        match self.raw.get("rules") {
            Some(Value::Array(items)) => items.iter().map(FieldRule::from_value).collect(),
            _ => Ok(Vec::new()),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.raw.clone())
    }
}

/// A schema section, without its fields
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormSchemaSection {
    pub key: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
}

impl FormSchemaSection {
    fn from_raw(raw: &RawSection) -> Self {
        Self {
            key: raw.key().to_string(),
            label: raw.props.get("label").map(value_to_string).unwrap_or_default(),
            line: raw.props.get("line").filter(|v| !v.is_null()).map(value_to_string),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) const TEST_FORM: &str = r#"{"title":"Test Form","shortname":"test","revision":"1.0","version":"2021030200","language":"en-US","fields":[{"key":"agency_code","line":"A","label":"Agency code","required":false,"type":"text"},{"key":"request_status","line":"B","label":"Request Status","type":"select_one","required":false,"default":null,"attrs":{"choices":[{"key":null,"label":"Select one"},{"key":"Yes","label":"Yes, of course"},{"key":"No","label":"No thank you"}]}},{"key":"detailed_description","line":"C","label":"A detailed description","required":false,"type":"editor"}],"sections":[{"key":"A","line":"Section A","label":"Basic Information","fields":[{"key":"applicant_name","line":"1","label":"Applicant's Name","instruction":"Last, First, Middle Initial","required":false,"type":"fullname","attrs":{"format":"last,first,middle-initial"}}]},{"key":"B","line":"Section B","label":"Course Information","fields":[{"key":"training_vendor","line":"1","label":"Name and Mailing Address of Training Vendor","instruction":"No., Street, City, Sata, ZIP Code","required":false,"type":"address"}]}]}"#;

    fn schema() -> FormSchema {
        FormSchema::from_json(TEST_FORM).unwrap()
    }

    fn keys(fields: &[FormSchemaField<'_>]) -> Vec<String> {
        fields.iter().map(|f| f.key().to_string()).collect()
    }

    #[test]
    fn test_version() {
        assert_eq!(schema().version(), Some("2021030200"));
    }

    #[test]
    fn test_fields_in_order() {
        let schema = schema();
        assert_eq!(
            keys(&schema.fields()),
            vec![
                "agency_code",
                "request_status",
                "detailed_description",
                "applicant_name",
                "training_vendor"
            ]
        );
        let agency = schema.field("agency_code").unwrap();
        assert_eq!(agency.index(), "top/agency_code");
        assert_eq!(agency.label(), Some("Agency code"));
        assert_eq!(agency.field_type(), Some("text"));
        assert!(agency.default_value().is_none());
        assert!(!agency.required());
        assert!(!agency.disabled());
    }

    #[test]
    fn test_section_queries() {
        let schema = schema();
        assert_eq!(
            keys(&schema.top_level_fields()),
            vec!["agency_code", "request_status", "detailed_description"]
        );
        assert_eq!(keys(&schema.section_fields("A")), vec!["applicant_name"]);
        assert_eq!(keys(&schema.section_fields("B")), vec!["training_vendor"]);
        assert!(schema.section_fields("Z").is_empty());

        let sections = schema.sections();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].key, "A");
        assert_eq!(sections[0].line.as_deref(), Some("Section A"));
        assert_eq!(sections[0].label, "Basic Information");

        let applicant = schema.field("applicant_name").unwrap();
        assert_eq!(applicant.index(), "0/applicant_name");
        assert_eq!(applicant.section_index(), "0");
        assert_eq!(schema.field_section("applicant_name").unwrap().key, "A");
        assert!(schema.field_section("agency_code").is_none());
    }

    #[test]
    fn test_has_field_and_types() {
        let schema = schema();
        assert!(schema.has_field("applicant_name"));
        assert!(!schema.has_field("unknown_key"));
        assert_eq!(keys(&schema.fields_of_type("text")), vec!["agency_code"]);
    }

    #[test]
    fn test_round_trip_json() {
        assert_eq!(schema().to_json(), TEST_FORM);
    }

    #[test]
    fn test_field_choices_skip_null_keys() {
        let choices = schema().field_choices("request_status");
        assert_eq!(
            choices,
            vec![
                ("Yes".to_string(), "Yes, of course".to_string()),
                ("No".to_string(), "No thank you".to_string())
            ]
        );
        assert!(schema().field_choices("agency_code").is_empty());
    }

    #[test]
    fn test_field_choices_from_rules() {
        let schema = FormSchema::from_value(
            json!({"fields": [{
                "key": "size",
                "attrs": {"choices": [{"key": "S", "label": "Small"}]},
                "rules": [{
                    "test": {"key": "kind", "condition": "EQUALS", "value": "shirt"},
                    "set": {"attrs": {"choices": [
                        {"key": "S", "label": "Tiny"},
                        {"key": "L", "label": "Large"}
                    ]}}
                }]
            }]}),
            32,
        )
        .unwrap();
        assert_eq!(
            schema.field_choices("size"),
            vec![
                ("S".to_string(), "Small".to_string()),
                ("L".to_string(), "Large".to_string())
            ]
        );
    }

    #[test]
    fn test_apply_formviews() {
        let schema = schema();
        let formviews = vec![
            Formview::new("training_vendor", true, false),
            Formview::new("agency_code", false, true).with_default("AC-1"),
            Formview::new("applicant_name", false, false),
            Formview::new("missing_field", false, false),
        ];
        let applied = schema.apply_formviews(&formviews);

        assert_eq!(
            keys(&applied.fields()),
            vec!["agency_code", "training_vendor", "applicant_name"]
        );
        let agency = applied.field("agency_code").unwrap();
        assert!(agency.disabled());
        assert_eq!(agency.default_value(), Some(&json!("AC-1")));
        // sections are recreated in first-use order
        assert_eq!(applied.field("training_vendor").unwrap().index(), "0/training_vendor");
        assert_eq!(applied.field("applicant_name").unwrap().index(), "1/applicant_name");
        assert!(applied.field("training_vendor").unwrap().required());
        assert_eq!(applied.version(), Some("2021030200"));
    }

    #[test]
    fn test_apply_formviews_skips_inactive() {
        let mut inactive = Formview::new("agency_code", false, false);
        inactive.active = false;
        let applied = schema().apply_formviews(&[inactive]);
        assert!(applied.is_empty());
    }

    #[test]
    fn test_concat_adds_and_updates() {
        let base = schema();
        let first = base.apply_formviews(&[
            Formview::new("agency_code", false, false),
            Formview::new("applicant_name", false, false),
        ]);
        let second = base.apply_formviews(&[
            Formview::new("agency_code", true, false),
            Formview::new("training_vendor", false, false),
            Formview::new("applicant_name", false, true),
        ]);
        let merged = first.concat(&second);

        assert_eq!(
            keys(&merged.fields()),
            vec!["agency_code", "applicant_name", "training_vendor"]
        );
        assert!(merged.field("agency_code").unwrap().required());
        assert!(merged.field("applicant_name").unwrap().disabled());
        assert_eq!(merged.field("applicant_name").unwrap().index(), "0/applicant_name");
        assert_eq!(merged.field("training_vendor").unwrap().index(), "1/training_vendor");
    }

    #[test]
    fn test_set_field_properties() {
        let mut schema = schema();
        schema.set_field_default("applicant_name", "Olivia S. Parsons");
        schema.set_field_disabled("applicant_name", true);
        schema.set_field_help("agency_code", "Ask your manager");
        schema.set_field_meta("agency_code", json!({"source": "hr"}));
        schema.set_field_default("unknown", "ignored");

        let field = schema.field("applicant_name").unwrap();
        assert_eq!(field.default_value(), Some(&json!("Olivia S. Parsons")));
        assert!(field.disabled());
        let agency = schema.field("agency_code").unwrap();
        assert_eq!(agency.get("help"), Some(&json!("Ask your manager")));
        assert_eq!(agency.get("meta"), Some(&json!({"source": "hr"})));
        assert!(!schema.has_field("unknown"));
    }

    #[test]
    fn test_respondable_fields() {
        let schema = FormSchema::from_value(
            json!({"fields": [
                {"key": "intro", "type": "label"},
                {"key": "name", "type": "text"},
                {"key": "sum", "type": "total"}
            ]}),
            32,
        )
        .unwrap();
        assert_eq!(keys(&schema.respondable_fields(&FormLimits::default())), vec!["name"]);
    }

    #[test]
    fn test_invalid_schemas() {
        assert!(matches!(
            FormSchema::from_json("[]"),
            Err(FormError::InvalidSchema(_))
        ));
        assert!(FormSchema::from_json("{\"fields\":[{\"label\":\"no key\"}]}").is_err());
        assert!(FormSchema::from_json("{\"sections\":{}}").is_err());
        assert!(matches!(
            FormSchema::from_value(json!({"fields": [{"key": "a", "attrs": {"x": {"y": 1}}}]}), 4),
            Err(FormError::DepthExceeded { .. })
        ));
    }
}
