//! Error types for form schema and form data handling

/// Errors raised while parsing or validating forms
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// Form data that is not a well-formed JSON object, or that fails the
    /// readiness check. The message is shown to the submitter.
    #[error("{0}")]
    MaliciousData(String),

    #[error("Invalid form schema: {0}")]
    InvalidSchema(String),

    #[error("Unknown purpose: {0}")]
    UnknownPurpose(String),

    #[error("Invalid form limit: {0}")]
    InvalidLimit(String),

    #[error("JSON nesting depth {depth} exceeds the limit of {limit}")]
    DepthExceeded { depth: usize, limit: usize },
}

impl FormError {
    pub(crate) fn malicious(message: impl Into<String>) -> Self {
        FormError::MaliciousData(message.into())
    }
}

/// Result type alias for form operations
pub type FormResult<T> = Result<T, FormError>;

/// Nesting depth of a JSON value. Scalars count as one level, containers
/// add one level on top of their deepest child.
pub(crate) fn json_depth(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        serde_json::Value::Object(map) => 1 + map.values().map(json_depth).max().unwrap_or(0),
        _ => 1,
    }
}

pub(crate) fn check_depth(value: &serde_json::Value, limit: usize) -> FormResult<()> {
    let depth = json_depth(value);
    if depth > limit {
        return Err(FormError::DepthExceeded { depth, limit });
    }
    Ok(())
}
