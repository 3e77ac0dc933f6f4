//! Error type for engine operations that cross the model and form layers

use approval_form::FormError;
use approval_types::ApprovalError;

/// Errors that can occur in approval engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Approval(#[from] ApprovalError),

    #[error(transparent)]
    Form(#[from] FormError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
