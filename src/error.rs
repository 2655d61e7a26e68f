use std::time::Duration;

/// Input rejected before any generation attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} = {value} is outside the allowed range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Failure raised by a text-completion client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("completion service returned status {0}")]
    Status(u16),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion service returned no text")]
    EmptyResponse,
}

/// Reason the generative path was abandoned. Never escapes the engine.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdapterFailure {
    #[error("completion service failed: {0}")]
    Service(#[from] CompletionError),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("response could not be parsed: {0}")]
    Parse(String),

    #[error("response contained no valid alerts")]
    NoValidItems,

    #[error("response contained an empty narrative")]
    EmptyNarrative,
}

impl AdapterFailure {
    /// Short tag used in log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            AdapterFailure::Service(_) => "service",
            AdapterFailure::Timeout(_) => "timeout",
            AdapterFailure::Parse(_) => "parse",
            AdapterFailure::NoValidItems => "no_valid_items",
            AdapterFailure::EmptyNarrative => "empty_narrative",
        }
    }
}
