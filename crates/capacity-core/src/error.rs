//! Error types for capacity estimation

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CapacityError>;

#[derive(Debug, Error)]
pub enum CapacityError {
    /// One or more user-facing validation messages
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Finalize was requested with no namespaces in the result set
    #[error("Please add at least one namespace before finalizing.")]
    EmptyInput,

    #[error("cost service unavailable: {0}")]
    Transport(String),

    #[error("finalized total {actual:.2} is implausible against expected {expected:.2}")]
    ReconciliationMismatch { expected: f64, actual: f64 },

    #[error("display target not found: {0}")]
    MissingDisplayTarget(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CapacityError {
    /// Messages suitable for showing to the user as-is
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            CapacityError::Validation(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_are_kept_separate() {
        let err = CapacityError::Validation(vec![
            "Env is required".to_string(),
            "Cluster is required".to_string(),
        ]);

        assert_eq!(err.user_messages().len(), 2);
        assert_eq!(
            err.to_string(),
            "validation failed: Env is required; Cluster is required"
        );
    }

    #[test]
    fn test_empty_input_message() {
        assert_eq!(
            CapacityError::EmptyInput.user_messages(),
            vec!["Please add at least one namespace before finalizing.".to_string()]
        );
    }
}
