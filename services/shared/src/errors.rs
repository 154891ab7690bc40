/// Shared error types for wagerdeck services
///
/// Validation failures are reported synchronously to the caller and never
/// leave partial state behind. Simulated bet failures are not errors at all;
/// they surface as terminal record statuses through the same rendering path
/// as successes.
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No eligible accounts for distribution")]
    NoEligibleAccounts,

    #[error("Record not found: {0}")]
    RecordNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(#[from] crate::types::ValidationError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidationError;

    #[test]
    fn test_validation_error_converts() {
        let err: EngineError = ValidationError::NonPositiveStake(-1.0).into();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_record_not_found_display() {
        let id = Uuid::new_v4();
        let err = EngineError::RecordNotFound(id);
        assert!(err.to_string().contains(&id.to_string()));
    }
}
