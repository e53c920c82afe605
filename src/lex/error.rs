use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Store(StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(entity: &str, key: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    pub fn conflict(entity: &str, key: &str) -> Self {
        Self::Conflict {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }
}

// Lift the store's own NotFound/Conflict into the engine taxonomy so callers
// match on one set of variants.
impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { entity, key } => Self::NotFound { entity, key },
            StoreError::Conflict { entity, key } => Self::Conflict { entity, key },
            StoreError::Validation(message) => Self::InvalidState(message),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_becomes_engine_conflict() {
        let err: EngineError = StoreError::conflict("student_badge", "s1:b1").into();
        assert!(matches!(err, EngineError::Conflict { .. }));
    }

    #[test]
    fn storage_failure_stays_transient() {
        let err: EngineError = StoreError::Migration {
            version: 1,
            message: "x".to_string(),
        }
        .into();
        assert!(matches!(err, EngineError::Store(_)));
    }
}
