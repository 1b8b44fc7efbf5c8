//! Request-level error taxonomy

use thiserror::Error;

use crate::model::EntityKind;
use crate::ports::StoreError;

/// Errors surfaced to directory callers
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Malformed or out-of-range input (422)
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    /// The primary entity does not exist (404)
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    /// Retry budget exhausted or unexpected storage failure (500).
    /// Details are logged, never shown.
    #[error("The directory store is temporarily unavailable")]
    TransientStorage,
}

impl DirectoryError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_found(kind: EntityKind, key: impl ToString) -> Self {
        Self::NotFound {
            kind: kind.label(),
            key: key.to_string(),
        }
    }

    /// HTTP-equivalent status code
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 422,
            Self::NotFound { .. } => 404,
            Self::TransientStorage => 500,
        }
    }

    /// Translate a store failure, logging what the caller will not see.
    ///
    /// `reference_field` names the input field whose ids failed a
    /// foreign-key check, if the operation has one.
    pub fn from_store(err: StoreError, operation: &str, reference_field: &str) -> Self {
        match err {
            StoreError::UniqueViolation { field } => {
                Self::validation(field, "has already been taken")
            }
            StoreError::MissingReference { ids } => Self::validation(
                reference_field,
                format!("unknown ids: {}", join_ids(&ids)),
            ),
            StoreError::NotFound(key) => Self::NotFound {
                kind: "Record",
                key,
            },
            err @ (StoreError::Conflict(_) | StoreError::Database(_)) => {
                tracing::error!(operation, error = %err, "Storage failure");
                Self::TransientStorage
            }
        }
    }
}

pub(crate) fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;
