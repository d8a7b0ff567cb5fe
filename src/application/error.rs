use thiserror::Error;

use crate::domain::{ExpenseId, ValidationError};
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Offending input field, when the problem belongs to one
        field: Option<&'static str>,
        reason: String,
        /// Every broken field rule, empty when the problem is not about fields
        violations: Vec<ValidationError>,
    },

    #[error("Expense not found: {0}")]
    NotFound(ExpenseId),

    #[error("Expense {id} was modified by someone else (expected version {expected}, found {found})")]
    Conflict {
        id: ExpenseId,
        expected: i64,
        found: i64,
    },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// An invalid argument that is not tied to a single input field.
    pub fn invalid(reason: impl Into<String>) -> Self {
        AppError::InvalidArgument {
            field: None,
            reason: reason.into(),
            violations: Vec::new(),
        }
    }

    /// Input rejected by field rules. `field` names the first offender.
    pub fn rejected(violations: Vec<ValidationError>) -> Self {
        let reason = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        AppError::InvalidArgument {
            field: violations.first().map(|err| err.field),
            reason,
            violations,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::rejected(vec![err])
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Missing(id) => AppError::NotFound(id),
            StorageError::StaleVersion {
                id,
                expected,
                found,
            } => AppError::Conflict {
                id,
                expected,
                found,
            },
            StorageError::Backend(err) => AppError::Database(err),
        }
    }
}
