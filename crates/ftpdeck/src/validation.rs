//! Checks run before a request is sent

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("choose a site first")]
    NoSite,

    #[error("choose a task type first")]
    NoTaskType,

    #[error("select at least one file or folder")]
    EmptySelection,

    #[error("{name}: {task_type} cannot be used on a {kind}")]
    Incompatible {
        name: String,
        task_type: &'static str,
        kind: &'static str,
    },

    #[error("{0} is required")]
    Required(&'static str),

    #[error("{field} must be between {min} and {max} characters")]
    Length {
        field: &'static str,
        min: usize,
        max: usize,
    },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },
}
