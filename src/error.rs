use thiserror::Error;
use uuid::Uuid;

use crate::models::Role;
use crate::validation::FieldErrors;

/// Opaque failure reported by the data-access collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        BackendError::new(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::new(format!("malformed record: {err}"))
    }
}

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("{0}")]
    Validation(FieldErrors),

    #[error("Too many {action} attempts. Please wait before trying again.")]
    ThrottleExceeded { action: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("You must be signed in")]
    Unauthenticated,

    #[error("This action requires the {required} role")]
    Forbidden { required: Role },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Student {student_id} is already enrolled in course {course_id}")]
    AlreadyEnrolled { student_id: Uuid, course_id: Uuid },
}

impl From<FieldErrors> for PortalError {
    fn from(errors: FieldErrors) -> Self {
        PortalError::Validation(errors)
    }
}
