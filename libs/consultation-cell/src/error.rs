use thiserror::Error;

use shared_models::auth::ActorRole;
use shared_models::error::{ApiError, AppError};

use crate::models::ConsultationStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsultationError {
    /// Rejected locally by the transition table; nothing was sent.
    #[error("Invalid transition from {current} to {requested} for role {role}")]
    InvalidTransition {
        current: ConsultationStatus,
        requested: ConsultationStatus,
        role: ActorRole,
    },

    #[error("Consultation not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ConsultationError {
    /// What the initiating UI action should display.
    pub fn user_message(&self) -> String {
        match self {
            ConsultationError::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

impl From<ConsultationError> for AppError {
    fn from(err: ConsultationError) -> Self {
        match err {
            ConsultationError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            ConsultationError::NotFound(_) => AppError::NotFound(err.to_string()),
            ConsultationError::Validation(msg) => AppError::ValidationError(msg),
            ConsultationError::Api(api) => api.into(),
        }
    }
}
