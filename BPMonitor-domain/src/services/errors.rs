use thiserror::Error;
use validator::ValidationErrors;

use bp_monitor_data::repository::RepositoryError;

/// Errors raised by the profile and reading services
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input failed validation
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Profile limit reached
    #[error("{0}")]
    LimitReached(String),

    #[error("{0}")]
    Conflict(String),

    /// Storage failure
    #[error("Repository error: {0}")]
    Repository(String),
}

/// Map repository errors to service errors
pub fn map_repo_error(err: RepositoryError) -> ServiceError {
    match err {
        RepositoryError::NotFound(msg) => ServiceError::NotFound(format!("{} not found", msg)),
        RepositoryError::Validation(msg) => ServiceError::Validation(msg),
        RepositoryError::LimitReached(msg) => ServiceError::LimitReached(msg),
        RepositoryError::Conflict(msg) => ServiceError::Conflict(msg),
        _ => ServiceError::Repository(err.to_string()),
    }
}

/// Flatten validator errors into one readable message
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .into_iter()
        .map(|(field, errors)| {
            errors
                .iter()
                .map(|err| match &err.message {
                    Some(msg) => msg.to_string(),
                    None => format!("Invalid {}", field),
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect::<Vec<_>>()
        .join("; ")
}
