//! Error types for event registration

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Payment image missing or unreadable: {0}")]
    UploadInputError(String),

    #[error("Malformed registration form: {0}")]
    MalformedRequestError(String),

    #[error("Payment image upload failed: {0}")]
    UploadError(String),

    #[error("{}", required_message(.0))]
    ValidationError(&'static str),

    #[error("Failed to persist registration: {0}")]
    PersistenceError(String),

    #[error("Failed to read registrations: {0}")]
    AggregationReadError(String),
}

impl RegistrationError {
    /// Message shown to the registrant.
    pub fn user_message(&self) -> String {
        match self {
            RegistrationError::UploadInputError(_) | RegistrationError::UploadError(_) => {
                "Error uploading file".to_string()
            }
            RegistrationError::MalformedRequestError(_) => "Error getting user info".to_string(),
            RegistrationError::ValidationError(field) => required_message(field),
            RegistrationError::PersistenceError(_) => "Error creating user".to_string(),
            RegistrationError::AggregationReadError(_) => "Error fetching leaderboard".to_string(),
        }
    }

    /// Underlying cause, if there is one worth surfacing.
    pub fn cause(&self) -> Option<&str> {
        match self {
            RegistrationError::UploadInputError(cause)
            | RegistrationError::MalformedRequestError(cause)
            | RegistrationError::UploadError(cause)
            | RegistrationError::PersistenceError(cause)
            | RegistrationError::AggregationReadError(cause) => Some(cause),
            RegistrationError::ValidationError(_) => None,
        }
    }
}

fn required_message(field: &str) -> String {
    format!("{} is required", field)
}

/// Failures of the configured store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store timed out after {0} ms")]
    Timeout(u64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
