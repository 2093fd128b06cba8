use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("order validation failed: {message}")]
    Validation { message: String },
    #[error("order invariant violated: {message}")]
    Invariant { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant {
            message: message.into(),
        }
    }
}
