/// Core type errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}
