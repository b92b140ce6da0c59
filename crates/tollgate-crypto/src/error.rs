/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("public key recovery failed")]
    RecoveryFailed,
}
