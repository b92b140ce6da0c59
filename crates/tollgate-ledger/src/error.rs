use tollgate_core::{Address, CoreError};

/// Ledger errors. Every failure is surfaced to the caller; nothing is retried
/// internally.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: u128, required: u128 },

    #[error("withdraw is not available now")]
    NotReady { ready_at: Option<u64> },

    #[error("invalid signature")]
    InvalidSignature,

    #[error("caller {caller} is not the receiver {receiver} of the claim")]
    NotReceiver { caller: Address, receiver: Address },

    #[error("not found: {0}")]
    NotFound(Address),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("claim arrays differ in length: {records} records, {amounts} amounts, {signatures} signatures")]
    LengthMismatch {
        records: usize,
        amounts: usize,
        signatures: usize,
    },

    #[error("arithmetic overflow")]
    Overflow,

    #[error("value transfer failed: {0}")]
    Transfer(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("internal error: {0}")]
    Internal(String),
}
