pub mod error;
pub mod types;
pub mod payment_record;
pub mod config;

pub use config::{ClaimAccounting, ClaimPayout, LedgerConfig};
pub use error::CoreError;
pub use payment_record::PaymentRecord;
pub use types::{Address, HostEntry, TokenAmount, WithdrawalRequest};
