//! Tollgate settlement ledger.
//!
//! Custodial balances with a time-locked withdrawal flow, redemption of
//! off-line signed payment claims with replay protection, and the registry
//! of host endpoints clients route traffic to. Token movement in and out of
//! custody goes through a pluggable [`ValueTransferPort`].

pub mod error;
pub mod clock;
pub mod transfer;
pub mod access;
pub mod balance;
pub mod claims;
pub mod registry;
pub mod events;
pub mod state;
pub mod ledger;
pub mod adapters;

pub use access::{authorize, Role};
pub use adapters::internal::InternalTransferPort;
pub use claims::{ClaimKey, ClaimOutcome, ClaimReport, SignedClaim};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::LedgerError;
pub use events::LedgerEvent;
pub use ledger::Ledger;
pub use state::{LedgerSnapshot, LedgerState};
pub use transfer::ValueTransferPort;
