use serde::{Deserialize, Serialize};

use crate::types::{Address, TokenAmount};

/// Runtime configuration of a ledger instance. Persisted with the ledger
/// state so that administrative changes survive restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Account holding the administrator capability.
    #[serde(default)]
    pub admin: Address,
    /// Delay between a withdrawal request and its eligibility (seconds).
    #[serde(default)]
    pub withdraw_hold_secs: u64,
    /// How the `amount` of a claim entry is interpreted.
    #[serde(default)]
    pub claim_accounting: ClaimAccounting,
    /// Where redeemed claim value goes.
    #[serde(default)]
    pub claim_payout: ClaimPayout,
}

/// Interpretation of the amount a receiver asks to redeem for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimAccounting {
    /// The amount is the receiver's running total for the record: an entry
    /// redeems `min(amount, record.amount) - already`. Resubmitting the same
    /// entry redeems nothing.
    #[default]
    Cumulative,
    /// The amount is a fresh increment: an entry redeems
    /// `min(amount, record.amount - already)`.
    Incremental,
}

impl ClaimAccounting {
    /// Value an entry may redeem given what the record has already paid.
    pub fn redeemable(
        self,
        requested: TokenAmount,
        ceiling: TokenAmount,
        already: TokenAmount,
    ) -> TokenAmount {
        match self {
            ClaimAccounting::Cumulative => requested.min(ceiling).saturating_sub(already),
            ClaimAccounting::Incremental => requested.min(ceiling.saturating_sub(already)),
        }
    }
}

/// Destination of value redeemed from a payment claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPayout {
    /// Credit the receiver's ledger balance.
    Credit,
    /// Release the redeemed value from custody straight to the receiver.
    #[default]
    Transfer,
}

impl LedgerConfig {
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            withdraw_hold_secs: 0,
            claim_accounting: ClaimAccounting::Cumulative,
            claim_payout: ClaimPayout::Transfer,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::new(Address::ZERO)
    }
}
