use serde::{Deserialize, Serialize};
use tollgate_core::{Address, HostEntry, TokenAmount};

use crate::claims::ClaimReport;

/// State change notifications published by the ledger after each commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum LedgerEvent {
    Deposited {
        account: Address,
        amount: TokenAmount,
        balance: TokenAmount,
    },
    WithdrawRequested {
        account: Address,
        ready_at: u64,
    },
    Withdrawn {
        account: Address,
        amount: TokenAmount,
    },
    HoldTimeChanged {
        seconds: u64,
    },
    ClaimSettled {
        receiver: Address,
        report: ClaimReport,
    },
    HostAdded {
        host: HostEntry,
    },
    HostRemoved {
        operator: Address,
    },
    HostPaused {
        operator: Address,
    },
    HostUnpaused {
        operator: Address,
    },
    AdminTransferred {
        previous: Address,
        admin: Address,
    },
}

impl LedgerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::Deposited { .. } => "deposited",
            LedgerEvent::WithdrawRequested { .. } => "withdraw_requested",
            LedgerEvent::Withdrawn { .. } => "withdrawn",
            LedgerEvent::HoldTimeChanged { .. } => "hold_time_changed",
            LedgerEvent::ClaimSettled { .. } => "claim_settled",
            LedgerEvent::HostAdded { .. } => "host_added",
            LedgerEvent::HostRemoved { .. } => "host_removed",
            LedgerEvent::HostPaused { .. } => "host_paused",
            LedgerEvent::HostUnpaused { .. } => "host_unpaused",
            LedgerEvent::AdminTransferred { .. } => "admin_transferred",
        }
    }
}
