use serde::{Deserialize, Serialize};
use tollgate_core::LedgerConfig;

use crate::balance::BalanceBook;
use crate::claims::RedeemedClaims;
use crate::registry::HostRegistry;

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything the ledger owns. Mutated only under the ledger's write guard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub config: LedgerConfig,
    pub balances: BalanceBook,
    pub redeemed: RedeemedClaims,
    pub hosts: HostRegistry,
}

impl LedgerState {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}

/// Serializable point-in-time copy of a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    /// Unix seconds at which the snapshot was taken.
    pub taken_at: u64,
    pub state: LedgerState,
}

impl LedgerSnapshot {
    pub fn new(state: LedgerState, taken_at: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            taken_at,
            state,
        }
    }
}
