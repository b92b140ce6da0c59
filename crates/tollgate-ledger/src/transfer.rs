use async_trait::async_trait;
use tollgate_core::{Address, TokenAmount};

use crate::error::LedgerError;

/// Moves the backing token between external holders and the ledger's custody.
///
/// Implementations bridge the ledger to a concrete asset (an ERC-20 style
/// token, a payment processor, an in-memory test token). Both transfers are
/// failable; the ledger only commits balance changes once a transfer returns
/// `Ok`.
#[async_trait]
pub trait ValueTransferPort: Send + Sync {
    /// Pull `amount` from `holder` into custody.
    ///
    /// A holder shortfall is reported as [`LedgerError::InsufficientFunds`].
    async fn transfer_in(&self, holder: Address, amount: TokenAmount) -> Result<(), LedgerError>;

    /// Release `amount` from custody to `recipient`.
    async fn transfer_out(
        &self,
        recipient: Address,
        amount: TokenAmount,
    ) -> Result<(), LedgerError>;

    /// Total value currently held in custody.
    async fn custody_balance(&self) -> Result<TokenAmount, LedgerError>;

    /// Unique identifier of this port (e.g. "tp-internal").
    fn port_id(&self) -> &str;
}
