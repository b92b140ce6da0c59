use async_trait::async_trait;
use dashmap::DashMap;
use tollgate_core::{Address, TokenAmount};

use crate::error::LedgerError;
use crate::transfer::ValueTransferPort;

/// In-memory fungible token acting as the ledger's backing asset.
///
/// Holdings are tracked per account, with custody being one more account
/// (the ledger's own). `transfer_in` moves value from a holder into the
/// custody account and `transfer_out` moves it back out, the way an ERC-20
/// `transferFrom`/`transfer` pair would against the ledger contract.
pub struct InternalTransferPort {
    custody_account: Address,
    holdings: DashMap<Address, TokenAmount>,
}

impl InternalTransferPort {
    pub fn new(custody_account: Address) -> Self {
        Self {
            custody_account,
            holdings: DashMap::new(),
        }
    }

    /// Rebuild a token from previously exported holdings.
    pub fn with_holdings(
        custody_account: Address,
        holdings: impl IntoIterator<Item = (Address, TokenAmount)>,
    ) -> Self {
        let port = Self::new(custody_account);
        for (account, amount) in holdings {
            port.holdings.insert(account, amount);
        }
        port
    }

    pub fn custody_account(&self) -> Address {
        self.custody_account
    }

    /// Create `amount` new tokens in `account`. Test and bootstrap helper.
    pub fn mint(&self, account: Address, amount: TokenAmount) -> Result<TokenAmount, LedgerError> {
        let mut entry = self.holdings.entry(account).or_insert(0);
        *entry = entry.checked_add(amount).ok_or(LedgerError::Overflow)?;
        tracing::debug!(account = %account, amount = %amount, "Tokens minted");
        Ok(*entry)
    }

    pub fn balance_of(&self, account: &Address) -> TokenAmount {
        self.holdings.get(account).map(|v| *v).unwrap_or(0)
    }

    /// All non-empty holdings, sorted by account.
    pub fn holdings(&self) -> Vec<(Address, TokenAmount)> {
        let mut all: Vec<_> = self
            .holdings
            .iter()
            .filter(|e| *e.value() > 0)
            .map(|e| (*e.key(), *e.value()))
            .collect();
        all.sort_by_key(|(account, _)| *account);
        all
    }

    /// Move `amount` between two holders. Each side is touched under its own
    /// shard guard; the two guards are never held together.
    fn move_tokens(
        &self,
        from: Address,
        to: Address,
        amount: TokenAmount,
    ) -> Result<(), LedgerError> {
        if from == to {
            let available = self.balance_of(&from);
            if available < amount {
                return Err(LedgerError::InsufficientFunds {
                    available,
                    required: amount,
                });
            }
            return Ok(());
        }

        // Reject before touching anything if the credit could not land.
        let to_balance = self.balance_of(&to);
        to_balance.checked_add(amount).ok_or(LedgerError::Overflow)?;

        {
            let mut from_entry = self.holdings.entry(from).or_insert(0);
            if *from_entry < amount {
                return Err(LedgerError::InsufficientFunds {
                    available: *from_entry,
                    required: amount,
                });
            }
            *from_entry -= amount;
        }

        let mut to_entry = self.holdings.entry(to).or_insert(0);
        *to_entry = to_entry.saturating_add(amount);
        Ok(())
    }
}

#[async_trait]
impl ValueTransferPort for InternalTransferPort {
    async fn transfer_in(&self, holder: Address, amount: TokenAmount) -> Result<(), LedgerError> {
        self.move_tokens(holder, self.custody_account, amount)?;
        tracing::info!(holder = %holder, amount = %amount, "Tokens moved into custody");
        Ok(())
    }

    async fn transfer_out(
        &self,
        recipient: Address,
        amount: TokenAmount,
    ) -> Result<(), LedgerError> {
        self.move_tokens(self.custody_account, recipient, amount)?;
        tracing::info!(recipient = %recipient, amount = %amount, "Tokens released from custody");
        Ok(())
    }

    async fn custody_balance(&self) -> Result<TokenAmount, LedgerError> {
        Ok(self.balance_of(&self.custody_account))
    }

    fn port_id(&self) -> &str {
        "tp-internal"
    }
}
