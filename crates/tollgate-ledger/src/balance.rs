use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tollgate_core::{Address, TokenAmount, WithdrawalRequest};

use crate::error::LedgerError;

/// Custodial balances and the per-account withdrawal requests against them.
///
/// Entries are never removed; an account that withdraws everything keeps a
/// zero balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBook {
    balances: HashMap<Address, TokenAmount>,
    withdrawals: HashMap<Address, WithdrawalRequest>,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account` (zero if never seen).
    pub fn balance_of(&self, account: &Address) -> TokenAmount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Sum of all balances.
    pub fn total(&self) -> Result<TokenAmount, LedgerError> {
        self.balances
            .values()
            .try_fold(0u128, |acc, v| acc.checked_add(*v))
            .ok_or(LedgerError::Overflow)
    }

    pub fn accounts(&self) -> usize {
        self.balances.len()
    }

    /// Fail with `Overflow` if `amount` cannot be credited to `account`.
    pub fn check_credit(&self, account: &Address, amount: TokenAmount) -> Result<TokenAmount, LedgerError> {
        self.balance_of(account)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)
    }

    /// Add `amount` to `account`, returning the new balance.
    pub fn credit(&mut self, account: Address, amount: TokenAmount) -> Result<TokenAmount, LedgerError> {
        let updated = self.check_credit(&account, amount)?;
        self.balances.insert(account, updated);
        Ok(updated)
    }

    /// Remove `amount` from `account`, returning the new balance.
    pub fn debit(&mut self, account: Address, amount: TokenAmount) -> Result<TokenAmount, LedgerError> {
        let available = self.balance_of(&account);
        let updated = available
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientFunds {
                available,
                required: amount,
            })?;
        self.balances.insert(account, updated);
        Ok(updated)
    }

    /// Move `amount` from one balance to another. Nothing changes on error.
    pub fn transfer(
        &mut self,
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
        let available = self.balance_of(&from);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                available,
                required: amount,
            });
        }
        self.check_credit(&to, amount)?;
        self.debit(from, amount)?;
        self.credit(to, amount)?;
        Ok(())
    }

    /// Withdrawal request of `account` (default: not pending).
    pub fn withdrawal(&self, account: &Address) -> WithdrawalRequest {
        self.withdrawals.get(account).copied().unwrap_or_default()
    }

    /// Open (or restart) a withdrawal request that becomes executable at
    /// `now + hold_secs`.
    pub fn request_withdraw(
        &mut self,
        account: Address,
        now: u64,
        hold_secs: u64,
    ) -> WithdrawalRequest {
        let request = WithdrawalRequest {
            pending: true,
            ready_at: now.saturating_add(hold_secs),
        };
        self.withdrawals.insert(account, request);
        request
    }

    /// The amount a withdrawal by `account` would release at `now`.
    pub fn withdrawable(&self, account: &Address, now: u64) -> Result<TokenAmount, LedgerError> {
        let request = self.withdrawal(account);
        if !request.pending {
            return Err(LedgerError::NotReady { ready_at: None });
        }
        if now < request.ready_at {
            return Err(LedgerError::NotReady {
                ready_at: Some(request.ready_at),
            });
        }
        Ok(self.balance_of(account))
    }

    /// Zero the balance of `account` and close its withdrawal request.
    pub fn settle_withdraw(&mut self, account: Address) -> TokenAmount {
        let amount = self.balance_of(&account);
        self.balances.insert(account, 0);
        if let Some(request) = self.withdrawals.get_mut(&account) {
            request.pending = false;
        }
        amount
    }
}
