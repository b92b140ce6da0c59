use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tollgate_core::{Address, ClaimPayout, HostEntry, LedgerConfig, PaymentRecord, TokenAmount, WithdrawalRequest};

use crate::access::{authorize, Role};
use crate::claims::{self, ClaimKey, ClaimReport, SignedClaim};
use crate::clock::Clock;
use crate::error::LedgerError;
use crate::events::LedgerEvent;
use crate::state::{LedgerSnapshot, LedgerState};
use crate::transfer::ValueTransferPort;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The settlement ledger service.
///
/// All state sits behind one async `RwLock`. Mutations hold the write guard
/// from first read to last write, including across calls into the
/// [`ValueTransferPort`], so every operation is atomic with respect to every
/// other. Queries take the read guard.
pub struct Ledger {
    state: RwLock<LedgerState>,
    port: Arc<dyn ValueTransferPort>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<LedgerEvent>,
}

impl Ledger {
    pub fn new(config: LedgerConfig, port: Arc<dyn ValueTransferPort>, clock: Arc<dyn Clock>) -> Self {
        Self::from_state(LedgerState::new(config), port, clock)
    }

    /// Rebuild a ledger from a snapshot.
    pub fn restore(
        snapshot: LedgerSnapshot,
        port: Arc<dyn ValueTransferPort>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        tracing::info!(
            version = snapshot.version,
            taken_at = snapshot.taken_at,
            accounts = snapshot.state.balances.accounts(),
            hosts = snapshot.state.hosts.len(),
            "Restoring ledger from snapshot"
        );
        Self::from_state(snapshot.state, port, clock)
    }

    fn from_state(state: LedgerState, port: Arc<dyn ValueTransferPort>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(state),
            port,
            clock,
            events,
        }
    }

    /// Receive every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.read().await;
        LedgerSnapshot::new(state.clone(), self.clock.now())
    }

    pub fn port(&self) -> &Arc<dyn ValueTransferPort> {
        &self.port
    }

    fn publish(&self, event: LedgerEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    // ---- balances ----------------------------------------------------------

    /// Pull `amount` from `caller` into custody and credit it. Returns the new
    /// balance.
    pub async fn deposit(&self, caller: Address, amount: TokenAmount) -> Result<TokenAmount, LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount("deposit amount must be positive".into()));
        }
        let mut state = self.state.write().await;
        state.balances.check_credit(&caller, amount)?;

        self.port.transfer_in(caller, amount).await?;
        let balance = state.balances.credit(caller, amount)?;
        drop(state);

        tracing::info!(account = %caller, amount = %amount, balance = %balance, "Deposit credited");
        self.publish(LedgerEvent::Deposited {
            account: caller,
            amount,
            balance,
        });
        Ok(balance)
    }

    /// Start (or restart) the withdrawal hold for `caller`.
    pub async fn request_withdraw(&self, caller: Address) -> Result<WithdrawalRequest, LedgerError> {
        let mut state = self.state.write().await;
        let hold = state.config.withdraw_hold_secs;
        let request = state.balances.request_withdraw(caller, self.clock.now(), hold);
        drop(state);

        tracing::info!(account = %caller, ready_at = request.ready_at, "Withdrawal requested");
        self.publish(LedgerEvent::WithdrawRequested {
            account: caller,
            ready_at: request.ready_at,
        });
        Ok(request)
    }

    /// Release `caller`'s whole balance once the hold has elapsed. Returns the
    /// amount released.
    pub async fn withdraw(&self, caller: Address) -> Result<TokenAmount, LedgerError> {
        let mut state = self.state.write().await;
        let amount = state.balances.withdrawable(&caller, self.clock.now())?;

        // Commit only once the value has actually left custody.
        self.port.transfer_out(caller, amount).await?;
        state.balances.settle_withdraw(caller);
        drop(state);

        tracing::info!(account = %caller, amount = %amount, "Withdrawal executed");
        self.publish(LedgerEvent::Withdrawn {
            account: caller,
            amount,
        });
        Ok(amount)
    }

    /// Admin only. Applies to requests made after the change.
    pub async fn set_withdraw_hold_time(&self, caller: Address, seconds: u64) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        authorize(&state.config, &caller, Role::Admin)?;
        state.config.withdraw_hold_secs = seconds;
        drop(state);

        tracing::info!(seconds, "Withdraw hold time changed");
        self.publish(LedgerEvent::HoldTimeChanged { seconds });
        Ok(())
    }

    /// Admin only. Hands the admin capability to `new_admin`.
    pub async fn transfer_admin(&self, caller: Address, new_admin: Address) -> Result<(), LedgerError> {
        if new_admin.is_zero() {
            return Err(LedgerError::Unauthorized("admin cannot be the zero address".into()));
        }
        let mut state = self.state.write().await;
        authorize(&state.config, &caller, Role::Admin)?;
        let previous = std::mem::replace(&mut state.config.admin, new_admin);
        drop(state);

        tracing::warn!(previous = %previous, admin = %new_admin, "Admin transferred");
        self.publish(LedgerEvent::AdminTransferred {
            previous,
            admin: new_admin,
        });
        Ok(())
    }

    pub async fn balances(&self, account: &Address) -> TokenAmount {
        self.state.read().await.balances.balance_of(account)
    }

    pub async fn withdrawal_request(&self, account: &Address) -> WithdrawalRequest {
        self.state.read().await.balances.withdrawal(account)
    }

    pub async fn withdraw_hold_time(&self) -> u64 {
        self.state.read().await.config.withdraw_hold_secs
    }

    pub async fn total_balances(&self) -> Result<TokenAmount, LedgerError> {
        self.state.read().await.balances.total()
    }

    pub async fn admin(&self) -> Address {
        self.state.read().await.config.admin
    }

    pub async fn config(&self) -> LedgerConfig {
        self.state.read().await.config.clone()
    }

    // ---- claims ------------------------------------------------------------

    /// Succeeds iff `signature` is `record.sender`'s signature over `record`.
    pub fn verify_payment(&self, record: &PaymentRecord, signature: &[u8]) -> Result<(), LedgerError> {
        if tollgate_crypto::verify_payment(record, signature) {
            Ok(())
        } else {
            Err(LedgerError::InvalidSignature)
        }
    }

    /// Total value already redeemed against `record`.
    pub async fn redeemed_amount(&self, record: &PaymentRecord) -> TokenAmount {
        self.state.read().await.redeemed.redeemed(&ClaimKey::of(record))
    }

    /// Parallel-array form of [`Ledger::claim_funds`].
    pub async fn claim_funds_parallel(
        &self,
        caller: Address,
        records: &[PaymentRecord],
        amounts: &[TokenAmount],
        signatures: &[Vec<u8>],
    ) -> Result<ClaimReport, LedgerError> {
        let claims = SignedClaim::zip(records, amounts, signatures)?;
        self.claim_funds(caller, &claims).await
    }

    /// Redeem a batch of signed claims addressed to `caller`, in order.
    ///
    /// A receiver mismatch or bad signature anywhere in the batch rejects the
    /// whole call with nothing applied. Fully redeemed, zero-amount and
    /// underfunded entries are skipped and reported.
    pub async fn claim_funds(&self, caller: Address, claims: &[SignedClaim]) -> Result<ClaimReport, LedgerError> {
        let keys = claims::validate_batch(&caller, claims)?;

        let mut state = self.state.write().await;
        let LedgerState {
            config,
            balances,
            redeemed,
            ..
        } = &mut *state;

        let (report, applied) =
            claims::apply_batch(config.claim_accounting, balances, redeemed, claims, &keys)?;

        if config.claim_payout == ClaimPayout::Transfer && report.total_redeemed > 0 {
            let total = report.total_redeemed;
            if let Err(e) = balances.debit(caller, total) {
                claims::revert(balances, redeemed, &applied);
                return Err(e);
            }
            if let Err(e) = self.port.transfer_out(caller, total).await {
                tracing::warn!(receiver = %caller, amount = %total, error = %e, "Claim payout failed, rolling back batch");
                if let Err(credit_err) = balances.credit(caller, total) {
                    tracing::error!(receiver = %caller, error = %credit_err, "Failed to restore receiver balance");
                }
                claims::revert(balances, redeemed, &applied);
                return Err(e);
            }
        }
        drop(state);

        tracing::info!(
            receiver = %caller,
            entries = claims.len(),
            applied = report.applied(),
            total = %report.total_redeemed,
            "Claims settled"
        );
        self.publish(LedgerEvent::ClaimSettled {
            receiver: caller,
            report: report.clone(),
        });
        Ok(report)
    }

    // ---- host registry -----------------------------------------------------

    /// Admin only. Registers (or re-registers) `operator`'s endpoint as active.
    pub async fn add_host(
        &self,
        caller: Address,
        url: String,
        operator: Address,
        weight: u64,
    ) -> Result<HostEntry, LedgerError> {
        let mut state = self.state.write().await;
        authorize(&state.config, &caller, Role::Admin)?;
        let host = state.hosts.add(url, operator, weight);
        drop(state);

        tracing::info!(operator = %operator, url = %host.url, weight, "Host registered");
        self.publish(LedgerEvent::HostAdded { host: host.clone() });
        Ok(host)
    }

    /// Admin only.
    pub async fn remove_host(&self, caller: Address, operator: Address) -> Result<HostEntry, LedgerError> {
        let mut state = self.state.write().await;
        authorize(&state.config, &caller, Role::Admin)?;
        let host = state.hosts.remove(&operator)?;
        drop(state);

        tracing::info!(operator = %operator, "Host removed");
        self.publish(LedgerEvent::HostRemoved { operator });
        Ok(host)
    }

    /// Operator only: take the caller's own entry out of the active set.
    pub async fn pause(&self, caller: Address) -> Result<HostEntry, LedgerError> {
        let host = self.set_active(caller, false).await?;
        tracing::info!(operator = %caller, "Host paused");
        self.publish(LedgerEvent::HostPaused { operator: caller });
        Ok(host)
    }

    /// Operator only: put the caller's own entry back in the active set.
    pub async fn unpause(&self, caller: Address) -> Result<HostEntry, LedgerError> {
        let host = self.set_active(caller, true).await?;
        tracing::info!(operator = %caller, "Host unpaused");
        self.publish(LedgerEvent::HostUnpaused { operator: caller });
        Ok(host)
    }

    /// Entries are keyed by operator, so a caller only ever reaches its own.
    async fn set_active(&self, caller: Address, active: bool) -> Result<HostEntry, LedgerError> {
        self.state.write().await.hosts.set_active(&caller, active)
    }

    pub async fn get_host(&self, operator: &Address) -> Result<HostEntry, LedgerError> {
        self.state.read().await.hosts.get(operator)
    }

    pub async fn get_hosts(&self) -> Vec<HostEntry> {
        self.state.read().await.hosts.all()
    }

    pub async fn get_active_hosts(&self) -> Vec<HostEntry> {
        self.state.read().await.hosts.active()
    }
}
