//! Fixtures shared by the cross-crate scenarios in `tests/`.

use std::sync::Arc;

use tollgate_core::{Address, LedgerConfig, PaymentRecord, TokenAmount};
use tollgate_crypto::{sign_payment, KeyPair};
use tollgate_ledger::{Clock, InternalTransferPort, Ledger, ManualClock, SignedClaim, SystemClock};

pub const CUSTODY: Address = Address([0xc0; 20]);

/// Deterministic test account `n`.
pub fn account(n: u8) -> KeyPair {
    let mut seed = [0u8; 32];
    seed[31] = n;
    seed[0] = 0x70;
    KeyPair::from_seed(&seed).expect("valid seed")
}

/// A ledger wired to an in-memory token.
pub struct Market {
    pub ledger: Ledger,
    pub token: Arc<InternalTransferPort>,
    pub admin: KeyPair,
}

impl Market {
    fn build(config: LedgerConfig, admin: KeyPair, clock: Arc<dyn Clock>) -> Self {
        let token = Arc::new(InternalTransferPort::new(CUSTODY));
        let ledger = Ledger::new(config, token.clone(), clock);
        Self {
            ledger,
            token,
            admin,
        }
    }

    /// Market on the wall clock.
    pub fn new() -> Self {
        let admin = account(0);
        Self::build(LedgerConfig::new(admin.address()), admin, Arc::new(SystemClock))
    }

    /// Market on a manual clock, with a custom config (admin is overwritten).
    pub fn with_clock(mut config: LedgerConfig, clock: Arc<ManualClock>) -> Self {
        let admin = account(0);
        config.admin = admin.address();
        Self::build(config, admin, clock)
    }

    /// Mint `amount` to `who` and deposit all of it.
    pub async fn fund(&self, who: &KeyPair, amount: TokenAmount) {
        self.token.mint(who.address(), amount).expect("mint");
        self.ledger
            .deposit(who.address(), amount)
            .await
            .expect("deposit");
    }

    /// Custody invariant: ledger balances never exceed what custody holds.
    pub async fn assert_custody_covers_balances(&self) {
        let total = self.ledger.total_balances().await.expect("total");
        let custody = self.token.balance_of(&CUSTODY);
        assert!(
            total <= custody,
            "ledger balances {} exceed custody {}",
            total,
            custody
        );
    }
}

impl Default for Market {
    fn default() -> Self {
        Self::new()
    }
}

/// `payer` authorizes `receiver` to redeem up to `ceiling` under `uuid`.
pub fn signed_claim(
    payer: &KeyPair,
    receiver: Address,
    ceiling: TokenAmount,
    uuid: &str,
    redeem: TokenAmount,
) -> SignedClaim {
    let record = PaymentRecord::new(payer.address(), receiver, ceiling, uuid);
    let signature = sign_payment(&record, payer);
    tracing::debug!(uuid, signature = %signature.to_hex(), "signed test claim");
    SignedClaim::new(record, redeem, signature.to_bytes().to_vec())
}
