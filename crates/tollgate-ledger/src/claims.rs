//! Redemption of signed payment claims.
//!
//! A claim is redeemed against the full digest of its record, so two records
//! that differ in any field (including the signed ceiling) are tracked
//! independently. The sum of all redeemed value for one record never exceeds
//! `record.amount`; how each entry's requested amount counts against that
//! ceiling is decided by [`ClaimAccounting`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tollgate_core::{Address, ClaimAccounting, PaymentRecord, TokenAmount};
use tollgate_crypto::{record_digest, verify_payment};

use crate::balance::BalanceBook;
use crate::error::LedgerError;

/// Replay identity of a payment record: its keccak256 record digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClaimKey(pub [u8; 32]);

impl ClaimKey {
    pub fn of(record: &PaymentRecord) -> Self {
        Self(record_digest(record))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(s: &str) -> Result<Self, LedgerError> {
        let trimmed = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(trimmed)
            .map_err(|e| LedgerError::Internal(format!("invalid claim key: {}", e)))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LedgerError::Internal("claim key must be 32 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl fmt::Display for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ClaimKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClaimKey({})", self.to_hex())
    }
}

impl Serialize for ClaimKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ClaimKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Cumulative redeemed value per claim key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemedClaims {
    redeemed: HashMap<ClaimKey, TokenAmount>,
}

impl RedeemedClaims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redeemed(&self, key: &ClaimKey) -> TokenAmount {
        self.redeemed.get(key).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.redeemed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redeemed.is_empty()
    }

    pub(crate) fn add(&mut self, key: ClaimKey, amount: TokenAmount) {
        let entry = self.redeemed.entry(key).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    pub(crate) fn subtract(&mut self, key: &ClaimKey, amount: TokenAmount) {
        if let Some(entry) = self.redeemed.get_mut(key) {
            *entry = entry.saturating_sub(amount);
            if *entry == 0 {
                self.redeemed.remove(key);
            }
        }
    }
}

/// One entry of a claim batch: the signed record, the value to redeem now,
/// and the sender's 65-byte signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedClaim {
    pub record: PaymentRecord,
    pub amount: TokenAmount,
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
}

impl SignedClaim {
    pub fn new(record: PaymentRecord, amount: TokenAmount, signature: impl Into<Vec<u8>>) -> Self {
        Self {
            record,
            amount,
            signature: signature.into(),
        }
    }

    /// Zip the parallel-array form of a batch into entries.
    pub fn zip(
        records: &[PaymentRecord],
        amounts: &[TokenAmount],
        signatures: &[Vec<u8>],
    ) -> Result<Vec<SignedClaim>, LedgerError> {
        if records.len() != amounts.len() || records.len() != signatures.len() {
            return Err(LedgerError::LengthMismatch {
                records: records.len(),
                amounts: amounts.len(),
                signatures: signatures.len(),
            });
        }
        Ok(records
            .iter()
            .zip(amounts)
            .zip(signatures)
            .map(|((record, amount), signature)| {
                SignedClaim::new(record.clone(), *amount, signature.clone())
            })
            .collect())
    }
}

/// What happened to one entry of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Applied { amount: TokenAmount },
    SkippedZeroAmount,
    /// Nothing left to redeem for this entry.
    SkippedFullyRedeemed,
    SkippedUnderfunded {
        required: TokenAmount,
        available: TokenAmount,
    },
}

/// Per-entry outcomes of a batch, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReport {
    pub outcomes: Vec<ClaimOutcome>,
    pub total_redeemed: TokenAmount,
}

impl ClaimReport {
    pub fn applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ClaimOutcome::Applied { .. }))
            .count()
    }
}

/// A committed redemption, kept so a batch can be undone.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AppliedClaim {
    pub sender: Address,
    pub receiver: Address,
    pub key: ClaimKey,
    pub amount: TokenAmount,
}

/// Check receiver and signature of every entry, in order, without touching
/// state. The first failing entry decides the error.
pub(crate) fn validate_batch(
    caller: &Address,
    claims: &[SignedClaim],
) -> Result<Vec<ClaimKey>, LedgerError> {
    claims
        .iter()
        .map(|claim| {
            if claim.record.receiver != *caller {
                return Err(LedgerError::NotReceiver {
                    caller: *caller,
                    receiver: claim.record.receiver,
                });
            }
            if !verify_payment(&claim.record, &claim.signature) {
                tracing::warn!(
                    sender = %claim.record.sender,
                    uuid = %claim.record.uuid,
                    "Claim rejected: invalid signature"
                );
                return Err(LedgerError::InvalidSignature);
            }
            Ok(ClaimKey::of(&claim.record))
        })
        .collect()
}

/// Apply a validated batch in order. On error every entry applied so far is
/// reverted before returning.
pub(crate) fn apply_batch(
    accounting: ClaimAccounting,
    balances: &mut BalanceBook,
    redeemed: &mut RedeemedClaims,
    claims: &[SignedClaim],
    keys: &[ClaimKey],
) -> Result<(ClaimReport, Vec<AppliedClaim>), LedgerError> {
    let mut report = ClaimReport::default();
    let mut applied: Vec<AppliedClaim> = Vec::new();

    for (claim, key) in claims.iter().zip(keys) {
        match apply_one(accounting, balances, redeemed, claim, *key) {
            Ok(outcome) => {
                if let ClaimOutcome::Applied { amount } = outcome {
                    applied.push(AppliedClaim {
                        sender: claim.record.sender,
                        receiver: claim.record.receiver,
                        key: *key,
                        amount,
                    });
                    report.total_redeemed = match report.total_redeemed.checked_add(amount) {
                        Some(total) => total,
                        None => {
                            revert(balances, redeemed, &applied);
                            return Err(LedgerError::Overflow);
                        }
                    };
                }
                report.outcomes.push(outcome);
            }
            Err(e) => {
                revert(balances, redeemed, &applied);
                return Err(e);
            }
        }
    }
    Ok((report, applied))
}

fn apply_one(
    accounting: ClaimAccounting,
    balances: &mut BalanceBook,
    redeemed: &mut RedeemedClaims,
    claim: &SignedClaim,
    key: ClaimKey,
) -> Result<ClaimOutcome, LedgerError> {
    if claim.amount == 0 {
        return Ok(ClaimOutcome::SkippedZeroAmount);
    }
    let redeemable =
        accounting.redeemable(claim.amount, claim.record.amount, redeemed.redeemed(&key));
    if redeemable == 0 {
        return Ok(ClaimOutcome::SkippedFullyRedeemed);
    }
    let available = balances.balance_of(&claim.record.sender);
    if available < redeemable {
        tracing::debug!(
            sender = %claim.record.sender,
            uuid = %claim.record.uuid,
            required = %redeemable,
            available = %available,
            "Claim skipped: sender underfunded"
        );
        return Ok(ClaimOutcome::SkippedUnderfunded {
            required: redeemable,
            available,
        });
    }
    balances.transfer(claim.record.sender, claim.record.receiver, redeemable)?;
    redeemed.add(key, redeemable);
    Ok(ClaimOutcome::Applied { amount: redeemable })
}

/// Undo `applied` in reverse order.
pub(crate) fn revert(balances: &mut BalanceBook, redeemed: &mut RedeemedClaims, applied: &[AppliedClaim]) {
    for entry in applied.iter().rev() {
        if let Err(e) = balances.transfer(entry.receiver, entry.sender, entry.amount) {
            tracing::error!(key = %entry.key, error = %e, "Failed to revert claim");
        }
        redeemed.subtract(&entry.key, entry.amount);
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let trimmed = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(trimmed).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollgate_crypto::{sign_payment, KeyPair};

    fn sender() -> KeyPair {
        KeyPair::from_seed(&[0x11; 32]).unwrap()
    }

    const RECEIVER: Address = Address([0x22; 20]);

    fn claim(kp: &KeyPair, ceiling: TokenAmount, uuid: &str, amount: TokenAmount) -> SignedClaim {
        let record = PaymentRecord::new(kp.address(), RECEIVER, ceiling, uuid);
        let sig = sign_payment(&record, kp);
        SignedClaim::new(record, amount, sig.to_bytes().to_vec())
    }

    fn run_with(
        accounting: ClaimAccounting,
        balances: &mut BalanceBook,
        redeemed: &mut RedeemedClaims,
        claims: &[SignedClaim],
    ) -> Result<ClaimReport, LedgerError> {
        let keys = validate_batch(&RECEIVER, claims)?;
        apply_batch(accounting, balances, redeemed, claims, &keys).map(|(report, _)| report)
    }

    fn run(
        balances: &mut BalanceBook,
        redeemed: &mut RedeemedClaims,
        claims: &[SignedClaim],
    ) -> Result<ClaimReport, LedgerError> {
        run_with(ClaimAccounting::Cumulative, balances, redeemed, claims)
    }

    #[test]
    fn test_cumulative_resubmission_redeems_nothing() {
        let kp = sender();
        let mut balances = BalanceBook::new();
        let mut redeemed = RedeemedClaims::new();
        balances.credit(kp.address(), 1_000).unwrap();

        let report = run(&mut balances, &mut redeemed, &[claim(&kp, 100, "c", 60)]).unwrap();
        assert_eq!(report.outcomes, vec![ClaimOutcome::Applied { amount: 60 }]);

        let report = run(&mut balances, &mut redeemed, &[claim(&kp, 100, "c", 60)]).unwrap();
        assert_eq!(report.outcomes, vec![ClaimOutcome::SkippedFullyRedeemed]);

        // A higher running total redeems the difference, capped at the ceiling.
        let report = run(&mut balances, &mut redeemed, &[claim(&kp, 100, "c", 250)]).unwrap();
        assert_eq!(report.outcomes, vec![ClaimOutcome::Applied { amount: 40 }]);

        assert_eq!(balances.balance_of(&kp.address()), 900);
        assert_eq!(balances.balance_of(&RECEIVER), 100);
    }

    #[test]
    fn test_incremental_partial_then_capped_redemption() {
        let kp = sender();
        let mut balances = BalanceBook::new();
        let mut redeemed = RedeemedClaims::new();
        let mode = ClaimAccounting::Incremental;
        balances.credit(kp.address(), 1_000).unwrap();

        let entry = [claim(&kp, 100, "a", 60)];
        let report = run_with(mode, &mut balances, &mut redeemed, &entry).unwrap();
        assert_eq!(report.outcomes, vec![ClaimOutcome::Applied { amount: 60 }]);

        let report = run_with(mode, &mut balances, &mut redeemed, &entry).unwrap();
        assert_eq!(report.outcomes, vec![ClaimOutcome::Applied { amount: 40 }]);

        let report = run_with(mode, &mut balances, &mut redeemed, &entry).unwrap();
        assert_eq!(report.outcomes, vec![ClaimOutcome::SkippedFullyRedeemed]);
        assert_eq!(report.total_redeemed, 0);

        assert_eq!(balances.balance_of(&kp.address()), 900);
        assert_eq!(balances.balance_of(&RECEIVER), 100);
    }

    #[test]
    fn test_zero_amount_skipped() {
        let kp = sender();
        let mut balances = BalanceBook::new();
        let mut redeemed = RedeemedClaims::new();
        balances.credit(kp.address(), 10).unwrap();

        let report = run(&mut balances, &mut redeemed, &[claim(&kp, 10, "z", 0)]).unwrap();
        assert_eq!(report.outcomes, vec![ClaimOutcome::SkippedZeroAmount]);
        assert!(redeemed.is_empty());
    }

    #[test]
    fn test_underfunded_entry_skipped_batch_continues() {
        let kp = sender();
        let mut balances = BalanceBook::new();
        let mut redeemed = RedeemedClaims::new();
        balances.credit(kp.address(), 50).unwrap();

        let batch = [claim(&kp, 100, "big", 100), claim(&kp, 30, "small", 30)];
        let report = run(&mut balances, &mut redeemed, &batch).unwrap();
        assert_eq!(
            report.outcomes,
            vec![
                ClaimOutcome::SkippedUnderfunded {
                    required: 100,
                    available: 50
                },
                ClaimOutcome::Applied { amount: 30 },
            ]
        );
        assert_eq!(report.total_redeemed, 30);
        assert_eq!(report.applied(), 1);
    }

    #[test]
    fn test_distinct_ceilings_are_distinct_claims() {
        let kp = sender();
        let mut balances = BalanceBook::new();
        let mut redeemed = RedeemedClaims::new();
        balances.credit(kp.address(), 1_000).unwrap();

        run(&mut balances, &mut redeemed, &[claim(&kp, 100, "same", 100)]).unwrap();
        let report = run(&mut balances, &mut redeemed, &[claim(&kp, 200, "same", 200)]).unwrap();
        assert_eq!(report.total_redeemed, 200);
        assert_eq!(redeemed.len(), 2);
    }

    #[test]
    fn test_invalid_signature_aborts_whole_batch() {
        let kp = sender();
        let mut balances = BalanceBook::new();
        let mut redeemed = RedeemedClaims::new();
        balances.credit(kp.address(), 1_000).unwrap();

        let mut forged = claim(&kp, 100, "forged", 100);
        forged.record.amount = 1_000;
        let batch = [claim(&kp, 100, "ok", 100), forged];

        let result = run(&mut balances, &mut redeemed, &batch);
        assert!(matches!(result, Err(LedgerError::InvalidSignature)));
        assert_eq!(balances.balance_of(&kp.address()), 1_000);
        assert!(redeemed.is_empty());
    }

    #[test]
    fn test_wrong_receiver_rejected() {
        let kp = sender();
        let entry = claim(&kp, 100, "x", 100);
        let result = validate_batch(&Address([0x99; 20]), &[entry]);
        assert!(matches!(result, Err(LedgerError::NotReceiver { .. })));
    }

    #[test]
    fn test_revert_restores_state() {
        let kp = sender();
        let mut balances = BalanceBook::new();
        let mut redeemed = RedeemedClaims::new();
        balances.credit(kp.address(), 100).unwrap();

        let batch = [claim(&kp, 100, "r", 70)];
        let keys = validate_batch(&RECEIVER, &batch).unwrap();
        let (_, applied) =
            apply_batch(ClaimAccounting::Cumulative, &mut balances, &mut redeemed, &batch, &keys)
                .unwrap();
        revert(&mut balances, &mut redeemed, &applied);

        assert_eq!(balances.balance_of(&kp.address()), 100);
        assert_eq!(balances.balance_of(&RECEIVER), 0);
        assert_eq!(redeemed.redeemed(&keys[0]), 0);
    }

    #[test]
    fn test_zip_length_mismatch() {
        let result = SignedClaim::zip(&[], &[1], &[]);
        assert!(matches!(
            result,
            Err(LedgerError::LengthMismatch {
                records: 0,
                amounts: 1,
                signatures: 0
            })
        ));
    }

    #[test]
    fn test_signed_claim_json_uses_hex_signature() {
        let entry = claim(&sender(), 5, "json", 5);
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json["signature"].as_str().unwrap().starts_with("0x"));
        let back: SignedClaim = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_report_json_keeps_amounts_above_u64() {
        let big = u64::MAX as u128 + 1;
        let report = ClaimReport {
            outcomes: vec![
                ClaimOutcome::Applied { amount: big },
                ClaimOutcome::SkippedUnderfunded {
                    required: u128::MAX,
                    available: big,
                },
                ClaimOutcome::SkippedFullyRedeemed,
            ],
            total_redeemed: big,
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: ClaimReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["outcomes"][0]["outcome"], "applied");
        assert_eq!(value["outcomes"][2]["outcome"], "skipped_fully_redeemed");
    }

    #[test]
    fn test_claim_key_hex_roundtrip() {
        let entry = claim(&sender(), 5, "key", 5);
        let key = ClaimKey::of(&entry.record);
        assert_eq!(ClaimKey::from_hex(&key.to_hex()).unwrap(), key);
    }
}
