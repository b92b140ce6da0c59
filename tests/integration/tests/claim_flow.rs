//! Integration test: off-line signed claims redeemed on the ledger.

use std::sync::Arc;

use tollgate_core::{Address, ClaimAccounting, ClaimPayout, LedgerConfig, PaymentRecord};
use tollgate_crypto::sign_payment;
use tollgate_integration_tests::{account, signed_claim, Market};
use tollgate_ledger::{ClaimOutcome, LedgerError, ManualClock};

fn market(payout: ClaimPayout) -> Market {
    market_with(ClaimAccounting::Cumulative, payout)
}

fn market_with(accounting: ClaimAccounting, payout: ClaimPayout) -> Market {
    let mut config = LedgerConfig::default();
    config.claim_accounting = accounting;
    config.claim_payout = payout;
    Market::with_clock(config, Arc::new(ManualClock::new(0)))
}

#[tokio::test]
async fn test_partial_claim_paid_out_to_receiver() {
    let market = Market::with_clock(LedgerConfig::default(), Arc::new(ManualClock::new(0)));
    let sender = account(10);
    let receiver = account(11);

    market.fund(&sender, 10_000_000_000).await;

    let claim = signed_claim(&sender, receiver.address(), 10_000_000_000, "u1", 5_000_000_000);
    let report = market
        .ledger
        .claim_funds(receiver.address(), &[claim.clone()])
        .await
        .unwrap();
    assert_eq!(report.total_redeemed, 5_000_000_000);

    assert_eq!(market.ledger.balances(&sender.address()).await, 5_000_000_000);
    assert_eq!(market.token.balance_of(&receiver.address()), 5_000_000_000);

    // The identical call changes nothing.
    let second = market
        .ledger
        .claim_funds(receiver.address(), &[claim.clone()])
        .await
        .unwrap();
    assert_eq!(second.total_redeemed, 0);
    assert_eq!(second.outcomes, vec![ClaimOutcome::SkippedFullyRedeemed]);
    assert_eq!(market.ledger.balances(&sender.address()).await, 5_000_000_000);
    assert_eq!(market.token.balance_of(&receiver.address()), 5_000_000_000);

    // Raising the running total to the ceiling pays out the rest.
    let mut full = claim;
    full.amount = 10_000_000_000;
    let third = market
        .ledger
        .claim_funds(receiver.address(), &[full])
        .await
        .unwrap();
    assert_eq!(third.total_redeemed, 5_000_000_000);
    assert_eq!(market.ledger.balances(&sender.address()).await, 0);
    assert_eq!(market.token.balance_of(&receiver.address()), 10_000_000_000);
    market.assert_custody_covers_balances().await;
}

#[tokio::test]
async fn test_credit_payout_keeps_value_on_ledger() {
    let market = market(ClaimPayout::Credit);
    let sender = account(12);
    let receiver = account(13);
    market.fund(&sender, 10_000_000_000).await;

    let claim = signed_claim(&sender, receiver.address(), 10_000_000_000, "u1", 5_000_000_000);
    market
        .ledger
        .claim_funds(receiver.address(), &[claim])
        .await
        .unwrap();

    assert_eq!(market.ledger.balances(&sender.address()).await, 5_000_000_000);
    assert_eq!(market.ledger.balances(&receiver.address()).await, 5_000_000_000);
    assert_eq!(market.token.balance_of(&receiver.address()), 0);
    market.assert_custody_covers_balances().await;
}

#[tokio::test]
async fn test_incremental_redemption_converges_to_signed_ceiling() {
    let market = market_with(ClaimAccounting::Incremental, ClaimPayout::Credit);
    let sender = account(14);
    let receiver = account(15);
    market.fund(&sender, 1_000).await;

    let claim = signed_claim(&sender, receiver.address(), 100, "conv", 30);
    let mut redeemed = Vec::new();
    for _ in 0..5 {
        let report = market
            .ledger
            .claim_funds(receiver.address(), &[claim.clone()])
            .await
            .unwrap();
        redeemed.push(report.total_redeemed);
    }
    assert_eq!(redeemed, vec![30, 30, 30, 10, 0]);
    assert_eq!(market.ledger.redeemed_amount(&claim.record).await, 100);
}

#[tokio::test]
async fn test_batch_with_forged_entry_applies_nothing() {
    let market = market(ClaimPayout::Credit);
    let sender = account(16);
    let receiver = account(17);
    market.fund(&sender, 1_000).await;

    let good = signed_claim(&sender, receiver.address(), 100, "good", 100);
    let mut forged = signed_claim(&sender, receiver.address(), 100, "forged", 100);
    forged.record.amount = 900;
    forged.amount = 900;

    let result = market
        .ledger
        .claim_funds(receiver.address(), &[good.clone(), forged])
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidSignature)));
    assert_eq!(market.ledger.balances(&sender.address()).await, 1_000);
    assert_eq!(market.ledger.redeemed_amount(&good.record).await, 0);
}

#[tokio::test]
async fn test_claim_signed_by_third_party_rejected() {
    let market = market(ClaimPayout::Credit);
    let sender = account(18);
    let impostor = account(19);
    let receiver = account(20);
    market.fund(&sender, 1_000).await;

    let record = PaymentRecord::new(sender.address(), receiver.address(), 500, "imp");
    let signature = sign_payment(&record, &impostor).to_bytes().to_vec();
    assert!(matches!(
        market.ledger.verify_payment(&record, &signature),
        Err(LedgerError::InvalidSignature)
    ));

    let result = market
        .ledger
        .claim_funds_parallel(receiver.address(), &[record], &[500], &[signature])
        .await;
    assert!(matches!(result, Err(LedgerError::InvalidSignature)));
}

#[tokio::test]
async fn test_only_receiver_may_claim() {
    let market = market(ClaimPayout::Credit);
    let sender = account(21);
    let receiver = account(22);
    market.fund(&sender, 1_000).await;

    let claim = signed_claim(&sender, receiver.address(), 100, "recv", 100);
    let result = market.ledger.claim_funds(Address([0x01; 20]), &[claim]).await;
    assert!(matches!(result, Err(LedgerError::NotReceiver { .. })));
}

#[tokio::test]
async fn test_underfunded_entries_skip_without_failing_batch() {
    let market = market(ClaimPayout::Credit);
    let rich = account(23);
    let poor = account(24);
    let receiver = account(25);
    market.fund(&rich, 1_000).await;
    market.fund(&poor, 10).await;

    let batch = [
        signed_claim(&poor, receiver.address(), 50, "p", 50),
        signed_claim(&rich, receiver.address(), 50, "r", 50),
        signed_claim(&rich, receiver.address(), 50, "z", 0),
    ];
    let report = market
        .ledger
        .claim_funds(receiver.address(), &batch)
        .await
        .unwrap();

    assert_eq!(
        report.outcomes,
        vec![
            ClaimOutcome::SkippedUnderfunded {
                required: 50,
                available: 10
            },
            ClaimOutcome::Applied { amount: 50 },
            ClaimOutcome::SkippedZeroAmount,
        ]
    );
    assert_eq!(market.ledger.balances(&receiver.address()).await, 50);

    // Once the poor sender tops up, the skipped claim becomes redeemable.
    market.fund(&poor, 40).await;
    let report = market
        .ledger
        .claim_funds(receiver.address(), &batch[..1])
        .await
        .unwrap();
    assert_eq!(report.total_redeemed, 50);
}

#[tokio::test]
async fn test_claim_report_json_shape() {
    let market = market(ClaimPayout::Credit);
    let sender = account(26);
    let receiver = account(27);
    market.fund(&sender, 10).await;

    let report = market
        .ledger
        .claim_funds(
            receiver.address(),
            &[signed_claim(&sender, receiver.address(), 10, "j", 4)],
        )
        .await
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total_redeemed"], 4);
    assert_eq!(json["outcomes"][0]["outcome"], "applied");
    assert_eq!(json["outcomes"][0]["data"]["amount"], 4);
}
