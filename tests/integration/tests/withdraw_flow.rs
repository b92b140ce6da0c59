//! Integration test: deposit, time-locked withdrawal and custody accounting.

use std::sync::Arc;
use std::time::Duration;

use tollgate_core::LedgerConfig;
use tollgate_integration_tests::{account, Market, CUSTODY};
use tollgate_ledger::{LedgerError, LedgerEvent, ManualClock};

#[tokio::test]
async fn test_withdraw_after_real_two_second_hold() {
    let market = Market::new();
    let user = account(1);
    let amount: u128 = 50_000_000_000;

    market.fund(&user, amount).await;
    assert_eq!(market.token.balance_of(&user.address()), 0);
    assert_eq!(market.ledger.balances(&user.address()).await, amount);

    market
        .ledger
        .set_withdraw_hold_time(market.admin.address(), 2)
        .await
        .unwrap();
    market.ledger.request_withdraw(user.address()).await.unwrap();

    let early = market.ledger.withdraw(user.address()).await;
    assert!(matches!(early, Err(LedgerError::NotReady { .. })));

    tokio::time::sleep(Duration::from_millis(2_100)).await;

    let withdrawn = market.ledger.withdraw(user.address()).await.unwrap();
    assert_eq!(withdrawn, amount);
    assert_eq!(market.ledger.balances(&user.address()).await, 0);
    assert_eq!(market.token.balance_of(&user.address()), amount);
    assert_eq!(market.token.balance_of(&CUSTODY), 0);
}

#[tokio::test]
async fn test_withdraw_without_request_is_not_ready() {
    let clock = Arc::new(ManualClock::new(10_000));
    let market = Market::with_clock(LedgerConfig::default(), clock.clone());
    let user = account(2);
    market.fund(&user, 1_000).await;

    clock.advance(1_000_000);
    assert!(matches!(
        market.ledger.withdraw(user.address()).await,
        Err(LedgerError::NotReady { ready_at: None })
    ));
    assert_eq!(market.ledger.balances(&user.address()).await, 1_000);
}

#[tokio::test]
async fn test_round_trip_restores_prior_external_balance() {
    let clock = Arc::new(ManualClock::new(0));
    let mut config = LedgerConfig::default();
    config.withdraw_hold_secs = 60;
    let market = Market::with_clock(config, clock.clone());
    let user = account(3);

    market.token.mint(user.address(), 700).unwrap();
    market.ledger.deposit(user.address(), 300).await.unwrap();
    market.ledger.deposit(user.address(), 200).await.unwrap();
    assert_eq!(market.token.balance_of(&user.address()), 200);

    let request = market.ledger.request_withdraw(user.address()).await.unwrap();
    assert_eq!(request.ready_at, 60);
    clock.set(59);
    assert!(market.ledger.withdraw(user.address()).await.is_err());
    clock.set(60);
    assert_eq!(market.ledger.withdraw(user.address()).await.unwrap(), 500);

    assert_eq!(market.token.balance_of(&user.address()), 700);
    market.assert_custody_covers_balances().await;
}

#[tokio::test]
async fn test_rerequest_resets_timer() {
    let clock = Arc::new(ManualClock::new(0));
    let mut config = LedgerConfig::default();
    config.withdraw_hold_secs = 10;
    let market = Market::with_clock(config, clock.clone());
    let user = account(4);
    market.fund(&user, 5).await;

    market.ledger.request_withdraw(user.address()).await.unwrap();
    clock.advance(8);
    market.ledger.request_withdraw(user.address()).await.unwrap();
    clock.advance(8);
    assert!(matches!(
        market.ledger.withdraw(user.address()).await,
        Err(LedgerError::NotReady { ready_at: Some(18) })
    ));
    clock.advance(2);
    assert_eq!(market.ledger.withdraw(user.address()).await.unwrap(), 5);
}

#[tokio::test]
async fn test_deposit_shortfall_surfaces_insufficient_funds() {
    let market = Market::new();
    let user = account(5);
    market.token.mint(user.address(), 99).unwrap();

    let err = market.ledger.deposit(user.address(), 100).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds {
            available: 99,
            required: 100
        }
    ));
    assert_eq!(market.ledger.total_balances().await.unwrap(), 0);
}

#[tokio::test]
async fn test_events_follow_withdraw_lifecycle() {
    let clock = Arc::new(ManualClock::new(100));
    let market = Market::with_clock(LedgerConfig::default(), clock.clone());
    let user = account(6);
    let mut events = market.ledger.subscribe();

    market.fund(&user, 42).await;
    market.ledger.request_withdraw(user.address()).await.unwrap();
    market.ledger.withdraw(user.address()).await.unwrap();

    let kinds: Vec<&str> = [
        events.recv().await.unwrap(),
        events.recv().await.unwrap(),
        events.recv().await.unwrap(),
    ]
    .iter()
    .map(LedgerEvent::kind)
    .collect();
    assert_eq!(kinds, vec!["deposited", "withdraw_requested", "withdrawn"]);
}
