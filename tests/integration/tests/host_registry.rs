//! Integration test: host registry administration and filtering.

use tollgate_core::{Address, HostEntry};
use tollgate_integration_tests::{account, Market};
use tollgate_ledger::{LedgerError, LedgerEvent};

fn operators(hosts: &[HostEntry]) -> Vec<Address> {
    hosts.iter().map(|h| h.operator).collect()
}

#[tokio::test]
async fn test_active_view_is_filtered_subsequence() {
    let market = Market::new();
    let admin = market.admin.address();
    let ops: Vec<Address> = (30..34).map(|n| account(n).address()).collect();

    for (i, op) in ops.iter().enumerate() {
        market
            .ledger
            .add_host(admin, format!("https://host-{}.example", i), *op, i as u64 + 1)
            .await
            .unwrap();
    }

    market.ledger.pause(ops[1]).await.unwrap();
    market.ledger.pause(ops[3]).await.unwrap();

    let all = market.ledger.get_hosts().await;
    let active = market.ledger.get_active_hosts().await;
    assert_eq!(operators(&all), ops);
    assert_eq!(operators(&active), vec![ops[0], ops[2]]);

    market.ledger.unpause(ops[3]).await.unwrap();
    assert_eq!(
        operators(&market.ledger.get_active_hosts().await),
        vec![ops[0], ops[2], ops[3]]
    );
}

#[tokio::test]
async fn test_remove_drops_entry_from_both_views() {
    let market = Market::new();
    let admin = market.admin.address();
    let a = account(40).address();
    let b = account(41).address();
    let c = account(42).address();

    for op in [a, b, c] {
        market
            .ledger
            .add_host(admin, "https://h.example".into(), op, 1)
            .await
            .unwrap();
    }
    market.ledger.remove_host(admin, b).await.unwrap();

    assert_eq!(operators(&market.ledger.get_hosts().await), vec![a, c]);
    assert_eq!(operators(&market.ledger.get_active_hosts().await), vec![a, c]);
    assert!(matches!(
        market.ledger.get_host(&b).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        market.ledger.pause(b).await,
        Err(LedgerError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_registry_mutations_require_admin() {
    let market = Market::new();
    let outsider = account(50).address();
    let op = account(51).address();

    assert!(matches!(
        market
            .ledger
            .add_host(outsider, "https://h.example".into(), op, 1)
            .await,
        Err(LedgerError::Unauthorized(_))
    ));

    market
        .ledger
        .add_host(market.admin.address(), "https://h.example".into(), op, 1)
        .await
        .unwrap();
    assert!(matches!(
        market.ledger.remove_host(op, op).await,
        Err(LedgerError::Unauthorized(_))
    ));
    assert_eq!(market.ledger.get_hosts().await.len(), 1);
}

#[tokio::test]
async fn test_readd_reactivates_in_place() {
    let market = Market::new();
    let admin = market.admin.address();
    let a = account(60).address();
    let b = account(61).address();

    market.ledger.add_host(admin, "https://a".into(), a, 1).await.unwrap();
    market.ledger.add_host(admin, "https://b".into(), b, 1).await.unwrap();
    market.ledger.pause(a).await.unwrap();

    let entry = market
        .ledger
        .add_host(admin, "https://a-v2".into(), a, 5)
        .await
        .unwrap();
    assert!(entry.active);
    assert_eq!(entry.weight, 5);
    assert_eq!(operators(&market.ledger.get_active_hosts().await), vec![a, b]);
    assert_eq!(market.ledger.get_host(&a).await.unwrap().url, "https://a-v2");
}

#[tokio::test]
async fn test_admin_handover_moves_registry_control() {
    let market = Market::new();
    let old_admin = market.admin.address();
    let new_admin = account(70).address();
    let op = account(71).address();
    let mut events = market.ledger.subscribe();

    market.ledger.transfer_admin(old_admin, new_admin).await.unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        LedgerEvent::AdminTransferred {
            previous: old_admin,
            admin: new_admin
        }
    );

    assert!(market
        .ledger
        .add_host(old_admin, "https://h".into(), op, 1)
        .await
        .is_err());
    market
        .ledger
        .add_host(new_admin, "https://h".into(), op, 1)
        .await
        .unwrap();
}
