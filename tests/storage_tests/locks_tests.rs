//! Tests for CollectionLocks
//!
//! These tests verify:
//! - One writer per collection name at a time
//! - Different names never block each other
//! - Registry entries disappear once nobody holds or waits on them

use std::sync::Arc;
use std::time::Duration;

use flickdb::storage::CollectionLocks;

#[tokio::test]
async fn test_entry_removed_after_release() {
    let locks = CollectionLocks::new();

    let guard = locks.acquire("users").await;
    assert_eq!(locks.len(), 1);

    drop(guard);
    assert!(locks.is_empty());
}

#[tokio::test]
async fn test_distinct_names_do_not_block() {
    let locks = CollectionLocks::new();

    let _users = locks.acquire("users").await;
    let orders = tokio::time::timeout(Duration::from_secs(1), locks.acquire("orders"))
        .await
        .expect("lock on another name should be free");

    assert_eq!(locks.len(), 2);
    drop(orders);
    assert_eq!(locks.len(), 1);
}

#[tokio::test]
async fn test_waiter_keeps_entry_until_done() {
    let locks = Arc::new(CollectionLocks::new());
    let first = locks.acquire("users").await;

    let waiter = {
        let locks = Arc::clone(&locks);
        tokio::spawn(async move {
            let _guard = locks.acquire("users").await;
        })
    };

    // Same name is held, so the waiter cannot finish yet
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());

    drop(first);
    assert_eq!(locks.len(), 1);

    waiter.await.unwrap();
    assert!(locks.is_empty());
}
