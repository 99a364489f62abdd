use auth_kv_adapter::{
    AdapterConfig, AdapterSession, InMemoryKvStore, KvAdapter, KvStore, SessionUpdate,
};

use crate::common::scenarios;
use crate::common::{TestUsers, expires_in, github_account, unique_suffix};

fn memory_adapter() -> (KvAdapter<InMemoryKvStore>, InMemoryKvStore) {
    let store = InMemoryKvStore::new();
    (KvAdapter::new(store.clone()), store)
}

#[tokio::test]
async fn test_user_round_trip() {
    let (adapter, _store) = memory_adapter();
    scenarios::user_round_trip(&adapter).await;
}

#[tokio::test]
async fn test_user_email_change() {
    let (adapter, _store) = memory_adapter();
    scenarios::user_email_change(&adapter).await;
}

#[tokio::test]
async fn test_account_link_unlink() {
    let (adapter, _store) = memory_adapter();
    scenarios::account_link_unlink(&adapter).await;
}

#[tokio::test]
async fn test_delete_user_cascade() {
    let (adapter, _store) = memory_adapter();
    scenarios::delete_user_cascade(&adapter).await;
}

#[tokio::test]
async fn test_session_lifecycle() {
    let (adapter, _store) = memory_adapter();
    scenarios::session_lifecycle(&adapter).await;
}

#[tokio::test]
async fn test_verification_single_use() {
    let (adapter, _store) = memory_adapter();
    scenarios::verification_single_use(&adapter).await;
}

#[tokio::test]
async fn test_invalid_identifiers() {
    let (adapter, store) = memory_adapter();
    scenarios::invalid_identifiers(&adapter).await;
    assert!(store.keys().await.is_empty());
}

#[tokio::test]
async fn test_full_lifecycle_leaves_no_keys() {
    // Given a user with an account and a session, and cascading deletes
    let store = InMemoryKvStore::new();
    let config = AdapterConfig::default().with_session_cascade(true);
    let adapter = KvAdapter::with_config(store.clone(), config).unwrap();
    let suffix = unique_suffix();
    let alice = TestUsers::alice(&suffix);
    adapter.create_user(alice.clone()).await.unwrap();
    adapter
        .link_account(github_account(&alice.id, &suffix))
        .await
        .unwrap();
    adapter
        .create_session(AdapterSession::new("tok1", &alice.id, expires_in(3600)))
        .await
        .unwrap();

    // When the user is deleted
    adapter.delete_user(&alice.id).await.unwrap();

    // Then nothing is left behind
    assert!(store.keys().await.is_empty());
}

#[tokio::test]
async fn test_expired_records_disappear_with_expire_records() {
    // Given an adapter mirroring expiry into the store
    let store = InMemoryKvStore::new();
    let config = AdapterConfig::default().with_expire_records(true);
    let adapter = KvAdapter::with_config(store.clone(), config).unwrap();
    let alice = TestUsers::alice(&unique_suffix());
    adapter.create_user(alice.clone()).await.unwrap();

    // When a session is written with an expiry that has already passed
    adapter
        .create_session(AdapterSession::new("stale", &alice.id, expires_in(-10)))
        .await
        .unwrap();
    assert!(store.ttl("authjs:session:stale").await.is_some());
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    // Then the store has dropped it, while the user record has no TTL
    assert_eq!(adapter.get_session_and_user("stale").await.unwrap(), None);
    assert!(
        adapter
            .update_session(SessionUpdate::new("stale").expires(expires_in(60)))
            .await
            .unwrap()
            .is_none()
    );
    assert_eq!(store.ttl(&format!("authjs:user:{}", alice.id)).await, None);
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let store = InMemoryKvStore::new();
    let tenant_a = KvAdapter::with_config(
        store.clone(),
        AdapterConfig::default().with_namespace("tenant_a"),
    )
    .unwrap();
    let tenant_b = KvAdapter::with_config(
        store.clone(),
        AdapterConfig::default().with_namespace("tenant_b"),
    )
    .unwrap();
    let alice = TestUsers::alice(&unique_suffix());

    tenant_a.create_user(alice.clone()).await.unwrap();

    assert_eq!(tenant_b.get_user(&alice.id).await.unwrap(), None);
    assert_eq!(tenant_a.get_user(&alice.id).await.unwrap(), Some(alice));
    assert!(
        store
            .hash_get("authjs:user:nobody")
            .await
            .unwrap()
            .is_none()
    );
}
