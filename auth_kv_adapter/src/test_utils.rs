//! Shared fixtures for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::adapter::KvAdapter;
use crate::store::{Fields, InMemoryKvStore, KvStore, StoreError};
use crate::types::{AccountType, AdapterAccount, AdapterUser};

/// Adapter over a fresh in-memory store, plus a handle to that store for
/// inspecting what was written.
pub(crate) fn test_adapter() -> (KvAdapter<InMemoryKvStore>, InMemoryKvStore) {
    let store = InMemoryKvStore::new();
    (KvAdapter::new(store.clone()), store)
}

pub(crate) fn user_fixture(id: &str, email: &str) -> AdapterUser {
    let mut user = AdapterUser::new(id, email);
    user.name = Some(format!("User {id}"));
    user
}

pub(crate) fn account_fixture(
    user_id: &str,
    provider: &str,
    provider_account_id: &str,
) -> AdapterAccount {
    let mut account =
        AdapterAccount::new(user_id, AccountType::Oauth, provider, provider_account_id);
    account.access_token = Some(format!("access-{provider}-{provider_account_id}"));
    account.token_type = Some("bearer".to_string());
    account
}

/// A point in time `secs` seconds from now; negative values are in the past.
pub(crate) fn expires_in(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs)
}

/// In-memory store that can be told to fail chosen operations, for testing
/// what partial failures leave behind.
#[derive(Clone, Default)]
pub(crate) struct FlakyKvStore {
    pub(crate) inner: InMemoryKvStore,
    failure: Arc<Mutex<Option<(&'static str, String)>>>,
    calls: Arc<AtomicUsize>,
}

impl FlakyKvStore {
    /// Fail every `operation` call on a key containing `key_fragment`.
    pub(crate) fn fail_on(&self, operation: &'static str, key_fragment: &str) {
        *self.failure.lock().unwrap() = Some((operation, key_fragment.to_string()));
    }

    pub(crate) fn heal(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Number of store calls made so far, failed ones included.
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, operation: &str, key: &str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.failure.lock().unwrap() {
            Some((op, fragment)) if *op == operation && key.contains(fragment.as_str()) => Err(
                StoreError::Storage(format!("injected failure: {operation} {key}")),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KvStore for FlakyKvStore {
    async fn hash_get(&self, key: &str) -> Result<Option<Fields>, StoreError> {
        self.check("hash_get", key)?;
        self.inner.hash_get(key).await
    }

    async fn hash_set(&self, key: &str, fields: Fields) -> Result<(), StoreError> {
        self.check("hash_set", key)?;
        self.inner.hash_set(key, fields).await
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.check("set_add", key)?;
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.check("set_remove", key)?;
        self.inner.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.check("set_members", key)?;
        self.inner.set_members(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.check("delete", key)?;
        self.inner.delete(key).await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        self.check("expire", key)?;
        self.inner.expire(key, ttl_secs).await
    }

    async fn hash_compare_and_delete(
        &self,
        key: &str,
        field: &str,
        expected: &str,
    ) -> Result<Option<Fields>, StoreError> {
        self.check("hash_compare_and_delete", key)?;
        self.inner.hash_compare_and_delete(key, field, expected).await
    }

    async fn hash_merge_if_exists(
        &self,
        key: &str,
        fields: Fields,
    ) -> Result<Option<Fields>, StoreError> {
        self.check("hash_merge_if_exists", key)?;
        self.inner.hash_merge_if_exists(key, fields).await
    }
}
