use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;

use super::errors::StoreError;

/// Flat field map of one hash record.
pub type Fields = HashMap<String, String>;

#[derive(Debug, Clone)]
pub(super) enum StoredValue {
    Hash(Fields),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
pub(super) struct Entry {
    pub(super) value: StoredValue,
    pub(super) expires_at: Option<Instant>,
}

/// Process-local store with Redis-like hash, set and expiry semantics.
///
/// Clones share the same data, so a test can keep one handle for
/// inspection while the adapter owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKvStore {
    pub(super) entries: Arc<RwLock<HashMap<String, Entry>>>,
}

/// Store backed by a Redis server through a multiplexed async connection.
#[derive(Debug, Clone)]
pub struct RedisKvStore {
    pub(super) client: redis::Client,
}

/// Capability interface the adapter consumes from a key-value store client.
///
/// Keys are fully encoded by the caller. Absent keys are never errors:
/// reads return `None` or an empty collection, deletes and removals are
/// no-ops.
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Read a whole hash. An absent key and an empty hash are both `None`.
    async fn hash_get(&self, key: &str) -> Result<Option<Fields>, StoreError>;

    /// Replace the whole hash at `key` with `fields`.
    ///
    /// Fields not present in `fields` do not survive the write. An empty map
    /// removes the key.
    async fn hash_set(&self, key: &str, fields: Fields) -> Result<(), StoreError>;

    /// Add `member` to the set at `key`, creating the set if needed.
    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Remove `member` from the set at `key`.
    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// All members of the set at `key`, in no particular order.
    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Delete `key` whatever its type.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Give `key` a time-to-live. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError>;

    /// Delete the hash at `key` only if its `field` equals `expected`, and
    /// return the deleted record.
    ///
    /// This default is a plain read followed by a delete, so two concurrent
    /// callers can both observe the match. Implementations override it with
    /// an atomic version where the backend allows.
    async fn hash_compare_and_delete(
        &self,
        key: &str,
        field: &str,
        expected: &str,
    ) -> Result<Option<Fields>, StoreError> {
        match self.hash_get(key).await? {
            Some(fields) if field_matches(&fields, field, expected) => {
                self.delete(key).await?;
                Ok(Some(fields))
            }
            _ => Ok(None),
        }
    }

    /// Merge `fields` onto the existing hash at `key` and return the merged
    /// record. Returns `None` and writes nothing when the key is absent.
    ///
    /// The default is read-modify-write and can lose a concurrent update.
    async fn hash_merge_if_exists(
        &self,
        key: &str,
        fields: Fields,
    ) -> Result<Option<Fields>, StoreError> {
        let Some(mut merged) = self.hash_get(key).await? else {
            return Ok(None);
        };
        merged.extend(fields);
        self.hash_set(key, merged.clone()).await?;
        Ok(Some(merged))
    }
}

/// Constant-time check that `fields[field] == expected`.
pub(crate) fn field_matches(fields: &Fields, field: &str, expected: &str) -> bool {
    fields
        .get(field)
        .is_some_and(|value| bool::from(value.as_bytes().ct_eq(expected.as_bytes())))
}
