use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use super::errors::StoreError;
use super::types::{Entry, Fields, InMemoryKvStore, KvStore, StoredValue, field_matches};

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Live entry at `key`, dropping it first if its TTL has passed.
fn live_entry<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
    if entries
        .get(key)
        .is_some_and(|entry| entry.is_expired(Instant::now()))
    {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn as_hash<'a>(entry: &'a Entry, key: &str) -> Result<&'a Fields, StoreError> {
    match &entry.value {
        StoredValue::Hash(fields) => Ok(fields),
        StoredValue::Set(_) => Err(StoreError::WrongType(key.to_string())),
    }
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory key-value store");
        Self::default()
    }

    /// Whether a live (unexpired) value exists at `key`.
    pub async fn contains_key(&self, key: &str) -> bool {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }

    /// Remaining time-to-live of `key`, if it has one.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Sorted list of live keys.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop every expired entry.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| !entry.is_expired(now));
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn hash_get(&self, key: &str) -> Result<Option<Fields>, StoreError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => {
                let fields = as_hash(entry, key)?;
                Ok((!fields.is_empty()).then(|| fields.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn hash_set(&self, key: &str, fields: Fields) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if fields.is_empty() {
            entries.remove(key);
        } else {
            entries.insert(
                key.to_string(),
                Entry {
                    value: StoredValue::Hash(fields),
                    expires_at: None,
                },
            );
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        match live_entry(&mut entries, key) {
            Some(Entry {
                value: StoredValue::Set(members),
                ..
            }) => {
                members.insert(member.to_string());
            }
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: StoredValue::Set(BTreeSet::from([member.to_string()])),
                        expires_at: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let now_empty = match live_entry(&mut entries, key) {
            Some(Entry {
                value: StoredValue::Set(members),
                ..
            }) => {
                members.remove(member);
                members.is_empty()
            }
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
            None => false,
        };
        // Redis drops a set once its last member is gone.
        if now_empty {
            entries.remove(key);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => match &entry.value {
                StoredValue::Set(members) => Ok(members.iter().cloned().collect()),
                StoredValue::Hash(_) => Err(StoreError::WrongType(key.to_string())),
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut entries = self.entries.write().await;
        match live_entry(&mut entries, key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(ttl_secs));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn hash_compare_and_delete(
        &self,
        key: &str,
        field: &str,
        expected: &str,
    ) -> Result<Option<Fields>, StoreError> {
        // The write lock is held across compare and delete, so only one
        // caller can observe the match.
        let mut entries = self.entries.write().await;
        let matched = match live_entry(&mut entries, key) {
            Some(entry) => field_matches(as_hash(entry, key)?, field, expected),
            None => false,
        };
        if !matched {
            return Ok(None);
        }
        match entries.remove(key) {
            Some(Entry {
                value: StoredValue::Hash(fields),
                ..
            }) => Ok(Some(fields)),
            _ => Ok(None),
        }
    }

    async fn hash_merge_if_exists(
        &self,
        key: &str,
        fields: Fields,
    ) -> Result<Option<Fields>, StoreError> {
        let mut entries = self.entries.write().await;
        match live_entry(&mut entries, key) {
            Some(Entry {
                value: StoredValue::Hash(existing),
                ..
            }) => {
                existing.extend(fields);
                Ok(Some(existing.clone()))
            }
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => Ok(None),
        }
    }
}
