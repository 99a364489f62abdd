use async_trait::async_trait;
use redis::{self, AsyncCommands, Script};
use std::collections::HashMap;
use std::sync::LazyLock;

use super::errors::StoreError;
use super::types::{Fields, KvStore, RedisKvStore};

/// Returns the hash and deletes it when `ARGV[1]` holds `ARGV[2]`.
static COMPARE_AND_DELETE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        local current = redis.call('HGET', KEYS[1], ARGV[1])
        if current ~= ARGV[2] then
            return false
        end
        local record = redis.call('HGETALL', KEYS[1])
        redis.call('DEL', KEYS[1])
        return record
        ",
    )
});

/// HSETs the field/value pairs in ARGV onto an existing hash only.
static MERGE_IF_EXISTS: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
        if redis.call('EXISTS', KEYS[1]) == 0 then
            return false
        end
        if #ARGV > 0 then
            redis.call('HSET', KEYS[1], unpack(ARGV))
        end
        return redis.call('HGETALL', KEYS[1])
        ",
    )
});

/// HGETALL replies come back from scripts as a flat field/value list.
fn pairs_to_fields(flat: Vec<String>) -> Fields {
    let mut fields = HashMap::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        fields.insert(field, value);
    }
    fields
}

impl RedisKvStore {
    /// Wrap an already configured client. The connection itself is opened
    /// lazily per operation.
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Open a client for `url`.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(Self { client })
    }

    /// Verify the server is reachable.
    pub async fn init(&self) -> Result<(), StoreError> {
        let _conn = self.client.get_multiplexed_async_connection().await?;
        Ok(())
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn hash_get(&self, key: &str) -> Result<Option<Fields>, StoreError> {
        let mut conn = self.connection().await?;
        let fields: Fields = conn.hgetall(key).await?;
        // HGETALL answers an empty map for a missing key.
        Ok((!fields.is_empty()).then_some(fields))
    }

    async fn hash_set(&self, key: &str, fields: Fields) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        if fields.is_empty() {
            let _: () = conn.del(key).await?;
            return Ok(());
        }
        let items: Vec<(String, String)> = fields.into_iter().collect();
        let _: () = redis::pipe()
            .atomic()
            .del(key)
            .ignore()
            .hset_multiple(key, &items[..])
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.sadd(key, member).await?;
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.srem(key, member).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
        let applied: bool = conn.expire(key, ttl).await?;
        Ok(applied)
    }

    async fn hash_compare_and_delete(
        &self,
        key: &str,
        field: &str,
        expected: &str,
    ) -> Result<Option<Fields>, StoreError> {
        let mut conn = self.connection().await?;
        let record: Option<Vec<String>> = COMPARE_AND_DELETE
            .key(key)
            .arg(field)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        Ok(record.map(pairs_to_fields))
    }

    async fn hash_merge_if_exists(
        &self,
        key: &str,
        fields: Fields,
    ) -> Result<Option<Fields>, StoreError> {
        let mut conn = self.connection().await?;
        let mut invocation = MERGE_IF_EXISTS.prepare_invoke();
        invocation.key(key);
        for (field, value) in &fields {
            invocation.arg(field).arg(value);
        }
        let record: Option<Vec<String>> = invocation.invoke_async(&mut conn).await?;
        Ok(record.map(pairs_to_fields))
    }
}
