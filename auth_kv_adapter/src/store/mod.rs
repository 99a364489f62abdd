mod errors;
mod memory;
mod redis;
mod types;

pub use errors::StoreError;
pub use types::{Fields, InMemoryKvStore, KvStore, RedisKvStore};
