//! auth-kv-adapter - Key-value store persistence for authentication data
//!
//! Stores users, linked provider accounts, sessions and single-use
//! verification tokens as hashes and sets in a key-value store, for an
//! authentication framework that talks to storage through the
//! [`AuthAdapter`] contract.
//!
//! The store is injected: [`RedisKvStore`] for a Redis server,
//! [`InMemoryKvStore`] for tests and single-process use, or any other
//! [`KvStore`] implementation.
//!
//! ```no_run
//! use auth_kv_adapter::{AdapterConfig, AdapterUser, KvAdapter, RedisKvStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisKvStore::open("redis://127.0.0.1:6379")?;
//! store.init().await?;
//! let adapter = KvAdapter::with_config(store, AdapterConfig::from_env()?)?;
//!
//! let user = adapter
//!     .create_user(AdapterUser::new("", "alice@example.com"))
//!     .await?;
//! assert!(adapter.get_user_by_email("alice@example.com").await?.is_some());
//! # let _ = user;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod codec;
mod config;
mod errors;
mod keys;
mod store;
mod types;

#[cfg(test)]
mod test_utils;

pub use adapter::{AuthAdapter, KvAdapter};
pub use codec::{DecodeError, HashRecord};
pub use config::{AdapterConfig, ENV_CASCADE_SESSIONS, ENV_EXPIRE_RECORDS, ENV_NAMESPACE};
pub use errors::AdapterError;
pub use keys::{DEFAULT_NAMESPACE, KeyEncoder, KeySegment};
pub use store::{Fields, InMemoryKvStore, KvStore, RedisKvStore, StoreError};
pub use types::{
    AccountRef, AccountType, AdapterAccount, AdapterSession, AdapterUser, SessionAndUser,
    SessionUpdate, VerificationToken,
};
