//! The authentication adapter over a [`KvStore`].
//!
//! Each operation issues its store calls one after another. There is no
//! multi-key atomicity: every operation writes in an order that leaves a
//! recoverable state if it stops halfway, and readers tolerate what such a
//! stop leaves behind (dangling set members, stale email index entries).

mod account;
mod deletion;
mod session;
mod user;
mod verification;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::codec::HashRecord;
use crate::config::AdapterConfig;
use crate::errors::AdapterError;
use crate::keys::KeyEncoder;
use crate::store::KvStore;
use crate::types::{
    AccountRef, AdapterAccount, AdapterSession, AdapterUser, SessionAndUser, SessionUpdate,
    VerificationToken,
};

/// Persistence contract an authentication framework calls into.
///
/// Lookups answer `Ok(None)` for anything absent. Errors mean the store
/// failed, an identifier cannot be encoded, or an update targeted a missing
/// user.
#[async_trait]
pub trait AuthAdapter: Send + Sync {
    async fn create_user(&self, user: AdapterUser) -> Result<AdapterUser, AdapterError>;

    async fn get_user(&self, id: &str) -> Result<Option<AdapterUser>, AdapterError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<AdapterUser>, AdapterError>;

    async fn get_user_by_account(
        &self,
        account: &AccountRef,
    ) -> Result<Option<AdapterUser>, AdapterError>;

    async fn update_user(&self, user: AdapterUser) -> Result<AdapterUser, AdapterError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), AdapterError>;

    async fn link_account(&self, account: AdapterAccount) -> Result<AdapterAccount, AdapterError>;

    async fn unlink_account(
        &self,
        account: &AccountRef,
    ) -> Result<Option<AdapterAccount>, AdapterError>;

    async fn create_session(
        &self,
        session: AdapterSession,
    ) -> Result<AdapterSession, AdapterError>;

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> Result<Option<SessionAndUser>, AdapterError>;

    async fn update_session(
        &self,
        update: SessionUpdate,
    ) -> Result<Option<AdapterSession>, AdapterError>;

    async fn delete_session(
        &self,
        session_token: &str,
    ) -> Result<Option<AdapterSession>, AdapterError>;

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> Result<VerificationToken, AdapterError>;

    async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> Result<Option<VerificationToken>, AdapterError>;
}

/// [`AuthAdapter`] implementation storing records as hashes and sets in a
/// key-value store.
#[derive(Clone)]
pub struct KvAdapter<S: KvStore> {
    store: S,
    keys: KeyEncoder,
    config: AdapterConfig,
}

impl<S: KvStore> KvAdapter<S> {
    /// Adapter with the default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            keys: KeyEncoder::default(),
            config: AdapterConfig::default(),
        }
    }

    /// Fails if the configured namespace is not a valid key segment.
    pub fn with_config(store: S, config: AdapterConfig) -> Result<Self, AdapterError> {
        let keys = KeyEncoder::new(&config.namespace).map_err(AdapterError::log)?;
        tracing::info!(
            namespace = %config.namespace,
            expire_records = config.expire_records,
            cascade_sessions = config.cascade_sessions_on_user_delete,
            "Configured key-value auth adapter"
        );
        Ok(Self {
            store,
            keys,
            config,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn keys(&self) -> &KeyEncoder {
        &self.keys
    }

    /// Fetch and decode one record. A record that fails to decode is logged
    /// and reported as absent.
    async fn read_record<T: HashRecord>(&self, key: &str) -> Result<Option<T>, AdapterError> {
        let Some(fields) = self.store.hash_get(key).await? else {
            return Ok(None);
        };
        match T::from_fields(fields) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!("Ignoring malformed record: {}", e);
                Ok(None)
            }
        }
    }

    async fn write_record<T: HashRecord>(&self, key: &str, record: &T) -> Result<(), AdapterError> {
        self.store.hash_set(key, record.to_fields()).await?;
        Ok(())
    }

    /// Follow a user id stored inside another record. An id that cannot form
    /// a key is treated like a missing user.
    async fn load_referenced_user(
        &self,
        user_id: &str,
    ) -> Result<Option<AdapterUser>, AdapterError> {
        match self.keys.user(user_id) {
            Ok(key) => self.read_record(&key).await,
            Err(e) => {
                tracing::warn!("Ignoring unusable user reference: {}", e);
                Ok(None)
            }
        }
    }

    /// Mirror `expires` as a store TTL when `expire_records` is on.
    async fn apply_ttl(&self, key: &str, expires: &DateTime<Utc>) -> Result<(), AdapterError> {
        if !self.config.expire_records {
            return Ok(());
        }
        let ttl_secs = (*expires - Utc::now()).num_seconds().max(1) as u64;
        if !self.store.expire(key, ttl_secs).await? {
            tracing::warn!("Record vanished before its TTL could be set");
        }
        Ok(())
    }
}

#[async_trait]
impl<S: KvStore> AuthAdapter for KvAdapter<S> {
    async fn create_user(&self, user: AdapterUser) -> Result<AdapterUser, AdapterError> {
        KvAdapter::create_user(self, user).await
    }

    async fn get_user(&self, id: &str) -> Result<Option<AdapterUser>, AdapterError> {
        KvAdapter::get_user(self, id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<AdapterUser>, AdapterError> {
        KvAdapter::get_user_by_email(self, email).await
    }

    async fn get_user_by_account(
        &self,
        account: &AccountRef,
    ) -> Result<Option<AdapterUser>, AdapterError> {
        KvAdapter::get_user_by_account(self, account).await
    }

    async fn update_user(&self, user: AdapterUser) -> Result<AdapterUser, AdapterError> {
        KvAdapter::update_user(self, user).await
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), AdapterError> {
        KvAdapter::delete_user(self, user_id).await
    }

    async fn link_account(&self, account: AdapterAccount) -> Result<AdapterAccount, AdapterError> {
        KvAdapter::link_account(self, account).await
    }

    async fn unlink_account(
        &self,
        account: &AccountRef,
    ) -> Result<Option<AdapterAccount>, AdapterError> {
        KvAdapter::unlink_account(self, account).await
    }

    async fn create_session(
        &self,
        session: AdapterSession,
    ) -> Result<AdapterSession, AdapterError> {
        KvAdapter::create_session(self, session).await
    }

    async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> Result<Option<SessionAndUser>, AdapterError> {
        KvAdapter::get_session_and_user(self, session_token).await
    }

    async fn update_session(
        &self,
        update: SessionUpdate,
    ) -> Result<Option<AdapterSession>, AdapterError> {
        KvAdapter::update_session(self, update).await
    }

    async fn delete_session(
        &self,
        session_token: &str,
    ) -> Result<Option<AdapterSession>, AdapterError> {
        KvAdapter::delete_session(self, session_token).await
    }

    async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> Result<VerificationToken, AdapterError> {
        KvAdapter::create_verification_token(self, token).await
    }

    async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> Result<Option<VerificationToken>, AdapterError> {
        KvAdapter::use_verification_token(self, identifier, token).await
    }
}
