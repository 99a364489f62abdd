use uuid::Uuid;

use super::KvAdapter;
use crate::errors::AdapterError;
use crate::store::KvStore;
use crate::types::{AdapterUser, EmailIndexEntry};

impl<S: KvStore> KvAdapter<S> {
    /// Store a new user and index it by email.
    ///
    /// An empty `id` is replaced with a generated UUID. The user record is
    /// written first; if the index write then fails the user is reachable by
    /// id only. Recreating an existing id under a new email releases the
    /// index entry of the old email.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_user(&self, mut user: AdapterUser) -> Result<AdapterUser, AdapterError> {
        if user.id.is_empty() {
            user.id = Uuid::new_v4().to_string();
            tracing::Span::current().record("user_id", user.id.as_str());
        }

        let user_key = self.keys.user(&user.id).map_err(AdapterError::log)?;
        let email_key = self.keys.user_email(&user.email).map_err(AdapterError::log)?;

        let previous_email = self
            .store
            .hash_get(&user_key)
            .await?
            .and_then(|fields| fields.get("email").cloned());

        self.write_record(&user_key, &user).await?;
        self.claim_email_index(&email_key, &user.id)
            .await
            .map_err(|e| {
                tracing::error!("User stored without email index: {}", e);
                e
            })?;

        if let Some(old_email) = previous_email.filter(|old| *old != user.email) {
            tracing::warn!("Existing user recreated with a different email");
            self.release_email_index(&old_email, &user.id).await?;
        }

        tracing::info!("Created user");
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_user(&self, id: &str) -> Result<Option<AdapterUser>, AdapterError> {
        let key = self.keys.user(id).map_err(AdapterError::log)?;
        let user = self.read_record::<AdapterUser>(&key).await?;
        tracing::debug!(found = user.is_some(), "Looked up user");
        Ok(user)
    }

    /// Resolve a user through the email index.
    ///
    /// An index entry whose user is gone, or whose user now has a different
    /// email, counts as absent.
    #[tracing::instrument(skip(self, email))]
    pub async fn get_user_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AdapterUser>, AdapterError> {
        let email_key = self.keys.user_email(email).map_err(AdapterError::log)?;
        let Some(index) = self.read_record::<EmailIndexEntry>(&email_key).await? else {
            tracing::debug!(found = false, "No email index entry");
            return Ok(None);
        };

        let user = self
            .load_referenced_user(&index.user_id)
            .await?
            .filter(|user| {
                let current = user.email == email;
                if !current {
                    tracing::debug!(user_id = %user.id, "Email index entry is stale");
                }
                current
            });

        tracing::debug!(found = user.is_some(), "Looked up user by email");
        Ok(user)
    }

    /// Overwrite an existing user, moving the email index if the email
    /// changed.
    ///
    /// The new index entry is written before the old one is released, so the
    /// user stays reachable by email throughout.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn update_user(&self, user: AdapterUser) -> Result<AdapterUser, AdapterError> {
        let user_key = self.keys.user(&user.id).map_err(AdapterError::log)?;
        let email_key = self.keys.user_email(&user.email).map_err(AdapterError::log)?;

        let Some(previous) = self.store.hash_get(&user_key).await? else {
            return Err(AdapterError::UserNotFound(user.id.clone()).log());
        };
        let previous_email = previous.get("email").cloned();

        self.write_record(&user_key, &user).await?;
        self.claim_email_index(&email_key, &user.id).await?;

        if let Some(old_email) = previous_email.filter(|old| *old != user.email) {
            self.release_email_index(&old_email, &user.id).await?;
            tracing::info!("Moved email index to the new address");
        }

        tracing::info!("Updated user");
        Ok(user)
    }

    /// Point the index entry at `email_key` to `user_id`.
    ///
    /// Taking over an entry that names another user is allowed but logged;
    /// that user is no longer reachable by email afterwards.
    async fn claim_email_index(&self, email_key: &str, user_id: &str) -> Result<(), AdapterError> {
        let displaced = self
            .read_record::<EmailIndexEntry>(email_key)
            .await?
            .filter(|existing| existing.user_id != user_id);
        if let Some(existing) = displaced {
            tracing::warn!(
                previous_user_id = %existing.user_id,
                "Email index entry taken over from another user"
            );
        }

        let index = EmailIndexEntry {
            user_id: user_id.to_string(),
        };
        self.write_record(email_key, &index).await
    }

    /// Delete the index entry for `email` if it still points at `user_id`.
    pub(super) async fn release_email_index(
        &self,
        email: &str,
        user_id: &str,
    ) -> Result<(), AdapterError> {
        let email_key = match self.keys.user_email(email) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("Stored email cannot form an index key: {}", e);
                return Ok(());
            }
        };
        let released = self
            .store
            .hash_compare_and_delete(&email_key, "userId", user_id)
            .await?;
        if released.is_none() {
            tracing::debug!("Email index entry owned by another user or already gone");
        }
        Ok(())
    }
}
