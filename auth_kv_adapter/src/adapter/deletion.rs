//! User deletion with a write-ahead marker.
//!
//! Deleting a user touches many keys. Before the first destructive step a
//! marker recording the user's email is written to `user_deletion:<id>` and
//! the id is added to the `user_deletions` set. Every later step is
//! idempotent, and the marker goes last, so a deletion that stopped halfway
//! is listed by [`KvAdapter::pending_user_deletions`] and can be finished
//! with [`KvAdapter::resume_user_deletion`] or another `delete_user` call.

use chrono::Utc;

use super::KvAdapter;
use crate::errors::AdapterError;
use crate::keys::KeyEncoder;
use crate::store::KvStore;
use crate::types::UserDeletionMarker;

impl<S: KvStore> KvAdapter<S> {
    /// Delete a user with their email index entry and linked accounts, and
    /// their sessions when `cascade_sessions_on_user_delete` is on.
    ///
    /// Deleting a user that does not exist is a no-op. If a previous deletion
    /// of the same id was interrupted, it is completed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> Result<(), AdapterError> {
        let user_key = self.keys.user(user_id).map_err(AdapterError::log)?;
        let marker_key = self.keys.user_deletion(user_id)?;

        let marker = match self.store.hash_get(&user_key).await? {
            Some(fields) => {
                let marker = UserDeletionMarker {
                    user_id: user_id.to_string(),
                    email: fields.get("email").cloned(),
                    started_at: Utc::now(),
                };
                self.write_record(&marker_key, &marker).await?;
                self.store
                    .set_add(&self.keys.user_deletions(), user_id)
                    .await?;
                marker
            }
            None => match self.read_record::<UserDeletionMarker>(&marker_key).await? {
                Some(marker) => {
                    tracing::info!("Completing an interrupted deletion");
                    marker
                }
                None => {
                    tracing::debug!("User does not exist, nothing to delete");
                    return Ok(());
                }
            },
        };

        self.finish_user_deletion(&marker).await
    }

    /// Ids of users whose deletion started but did not finish.
    pub async fn pending_user_deletions(&self) -> Result<Vec<String>, AdapterError> {
        let mut pending = self
            .store
            .set_members(&self.keys.user_deletions())
            .await?;
        pending.sort();
        Ok(pending)
    }

    /// Finish an interrupted deletion from its marker.
    ///
    /// Returns `false` when no marker exists for `user_id`; a leftover entry
    /// in the pending set is dropped in that case.
    #[tracing::instrument(skip(self))]
    pub async fn resume_user_deletion(&self, user_id: &str) -> Result<bool, AdapterError> {
        let marker_key = self.keys.user_deletion(user_id).map_err(AdapterError::log)?;

        let Some(marker) = self.read_record::<UserDeletionMarker>(&marker_key).await? else {
            self.store
                .set_remove(&self.keys.user_deletions(), user_id)
                .await?;
            tracing::debug!("No deletion marker");
            return Ok(false);
        };

        tracing::info!(started_at = %marker.started_at, "Resuming user deletion");
        self.finish_user_deletion(&marker).await?;
        Ok(true)
    }

    async fn finish_user_deletion(&self, marker: &UserDeletionMarker) -> Result<(), AdapterError> {
        self.run_deletion_steps(marker).await.map_err(|e| {
            tracing::error!(
                user_id = %marker.user_id,
                "User deletion interrupted, marker kept for resume: {}",
                e
            );
            e
        })?;
        tracing::info!(user_id = %marker.user_id, "Deleted user");
        Ok(())
    }

    async fn run_deletion_steps(&self, marker: &UserDeletionMarker) -> Result<(), AdapterError> {
        let user_id = marker.user_id.as_str();

        self.store.delete(&self.keys.user(user_id)?).await?;
        if let Some(email) = &marker.email {
            self.release_email_index(email, user_id).await?;
        }

        let accounts_key = self.keys.user_accounts(user_id)?;
        for member in self.store.set_members(&accounts_key).await? {
            let Some((provider, provider_account_id)) = KeyEncoder::parse_account_member(&member)
            else {
                tracing::warn!("Skipping malformed account set member");
                continue;
            };
            let account_key = self.keys.provider_account(provider, provider_account_id)?;
            // An account relinked to someone else since is left alone
            self.store
                .hash_compare_and_delete(&account_key, "userId", user_id)
                .await?;
        }
        self.store.delete(&accounts_key).await?;

        if self.config.cascade_sessions_on_user_delete {
            let sessions_key = self.keys.user_sessions(user_id)?;
            for token in self.store.set_members(&sessions_key).await? {
                match self.keys.session(&token) {
                    Ok(session_key) => {
                        self.store
                            .hash_compare_and_delete(&session_key, "userId", user_id)
                            .await?;
                    }
                    Err(e) => tracing::warn!("Skipping unusable session index member: {}", e),
                }
            }
            self.store.delete(&sessions_key).await?;
        }

        self.store.delete(&self.keys.user_deletion(user_id)?).await?;
        self.store
            .set_remove(&self.keys.user_deletions(), user_id)
            .await?;
        Ok(())
    }
}
