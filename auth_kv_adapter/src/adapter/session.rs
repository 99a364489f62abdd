use super::KvAdapter;
use crate::codec::{HashRecord, session_update_fields};
use crate::errors::AdapterError;
use crate::store::KvStore;
use crate::types::{AdapterSession, SessionAndUser, SessionUpdate};

impl<S: KvStore> KvAdapter<S> {
    /// Store a session and add its token to the owner's session index.
    #[tracing::instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn create_session(
        &self,
        session: AdapterSession,
    ) -> Result<AdapterSession, AdapterError> {
        let session_key = self
            .keys
            .session(&session.session_token)
            .map_err(AdapterError::log)?;
        let sessions_key = self
            .keys
            .user_sessions(&session.user_id)
            .map_err(AdapterError::log)?;

        self.write_record(&session_key, &session).await?;
        self.apply_ttl(&session_key, &session.expires).await?;
        self.store
            .set_add(&sessions_key, &session.session_token)
            .await
            .map_err(|e| {
                tracing::error!("Session stored without user index entry: {}", e);
                e
            })?;

        tracing::info!("Created session");
        Ok(session)
    }

    /// The session for `session_token` together with its user.
    ///
    /// `None` when either is missing. Expiry is not checked here.
    #[tracing::instrument(skip_all)]
    pub async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> Result<Option<SessionAndUser>, AdapterError> {
        let session_key = self.keys.session(session_token).map_err(AdapterError::log)?;
        let Some(session) = self.read_record::<AdapterSession>(&session_key).await? else {
            tracing::debug!(found = false, "No session");
            return Ok(None);
        };

        let found = self
            .load_referenced_user(&session.user_id)
            .await?
            .map(|user| SessionAndUser { session, user });

        tracing::debug!(found = found.is_some(), "Looked up session and user");
        Ok(found)
    }

    /// Merge the supplied fields onto an existing session.
    ///
    /// Returns the merged session, or `None` without writing anything when no
    /// session exists for the token. The merge itself is atomic in the store;
    /// moving the token between two users' indexes afterwards is not.
    #[tracing::instrument(skip_all, fields(user_id = ?update.user_id))]
    pub async fn update_session(
        &self,
        update: SessionUpdate,
    ) -> Result<Option<AdapterSession>, AdapterError> {
        let session_key = self
            .keys
            .session(&update.session_token)
            .map_err(AdapterError::log)?;
        let new_index = update
            .user_id
            .as_deref()
            .map(|user_id| self.keys.user_sessions(user_id))
            .transpose()
            .map_err(AdapterError::log)?;

        let previous_owner = match &new_index {
            Some(_) => self
                .store
                .hash_get(&session_key)
                .await?
                .and_then(|fields| fields.get("userId").cloned()),
            None => None,
        };

        let Some(merged) = self
            .store
            .hash_merge_if_exists(&session_key, session_update_fields(&update))
            .await?
        else {
            tracing::debug!("No session to update");
            return Ok(None);
        };
        let session = match AdapterSession::from_fields(merged) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Updated session no longer decodes: {}", e);
                return Ok(None);
            }
        };

        let moved = previous_owner.as_deref() != Some(session.user_id.as_str());
        if let (Some(new_index), true) = (new_index, moved) {
            self.store
                .set_add(&new_index, &session.session_token)
                .await?;
            if let Some(old_owner) = previous_owner {
                self.release_session_index(&old_owner, &session.session_token)
                    .await?;
            }
            tracing::info!("Moved session to another user");
        }

        if update.expires.is_some() {
            self.apply_ttl(&session_key, &session.expires).await?;
        }

        tracing::info!("Updated session");
        Ok(Some(session))
    }

    /// Delete a session and drop it from the owner's index.
    ///
    /// Returns the deleted session, `None` if there was none. A record that
    /// no longer decodes is still deleted.
    #[tracing::instrument(skip_all)]
    pub async fn delete_session(
        &self,
        session_token: &str,
    ) -> Result<Option<AdapterSession>, AdapterError> {
        let session_key = self.keys.session(session_token).map_err(AdapterError::log)?;
        let Some(fields) = self.store.hash_get(&session_key).await? else {
            tracing::debug!("Session already gone");
            return Ok(None);
        };

        self.store.delete(&session_key).await?;
        if let Some(owner) = fields.get("userId") {
            self.release_session_index(owner, session_token).await?;
        }

        tracing::info!("Deleted session");
        match AdapterSession::from_fields(fields) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!("Deleted a malformed session record: {}", e);
                Ok(None)
            }
        }
    }

    async fn release_session_index(
        &self,
        user_id: &str,
        session_token: &str,
    ) -> Result<(), AdapterError> {
        match self.keys.user_sessions(user_id) {
            Ok(sessions_key) => {
                self.store.set_remove(&sessions_key, session_token).await?;
            }
            Err(e) => tracing::warn!("Session record has an unusable owner: {}", e),
        }
        Ok(())
    }
}
