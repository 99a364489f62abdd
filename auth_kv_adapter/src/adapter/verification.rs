use super::KvAdapter;
use crate::codec::HashRecord;
use crate::errors::AdapterError;
use crate::store::KvStore;
use crate::types::VerificationToken;

impl<S: KvStore> KvAdapter<S> {
    /// Store a verification token, replacing any earlier token for the same
    /// identifier.
    #[tracing::instrument(skip_all, fields(identifier = %token.identifier))]
    pub async fn create_verification_token(
        &self,
        token: VerificationToken,
    ) -> Result<VerificationToken, AdapterError> {
        let key = self
            .keys
            .verification_token(&token.identifier)
            .map_err(AdapterError::log)?;

        self.write_record(&key, &token).await?;
        self.apply_ttl(&key, &token.expires).await?;

        tracing::info!("Created verification token");
        Ok(token)
    }

    /// Consume the token stored for `identifier` if it equals `token`.
    ///
    /// Comparison and deletion happen in one store step, so a token is
    /// handed out at most once. A mismatch leaves the stored token in place.
    #[tracing::instrument(skip(self, token))]
    pub async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> Result<Option<VerificationToken>, AdapterError> {
        let key = self
            .keys
            .verification_token(identifier)
            .map_err(AdapterError::log)?;

        let Some(fields) = self
            .store
            .hash_compare_and_delete(&key, "token", token)
            .await?
        else {
            tracing::debug!(found = false, "No matching verification token");
            return Ok(None);
        };

        tracing::info!("Used verification token");
        match VerificationToken::from_fields(fields) {
            Ok(used) => Ok(Some(used)),
            Err(e) => {
                tracing::warn!("Consumed a malformed verification token: {}", e);
                Ok(None)
            }
        }
    }
}
