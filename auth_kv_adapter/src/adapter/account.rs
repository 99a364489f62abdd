use super::KvAdapter;
use crate::codec::HashRecord;
use crate::errors::AdapterError;
use crate::keys::KeyEncoder;
use crate::store::KvStore;
use crate::types::{AccountRef, AdapterAccount, AdapterUser};

impl<S: KvStore> KvAdapter<S> {
    /// Link a provider account to its user.
    ///
    /// The user's account set is updated before the record is written; a
    /// failure in between leaves a dangling set member, which readers skip.
    /// Relinking an account to another user drops it from the previous
    /// owner's set once the new record is in place.
    #[tracing::instrument(
        skip(self, account),
        fields(user_id = %account.user_id, provider = %account.provider)
    )]
    pub async fn link_account(
        &self,
        account: AdapterAccount,
    ) -> Result<AdapterAccount, AdapterError> {
        let accounts_key = self
            .keys
            .user_accounts(&account.user_id)
            .map_err(AdapterError::log)?;
        let account_key = self
            .keys
            .provider_account(&account.provider, &account.provider_account_id)
            .map_err(AdapterError::log)?;
        let member = self
            .keys
            .account_member(&account.provider, &account.provider_account_id)?;

        let previous_owner = self
            .store
            .hash_get(&account_key)
            .await?
            .and_then(|fields| fields.get("userId").cloned())
            .filter(|owner| *owner != account.user_id);

        self.store.set_add(&accounts_key, &member).await?;
        self.write_record(&account_key, &account)
            .await
            .map_err(|e| {
                tracing::error!("Account set updated but account record not written: {}", e);
                e
            })?;

        if let Some(previous_owner) = previous_owner {
            match self.keys.user_accounts(&previous_owner) {
                Ok(previous_key) => self.store.set_remove(&previous_key, &member).await?,
                Err(e) => tracing::warn!("Previous account owner is unusable: {}", e),
            }
            tracing::info!("Moved account to another user");
        }

        tracing::info!("Linked account");
        Ok(account)
    }

    /// Remove a provider account and its membership in the owner's set.
    ///
    /// Returns the removed account, or `None` if there was nothing to remove.
    /// A record that no longer decodes is still deleted.
    #[tracing::instrument(skip(self, account), fields(provider = %account.provider))]
    pub async fn unlink_account(
        &self,
        account: &AccountRef,
    ) -> Result<Option<AdapterAccount>, AdapterError> {
        let account_key = self
            .keys
            .provider_account(&account.provider, &account.provider_account_id)
            .map_err(AdapterError::log)?;
        let member = self
            .keys
            .account_member(&account.provider, &account.provider_account_id)?;

        let Some(fields) = self.store.hash_get(&account_key).await? else {
            tracing::debug!("Account already unlinked");
            return Ok(None);
        };

        match fields
            .get("userId")
            .map(|user_id| self.keys.user_accounts(user_id))
        {
            Some(Ok(accounts_key)) => self.store.set_remove(&accounts_key, &member).await?,
            Some(Err(e)) => tracing::warn!("Account record has an unusable owner: {}", e),
            None => tracing::warn!("Account record has no owner"),
        }
        self.store.delete(&account_key).await?;

        tracing::info!("Unlinked account");
        match AdapterAccount::from_fields(fields) {
            Ok(removed) => Ok(Some(removed)),
            Err(e) => {
                tracing::warn!("Removed a malformed account record: {}", e);
                Ok(None)
            }
        }
    }

    #[tracing::instrument(skip(self, account), fields(provider = %account.provider))]
    pub async fn get_user_by_account(
        &self,
        account: &AccountRef,
    ) -> Result<Option<AdapterUser>, AdapterError> {
        let account_key = self
            .keys
            .provider_account(&account.provider, &account.provider_account_id)
            .map_err(AdapterError::log)?;

        let user = match self.read_record::<AdapterAccount>(&account_key).await? {
            Some(linked) => self.load_referenced_user(&linked.user_id).await?,
            None => None,
        };

        tracing::debug!(found = user.is_some(), "Looked up user by account");
        Ok(user)
    }

    /// Every account linked to `user_id`, ordered by provider and account id.
    ///
    /// Set members whose record is missing, malformed or owned by another
    /// user are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn get_accounts_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<AdapterAccount>, AdapterError> {
        let accounts_key = self.keys.user_accounts(user_id).map_err(AdapterError::log)?;
        let mut members = self.store.set_members(&accounts_key).await?;
        members.sort();

        let mut accounts = Vec::with_capacity(members.len());
        for member in &members {
            let Some((provider, provider_account_id)) = KeyEncoder::parse_account_member(member)
            else {
                tracing::warn!("Skipping malformed account set member");
                continue;
            };
            let account_key = self.keys.provider_account(provider, provider_account_id)?;
            match self.read_record::<AdapterAccount>(&account_key).await? {
                Some(account) if account.user_id == user_id => accounts.push(account),
                Some(_) => tracing::warn!(provider, "Skipping stale account set member"),
                None => tracing::warn!(provider, "Skipping dangling account set member"),
            }
        }

        tracing::debug!(count = accounts.len(), "Listed accounts");
        Ok(accounts)
    }
}
