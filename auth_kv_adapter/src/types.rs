use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user as the authentication framework sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterUser {
    /// Canonical identifier; generated on create when left empty
    pub id: String,
    /// Display name
    pub name: Option<String>,
    /// Email address, unique across users
    pub email: String,
    /// When the email address was verified, if it was
    pub email_verified: Option<DateTime<Utc>>,
    /// Avatar URL
    pub image: Option<String>,
}

impl AdapterUser {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: email.into(),
            email_verified: None,
            image: None,
        }
    }
}

/// How an account authenticates its user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Oauth,
    Oidc,
    Email,
    Webauthn,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Oauth => "oauth",
            Self::Oidc => "oidc",
            Self::Email => "email",
            Self::Webauthn => "webauthn",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oauth" => Ok(Self::Oauth),
            "oidc" => Ok(Self::Oidc),
            "email" => Ok(Self::Email),
            "webauthn" => Ok(Self::Webauthn),
            other => Err(format!("unknown account type '{other}'")),
        }
    }
}

/// A provider account linked to a user, with the provider's tokens
///
/// Token field names follow the OAuth wire names rather than camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterAccount {
    pub user_id: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub provider: String,
    pub provider_account_id: String,
    #[serde(rename = "refresh_token")]
    pub refresh_token: Option<String>,
    #[serde(rename = "access_token")]
    pub access_token: Option<String>,
    /// Access token expiry, seconds since the Unix epoch
    #[serde(rename = "expires_at")]
    pub expires_at: Option<i64>,
    #[serde(rename = "token_type")]
    pub token_type: Option<String>,
    pub scope: Option<String>,
    #[serde(rename = "id_token")]
    pub id_token: Option<String>,
    #[serde(rename = "session_state")]
    pub session_state: Option<String>,
}

impl AdapterAccount {
    pub fn new(
        user_id: impl Into<String>,
        account_type: AccountType,
        provider: impl Into<String>,
        provider_account_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            account_type,
            provider: provider.into(),
            provider_account_id: provider_account_id.into(),
            refresh_token: None,
            access_token: None,
            expires_at: None,
            token_type: None,
            scope: None,
            id_token: None,
            session_state: None,
        }
    }

    pub fn account_ref(&self) -> AccountRef {
        AccountRef::new(&self.provider, &self.provider_account_id)
    }
}

/// Natural key of a provider account
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRef {
    pub provider: String,
    pub provider_account_id: String,
}

impl AccountRef {
    pub fn new(provider: impl Into<String>, provider_account_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            provider_account_id: provider_account_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterSession {
    pub session_token: String,
    pub user_id: String,
    /// Stored as data only; the adapter never rejects an expired session
    pub expires: DateTime<Utc>,
}

impl AdapterSession {
    pub fn new(
        session_token: impl Into<String>,
        user_id: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            session_token: session_token.into(),
            user_id: user_id.into(),
            expires,
        }
    }
}

/// Partial session for merge updates; `None` fields keep their stored value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdate {
    pub session_token: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

impl SessionUpdate {
    pub fn new(session_token: impl Into<String>) -> Self {
        Self {
            session_token: session_token.into(),
            user_id: None,
            expires: None,
        }
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionAndUser {
    pub session: AdapterSession,
    pub user: AdapterUser,
}

/// Single-use token, e.g. for email sign-in links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationToken {
    pub identifier: String,
    pub token: String,
    pub expires: DateTime<Utc>,
}

impl VerificationToken {
    pub fn new(
        identifier: impl Into<String>,
        token: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            token: token.into(),
            expires,
        }
    }
}

/// Reverse lookup from an email address to the owning user id
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EmailIndexEntry {
    pub(crate) user_id: String,
}

/// Write-ahead marker for a user deletion in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UserDeletionMarker {
    pub(crate) user_id: String,
    pub(crate) email: Option<String>,
    pub(crate) started_at: DateTime<Utc>,
}
