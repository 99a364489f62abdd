//! Key encoding for every record family the adapter writes.
//!
//! Keys are `:`-joined segments under a namespace:
//!
//! | family | key |
//! |---|---|
//! | user | `<ns>:user:<id>` |
//! | email index | `<ns>:user_email:<email>` |
//! | user's accounts | `<ns>:user:<id>:accounts` |
//! | user's sessions | `<ns>:user:<id>:sessions` |
//! | provider account | `<ns>:provider_account:<provider>:<providerAccountId>` |
//! | session | `<ns>:session:<sessionToken>` |
//! | verification token | `<ns>:verification_token:<identifier>` |
//! | deletion marker | `<ns>:user_deletion:<id>` |
//! | pending deletions | `<ns>:user_deletions` |
//!
//! Delimiters are not escaped. Injectivity relies on every identifier segment
//! passing [`KeySegment::new`]: non-empty, no `:`, no whitespace or control
//! characters. Identifiers that fail are rejected with
//! [`AdapterError::InvalidKey`] before anything is sent to the store.

use std::fmt;

use crate::errors::AdapterError;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "authjs";

const DELIMITER: char = ':';

/// An identifier that is safe to embed in a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySegment<'a>(&'a str);

impl<'a> KeySegment<'a> {
    pub fn new(value: &'a str) -> Result<Self, AdapterError> {
        if value.is_empty() {
            return Err(AdapterError::InvalidKey("segment is empty".to_string()));
        }
        if value.contains(DELIMITER) {
            return Err(AdapterError::InvalidKey(format!(
                "segment contains the '{DELIMITER}' delimiter"
            )));
        }
        if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AdapterError::InvalidKey(
                "segment contains whitespace or control characters".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }
}

impl fmt::Display for KeySegment<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Builds store keys under one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEncoder {
    namespace: String,
}

impl Default for KeyEncoder {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl KeyEncoder {
    pub fn new(namespace: &str) -> Result<Self, AdapterError> {
        let namespace = KeySegment::new(namespace)
            .map_err(|e| AdapterError::InvalidKey(format!("namespace: {e}")))?;
        Ok(Self {
            namespace: namespace.as_str().to_string(),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key(
        &self,
        family: &str,
        segments: &[&str],
        suffix: Option<&str>,
    ) -> Result<String, AdapterError> {
        let mut key = format!("{}{DELIMITER}{family}", self.namespace);
        for segment in segments {
            let segment = KeySegment::new(segment)
                .map_err(|e| AdapterError::InvalidKey(format!("{family}: {e}")))?;
            key.push(DELIMITER);
            key.push_str(segment.as_str());
        }
        if let Some(suffix) = suffix {
            key.push(DELIMITER);
            key.push_str(suffix);
        }
        Ok(key)
    }

    pub fn user(&self, user_id: &str) -> Result<String, AdapterError> {
        self.key("user", &[user_id], None)
    }

    pub fn user_email(&self, email: &str) -> Result<String, AdapterError> {
        self.key("user_email", &[email], None)
    }

    /// Set of `<provider>:<providerAccountId>` members linked to a user.
    pub fn user_accounts(&self, user_id: &str) -> Result<String, AdapterError> {
        self.key("user", &[user_id], Some("accounts"))
    }

    /// Set of session tokens issued to a user.
    pub fn user_sessions(&self, user_id: &str) -> Result<String, AdapterError> {
        self.key("user", &[user_id], Some("sessions"))
    }

    pub fn provider_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<String, AdapterError> {
        self.key("provider_account", &[provider, provider_account_id], None)
    }

    pub fn session(&self, session_token: &str) -> Result<String, AdapterError> {
        self.key("session", &[session_token], None)
    }

    pub fn verification_token(&self, identifier: &str) -> Result<String, AdapterError> {
        self.key("verification_token", &[identifier], None)
    }

    pub fn user_deletion(&self, user_id: &str) -> Result<String, AdapterError> {
        self.key("user_deletion", &[user_id], None)
    }

    /// Set of user ids whose deletion has started but not finished.
    pub fn user_deletions(&self) -> String {
        format!("{}{DELIMITER}user_deletions", self.namespace)
    }

    /// Member stored in a user's account set.
    pub fn account_member(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<String, AdapterError> {
        let provider = KeySegment::new(provider)?;
        let provider_account_id = KeySegment::new(provider_account_id)?;
        Ok(format!("{provider}{DELIMITER}{provider_account_id}"))
    }

    /// Split an account set member back into `(provider, providerAccountId)`.
    pub fn parse_account_member(member: &str) -> Option<(&str, &str)> {
        let (provider, provider_account_id) = member.split_once(DELIMITER)?;
        KeySegment::new(provider).ok()?;
        KeySegment::new(provider_account_id).ok()?;
        Some((provider, provider_account_id))
    }
}
