use std::env;

use crate::errors::AdapterError;
use crate::keys::DEFAULT_NAMESPACE;

pub const ENV_NAMESPACE: &str = "AUTH_KV_NAMESPACE";
pub const ENV_EXPIRE_RECORDS: &str = "AUTH_KV_EXPIRE_RECORDS";
pub const ENV_CASCADE_SESSIONS: &str = "AUTH_KV_CASCADE_SESSIONS";

/// Adapter behavior switches.
///
/// The defaults reproduce the plain contract: keys under `authjs`, expiry
/// kept as data only, sessions left alone when their user is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    /// First segment of every key
    pub namespace: String,
    /// Give sessions and verification tokens a store-level TTL matching
    /// their `expires` field
    pub expire_records: bool,
    /// Delete a user's sessions together with the user
    pub cascade_sessions_on_user_delete: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            expire_records: false,
            cascade_sessions_on_user_delete: false,
        }
    }
}

impl AdapterConfig {
    /// Read the configuration from the environment, falling back to
    /// defaults for unset variables.
    pub fn from_env() -> Result<Self, AdapterError> {
        let defaults = Self::default();
        let namespace = env::var(ENV_NAMESPACE).unwrap_or(defaults.namespace);
        let expire_records = bool_var(ENV_EXPIRE_RECORDS)?.unwrap_or(defaults.expire_records);
        let cascade_sessions_on_user_delete =
            bool_var(ENV_CASCADE_SESSIONS)?.unwrap_or(defaults.cascade_sessions_on_user_delete);

        tracing::debug!(
            namespace = %namespace,
            expire_records,
            cascade_sessions_on_user_delete,
            "Loaded adapter configuration"
        );

        Ok(Self {
            namespace,
            expire_records,
            cascade_sessions_on_user_delete,
        })
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_expire_records(mut self, enabled: bool) -> Self {
        self.expire_records = enabled;
        self
    }

    pub fn with_session_cascade(mut self, enabled: bool) -> Self {
        self.cascade_sessions_on_user_delete = enabled;
        self
    }
}

fn bool_var(name: &str) -> Result<Option<bool>, AdapterError> {
    match env::var(name) {
        Ok(value) => parse_bool(&value).map(Some).ok_or_else(|| {
            AdapterError::Config(format!("{name} must be a boolean, got '{value}'"))
        }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(AdapterError::Config(format!("{name}: {e}"))),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
