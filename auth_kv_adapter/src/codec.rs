//! Conversion between domain records and flat hash field maps.
//!
//! Every present field is one entry; `None` is written as a missing entry.
//! Date-times use RFC 3339 in UTC with the shortest fractional seconds that
//! loses nothing, so decoding what was encoded yields an equal value.

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::store::Fields;
use crate::types::{
    AccountType, AdapterAccount, AdapterSession, AdapterUser, EmailIndexEntry, SessionUpdate,
    UserDeletionMarker, VerificationToken,
};

/// A record was found but its fields do not form a valid value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{record} record is missing field '{field}'")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },

    #[error("{record} record has invalid field '{field}': {reason}")]
    InvalidField {
        record: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// A value stored as one hash record.
pub trait HashRecord: Sized {
    /// Name used in decode errors and logs.
    const RECORD: &'static str;

    fn to_fields(&self) -> Fields;

    fn from_fields(fields: Fields) -> Result<Self, DecodeError>;
}

pub(crate) fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn parse_datetime(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

/// Accumulates entries for one record.
struct FieldWriter(Fields);

impl FieldWriter {
    fn new() -> Self {
        Self(Fields::new())
    }

    fn put(mut self, field: &str, value: impl Into<String>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    fn put_opt(self, field: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.put(field, value),
            None => self,
        }
    }

    fn finish(self) -> Fields {
        self.0
    }
}

/// Takes fields out of a fetched record, reporting which one was bad.
struct FieldReader {
    record: &'static str,
    fields: Fields,
}

impl FieldReader {
    fn new(record: &'static str, fields: Fields) -> Self {
        Self { record, fields }
    }

    fn required(&mut self, field: &'static str) -> Result<String, DecodeError> {
        self.fields
            .remove(field)
            .ok_or(DecodeError::MissingField {
                record: self.record,
                field,
            })
    }

    fn optional(&mut self, field: &'static str) -> Option<String> {
        self.fields.remove(field)
    }

    fn invalid(&self, field: &'static str, reason: impl ToString) -> DecodeError {
        DecodeError::InvalidField {
            record: self.record,
            field,
            reason: reason.to_string(),
        }
    }

    fn required_datetime(&mut self, field: &'static str) -> Result<DateTime<Utc>, DecodeError> {
        let raw = self.required(field)?;
        parse_datetime(&raw).map_err(|e| self.invalid(field, e))
    }

    fn optional_datetime(
        &mut self,
        field: &'static str,
    ) -> Result<Option<DateTime<Utc>>, DecodeError> {
        self.optional(field)
            .map(|raw| parse_datetime(&raw).map_err(|e| self.invalid(field, e)))
            .transpose()
    }

    fn optional_i64(&mut self, field: &'static str) -> Result<Option<i64>, DecodeError> {
        self.optional(field)
            .map(|raw| raw.parse::<i64>().map_err(|e| self.invalid(field, e)))
            .transpose()
    }
}

impl HashRecord for AdapterUser {
    const RECORD: &'static str = "user";

    fn to_fields(&self) -> Fields {
        FieldWriter::new()
            .put("id", &self.id)
            .put_opt("name", self.name.as_ref())
            .put("email", &self.email)
            .put_opt("emailVerified", self.email_verified.as_ref().map(format_datetime))
            .put_opt("image", self.image.as_ref())
            .finish()
    }

    fn from_fields(fields: Fields) -> Result<Self, DecodeError> {
        let mut reader = FieldReader::new(Self::RECORD, fields);
        Ok(Self {
            id: reader.required("id")?,
            name: reader.optional("name"),
            email: reader.required("email")?,
            email_verified: reader.optional_datetime("emailVerified")?,
            image: reader.optional("image"),
        })
    }
}

impl HashRecord for AdapterAccount {
    const RECORD: &'static str = "provider_account";

    fn to_fields(&self) -> Fields {
        FieldWriter::new()
            .put("userId", &self.user_id)
            .put("type", self.account_type.as_str())
            .put("provider", &self.provider)
            .put("providerAccountId", &self.provider_account_id)
            .put_opt("refresh_token", self.refresh_token.as_ref())
            .put_opt("access_token", self.access_token.as_ref())
            .put_opt("expires_at", self.expires_at.map(|v| v.to_string()))
            .put_opt("token_type", self.token_type.as_ref())
            .put_opt("scope", self.scope.as_ref())
            .put_opt("id_token", self.id_token.as_ref())
            .put_opt("session_state", self.session_state.as_ref())
            .finish()
    }

    fn from_fields(fields: Fields) -> Result<Self, DecodeError> {
        let mut reader = FieldReader::new(Self::RECORD, fields);
        let user_id = reader.required("userId")?;
        let raw_type = reader.required("type")?;
        let account_type = raw_type
            .parse::<AccountType>()
            .map_err(|e| reader.invalid("type", e))?;
        Ok(Self {
            user_id,
            account_type,
            provider: reader.required("provider")?,
            provider_account_id: reader.required("providerAccountId")?,
            refresh_token: reader.optional("refresh_token"),
            access_token: reader.optional("access_token"),
            expires_at: reader.optional_i64("expires_at")?,
            token_type: reader.optional("token_type"),
            scope: reader.optional("scope"),
            id_token: reader.optional("id_token"),
            session_state: reader.optional("session_state"),
        })
    }
}

impl HashRecord for AdapterSession {
    const RECORD: &'static str = "session";

    fn to_fields(&self) -> Fields {
        FieldWriter::new()
            .put("sessionToken", &self.session_token)
            .put("userId", &self.user_id)
            .put("expires", format_datetime(&self.expires))
            .finish()
    }

    fn from_fields(fields: Fields) -> Result<Self, DecodeError> {
        let mut reader = FieldReader::new(Self::RECORD, fields);
        Ok(Self {
            session_token: reader.required("sessionToken")?,
            user_id: reader.required("userId")?,
            expires: reader.required_datetime("expires")?,
        })
    }
}

impl HashRecord for VerificationToken {
    const RECORD: &'static str = "verification_token";

    fn to_fields(&self) -> Fields {
        FieldWriter::new()
            .put("identifier", &self.identifier)
            .put("token", &self.token)
            .put("expires", format_datetime(&self.expires))
            .finish()
    }

    fn from_fields(fields: Fields) -> Result<Self, DecodeError> {
        let mut reader = FieldReader::new(Self::RECORD, fields);
        Ok(Self {
            identifier: reader.required("identifier")?,
            token: reader.required("token")?,
            expires: reader.required_datetime("expires")?,
        })
    }
}

impl HashRecord for EmailIndexEntry {
    const RECORD: &'static str = "user_email";

    fn to_fields(&self) -> Fields {
        FieldWriter::new().put("userId", &self.user_id).finish()
    }

    fn from_fields(fields: Fields) -> Result<Self, DecodeError> {
        let mut reader = FieldReader::new(Self::RECORD, fields);
        Ok(Self {
            user_id: reader.required("userId")?,
        })
    }
}

impl HashRecord for UserDeletionMarker {
    const RECORD: &'static str = "user_deletion";

    fn to_fields(&self) -> Fields {
        FieldWriter::new()
            .put("userId", &self.user_id)
            .put_opt("email", self.email.as_ref())
            .put("startedAt", format_datetime(&self.started_at))
            .finish()
    }

    fn from_fields(fields: Fields) -> Result<Self, DecodeError> {
        let mut reader = FieldReader::new(Self::RECORD, fields);
        Ok(Self {
            user_id: reader.required("userId")?,
            email: reader.optional("email"),
            started_at: reader.required_datetime("startedAt")?,
        })
    }
}

/// Only the fields the caller supplied, for a merge onto the stored session.
pub(crate) fn session_update_fields(update: &SessionUpdate) -> Fields {
    FieldWriter::new()
        .put("sessionToken", &update.session_token)
        .put_opt("userId", update.user_id.as_ref())
        .put_opt("expires", update.expires.as_ref().map(format_datetime))
        .finish()
}
