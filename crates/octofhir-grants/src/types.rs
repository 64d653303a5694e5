//! Grant domain types.
//!
//! A [`Grant`] is a short-lived authorization artifact (refresh token,
//! authorization code, consent record, device code) persisted under a
//! caller-supplied key and indexed by subject, client and grant type.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

// =============================================================================
// Grant Type
// =============================================================================

/// Kind of persisted grant.
///
/// Serialized as its wire string. Unknown values are preserved in
/// [`GrantType::Other`] so that grants written by newer issuers still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum GrantType {
    /// OAuth 2.0 refresh token.
    RefreshToken,
    /// Authorization code awaiting exchange.
    AuthorizationCode,
    /// Remembered user consent for a client.
    UserConsent,
    /// Device authorization (RFC 8628) device code.
    DeviceCode,
    /// Reference (opaque) access token.
    ReferenceToken,
    /// Any other grant kind.
    Other(String),
}

impl GrantType {
    /// Returns the wire value of this grant type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::RefreshToken => "refresh_token",
            Self::AuthorizationCode => "authorization_code",
            Self::UserConsent => "user_consent",
            Self::DeviceCode => "device_code",
            Self::ReferenceToken => "reference_token",
            Self::Other(value) => value,
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "refresh_token" => Self::RefreshToken,
            "authorization_code" => Self::AuthorizationCode,
            "user_consent" => Self::UserConsent,
            "device_code" => Self::DeviceCode,
            "reference_token" => Self::ReferenceToken,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<String> for GrantType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(grant_type) => grant_type,
            Err(never) => match never {},
        }
    }
}

impl From<GrantType> for String {
    fn from(value: GrantType) -> Self {
        match value {
            GrantType::Other(value) => value,
            known => known.as_str().to_string(),
        }
    }
}

// =============================================================================
// Grant
// =============================================================================

/// A persisted grant record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grant {
    /// Globally unique grant key. Used verbatim as the primary storage key.
    pub key: String,

    /// End user the grant belongs to (None for client-only grants).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,

    /// Client the grant was issued to.
    pub client_id: String,

    /// Kind of grant.
    #[serde(rename = "type")]
    pub grant_type: GrantType,

    /// When the grant was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the grant expires. The backing store drops the record then.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Grant-type specific data, opaque to the store.
    #[serde(default)]
    pub payload: Value,
}

impl Grant {
    /// Creates a grant issued now and living for `lifetime`.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        client_id: impl Into<String>,
        grant_type: GrantType,
        lifetime: time::Duration,
    ) -> Self {
        let created_at = OffsetDateTime::now_utc();
        Self {
            key: key.into(),
            subject_id: None,
            client_id: client_id.into(),
            grant_type,
            created_at,
            expires_at: created_at + lifetime,
            payload: Value::Null,
        }
    }

    /// Sets the subject.
    #[must_use]
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Overrides the expiration timestamp.
    #[must_use]
    pub fn with_expires_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = expires_at;
        self
    }

    /// Returns the subject if it is present and non-empty.
    ///
    /// An empty subject string is treated the same as an absent one.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject_id.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns `true` if this grant is tied to an end user.
    #[must_use]
    pub fn has_subject(&self) -> bool {
        self.subject().is_some()
    }

    /// Remaining lifetime relative to `now`, zero once expired.
    #[must_use]
    pub fn ttl(&self, now: OffsetDateTime) -> std::time::Duration {
        (self.expires_at - now)
            .try_into()
            .unwrap_or(std::time::Duration::ZERO)
    }

    /// Returns `true` if this grant has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }
}
