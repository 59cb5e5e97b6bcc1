//! Routing keys.
//!
//! A [`RoutingKey`] is a normalized host name. Matching is exact and
//! case-insensitive; there is no wildcard matching, so normalization is the
//! only transformation applied before lookup.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum length of a host name in presentation format.
const MAX_HOST_LEN: usize = 253;

/// Maximum length of a single DNS label.
const MAX_LABEL_LEN: usize = 63;

/// A normalized host name used to look up a tenant.
///
/// # Examples
///
/// ```
/// use realty_persistence::tenant::RoutingKey;
///
/// let key = RoutingKey::parse("ACME.Example.com:8443").unwrap();
/// assert_eq!(key.as_str(), "acme.example.com");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoutingKey(String);

impl RoutingKey {
    /// Normalizes and validates a host value.
    ///
    /// Surrounding whitespace, a `:port` suffix and one trailing `.` are
    /// removed and the result is lower-cased. The remaining value must be a
    /// DNS host name. Bracketed IPv6 literals are rejected because tenants are
    /// never addressed by IP.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = |message: &str| ValidationError::InvalidRoutingKey {
            value: raw.to_string(),
            message: message.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.starts_with('[') {
            return Err(invalid("IP literals are not routable"));
        }

        let host = match trimmed.rsplit_once(':') {
            Some((host, port)) => {
                if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid("malformed port"));
                }
                host
            }
            None => trimmed,
        };
        let host = host.strip_suffix('.').unwrap_or(host).to_ascii_lowercase();

        if host.is_empty() {
            return Err(invalid("host cannot be empty"));
        }
        if host.len() > MAX_HOST_LEN {
            return Err(invalid("host exceeds 253 characters"));
        }

        for label in host.split('.') {
            if label.is_empty() {
                return Err(invalid("empty label"));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(invalid("label exceeds 63 characters"));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(invalid("label cannot start or end with '-'"));
            }
            if !label
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                return Err(invalid("label contains invalid characters"));
            }
        }

        Ok(Self(host))
    }

    /// Returns the normalized host.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoutingKey({})", self.0)
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RoutingKey {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoutingKey> for String {
    fn from(key: RoutingKey) -> Self {
        key.0
    }
}
