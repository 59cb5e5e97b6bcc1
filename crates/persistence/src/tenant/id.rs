//! Tenant and partition identifier types.
//!
//! [`TenantId`] is the canonical slug of a tenant's display name and is the
//! key for the per-tenant provisioning lock. [`PartitionId`] is the schema
//! name of the tenant's isolated partition; once assigned it never changes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum length of a partition identifier (PostgreSQL's `NAMEDATALEN - 1`).
pub const MAX_PARTITION_ID_LEN: usize = 63;

/// A canonical tenant identifier.
///
/// Tenant identifiers are lower-case slugs: ASCII letters and digits separated
/// by single `-` characters.
///
/// # Examples
///
/// ```
/// use realty_persistence::tenant::TenantId;
///
/// let tenant = TenantId::from_name("Acme Corp.").unwrap();
/// assert_eq!(tenant.as_str(), "acme-corp");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Wraps an identifier that is already canonical.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the canonical identifier from a tenant display name.
    ///
    /// Runs of characters other than ASCII letters and digits collapse into
    /// a single `-`; leading and trailing separators are dropped. The
    /// derivation is deterministic so a retried provisioning call lands on
    /// the same tenant.
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        let mut slug = String::with_capacity(name.len());
        let mut pending_separator = false;

        for ch in name.trim().chars() {
            if ch.is_ascii_alphanumeric() {
                if pending_separator && !slug.is_empty() {
                    slug.push('-');
                }
                pending_separator = false;
                slug.push(ch.to_ascii_lowercase());
            } else {
                pending_separator = true;
            }
        }

        if slug.is_empty() {
            return Err(ValidationError::InvalidTenantName {
                name: name.to_string(),
                message: "name must contain at least one ASCII letter or digit".to_string(),
            });
        }

        Ok(Self(slug))
    }

    /// Returns the tenant ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TenantId({})", self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical = Self::from_name(s)?;
        if canonical.as_str() != s {
            return Err(ValidationError::InvalidTenantName {
                name: s.to_string(),
                message: format!("not canonical, expected '{}'", canonical),
            });
        }
        Ok(canonical)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The identifier of a physical partition (a schema name).
///
/// A valid identifier starts with a lower-case ASCII letter, continues with
/// lower-case letters, digits or `_`, and is at most
/// [`MAX_PARTITION_ID_LEN`] bytes long.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionId(String);

impl PartitionId {
    /// Parses and validates a partition identifier.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        validate_partition_id(&value)?;
        Ok(Self(value))
    }

    /// Wraps an identifier without validation.
    ///
    /// Only for values read back from the registry or built from already
    /// validated parts.
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_partition_id(value: &str) -> Result<(), ValidationError> {
    let invalid = |message: &str| ValidationError::InvalidPartitionId {
        value: value.to_string(),
        message: message.to_string(),
    };

    if value.is_empty() {
        return Err(invalid("identifier cannot be empty"));
    }
    if value.len() > MAX_PARTITION_ID_LEN {
        return Err(invalid("identifier exceeds 63 characters"));
    }
    if !value.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid("identifier must start with a lower-case letter"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(invalid(
            "identifier may only contain lower-case letters, digits and '_'",
        ));
    }
    if value.contains("__") {
        return Err(invalid("identifier cannot contain '__'"));
    }
    Ok(())
}

impl fmt::Debug for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartitionId({})", self.0)
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PartitionId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PartitionId> for String {
    fn from(id: PartitionId) -> Self {
        id.0
    }
}

impl AsRef<str> for PartitionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
