//! Registry records: tenants, domains, and partitions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{PartitionId, TenantId};
use super::routing_key::RoutingKey;
use crate::error::ValidationError;

/// Provisioning status of a partition.
///
/// Only [`PartitionStatus::Ready`] partitions are ever resolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionStatus {
    /// Allocated; schema application has not finished.
    Pending,
    /// Schema-complete and routable.
    Ready,
    /// Schema application failed or timed out.
    Failed,
    /// Deprovisioned. Data is retained; teardown is manual.
    Inactive,
}

impl PartitionStatus {
    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionStatus::Pending => "pending",
            PartitionStatus::Ready => "ready",
            PartitionStatus::Failed => "failed",
            PartitionStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for PartitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PartitionStatus::Pending),
            "ready" => Ok(PartitionStatus::Ready),
            "failed" => Ok(PartitionStatus::Failed),
            "inactive" => Ok(PartitionStatus::Inactive),
            other => Err(ValidationError::InvalidRecord {
                entity: "partition".to_string(),
                message: format!("unknown partition status '{}'", other),
            }),
        }
    }
}

/// A reference to a tenant's partition, as returned by resolution and
/// provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRef {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Schema name of the partition.
    pub partition_id: PartitionId,
    /// Status at the time the reference was produced.
    pub status: PartitionStatus,
}

/// A partition row from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionRecord {
    /// Schema name of the partition.
    pub partition_id: PartitionId,
    /// Owning tenant; `None` for the shared partition.
    pub tenant_id: Option<TenantId>,
    /// Current status.
    pub status: PartitionStatus,
    /// Last provisioning or migration error, if any.
    pub last_error: Option<String>,
    /// When the partition was allocated.
    pub created_at: DateTime<Utc>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

impl PartitionRecord {
    /// Returns a [`PartitionRef`] if the partition belongs to a tenant.
    pub fn to_ref(&self) -> Option<PartitionRef> {
        self.tenant_id.as_ref().map(|tenant_id| PartitionRef {
            tenant_id: tenant_id.clone(),
            partition_id: self.partition_id.clone(),
            status: self.status,
        })
    }
}

/// A customer organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Canonical identifier.
    pub tenant_id: TenantId,
    /// Immutable partition assignment.
    pub partition_id: PartitionId,
    /// Display name.
    pub display_name: String,
    /// Contact email.
    pub contact_email: String,
    /// Postal address.
    pub address: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Whether the tenant is active. Deprovisioned tenants are kept, inactive.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Returns `true` if the descriptor names this organization.
    ///
    /// Display name and contact email must both match; the canonical
    /// identifier alone is lossy ("Acme Realty" and "ACME realty!" share it).
    pub fn is_described_by(&self, descriptor: &TenantDescriptor) -> bool {
        self.display_name == descriptor.name.trim()
            && self
                .contact_email
                .eq_ignore_ascii_case(descriptor.contact_email.trim())
    }
}

/// Input to provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDescriptor {
    /// Display name; the canonical tenant identifier is derived from it.
    pub name: String,
    /// Contact email.
    pub contact_email: String,
    /// Initial domain, registered once the partition is ready.
    pub domain: RoutingKey,
    /// Postal address.
    #[serde(default)]
    pub address: Option<String>,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
}

impl TenantDescriptor {
    /// Creates a descriptor with the required fields.
    pub fn new(name: impl Into<String>, contact_email: impl Into<String>, domain: RoutingKey) -> Self {
        Self {
            name: name.into(),
            contact_email: contact_email.into(),
            domain,
            address: None,
            phone: None,
        }
    }

    /// Sets the postal address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Sets the phone number.
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Validates the descriptor and derives the canonical tenant identifier.
    pub fn tenant_id(&self) -> Result<TenantId, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingRequiredField {
                field: "name".to_string(),
            });
        }
        let email = self.contact_email.trim();
        if email.is_empty() {
            return Err(ValidationError::MissingRequiredField {
                field: "contact_email".to_string(),
            });
        }
        match email.split_once('@') {
            Some((local, host)) if !local.is_empty() && host.contains('.') => {}
            _ => {
                return Err(ValidationError::InvalidRecord {
                    entity: "tenant".to_string(),
                    message: format!("invalid contact email '{}'", email),
                });
            }
        }
        TenantId::from_name(&self.name)
    }
}

/// A routing entry mapping a host to a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Normalized host.
    pub routing_key: RoutingKey,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Whether this is the tenant's primary domain.
    pub primary: bool,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_status_round_trip() {
        for status in [
            PartitionStatus::Pending,
            PartitionStatus::Ready,
            PartitionStatus::Failed,
            PartitionStatus::Inactive,
        ] {
            assert_eq!(status.as_str().parse::<PartitionStatus>().unwrap(), status);
        }
        assert!("provisioning".parse::<PartitionStatus>().is_err());
    }

    #[test]
    fn test_descriptor_validation() {
        let domain = RoutingKey::parse("acme.example.com").unwrap();
        let descriptor = TenantDescriptor::new("Acme", "ops@acme.example.com", domain.clone());
        assert_eq!(descriptor.tenant_id().unwrap().as_str(), "acme");

        let missing_email = TenantDescriptor::new("Acme", " ", domain.clone());
        assert!(matches!(
            missing_email.tenant_id(),
            Err(ValidationError::MissingRequiredField { .. })
        ));

        let bad_email = TenantDescriptor::new("Acme", "ops", domain.clone());
        assert!(matches!(
            bad_email.tenant_id(),
            Err(ValidationError::InvalidRecord { .. })
        ));

        let bad_name = TenantDescriptor::new("???", "ops@acme.example.com", domain);
        assert!(matches!(
            bad_name.tenant_id(),
            Err(ValidationError::InvalidTenantName { .. })
        ));
    }

    #[test]
    fn test_tenant_is_described_by() {
        let tenant = Tenant {
            tenant_id: TenantId::new("acme-realty"),
            partition_id: PartitionId::new_unchecked("tenant_acme_realty"),
            display_name: "Acme Realty".to_string(),
            contact_email: "ops@acme.example.com".to_string(),
            address: None,
            phone: None,
            active: true,
            created_at: Utc::now(),
        };
        let domain = RoutingKey::parse("acme.example.com").unwrap();

        let retry = TenantDescriptor::new(" Acme Realty ", "OPS@acme.example.com", domain.clone());
        assert!(tenant.is_described_by(&retry));

        let other = TenantDescriptor::new("ACME  realty!", "ops@acme.example.com", domain.clone());
        assert_eq!(other.tenant_id().unwrap(), tenant.tenant_id);
        assert!(!tenant.is_described_by(&other));

        let other_contact = TenantDescriptor::new("Acme Realty", "ceo@elsewhere.example.com", domain);
        assert!(!tenant.is_described_by(&other_contact));
    }

    #[test]
    fn test_shared_partition_has_no_ref() {
        let record = PartitionRecord {
            partition_id: PartitionId::new_unchecked("shared"),
            tenant_id: None,
            status: PartitionStatus::Ready,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(record.to_ref().is_none());
    }
}
