//! PartitionRegistry implementation for SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};

use crate::core::PartitionRegistry;
use crate::error::{BackendError, ProvisioningError, StorageError, StorageResult, TenantError};
use crate::tenant::{
    Domain, PartitionId, PartitionRecord, PartitionRef, PartitionStatus, RoutingKey, Tenant,
    TenantId,
};

use super::SqliteBackend;
use super::schema::RegistryTables;

pub(crate) fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StorageError::Backend(BackendError::SerializationError {
                message: format!("invalid timestamp '{}': {}", value, e),
            })
        })
}

struct TenantRow {
    tenant_id: String,
    partition_id: String,
    display_name: String,
    contact_email: String,
    address: Option<String>,
    phone: Option<String>,
    active: bool,
    created_at: String,
}

const TENANT_COLUMNS: &str =
    "tenant_id, partition_id, display_name, contact_email, address, phone, is_active, created_at";

impl TenantRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            tenant_id: row.get(0)?,
            partition_id: row.get(1)?,
            display_name: row.get(2)?,
            contact_email: row.get(3)?,
            address: row.get(4)?,
            phone: row.get(5)?,
            active: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_tenant(self) -> StorageResult<Tenant> {
        Ok(Tenant {
            tenant_id: TenantId::new(self.tenant_id),
            partition_id: PartitionId::new_unchecked(self.partition_id),
            display_name: self.display_name,
            contact_email: self.contact_email,
            address: self.address,
            phone: self.phone,
            active: self.active,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

struct PartitionRow {
    partition_id: String,
    tenant_id: Option<String>,
    status: String,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

const PARTITION_COLUMNS: &str = "partition_id, tenant_id, status, last_error, created_at, updated_at";

impl PartitionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            partition_id: row.get(0)?,
            tenant_id: row.get(1)?,
            status: row.get(2)?,
            last_error: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_record(self) -> StorageResult<PartitionRecord> {
        Ok(PartitionRecord {
            partition_id: PartitionId::new_unchecked(self.partition_id),
            tenant_id: self.tenant_id.map(TenantId::new),
            status: self.status.parse()?,
            last_error: self.last_error,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct DomainRow {
    hostname: String,
    tenant_id: String,
    primary: bool,
    created_at: String,
}

impl DomainRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            hostname: row.get(0)?,
            tenant_id: row.get(1)?,
            primary: row.get(2)?,
            created_at: row.get(3)?,
        })
    }

    fn into_domain(self) -> StorageResult<Domain> {
        Ok(Domain {
            routing_key: RoutingKey::parse(&self.hostname)?,
            tenant_id: TenantId::new(self.tenant_id),
            primary: self.primary,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

pub(crate) fn fetch_tenant(
    conn: &Connection,
    tables: &RegistryTables,
    tenant_id: &TenantId,
) -> StorageResult<Option<Tenant>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM {} WHERE tenant_id = ?1",
            TENANT_COLUMNS, tables.tenants
        ),
        [tenant_id.as_str()],
        TenantRow::from_row,
    )
    .optional()?
    .map(TenantRow::into_tenant)
    .transpose()
}

pub(crate) fn fetch_partition(
    conn: &Connection,
    tables: &RegistryTables,
    partition_id: &PartitionId,
) -> StorageResult<Option<PartitionRecord>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM {} WHERE partition_id = ?1",
            PARTITION_COLUMNS, tables.partitions
        ),
        [partition_id.as_str()],
        PartitionRow::from_row,
    )
    .optional()?
    .map(PartitionRow::into_record)
    .transpose()
}

fn fetch_domain(
    conn: &Connection,
    tables: &RegistryTables,
    routing_key: &RoutingKey,
) -> StorageResult<Option<Domain>> {
    conn.query_row(
        &format!(
            "SELECT hostname, tenant_id, is_primary, created_at FROM {} WHERE hostname = ?1",
            tables.domains
        ),
        [routing_key.as_str()],
        DomainRow::from_row,
    )
    .optional()?
    .map(DomainRow::into_domain)
    .transpose()
}

#[async_trait]
impl PartitionRegistry for SqliteBackend {
    fn shared_partition(&self) -> &PartitionId {
        self.naming().shared_partition()
    }

    async fn resolve(&self, routing_key: &RoutingKey) -> StorageResult<Option<PartitionRef>> {
        let conn = self.get_connection()?;
        let row: Option<(String, String, String)> = conn
            .query_row(
                &format!(
                    "SELECT t.tenant_id, p.partition_id, p.status
                     FROM {domains} d
                     JOIN {tenants} t ON t.tenant_id = d.tenant_id
                     JOIN {partitions} p ON p.tenant_id = t.tenant_id
                     WHERE d.hostname = ?1 AND t.is_active = 1 AND p.status = 'ready'",
                    domains = self.tables.domains,
                    tenants = self.tables.tenants,
                    partitions = self.tables.partitions,
                ),
                [routing_key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(tenant_id, partition_id, status)| {
            Ok(PartitionRef {
                tenant_id: TenantId::new(tenant_id),
                partition_id: PartitionId::new_unchecked(partition_id),
                status: status.parse()?,
            })
        })
        .transpose()
    }

    async fn register(
        &self,
        tenant_id: &TenantId,
        routing_key: &RoutingKey,
        primary: bool,
    ) -> StorageResult<Domain> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let tenant = fetch_tenant(&tx, &self.tables, tenant_id)?.ok_or_else(|| {
            TenantError::TenantNotFound {
                tenant_id: tenant_id.clone(),
            }
        })?;
        if !tenant.active {
            return Err(TenantError::TenantInactive {
                tenant_id: tenant_id.clone(),
            }
            .into());
        }

        let partition = fetch_partition(&tx, &self.tables, &tenant.partition_id)?.ok_or_else(|| {
            TenantError::PartitionNotFound {
                partition_id: tenant.partition_id.clone(),
            }
        })?;
        if partition.status != PartitionStatus::Ready {
            return Err(ProvisioningError::InvalidState {
                partition_id: partition.partition_id,
                status: partition.status,
            }
            .into());
        }

        let demote_others = format!(
            "UPDATE {} SET is_primary = 0 WHERE tenant_id = ?1 AND hostname <> ?2",
            self.tables.domains
        );

        let domain = match fetch_domain(&tx, &self.tables, routing_key)? {
            Some(existing) if existing.tenant_id != *tenant_id => {
                return Err(TenantError::DuplicateDomain {
                    domain: routing_key.to_string(),
                    existing_tenant: existing.tenant_id,
                }
                .into());
            }
            Some(mut existing) => {
                if primary && !existing.primary {
                    tx.execute(&demote_others, params![tenant_id.as_str(), routing_key.as_str()])?;
                    tx.execute(
                        &format!(
                            "UPDATE {} SET is_primary = 1 WHERE hostname = ?1",
                            self.tables.domains
                        ),
                        [routing_key.as_str()],
                    )?;
                    existing.primary = true;
                }
                existing
            }
            None => {
                if primary {
                    tx.execute(&demote_others, params![tenant_id.as_str(), routing_key.as_str()])?;
                }
                let now = Utc::now();
                tx.execute(
                    &format!(
                        "INSERT INTO {} (hostname, tenant_id, is_primary, created_at)
                         VALUES (?1, ?2, ?3, ?4)",
                        self.tables.domains
                    ),
                    params![
                        routing_key.as_str(),
                        tenant_id.as_str(),
                        primary,
                        now.to_rfc3339()
                    ],
                )?;
                Domain {
                    routing_key: routing_key.clone(),
                    tenant_id: tenant_id.clone(),
                    primary,
                    created_at: now,
                }
            }
        };

        tx.commit()?;

        tracing::info!(
            tenant_id = %tenant_id,
            domain = %routing_key,
            primary = domain.primary,
            "Registered domain"
        );
        Ok(domain)
    }

    async fn deregister(&self, routing_key: &RoutingKey) -> StorageResult<Domain> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let domain = fetch_domain(&tx, &self.tables, routing_key)?.ok_or_else(|| {
            TenantError::DomainNotFound {
                domain: routing_key.to_string(),
            }
        })?;
        tx.execute(
            &format!("DELETE FROM {} WHERE hostname = ?1", self.tables.domains),
            [routing_key.as_str()],
        )?;
        tx.commit()?;

        tracing::info!(tenant_id = %domain.tenant_id, domain = %routing_key, "Deregistered domain");
        Ok(domain)
    }

    async fn domain(&self, routing_key: &RoutingKey) -> StorageResult<Option<Domain>> {
        let conn = self.get_connection()?;
        fetch_domain(&conn, &self.tables, routing_key)
    }

    async fn domains(&self, tenant_id: &TenantId) -> StorageResult<Vec<Domain>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT hostname, tenant_id, is_primary, created_at FROM {}
             WHERE tenant_id = ?1 ORDER BY is_primary DESC, hostname",
            self.tables.domains
        ))?;
        let rows = stmt
            .query_map([tenant_id.as_str()], DomainRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(DomainRow::into_domain).collect()
    }

    async fn tenant(&self, tenant_id: &TenantId) -> StorageResult<Option<Tenant>> {
        let conn = self.get_connection()?;
        fetch_tenant(&conn, &self.tables, tenant_id)
    }

    async fn list_tenants(&self) -> StorageResult<Vec<Tenant>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY tenant_id",
            TENANT_COLUMNS, self.tables.tenants
        ))?;
        let rows = stmt
            .query_map([], TenantRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TenantRow::into_tenant).collect()
    }

    async fn partition(&self, partition_id: &PartitionId) -> StorageResult<Option<PartitionRecord>> {
        let conn = self.get_connection()?;
        fetch_partition(&conn, &self.tables, partition_id)
    }

    async fn list_partitions(
        &self,
        status: Option<PartitionStatus>,
    ) -> StorageResult<Vec<PartitionRecord>> {
        let conn = self.get_connection()?;
        let rows = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM {} WHERE tenant_id IS NOT NULL AND status = ?1
                     ORDER BY partition_id",
                    PARTITION_COLUMNS, self.tables.partitions
                ))?;
                stmt.query_map([status.as_str()], PartitionRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM {} WHERE tenant_id IS NOT NULL ORDER BY partition_id",
                    PARTITION_COLUMNS, self.tables.partitions
                ))?;
                stmt.query_map([], PartitionRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        rows.into_iter().map(PartitionRow::into_record).collect()
    }
}
