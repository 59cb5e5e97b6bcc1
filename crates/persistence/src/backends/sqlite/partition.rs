//! PartitionStore implementation for SQLite.
//!
//! A partition is the set of tables named `{partition}__*`. Creating one
//! means creating its migration ledger; entity tables follow as definitions
//! are applied.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};

use crate::catalog::{
    AppliedMigration, EntityDefinition, FieldDef, FieldType, MigrationOutcome, RESERVED_ENTITIES,
    SchemaChange, SchemaDelta,
};
use crate::core::{PartitionRegistry, PartitionStore};
use crate::error::{
    CatalogError, MigrationError, ProvisioningError, StorageResult, TenantError,
};
use crate::strategy::{SchemaPerTenantStrategy, TABLE_SEPARATOR, escape_identifier, physical_table};
use crate::tenant::{PartitionId, PartitionRecord, PartitionStatus, Tenant, TenantId};

use super::SqliteBackend;
use super::backend::{column_exists, table_exists};
use super::registry::{fetch_partition, parse_timestamp};
use super::schema::{LEDGER_TABLE, create_ledger};

fn column_type(field_type: &FieldType) -> &'static str {
    match field_type {
        FieldType::Integer | FieldType::Boolean => "INTEGER",
        FieldType::Real => "REAL",
        FieldType::Text | FieldType::Timestamp | FieldType::Json | FieldType::Reference(_) => {
            "TEXT"
        }
    }
}

/// Renders the `REFERENCES` clause for a reference field.
///
/// Targets in the same partition get a foreign key. Targets that only exist
/// in the shared partition are plain columns, checked on write.
fn reference_clause(
    conn: &Connection,
    partition: &PartitionId,
    shared: &PartitionId,
    entity: &str,
    target: &str,
) -> StorageResult<Option<String>> {
    let local = physical_table(partition, target);
    if table_exists(conn, &local)? {
        return Ok(Some(format!("REFERENCES {}(id)", escape_identifier(&local))));
    }
    if table_exists(conn, &physical_table(shared, target))? {
        return Ok(None);
    }
    Err(CatalogError::UnknownReference {
        entity: entity.to_string(),
        target: target.to_string(),
    }
    .into())
}

fn column_sql(
    conn: &Connection,
    partition: &PartitionId,
    shared: &PartitionId,
    entity: &str,
    field: &FieldDef,
) -> StorageResult<String> {
    let mut sql = format!(
        "{} {}",
        escape_identifier(&field.name),
        column_type(&field.field_type)
    );
    if let Some(target) = field.reference_target() {
        if let Some(clause) = reference_clause(conn, partition, shared, entity, target)? {
            sql.push(' ');
            sql.push_str(&clause);
        }
    }
    Ok(sql)
}

/// Renders `CREATE TABLE IF NOT EXISTS` for an entity.
///
/// Required fields are enforced on write, not by the column, so that
/// columns added later can stay nullable.
fn create_table_sql(
    conn: &Connection,
    partition: &PartitionId,
    shared: &PartitionId,
    definition: &EntityDefinition,
) -> StorageResult<String> {
    let mut columns = vec!["id TEXT PRIMARY KEY".to_string()];
    for field in &definition.fields {
        columns.push(column_sql(conn, partition, shared, &definition.name, field)?);
    }
    columns.push("created_at TEXT NOT NULL".to_string());
    columns.push("updated_at TEXT NOT NULL".to_string());

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        escape_identifier(&physical_table(partition, &definition.name)),
        columns.join(",\n    ")
    ))
}

fn ledger_table(partition: &PartitionId) -> String {
    escape_identifier(&physical_table(partition, LEDGER_TABLE))
}

fn ledger_fingerprint(
    conn: &Connection,
    partition: &PartitionId,
    version: &str,
) -> StorageResult<Option<String>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT fingerprint FROM {} WHERE version = ?1",
                ledger_table(partition)
            ),
            [version],
            |row| row.get(0),
        )
        .optional()?)
}

fn record_ledger(conn: &Connection, partition: &PartitionId, delta: &SchemaDelta) -> StorageResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO {} (version, fingerprint, applied_at) VALUES (?1, ?2, ?3)",
            ledger_table(partition)
        ),
        params![delta.version, delta.fingerprint(), Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Looks the delta up in the ledger.
///
/// Returns `true` if the same change set is already recorded.
fn check_ledger(conn: &Connection, partition: &PartitionId, delta: &SchemaDelta) -> StorageResult<bool> {
    match ledger_fingerprint(conn, partition, &delta.version)? {
        Some(fingerprint) if fingerprint == delta.fingerprint() => Ok(true),
        Some(_) => Err(MigrationError::ChecksumMismatch {
            partition_id: partition.clone(),
            version: delta.version.clone(),
        }
        .into()),
        None => Ok(false),
    }
}

fn require_table(
    conn: &Connection,
    partition: &PartitionId,
    delta: &SchemaDelta,
    entity: &str,
) -> StorageResult<String> {
    let table = physical_table(partition, entity);
    if !table_exists(conn, &table)? {
        return Err(MigrationError::UnknownEntity {
            version: delta.version.clone(),
            entity: entity.to_string(),
        }
        .into());
    }
    Ok(table)
}

fn apply_change(
    conn: &Connection,
    partition: &PartitionId,
    shared: &PartitionId,
    delta: &SchemaDelta,
    change: &SchemaChange,
) -> StorageResult<()> {
    match change {
        SchemaChange::CreateEntity { definition } => {
            conn.execute(&create_table_sql(conn, partition, shared, definition)?, [])?;
        }
        SchemaChange::AddField { entity, field } => {
            let table = require_table(conn, partition, delta, entity)?;
            if !column_exists(conn, &table, &field.name)? {
                conn.execute(
                    &format!(
                        "ALTER TABLE {} ADD COLUMN {}",
                        escape_identifier(&table),
                        column_sql(conn, partition, shared, entity, field)?
                    ),
                    [],
                )?;
            }
        }
        SchemaChange::CreateIndex {
            entity,
            name,
            fields,
            unique,
        } => {
            let table = require_table(conn, partition, delta, entity)?;
            let columns: Vec<String> = fields.iter().map(|f| escape_identifier(f)).collect();
            conn.execute(
                &format!(
                    "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
                    if *unique { "UNIQUE " } else { "" },
                    escape_identifier(&physical_table(partition, name)),
                    escape_identifier(&table),
                    columns.join(", ")
                ),
                [],
            )?;
        }
    }
    Ok(())
}

impl SqliteBackend {
    fn require_ledger(&self, conn: &Connection, partition: &PartitionId) -> StorageResult<()> {
        if !table_exists(conn, &physical_table(partition, LEDGER_TABLE))? {
            return Err(TenantError::PartitionNotFound {
                partition_id: partition.clone(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl PartitionStore for SqliteBackend {
    fn strategy(&self) -> &SchemaPerTenantStrategy {
        self.naming()
    }

    async fn create_tenant_partition(&self, tenant: &Tenant) -> StorageResult<PartitionRecord> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if fetch_partition(&tx, &self.tables, &tenant.partition_id)?.is_some() {
            return Err(ProvisioningError::PartitionTaken {
                partition_id: tenant.partition_id.clone(),
            }
            .into());
        }
        let tenant_exists: Option<i64> = tx
            .query_row(
                &format!("SELECT 1 FROM {} WHERE tenant_id = ?1", self.tables.tenants),
                [tenant.tenant_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if tenant_exists.is_some() {
            return Err(ProvisioningError::InProgress {
                tenant_id: tenant.tenant_id.clone(),
            }
            .into());
        }

        let created_at = tenant.created_at.to_rfc3339();
        tx.execute(
            &format!(
                "INSERT INTO {} (tenant_id, partition_id, display_name, contact_email, address, phone, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                self.tables.tenants
            ),
            params![
                tenant.tenant_id.as_str(),
                tenant.partition_id.as_str(),
                tenant.display_name,
                tenant.contact_email,
                tenant.address,
                tenant.phone,
                tenant.active,
                created_at,
            ],
        )?;
        tx.execute(
            &format!(
                "INSERT INTO {} (partition_id, tenant_id, status, last_error, created_at, updated_at)
                 VALUES (?1, ?2, 'pending', NULL, ?3, ?3)",
                self.tables.partitions
            ),
            params![tenant.partition_id.as_str(), tenant.tenant_id.as_str(), created_at],
        )?;
        tx.commit()?;

        Ok(PartitionRecord {
            partition_id: tenant.partition_id.clone(),
            tenant_id: Some(tenant.tenant_id.clone()),
            status: PartitionStatus::Pending,
            last_error: None,
            created_at: tenant.created_at,
            updated_at: tenant.created_at,
        })
    }

    async fn transition_partition(
        &self,
        partition_id: &PartitionId,
        from: &[PartitionStatus],
        to: PartitionStatus,
        last_error: Option<&str>,
    ) -> StorageResult<bool> {
        if from.is_empty() {
            return Ok(false);
        }

        let conn = self.get_connection()?;
        let placeholders: Vec<String> = (0..from.len()).map(|i| format!("?{}", i + 5)).collect();
        let sql = format!(
            "UPDATE {} SET status = ?1, last_error = ?2, updated_at = ?3
             WHERE partition_id = ?4 AND status IN ({})",
            self.tables.partitions,
            placeholders.join(", ")
        );

        let mut values: Vec<Option<String>> = vec![
            Some(to.as_str().to_string()),
            last_error.map(str::to_string),
            Some(Utc::now().to_rfc3339()),
            Some(partition_id.as_str().to_string()),
        ];
        values.extend(from.iter().map(|s| Some(s.as_str().to_string())));

        let changed = conn.execute(&sql, params_from_iter(values.iter()))?;
        if changed > 0 {
            tracing::debug!(partition = %partition_id, status = %to, "Partition status changed");
        }
        Ok(changed > 0)
    }

    async fn set_tenant_active(&self, tenant_id: &TenantId, active: bool) -> StorageResult<()> {
        let conn = self.get_connection()?;
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET is_active = ?1 WHERE tenant_id = ?2",
                self.tables.tenants
            ),
            params![active, tenant_id.as_str()],
        )?;
        if changed == 0 {
            return Err(TenantError::TenantNotFound {
                tenant_id: tenant_id.clone(),
            }
            .into());
        }
        Ok(())
    }

    async fn create_partition(&self, partition_id: &PartitionId) -> StorageResult<()> {
        let conn = self.get_connection()?;
        create_ledger(&conn, partition_id)?;
        tracing::debug!(partition = %partition_id, "Created partition");
        Ok(())
    }

    async fn apply_definition(
        &self,
        partition_id: &PartitionId,
        definition: &EntityDefinition,
    ) -> StorageResult<()> {
        let conn = self.get_connection()?;
        let sql = create_table_sql(&conn, partition_id, self.shared_partition(), definition)?;
        conn.execute(&sql, [])?;
        tracing::debug!(
            partition = %partition_id,
            entity = %definition.name,
            "Applied entity definition"
        );
        Ok(())
    }

    async fn record_baseline(
        &self,
        partition_id: &PartitionId,
        delta: &SchemaDelta,
    ) -> StorageResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        self.require_ledger(&tx, partition_id)?;
        if !check_ledger(&tx, partition_id, delta)? {
            record_ledger(&tx, partition_id, delta)?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn apply_delta(
        &self,
        partition_id: &PartitionId,
        delta: &SchemaDelta,
    ) -> StorageResult<MigrationOutcome> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        self.require_ledger(&tx, partition_id)?;

        if check_ledger(&tx, partition_id, delta)? {
            return Ok(MigrationOutcome::AlreadyApplied);
        }
        if let Some(requires) = &delta.requires {
            if ledger_fingerprint(&tx, partition_id, requires)?.is_none() {
                return Err(MigrationError::OutOfOrder {
                    partition_id: partition_id.clone(),
                    version: delta.version.clone(),
                    requires: requires.clone(),
                }
                .into());
            }
        }

        for change in &delta.changes {
            apply_change(&tx, partition_id, self.shared_partition(), delta, change)?;
        }
        record_ledger(&tx, partition_id, delta)?;
        tx.commit()?;

        tracing::info!(partition = %partition_id, version = %delta.version, "Applied migration");
        Ok(MigrationOutcome::Applied)
    }

    async fn applied_migrations(
        &self,
        partition_id: &PartitionId,
    ) -> StorageResult<Vec<AppliedMigration>> {
        let conn = self.get_connection()?;
        self.require_ledger(&conn, partition_id)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT version, fingerprint, applied_at FROM {} ORDER BY applied_at, version",
            ledger_table(partition_id)
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(version, fingerprint, applied_at)| {
                Ok(AppliedMigration {
                    version,
                    fingerprint,
                    applied_at: parse_timestamp(&applied_at)?,
                })
            })
            .collect()
    }

    async fn entity_tables(&self, partition_id: &PartitionId) -> StorageResult<Vec<String>> {
        let conn = self.get_connection()?;
        let prefix = format!("{}{}", partition_id.as_str(), TABLE_SEPARATOR);

        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND substr(name, 1, length(?1)) = ?1
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([prefix.as_str()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names
            .into_iter()
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .filter(|entity| entity != LEDGER_TABLE && !RESERVED_ENTITIES.contains(&entity.as_str()))
            .collect())
    }
}
