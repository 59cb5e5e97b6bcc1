//! EntityStorage implementation for SQLite.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params_from_iter};
use serde_json::{Map, Number, Value};

use crate::catalog::{EntityDefinition, FieldType};
use crate::core::EntityStorage;
use crate::error::{
    BackendError, CatalogError, EntityError, StorageError, StorageResult, ValidationError,
};
use crate::strategy::{escape_identifier, physical_table};
use crate::tenant::{BoundContext, PartitionId};
use crate::types::{Page, Pagination, StoredEntity};

use super::SqliteBackend;
use super::backend::table_exists;
use super::registry::parse_timestamp;

const MAX_ID_LEN: usize = 64;

fn serialization_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::SerializationError { message })
}

/// Takes the record's `id` if it has one, otherwise generates one.
fn entity_id(definition: &EntityDefinition, record: &Value) -> Result<String, ValidationError> {
    let invalid = |message: &str| ValidationError::InvalidRecord {
        entity: definition.name.clone(),
        message: message.to_string(),
    };

    match record.get("id") {
        None | Some(Value::Null) => Ok(uuid::Uuid::new_v4().to_string()),
        Some(Value::String(id)) => {
            if id.is_empty() || id.len() > MAX_ID_LEN {
                return Err(invalid("id must be 1 to 64 characters"));
            }
            if !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(invalid("id may only contain ASCII letters, digits, '-', '_' and '.'"));
            }
            Ok(id.clone())
        }
        Some(_) => Err(invalid("id must be a string")),
    }
}

fn to_sql(field_type: &FieldType, value: &Value) -> StorageResult<SqlValue> {
    Ok(match (field_type, value) {
        (_, Value::Null) => SqlValue::Null,
        (FieldType::Json, value) => SqlValue::Text(serde_json::to_string(value)?),
        (FieldType::Boolean, Value::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        (FieldType::Integer, Value::Number(n)) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => return Err(serialization_error(format!("{} is not an integer", n))),
        },
        (FieldType::Real, Value::Number(n)) => match n.as_f64() {
            Some(f) => SqlValue::Real(f),
            None => return Err(serialization_error(format!("{} is not a number", n))),
        },
        (_, Value::String(s)) => SqlValue::Text(s.clone()),
        (_, other) => {
            return Err(serialization_error(format!(
                "cannot store {} as {:?}",
                other, field_type
            )));
        }
    })
}

fn from_sql(field_type: &FieldType, value: SqlValue) -> StorageResult<Value> {
    Ok(match (field_type, value) {
        (_, SqlValue::Null) => Value::Null,
        (FieldType::Boolean, SqlValue::Integer(i)) => Value::Bool(i != 0),
        (FieldType::Integer, SqlValue::Integer(i)) => Value::from(i),
        (FieldType::Real, SqlValue::Real(f)) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        (FieldType::Real, SqlValue::Integer(i)) => Value::from(i as f64),
        (FieldType::Json, SqlValue::Text(s)) => serde_json::from_str(&s)?,
        (_, SqlValue::Text(s)) => Value::String(s),
        (field_type, other) => {
            return Err(serialization_error(format!(
                "unexpected {:?} column value for {:?}",
                other.data_type(),
                field_type
            )));
        }
    })
}

fn select_columns(definition: &EntityDefinition) -> String {
    let mut columns = vec!["id".to_string()];
    columns.extend(definition.fields.iter().map(|f| escape_identifier(&f.name)));
    columns.push("created_at".to_string());
    columns.push("updated_at".to_string());
    columns.join(", ")
}

type RawRow = (String, Vec<SqlValue>, String, String);

fn map_row(definition: &EntityDefinition, row: &Row<'_>) -> rusqlite::Result<RawRow> {
    let id: String = row.get(0)?;
    let mut values = Vec::with_capacity(definition.fields.len());
    for index in 0..definition.fields.len() {
        values.push(row.get::<_, SqlValue>(index + 1)?);
    }
    let created_at: String = row.get(definition.fields.len() + 1)?;
    let updated_at: String = row.get(definition.fields.len() + 2)?;
    Ok((id, values, created_at, updated_at))
}

fn into_stored(
    definition: &EntityDefinition,
    partition: &PartitionId,
    (id, values, created_at, updated_at): RawRow,
) -> StorageResult<StoredEntity> {
    let mut fields = Map::with_capacity(values.len());
    for (field, value) in definition.fields.iter().zip(values) {
        fields.insert(field.name.clone(), from_sql(&field.field_type, value)?);
    }
    Ok(StoredEntity {
        entity: definition.name.clone(),
        id,
        partition_id: partition.clone(),
        fields,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_exists(conn: &Connection, table: &str, id: &str) -> StorageResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {} WHERE id = ?1", escape_identifier(table)),
            [id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

impl SqliteBackend {
    /// Returns the physical table of an entity for a bound request.
    ///
    /// The partition comes from the context alone.
    fn bound_table(
        &self,
        conn: &Connection,
        ctx: &BoundContext,
        definition: &EntityDefinition,
    ) -> StorageResult<(PartitionId, String)> {
        let partition = ctx.partition_for(definition.class).clone();
        ctx.check_access(&partition)?;

        let table = physical_table(&partition, &definition.name);
        if !table_exists(conn, &table)? {
            return Err(CatalogError::UnknownEntity {
                module: definition.module.clone(),
                entity: definition.name.clone(),
            }
            .into());
        }
        Ok((partition, table))
    }

    /// Checks that a reference points at an existing row.
    ///
    /// Only the bound partition and the shared partition are consulted.
    fn check_reference(
        &self,
        conn: &Connection,
        ctx: &BoundContext,
        definition: &EntityDefinition,
        field: &str,
        target: &str,
        id: &str,
    ) -> StorageResult<()> {
        let mut searched = vec![ctx.partition_for(definition.class)];
        if ctx.shared_partition() != searched[0] {
            searched.push(ctx.shared_partition());
        }

        for partition in searched {
            ctx.check_access(partition)?;
            let table = physical_table(partition, target);
            if table_exists(conn, &table)? && row_exists(conn, &table, id)? {
                return Ok(());
            }
        }

        Err(EntityError::ReferenceNotFound {
            entity: definition.name.clone(),
            field: field.to_string(),
            target: target.to_string(),
            id: id.to_string(),
        }
        .into())
    }
}

#[async_trait]
impl EntityStorage for SqliteBackend {
    async fn create(
        &self,
        ctx: &BoundContext,
        definition: &EntityDefinition,
        record: Value,
    ) -> StorageResult<StoredEntity> {
        let values = definition.validate_record(&record)?;
        let id = entity_id(definition, &record)?;

        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (partition, table) = self.bound_table(&tx, ctx, definition)?;

        if row_exists(&tx, &table, &id)? {
            return Err(EntityError::AlreadyExists {
                entity: definition.name.clone(),
                id,
            }
            .into());
        }

        let mut params: Vec<SqlValue> = Vec::with_capacity(values.len() + 3);
        params.push(SqlValue::Text(id.clone()));
        for (field, (name, value)) in definition.fields.iter().zip(&values) {
            if let (Some(target), Some(reference)) = (field.reference_target(), value.as_str()) {
                self.check_reference(&tx, ctx, definition, name, target, reference)?;
            }
            params.push(to_sql(&field.field_type, value)?);
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        params.push(SqlValue::Text(now.clone()));
        params.push(SqlValue::Text(now.clone()));

        let placeholders: Vec<String> = (1..=params.len()).map(|i| format!("?{}", i)).collect();
        tx.execute(
            &format!(
                "INSERT INTO {} ({}) VALUES ({})",
                escape_identifier(&table),
                select_columns(definition),
                placeholders.join(", ")
            ),
            params_from_iter(params.iter()),
        )?;

        let row = tx.query_row(
            &format!(
                "SELECT {} FROM {} WHERE id = ?1",
                select_columns(definition),
                escape_identifier(&table)
            ),
            [id.as_str()],
            |row| map_row(definition, row),
        )?;
        tx.commit()?;

        tracing::debug!(
            tenant_id = %ctx.tenant_id(),
            partition = %partition,
            entity = %definition.name,
            id = %id,
            correlation_id = ctx.correlation_id().unwrap_or("-"),
            "Created entity"
        );
        into_stored(definition, &partition, row)
    }

    async fn read(
        &self,
        ctx: &BoundContext,
        definition: &EntityDefinition,
        id: &str,
    ) -> StorageResult<Option<StoredEntity>> {
        let conn = self.get_connection()?;
        let (partition, table) = self.bound_table(&conn, ctx, definition)?;

        conn.query_row(
            &format!(
                "SELECT {} FROM {} WHERE id = ?1",
                select_columns(definition),
                escape_identifier(&table)
            ),
            [id],
            |row| map_row(definition, row),
        )
        .optional()?
        .map(|row| into_stored(definition, &partition, row))
        .transpose()
    }

    async fn list(
        &self,
        ctx: &BoundContext,
        definition: &EntityDefinition,
        pagination: Pagination,
    ) -> StorageResult<Page<StoredEntity>> {
        let conn = self.get_connection()?;
        let (partition, table) = self.bound_table(&conn, ctx, definition)?;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", escape_identifier(&table)),
            [],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY created_at, id LIMIT ?1 OFFSET ?2",
            select_columns(definition),
            escape_identifier(&table)
        ))?;
        let rows = stmt
            .query_map([i64::from(pagination.count), i64::from(pagination.offset)], |row| {
                map_row(definition, row)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let items = rows
            .into_iter()
            .map(|row| into_stored(definition, &partition, row))
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Page::new(items, total.max(0) as u64, pagination))
    }

    async fn count(&self, ctx: &BoundContext, definition: &EntityDefinition) -> StorageResult<u64> {
        let conn = self.get_connection()?;
        let (_, table) = self.bound_table(&conn, ctx, definition)?;
        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", escape_identifier(&table)),
            [],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as u64)
    }
}
