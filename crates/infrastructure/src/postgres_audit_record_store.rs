use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;

use revtrail_application::AuditRecordStore;
use revtrail_core::{AppError, AppResult};
use revtrail_domain::AuditRecord;

/// PostgreSQL-backed append-only audit record store.
#[derive(Clone)]
pub struct PostgresAuditRecordStore {
    pool: PgPool,
}

impl PostgresAuditRecordStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends a record inside a caller-owned transaction, so the audit row
    /// commits or rolls back together with the audited mutation.
    pub async fn append_in_transaction(
        transaction: &mut Transaction<'_, Postgres>,
        record: AuditRecord,
    ) -> AppResult<AuditRecord> {
        insert_record(&mut **transaction, record).await
    }
}

#[async_trait]
impl AuditRecordStore for PostgresAuditRecordStore {
    async fn append_record(&self, record: AuditRecord) -> AppResult<AuditRecord> {
        insert_record(&self.pool, record).await
    }
}

pub(crate) async fn insert_record<'e, E>(executor: E, mut record: AuditRecord) -> AppResult<AuditRecord>
where
    E: PgExecutor<'e>,
{
    let diff = serde_json::to_value(&record.diff)
        .map_err(|error| AppError::Internal(format!("failed to encode audit diff: {error}")))?;

    let (id, created_at) = sqlx::query_as::<_, (Uuid, DateTime<Utc>)>(
        r#"
        INSERT INTO audit_records (
            auditable_type,
            auditable_id,
            action,
            diff,
            initiator,
            context
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, created_at
        "#,
    )
    .bind(record.auditable.entity_type.as_str())
    .bind(record.auditable.entity_id.as_str())
    .bind(record.action.as_str())
    .bind(diff)
    .bind(record.initiator.clone())
    .bind(Value::Object(record.context.clone()))
    .fetch_one(executor)
    .await
    .map_err(|error| AppError::Persistence(format!("failed to append audit record: {error}")))?;

    record.id = Some(id);
    record.recorded_at = Some(created_at);
    Ok(record)
}
