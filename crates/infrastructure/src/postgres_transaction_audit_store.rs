use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, MutexGuard};

use revtrail_application::AuditRecordStore;
use revtrail_core::{AppError, AppResult};
use revtrail_domain::AuditRecord;

use crate::postgres_audit_record_store::insert_record;

/// Audit record store bound to one open PostgreSQL transaction.
///
/// The host runs its mutation through [`Self::transaction`] and hands the
/// store to `AuditRecorder::handle_lifecycle_event_in`, so audit rows share
/// the mutation's commit or rollback.
pub struct PostgresTransactionAuditStore {
    transaction: Mutex<Transaction<'static, Postgres>>,
}

impl PostgresTransactionAuditStore {
    /// Opens a transaction on the pool.
    pub async fn begin(pool: &PgPool) -> AppResult<Self> {
        let transaction = pool.begin().await.map_err(|error| {
            AppError::Persistence(format!("failed to begin audit transaction: {error}"))
        })?;

        Ok(Self::from_transaction(transaction))
    }

    /// Wraps a transaction the host already opened.
    #[must_use]
    pub fn from_transaction(transaction: Transaction<'static, Postgres>) -> Self {
        Self {
            transaction: Mutex::new(transaction),
        }
    }

    /// Locks the underlying transaction for host statements.
    pub async fn transaction(&self) -> MutexGuard<'_, Transaction<'static, Postgres>> {
        self.transaction.lock().await
    }

    /// Commits the mutation together with its audit rows.
    pub async fn commit(self) -> AppResult<()> {
        self.transaction
            .into_inner()
            .commit()
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to commit audit transaction: {error}"))
            })
    }

    /// Rolls back the mutation together with its audit rows.
    pub async fn rollback(self) -> AppResult<()> {
        self.transaction
            .into_inner()
            .rollback()
            .await
            .map_err(|error| {
                AppError::Persistence(format!("failed to roll back audit transaction: {error}"))
            })
    }
}

#[async_trait]
impl AuditRecordStore for PostgresTransactionAuditStore {
    async fn append_record(&self, record: AuditRecord) -> AppResult<AuditRecord> {
        let mut transaction = self.transaction.lock().await;
        insert_record(&mut **transaction, record).await
    }
}
