use async_trait::async_trait;
use chrono::Utc;
use revtrail_application::AuditRecordStore;
use revtrail_core::AppResult;
use revtrail_domain::AuditRecord;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory append-only audit record store.
#[derive(Debug, Default)]
pub struct InMemoryAuditRecordStore {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of appended records in append order.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }

    /// Returns records appended for one entity.
    pub async fn records_for(&self, entity_type: &str, entity_id: &str) -> Vec<AuditRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|record| {
                record.auditable.entity_type.as_str() == entity_type
                    && record.auditable.entity_id == entity_id
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditRecordStore for InMemoryAuditRecordStore {
    async fn append_record(&self, mut record: AuditRecord) -> AppResult<AuditRecord> {
        record.id = Some(Uuid::new_v4());
        record.recorded_at = Some(Utc::now());
        self.records.write().await.push(record.clone());
        Ok(record)
    }
}
