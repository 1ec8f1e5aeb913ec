use async_trait::async_trait;
use revtrail_core::AppResult;
use revtrail_domain::{AuditRecord, ChangeSet, LifecycleHook};

/// Entity-layer view of an object whose mutations can be audited.
pub trait AuditableEntity: Send + Sync {
    /// Entity type name, matching the registered policy.
    fn entity_type(&self) -> &str;

    /// Stable identity of this entity within its type.
    fn entity_id(&self) -> String;

    /// Changes already committed by the persistence layer for the current
    /// operation.
    fn saved_changes(&self) -> ChangeSet;

    /// In-memory changes not yet committed, including virtual fields.
    fn pending_changes(&self) -> ChangeSet;
}

/// Repository port for append-only audit records.
#[async_trait]
pub trait AuditRecordStore: Send + Sync {
    /// Appends one record and returns it with its store-assigned identity and
    /// timestamp.
    async fn append_record(&self, record: AuditRecord) -> AppResult<AuditRecord>;
}

/// Port for entity storage metadata, used when resolving all-column policies.
///
/// Returning [`revtrail_core::AppError::Unavailable`] signals that storage is
/// not provisioned yet.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Returns whether storage for the entity type exists.
    async fn storage_exists(&self, entity_type: &str) -> AppResult<bool>;

    /// Lists declared column names for the entity type.
    async fn column_names(&self, entity_type: &str) -> AppResult<Vec<String>>;
}

/// Host port receiving lifecycle hook registrations at policy setup.
pub trait LifecycleHookRegistrar: Send + Sync {
    /// Asks the host to call the recorder when any of `hooks` fires for the
    /// entity type. Either every hook is registered or none is.
    fn register_hooks(&mut self, entity_type: &str, hooks: &[LifecycleHook]) -> AppResult<()>;
}
