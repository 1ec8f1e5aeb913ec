//! Infrastructure adapters for audit trail ports.

#![forbid(unsafe_code)]

mod in_memory_audit_record_store;
mod lifecycle_hook_table;
mod postgres_audit_record_store;
mod postgres_schema_introspector;
mod postgres_transaction_audit_store;

pub use in_memory_audit_record_store::InMemoryAuditRecordStore;
pub use lifecycle_hook_table::LifecycleHookTable;
pub use postgres_audit_record_store::PostgresAuditRecordStore;
pub use postgres_schema_introspector::PostgresSchemaIntrospector;
pub use postgres_transaction_audit_store::PostgresTransactionAuditStore;

/// Migrations creating the audit record table.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
