//! Application services and ports for entity audit trails.

#![forbid(unsafe_code)]

mod ambient_context;
mod audit_policy_registry;
mod audit_ports;
mod audit_recorder;

pub use ambient_context::{current_audit_context, with_audit_context};
pub use audit_policy_registry::{
    AllFieldsSentinel, AuditPolicyDeclaration, AuditPolicyRegistry, DeclaredFields,
};
pub use audit_ports::{
    AuditRecordStore, AuditableEntity, LifecycleHookRegistrar, SchemaIntrospector,
};
pub use audit_recorder::{AuditRecorder, AuditSubject, RecordOptions};
