//! Domain types and invariants for entity audit trails.

#![forbid(unsafe_code)]

mod action;
mod change_set;
mod context;
mod policy;
mod record;

pub use action::{AuditAction, LifecycleHook};
pub use change_set::{ChangeSet, FieldChange};
pub use context::{AuditContext, CURRENT_USER_KEY, INITIATOR_KEY};
pub use policy::{AuditOptions, AuditPolicy, FieldSpec, UNAUDITED_COLUMNS};
pub use record::{AuditRecord, AuditableRef};
