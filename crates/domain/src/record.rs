use chrono::{DateTime, Utc};
use revtrail_core::NonEmptyString;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{AuditAction, ChangeSet};

/// Back reference to the audited entity. Does not own the entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditableRef {
    /// Entity type name.
    pub entity_type: NonEmptyString,
    /// Entity identity within its type.
    pub entity_id: String,
}

/// One audited mutation event.
///
/// `id` and `recorded_at` are assigned by the record store on append and stay
/// `None` for records built without saving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Store-assigned identity.
    pub id: Option<Uuid>,
    /// Audited action.
    pub action: AuditAction,
    /// Audited entity.
    pub auditable: AuditableRef,
    /// Filtered field changes.
    pub diff: ChangeSet,
    /// Actor identity taken from the context.
    pub initiator: Option<Value>,
    /// Context metadata without the initiator keys.
    pub context: Map<String, Value>,
    /// Store-assigned append timestamp.
    pub recorded_at: Option<DateTime<Utc>>,
}

impl AuditRecord {
    /// Returns whether the store has accepted this record.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}
