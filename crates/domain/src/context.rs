use revtrail_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Context key holding the actor identity.
pub const INITIATOR_KEY: &str = "initiator";

/// Fallback context key for the actor identity.
pub const CURRENT_USER_KEY: &str = "current_user";

/// Metadata attached to audits for the current unit of work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditContext(Map<String, Value>);

impl AuditContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a raw context value. `null` is treated as empty.
    pub fn from_value(value: Value) -> AppResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(entries) => Ok(Self(entries)),
            other => Err(AppError::InvalidContext(format!(
                "object expected, got: {other}"
            ))),
        }
    }

    /// Adds a context entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns a context entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns whether the context has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits the initiator from the remaining metadata.
    ///
    /// `initiator` wins over `current_user` unless it is `null` or `false`.
    /// Both keys are removed from the residual context.
    #[must_use]
    pub fn split_initiator(mut self) -> (Option<Value>, Self) {
        let initiator = self.0.remove(INITIATOR_KEY).filter(is_present);
        let current_user = self.0.remove(CURRENT_USER_KEY).filter(is_present);

        (initiator.or(current_user), self)
    }

    /// Returns the underlying map.
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

fn is_present(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

impl From<Map<String, Value>> for AuditContext {
    fn from(entries: Map<String, Value>) -> Self {
        Self(entries)
    }
}
