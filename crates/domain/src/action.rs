use std::fmt::{Display, Formatter};
use std::str::FromStr;

use revtrail_core::AppError;
use serde::{Deserialize, Serialize};

/// Entity mutations that can be audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Entity was created.
    Create,
    /// Entity was updated.
    Update,
    /// Entity was destroyed.
    Destroy,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[AuditAction] = &[AuditAction::Create, AuditAction::Update, AuditAction::Destroy];

        ALL
    }

    /// Returns the lifecycle hook that fires this action.
    #[must_use]
    pub fn lifecycle_hook(self) -> LifecycleHook {
        match self {
            Self::Create => LifecycleHook::AfterCreate,
            Self::Update => LifecycleHook::AfterUpdate,
            Self::Destroy => LifecycleHook::AfterDestroy,
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "destroy" | "delete" => Ok(Self::Destroy),
            _ => Err(AppError::Configuration(format!(
                "unknown audit action '{value}', expected one of create, update, destroy"
            ))),
        }
    }
}

/// Points in the host entity lifecycle where audits are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleHook {
    /// Fires after a create is committed.
    AfterCreate,
    /// Fires after an update is committed.
    AfterUpdate,
    /// Fires after a destroy is committed.
    AfterDestroy,
}

impl LifecycleHook {
    /// Returns the audit action recorded by this hook.
    #[must_use]
    pub fn action(self) -> AuditAction {
        match self {
            Self::AfterCreate => AuditAction::Create,
            Self::AfterUpdate => AuditAction::Update,
            Self::AfterDestroy => AuditAction::Destroy,
        }
    }

    /// Returns a stable name for this hook.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AfterCreate => "after_create",
            Self::AfterUpdate => "after_update",
            Self::AfterDestroy => "after_destroy",
        }
    }
}
