use std::sync::Arc;

use revtrail_core::AppResult;
use revtrail_domain::{
    AuditAction, AuditContext, AuditRecord, AuditableRef, ChangeSet, LifecycleHook,
};
use serde_json::Value;
use tracing::debug;

use crate::ambient_context::current_audit_context;
use crate::audit_policy_registry::AuditPolicyRegistry;
use crate::audit_ports::{AuditRecordStore, AuditableEntity};

/// Entity being audited and how the audit was triggered.
#[derive(Clone, Copy)]
pub enum AuditSubject<'a> {
    /// Lifecycle callback on the entity itself. Committed and pending changes
    /// are merged and no-op changes dropped.
    Lifecycle(&'a dyn AuditableEntity),
    /// Explicitly supplied entity, e.g. from an administrative task. Only its
    /// pending changes are used, unfiltered for no-ops.
    Manual(&'a dyn AuditableEntity),
}

impl<'a> AuditSubject<'a> {
    fn entity(&self) -> &'a dyn AuditableEntity {
        match *self {
            Self::Lifecycle(entity) | Self::Manual(entity) => entity,
        }
    }

    fn mode(&self) -> &'static str {
        match self {
            Self::Lifecycle(_) => "lifecycle",
            Self::Manual(_) => "manual",
        }
    }

    fn changes(&self) -> ChangeSet {
        match *self {
            Self::Lifecycle(entity) => entity
                .saved_changes()
                .merged_with(entity.pending_changes()),
            Self::Manual(entity) => entity.pending_changes(),
        }
    }
}

/// Per-call recording options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOptions {
    /// Build the record without appending it to the store.
    pub no_save: bool,
}

/// Application service turning entity mutations into audit records.
#[derive(Clone)]
pub struct AuditRecorder {
    policies: Arc<AuditPolicyRegistry>,
    store: Arc<dyn AuditRecordStore>,
}

impl AuditRecorder {
    /// Creates a recorder over a finished policy registry and a record store.
    #[must_use]
    pub fn new(policies: Arc<AuditPolicyRegistry>, store: Arc<dyn AuditRecordStore>) -> Self {
        Self { policies, store }
    }

    /// Returns the policy registry.
    #[must_use]
    pub fn policies(&self) -> &AuditPolicyRegistry {
        &self.policies
    }

    /// Entry point for host lifecycle hooks, using the ambient context.
    pub async fn handle_lifecycle_event(
        &self,
        hook: LifecycleHook,
        entity: &dyn AuditableEntity,
    ) -> AppResult<Option<AuditRecord>> {
        self.handle_lifecycle_event_in(hook, entity, self.store.as_ref())
            .await
    }

    /// Lifecycle entry point appending through `store` instead of the
    /// recorder's own store.
    ///
    /// Hosts pass a store bound to the mutation's transaction so the audit
    /// row commits or rolls back with it.
    pub async fn handle_lifecycle_event_in(
        &self,
        hook: LifecycleHook,
        entity: &dyn AuditableEntity,
        store: &dyn AuditRecordStore,
    ) -> AppResult<Option<AuditRecord>> {
        self.record(
            hook.action(),
            AuditSubject::Lifecycle(entity),
            RecordOptions::default(),
            current_audit_context,
            store,
        )
        .await
    }

    /// Records an audit using the ambient context of the current task.
    ///
    /// Returns `None` when the action is not audited or the diff is empty and
    /// suppressed. With `no_save` the record is returned without an id.
    pub async fn create_audit_record(
        &self,
        action: AuditAction,
        subject: AuditSubject<'_>,
        options: RecordOptions,
    ) -> AppResult<Option<AuditRecord>> {
        self.record(
            action,
            subject,
            options,
            current_audit_context,
            self.store.as_ref(),
        )
        .await
    }

    /// Records an audit with an explicitly supplied context.
    pub async fn create_audit_record_with_context(
        &self,
        action: AuditAction,
        subject: AuditSubject<'_>,
        options: RecordOptions,
        context: Value,
    ) -> AppResult<Option<AuditRecord>> {
        self.record(
            action,
            subject,
            options,
            move || AuditContext::from_value(context),
            self.store.as_ref(),
        )
        .await
    }

    async fn record(
        &self,
        action: AuditAction,
        subject: AuditSubject<'_>,
        options: RecordOptions,
        read_context: impl FnOnce() -> AppResult<AuditContext>,
        store: &dyn AuditRecordStore,
    ) -> AppResult<Option<AuditRecord>> {
        let entity = subject.entity();
        let Some(policy) = self.policies.policy_for(entity.entity_type()) else {
            debug!(
                entity_type = %entity.entity_type(),
                action = %action,
                "entity type has no audit policy; skipping"
            );
            return Ok(None);
        };

        if !policy.audits(action) {
            debug!(
                entity_type = %policy.entity_type(),
                action = %action,
                "action not audited; skipping"
            );
            return Ok(None);
        }

        let mut diff = subject.changes().restricted_to(policy.auditable_fields());
        if matches!(subject, AuditSubject::Lifecycle(_)) {
            diff = diff.without_no_ops();
        }

        // Read before suppression: a malformed context fails even when skipped.
        let context = read_context()?;

        if policy.suppresses_empty(action, diff.is_empty()) {
            debug!(
                entity_type = %policy.entity_type(),
                entity_id = %entity.entity_id(),
                action = %action,
                mode = subject.mode(),
                "empty audit diff; skipping"
            );
            return Ok(None);
        }

        let (initiator, residual) = context.split_initiator();
        let record = AuditRecord {
            id: None,
            action,
            auditable: AuditableRef {
                entity_type: policy.entity_type_name().clone(),
                entity_id: entity.entity_id(),
            },
            diff,
            initiator,
            context: residual.into_inner(),
            recorded_at: None,
        };

        if options.no_save {
            return Ok(Some(record));
        }

        let stored = store.append_record(record).await?;
        debug!(
            entity_type = %policy.entity_type(),
            entity_id = %stored.auditable.entity_id,
            action = %action,
            mode = subject.mode(),
            audit_record_id = ?stored.id,
            changed_fields = stored.diff.len(),
            "audit record appended"
        );

        Ok(Some(stored))
    }
}

#[cfg(test)]
mod tests;
