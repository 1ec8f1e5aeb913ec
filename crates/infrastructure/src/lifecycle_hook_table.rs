use std::collections::{HashMap, HashSet};

use revtrail_application::{
    AuditRecordStore, AuditRecorder, AuditableEntity, LifecycleHookRegistrar,
};
use revtrail_core::AppResult;
use revtrail_domain::{AuditRecord, LifecycleHook};
use tracing::trace;

/// Host-side table of lifecycle hooks requested by audit policies.
///
/// Entity layers call [`LifecycleHookTable::fire`] after each committed
/// mutation, or [`LifecycleHookTable::fire_in`] inside its transaction. Only
/// hooks registered at setup reach the recorder.
#[derive(Debug, Clone, Default)]
pub struct LifecycleHookTable {
    hooks: HashMap<String, HashSet<LifecycleHook>>,
}

impl LifecycleHookTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether `hook` is registered for the entity type.
    #[must_use]
    pub fn is_registered(&self, entity_type: &str, hook: LifecycleHook) -> bool {
        self.hooks
            .get(entity_type)
            .is_some_and(|hooks| hooks.contains(&hook))
    }

    /// Dispatches a committed lifecycle event to the recorder.
    pub async fn fire(
        &self,
        recorder: &AuditRecorder,
        hook: LifecycleHook,
        entity: &dyn AuditableEntity,
    ) -> AppResult<Option<AuditRecord>> {
        if !self.should_dispatch(entity, hook) {
            return Ok(None);
        }

        recorder.handle_lifecycle_event(hook, entity).await
    }

    /// Dispatches a lifecycle event whose audit row must be written through
    /// `store`, typically one bound to the mutation's transaction.
    pub async fn fire_in(
        &self,
        recorder: &AuditRecorder,
        hook: LifecycleHook,
        entity: &dyn AuditableEntity,
        store: &dyn AuditRecordStore,
    ) -> AppResult<Option<AuditRecord>> {
        if !self.should_dispatch(entity, hook) {
            return Ok(None);
        }

        recorder.handle_lifecycle_event_in(hook, entity, store).await
    }

    fn should_dispatch(&self, entity: &dyn AuditableEntity, hook: LifecycleHook) -> bool {
        let registered = self.is_registered(entity.entity_type(), hook);
        if !registered {
            trace!(
                entity_type = %entity.entity_type(),
                hook = hook.as_str(),
                "no audit hook registered"
            );
        }

        registered
    }
}

impl LifecycleHookRegistrar for LifecycleHookTable {
    fn register_hooks(&mut self, entity_type: &str, hooks: &[LifecycleHook]) -> AppResult<()> {
        self.hooks
            .entry(entity_type.to_owned())
            .or_default()
            .extend(hooks.iter().copied());
        Ok(())
    }
}
