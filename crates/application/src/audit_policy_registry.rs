use std::collections::HashMap;

use revtrail_core::{AppError, AppResult};
use revtrail_domain::{AuditOptions, AuditPolicy, FieldSpec};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::audit_ports::{LifecycleHookRegistrar, SchemaIntrospector};

/// Field selection as written in a policy declaration: `"all"` or a list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DeclaredFields {
    /// The `"all"` sentinel.
    All(AllFieldsSentinel),
    /// Explicit field names.
    List(Vec<String>),
}

/// Marker accepting only the string `"all"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllFieldsSentinel {
    /// Every column.
    All,
}

/// Declarative policy input, typically loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuditPolicyDeclaration {
    /// Entity type the policy applies to.
    pub entity_type: String,
    /// Auditable field selection.
    pub fields: DeclaredFields,
    /// Fields never audited.
    #[serde(default)]
    pub except: Vec<String>,
    /// Audited actions. Defaults to every action.
    #[serde(default)]
    pub when: Option<Vec<String>>,
    /// Skip empty diffs. Defaults to `true`.
    #[serde(default)]
    pub ignore_empty_diff: Option<bool>,
}

impl AuditPolicyDeclaration {
    /// Converts the declaration into a field spec and options.
    #[must_use]
    pub fn into_parts(self) -> (String, FieldSpec, AuditOptions) {
        let field_spec = match self.fields {
            DeclaredFields::All(_) => FieldSpec::all(),
            DeclaredFields::List(fields) => FieldSpec::explicit(fields),
        }
        .except(self.except);

        let mut options = AuditOptions::default();
        if let Some(when) = self.when {
            options = options.when(when);
        }
        if let Some(ignore_empty_diff) = self.ignore_empty_diff {
            options = options.ignore_empty_diff(ignore_empty_diff);
        }

        (self.entity_type, field_spec, options)
    }
}

/// Audit policies keyed by entity type.
///
/// Populated during setup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct AuditPolicyRegistry {
    policies: HashMap<String, AuditPolicy>,
}

impl AuditPolicyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and registers the policy for an entity type, then registers the
    /// lifecycle hooks for its audited actions.
    pub async fn register(
        &mut self,
        entity_type: &str,
        field_spec: FieldSpec,
        options: AuditOptions,
        introspector: &dyn SchemaIntrospector,
        hooks: &mut dyn LifecycleHookRegistrar,
    ) -> AppResult<&AuditPolicy> {
        if self.policies.contains_key(entity_type) {
            return Err(AppError::Configuration(format!(
                "audit policy for '{entity_type}' is already registered"
            )));
        }

        let columns = if field_spec.needs_columns() {
            resolve_columns(entity_type, introspector).await?
        } else {
            None
        };

        let policy = AuditPolicy::build(entity_type, &field_spec, &options, columns.as_deref())?;

        let lifecycle_hooks = policy
            .auditable_actions()
            .iter()
            .map(|action| action.lifecycle_hook())
            .collect::<Vec<_>>();
        hooks.register_hooks(policy.entity_type(), &lifecycle_hooks)?;

        debug!(
            entity_type = %policy.entity_type(),
            fields = ?policy.auditable_fields(),
            actions = ?policy.auditable_actions(),
            "registered audit policy"
        );

        let key = policy.entity_type().to_owned();
        Ok(&*self.policies.entry(key).or_insert(policy))
    }

    /// Registers a declared policy.
    pub async fn register_declaration(
        &mut self,
        declaration: AuditPolicyDeclaration,
        introspector: &dyn SchemaIntrospector,
        hooks: &mut dyn LifecycleHookRegistrar,
    ) -> AppResult<&AuditPolicy> {
        let (entity_type, field_spec, options) = declaration.into_parts();
        self.register(entity_type.as_str(), field_spec, options, introspector, hooks)
            .await
    }

    /// Returns the policy for an entity type.
    #[must_use]
    pub fn policy_for(&self, entity_type: &str) -> Option<&AuditPolicy> {
        self.policies.get(entity_type)
    }

    /// Number of registered policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns whether no policy is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

async fn resolve_columns(
    entity_type: &str,
    introspector: &dyn SchemaIntrospector,
) -> AppResult<Option<Vec<String>>> {
    match lookup_columns(entity_type, introspector).await {
        Ok(Some(columns)) => Ok(Some(columns)),
        Ok(None) => {
            warn!(
                entity_type = %entity_type,
                "entity storage does not exist yet; audit policy built without fields"
            );
            Ok(None)
        }
        Err(AppError::Unavailable(reason)) => {
            warn!(
                entity_type = %entity_type,
                reason = %reason,
                "entity storage unavailable; audit policy built without fields"
            );
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

async fn lookup_columns(
    entity_type: &str,
    introspector: &dyn SchemaIntrospector,
) -> AppResult<Option<Vec<String>>> {
    if !introspector.storage_exists(entity_type).await? {
        return Ok(None);
    }

    introspector.column_names(entity_type).await.map(Some)
}
