use std::collections::BTreeSet;
use std::str::FromStr;

use revtrail_core::{AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::AuditAction;

/// Columns managed by storage that are never audited through `AllColumns`.
pub const UNAUDITED_COLUMNS: &[&str] = &["id", "created_at", "updated_at"];

/// Requested set of auditable fields, resolved once at policy construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldSpec {
    /// Every declared column except identity, timestamps and exclusions.
    AllColumns {
        /// Fields never audited.
        #[serde(default)]
        except: Vec<String>,
    },
    /// Only the listed fields, minus exclusions.
    Explicit {
        /// Fields to audit.
        fields: Vec<String>,
        /// Fields never audited, even when listed.
        #[serde(default)]
        except: Vec<String>,
    },
}

impl FieldSpec {
    /// Audits every column.
    #[must_use]
    pub fn all() -> Self {
        Self::AllColumns { except: Vec::new() }
    }

    /// Audits only the listed fields.
    #[must_use]
    pub fn explicit<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Explicit {
            fields: fields.into_iter().map(Into::into).collect(),
            except: Vec::new(),
        }
    }

    /// Adds fields that must never be audited.
    #[must_use]
    pub fn except<I, S>(mut self, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let target = match &mut self {
            Self::AllColumns { except } | Self::Explicit { except, .. } => except,
        };
        target.extend(excluded.into_iter().map(Into::into));
        self
    }

    /// Returns whether resolution needs the entity's column list.
    #[must_use]
    pub fn needs_columns(&self) -> bool {
        matches!(self, Self::AllColumns { .. })
    }

    /// Resolves the auditable field list.
    ///
    /// `columns` is `None` when the entity storage is not provisioned yet; an
    /// `AllColumns` spec then resolves to no fields.
    #[must_use]
    pub fn resolve(&self, columns: Option<&[String]>) -> Vec<String> {
        let (candidates, except): (Vec<&str>, &[String]) = match self {
            Self::AllColumns { except } => (
                columns
                    .unwrap_or_default()
                    .iter()
                    .map(String::as_str)
                    .filter(|column| !UNAUDITED_COLUMNS.contains(column))
                    .collect(),
                except.as_slice(),
            ),
            Self::Explicit { fields, except } => (
                fields.iter().map(String::as_str).collect(),
                except.as_slice(),
            ),
        };

        let mut resolved: Vec<String> = Vec::with_capacity(candidates.len());
        for field in candidates {
            let excluded = except.iter().any(|value| value == field);
            let duplicate = resolved.iter().any(|value| value == field);
            if !excluded && !duplicate {
                resolved.push(field.to_owned());
            }
        }

        resolved
    }
}

/// Behavioral options for an audit policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditOptions {
    /// Raw action names to audit. Validated when the policy is built.
    pub when: Vec<String>,
    /// Skip records whose filtered diff is empty (destroy is always recorded).
    pub ignore_empty_diff: bool,
}

impl AuditOptions {
    /// Restricts auditing to the listed actions.
    #[must_use]
    pub fn when<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.when = actions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether empty diffs suppress record creation.
    #[must_use]
    pub fn ignore_empty_diff(mut self, value: bool) -> Self {
        self.ignore_empty_diff = value;
        self
    }
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            when: AuditAction::all()
                .iter()
                .map(|action| action.as_str().to_owned())
                .collect(),
            ignore_empty_diff: true,
        }
    }
}

/// Per-entity-type audit configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditPolicy {
    entity_type: NonEmptyString,
    auditable_fields: Vec<String>,
    auditable_actions: BTreeSet<AuditAction>,
    ignore_empty_diff: bool,
}

impl AuditPolicy {
    /// Builds a policy from a field spec, options and the entity's columns.
    ///
    /// Unknown `when` values fail with a configuration error.
    pub fn build(
        entity_type: impl Into<String>,
        field_spec: &FieldSpec,
        options: &AuditOptions,
        columns: Option<&[String]>,
    ) -> AppResult<Self> {
        let entity_type = NonEmptyString::new(entity_type)?;
        let auditable_actions = options
            .when
            .iter()
            .map(|value| AuditAction::from_str(value.trim()))
            .collect::<AppResult<BTreeSet<_>>>()?;

        Ok(Self {
            entity_type,
            auditable_fields: field_spec.resolve(columns),
            auditable_actions,
            ignore_empty_diff: options.ignore_empty_diff,
        })
    }

    /// Returns the entity type this policy applies to.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        self.entity_type.as_str()
    }

    /// Returns the validated entity type name.
    #[must_use]
    pub fn entity_type_name(&self) -> &NonEmptyString {
        &self.entity_type
    }

    /// Returns the ordered auditable field names.
    #[must_use]
    pub fn auditable_fields(&self) -> &[String] {
        &self.auditable_fields
    }

    /// Returns the audited actions.
    #[must_use]
    pub fn auditable_actions(&self) -> &BTreeSet<AuditAction> {
        &self.auditable_actions
    }

    /// Returns whether `action` is audited.
    #[must_use]
    pub fn audits(&self, action: AuditAction) -> bool {
        self.auditable_actions.contains(&action)
    }

    /// Returns whether an empty diff suppresses record creation.
    #[must_use]
    pub fn ignore_empty_diff(&self) -> bool {
        self.ignore_empty_diff
    }

    /// Returns whether a record with this diff should be skipped.
    #[must_use]
    pub fn suppresses_empty(&self, action: AuditAction, diff_is_empty: bool) -> bool {
        self.ignore_empty_diff && diff_is_empty && action != AuditAction::Destroy
    }
}
