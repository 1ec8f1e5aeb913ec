use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Before and after values reported for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(Value, Value)", into = "(Value, Value)")]
pub struct FieldChange {
    /// Value before the mutation.
    pub before: Value,
    /// Value after the mutation.
    pub after: Value,
}

impl FieldChange {
    /// Creates a field change from its two sides.
    #[must_use]
    pub fn new(before: impl Into<Value>, after: impl Into<Value>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }

    /// Returns whether both sides hold the same value.
    #[must_use]
    pub fn is_no_op(&self) -> bool {
        self.before == self.after
    }
}

impl From<(Value, Value)> for FieldChange {
    fn from((before, after): (Value, Value)) -> Self {
        Self { before, after }
    }
}

impl From<FieldChange> for (Value, Value) {
    fn from(change: FieldChange) -> Self {
        (change.before, change.after)
    }
}

/// Field-level changes reported by the entity layer, keyed by field name.
///
/// Serializes as `{"field": [before, after]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, FieldChange>);

impl ChangeSet {
    /// Creates an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a change, replacing any previous change for the field.
    pub fn insert(&mut self, field: impl Into<String>, change: FieldChange) {
        self.0.insert(field.into(), change);
    }

    /// Builder form of [`ChangeSet::insert`].
    #[must_use]
    pub fn with_change(
        mut self,
        field: impl Into<String>,
        before: impl Into<Value>,
        after: impl Into<Value>,
    ) -> Self {
        self.insert(field, FieldChange::new(before, after));
        self
    }

    /// Returns the change for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    /// Returns whether a change exists for the field.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns whether no field changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates changed fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.0.iter().map(|(field, change)| (field.as_str(), change))
    }

    /// Overlays `other` on top of this change set. Fields present in both take
    /// the change from `other`.
    #[must_use]
    pub fn merged_with(mut self, other: ChangeSet) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Keeps only the listed fields.
    #[must_use]
    pub fn restricted_to(mut self, fields: &[String]) -> Self {
        self.0.retain(|field, _| fields.iter().any(|allowed| allowed == field));
        self
    }

    /// Drops changes whose before and after values are equal.
    ///
    /// Serialized composite columns can report a change on every commit even
    /// when their logical content is identical.
    #[must_use]
    pub fn without_no_ops(mut self) -> Self {
        self.0.retain(|_, change| !change.is_no_op());
        self
    }
}

impl<K: Into<String>> FromIterator<(K, FieldChange)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (K, FieldChange)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(field, change)| (field.into(), change))
                .collect(),
        )
    }
}
