use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of remote entity kinds tally can mutate.
///
/// Ids are opaque strings and are not reused by the remote service across
/// kinds, so `(kind, id)` is a stable identity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Transaction,
    Category,
    Tag,
    Recurring,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Transaction => "transaction",
            EntityKind::Category => "category",
            EntityKind::Tag => "tag",
            EntityKind::Recurring => "recurring",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transaction" => Ok(EntityKind::Transaction),
            "category" => Ok(EntityKind::Category),
            "tag" => Ok(EntityKind::Tag),
            "recurring" => Ok(EntityKind::Recurring),
            other => Err(format!(
                "unknown entity kind {other:?} (expected transaction, category, tag, or recurring)"
            )),
        }
    }
}

/// Identity of a mutable remote object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One field mutation as applied: the value captured immediately before the
/// write, and the value the write set.
///
/// `old == Value::Null` means the field had no value before the write, which
/// is distinct from e.g. `old == Value::String("")`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, old: Value, new: Value) -> Self {
        Self {
            field: field.into(),
            old,
            new,
        }
    }
}

/// Undo eligibility of a single (entry, field) pair.
///
/// Supersede and undo are tracked per field, not per entry: one entry can
/// hold several fields whose eligibility diverges over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldState {
    /// Still in effect as far as the journal knows; eligible for undo.
    Applied,
    /// A later entry overwrote this (entity, field); no longer undoable here.
    Superseded,
    /// Restored to its old value by an undo.
    Undone,
}

/// How an entry came to exist.
///
/// Undoing is itself a first-class mutation, so undo entries carry the
/// sequence number of the entry they reverse. Native undo (the remote
/// service's own reversal) is journaled too, already `Undone`, so history
/// stays a single ordered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "via", content = "of_seq")]
pub enum EntryOrigin {
    Apply,
    UndoOf(u64),
    NativeUndoOf(u64),
}

/// Aggregate view of an entry's per-field states, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySummary {
    Applied,
    Superseded,
    Undone,
    /// Fields disagree (e.g. one restored, one conflicted and still applied).
    Partial,
}

impl fmt::Display for EntrySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntrySummary::Applied => "applied",
            EntrySummary::Superseded => "superseded",
            EntrySummary::Undone => "undone",
            EntrySummary::Partial => "partial",
        };
        f.write_str(s)
    }
}

/// The unit of undoable history.
///
/// `changes` is immutable once appended; only `states` transitions, and only
/// through [`crate::JournalStore::mark`]. No component other than the store
/// holds a writable reference to an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Strictly increasing across the store's lifetime, never reused.
    pub seq: u64,
    /// RFC 3339 wall-clock timestamp assigned at append time.
    pub at: String,
    pub entity: EntityRef,
    pub origin: EntryOrigin,
    pub changes: Vec<FieldChange>,
    pub states: BTreeMap<String, FieldState>,
}

impl JournalEntry {
    pub fn state_of(&self, field: &str) -> Option<FieldState> {
        self.states.get(field).copied()
    }

    /// Fields of this entry still eligible for undo.
    pub fn applied_fields(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes
            .iter()
            .filter(|c| self.states.get(&c.field) == Some(&FieldState::Applied))
    }

    pub fn change_for(&self, field: &str) -> Option<&FieldChange> {
        self.changes.iter().find(|c| c.field == field)
    }

    pub fn summary(&self) -> EntrySummary {
        let mut states = self.states.values();
        let Some(first) = states.next().copied() else {
            return EntrySummary::Applied;
        };
        if states.all(|s| *s == first) {
            match first {
                FieldState::Applied => EntrySummary::Applied,
                FieldState::Superseded => EntrySummary::Superseded,
                FieldState::Undone => EntrySummary::Undone,
            }
        } else {
            EntrySummary::Partial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry_with_states(states: &[(&str, FieldState)]) -> JournalEntry {
        JournalEntry {
            seq: 1,
            at: "2026-01-01T00:00:00Z".to_string(),
            entity: EntityRef::new(EntityKind::Transaction, "t1"),
            origin: EntryOrigin::Apply,
            changes: states
                .iter()
                .map(|(f, _)| FieldChange::new(*f, Value::Null, json!(true)))
                .collect(),
            states: states
                .iter()
                .map(|(f, s)| (f.to_string(), *s))
                .collect(),
        }
    }

    #[test]
    fn summary_uniform_and_mixed() {
        let e = entry_with_states(&[("reviewed", FieldState::Applied)]);
        assert_eq!(e.summary(), EntrySummary::Applied);

        let e = entry_with_states(&[
            ("reviewed", FieldState::Undone),
            ("notes", FieldState::Undone),
        ]);
        assert_eq!(e.summary(), EntrySummary::Undone);

        let e = entry_with_states(&[
            ("reviewed", FieldState::Undone),
            ("notes", FieldState::Applied),
        ]);
        assert_eq!(e.summary(), EntrySummary::Partial);
    }

    #[test]
    fn applied_fields_filters_by_state() {
        let e = entry_with_states(&[
            ("reviewed", FieldState::Applied),
            ("notes", FieldState::Superseded),
        ]);
        let fields: Vec<&str> = e.applied_fields().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["reviewed"]);
    }

    #[test]
    fn entity_kind_round_trips_from_str() {
        for kind in [
            EntityKind::Transaction,
            EntityKind::Category,
            EntityKind::Tag,
            EntityKind::Recurring,
        ] {
            assert_eq!(kind.as_str().parse::<EntityKind>(), Ok(kind));
        }
        assert!("account".parse::<EntityKind>().is_err());
    }

    #[test]
    fn origin_serializes_with_tag() {
        let v = serde_json::to_value(EntryOrigin::UndoOf(7)).unwrap();
        assert_eq!(v, json!({"via": "undo_of", "of_seq": 7}));
        let v = serde_json::to_value(EntryOrigin::Apply).unwrap();
        assert_eq!(v, json!({"via": "apply"}));
    }
}
