//! The entity change model: which fields of which entity kinds are mutable,
//! and what values they accept.
//!
//! Validation here is purely local — shape and domain checks with no side
//! effects and no network. Referential checks (does this category id exist?)
//! are a lookup concern of the caller, performed before a request is built.

use serde_json::Value;

use tally_journal::EntityKind;

/// The value shape a mutable field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// A boolean.
    Bool,
    /// A non-empty string.
    Text,
    /// A string, or `null` to clear.
    NullableText,
    /// A non-empty opaque id string.
    Id,
    /// An id string, or `null` to clear the reference.
    NullableId,
    /// An array of distinct id strings, replacing the whole set.
    IdSet,
    /// An integer.
    Int,
    /// One of a closed set of uppercase tokens.
    OneOf(&'static [&'static str]),
}

/// A single mutable field of an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub shape: ValueShape,
}

const FREQUENCIES: &[&str] = &[
    "DAILY",
    "WEEKLY",
    "BIWEEKLY",
    "MONTHLY",
    "QUARTERLY",
    "ANNUALLY",
];

const TRANSACTION_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "reviewed",
        shape: ValueShape::Bool,
    },
    FieldSpec {
        name: "category_id",
        shape: ValueShape::NullableId,
    },
    FieldSpec {
        name: "notes",
        shape: ValueShape::NullableText,
    },
    FieldSpec {
        name: "tags",
        shape: ValueShape::IdSet,
    },
    FieldSpec {
        name: "recurring_id",
        shape: ValueShape::NullableId,
    },
];

const CATEGORY_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "name",
        shape: ValueShape::Text,
    },
    FieldSpec {
        name: "emoji",
        shape: ValueShape::NullableText,
    },
    FieldSpec {
        name: "color",
        shape: ValueShape::NullableText,
    },
    FieldSpec {
        name: "excluded",
        shape: ValueShape::Bool,
    },
];

const TAG_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "name",
        shape: ValueShape::Text,
    },
    FieldSpec {
        name: "color",
        shape: ValueShape::NullableText,
    },
];

const RECURRING_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "frequency",
        shape: ValueShape::OneOf(FREQUENCIES),
    },
    FieldSpec {
        name: "min_amount",
        shape: ValueShape::Int,
    },
    FieldSpec {
        name: "max_amount",
        shape: ValueShape::Int,
    },
];

/// The closed set of mutable fields for `kind`.
pub fn fields_for(kind: EntityKind) -> &'static [FieldSpec] {
    match kind {
        EntityKind::Transaction => TRANSACTION_FIELDS,
        EntityKind::Category => CATEGORY_FIELDS,
        EntityKind::Tag => TAG_FIELDS,
        EntityKind::Recurring => RECURRING_FIELDS,
    }
}

pub fn field_spec(kind: EntityKind, field: &str) -> Option<&'static FieldSpec> {
    fields_for(kind).iter().find(|s| s.name == field)
}

/// A candidate value was rejected before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationRejected {
    #[error("{kind} has no mutable field {field:?}")]
    UnknownField { kind: EntityKind, field: String },

    #[error("invalid value for {kind}.{field}: {reason}")]
    InvalidValue {
        kind: EntityKind,
        field: String,
        reason: String,
    },
}

/// Check `value` against the closed field model. Local and side-effect free.
pub fn validate(kind: EntityKind, field: &str, value: &Value) -> Result<(), ValidationRejected> {
    let spec = field_spec(kind, field).ok_or_else(|| ValidationRejected::UnknownField {
        kind,
        field: field.to_string(),
    })?;

    let reject = |reason: String| ValidationRejected::InvalidValue {
        kind,
        field: field.to_string(),
        reason,
    };

    match spec.shape {
        ValueShape::Bool => match value {
            Value::Bool(_) => Ok(()),
            other => Err(reject(format!("expected a boolean, got {other}"))),
        },
        ValueShape::Text => match value {
            Value::String(s) if !s.trim().is_empty() => Ok(()),
            Value::String(_) => Err(reject("must not be empty".to_string())),
            other => Err(reject(format!("expected a string, got {other}"))),
        },
        ValueShape::NullableText => match value {
            Value::Null | Value::String(_) => Ok(()),
            other => Err(reject(format!("expected a string or null, got {other}"))),
        },
        ValueShape::Id => match value {
            Value::String(s) if !s.trim().is_empty() => Ok(()),
            other => Err(reject(format!("expected an id string, got {other}"))),
        },
        ValueShape::NullableId => match value {
            Value::Null => Ok(()),
            Value::String(s) if !s.trim().is_empty() => Ok(()),
            other => Err(reject(format!("expected an id string or null, got {other}"))),
        },
        ValueShape::IdSet => match value {
            Value::Array(items) => {
                let mut seen = std::collections::BTreeSet::new();
                for item in items {
                    let Value::String(id) = item else {
                        return Err(reject(format!("expected id strings, got {item}")));
                    };
                    if id.trim().is_empty() {
                        return Err(reject("ids must not be empty".to_string()));
                    }
                    if !seen.insert(id.as_str()) {
                        return Err(reject(format!("duplicate id {id:?}")));
                    }
                }
                Ok(())
            }
            other => Err(reject(format!("expected an array of ids, got {other}"))),
        },
        ValueShape::Int => match value {
            Value::Number(n) if n.is_i64() => Ok(()),
            other => Err(reject(format!("expected an integer, got {other}"))),
        },
        ValueShape::OneOf(allowed) => match value {
            Value::String(s) if allowed.contains(&s.as_str()) => Ok(()),
            Value::String(s) => Err(reject(format!(
                "{s:?} is not one of {}",
                allowed.join(", ")
            ))),
            other => Err(reject(format!("expected a string, got {other}"))),
        },
    }
}

/// How undo is carried out for a kind.
///
/// `JournalReplay` reconstructs the reverse write from captured old values.
/// `NativeUndo` delegates to the remote service's own reversal when a
/// transport supports it; the result is journaled either way so history
/// stays a single view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoMode {
    JournalReplay,
    NativeUndo,
}

/// The undo mode used for `kind` by default.
///
/// The service exposes no native undo endpoint for any of the four kinds,
/// so everything replays from the journal today.
pub fn undo_mode(kind: EntityKind) -> UndoMode {
    match kind {
        EntityKind::Transaction
        | EntityKind::Category
        | EntityKind::Tag
        | EntityKind::Recurring => UndoMode::JournalReplay,
    }
}
