//! Mapping between the engine's field names and the service's wire names.
//!
//! The engine speaks the closed change-model vocabulary (`reviewed`,
//! `category_id`, ...); the GraphQL API speaks camelCase (`isReviewed`,
//! `categoryId`, ...). This table is the single place the two meet.

use tally_engine::EntityKind;

const TRANSACTION: &[(&str, &str)] = &[
    ("reviewed", "isReviewed"),
    ("category_id", "categoryId"),
    ("notes", "notes"),
    ("tags", "tagIds"),
    ("recurring_id", "recurringId"),
];

const CATEGORY: &[(&str, &str)] = &[
    ("name", "name"),
    ("emoji", "emoji"),
    ("color", "color"),
    ("excluded", "excluded"),
];

const TAG: &[(&str, &str)] = &[("name", "name"), ("color", "color")];

const RECURRING: &[(&str, &str)] = &[
    ("frequency", "frequency"),
    ("min_amount", "minAmount"),
    ("max_amount", "maxAmount"),
];

fn table(kind: EntityKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        EntityKind::Transaction => TRANSACTION,
        EntityKind::Category => CATEGORY,
        EntityKind::Tag => TAG,
        EntityKind::Recurring => RECURRING,
    }
}

/// Wire name for a change-model field. Unknown fields pass through
/// unchanged; the engine validates field names before the transport runs.
pub fn to_wire(kind: EntityKind, field: &str) -> &str {
    table(kind)
        .iter()
        .find(|(model, _)| *model == field)
        .map(|(_, wire)| *wire)
        .unwrap_or(field)
}

/// Change-model name for a wire field, if it maps to one.
pub fn from_wire(kind: EntityKind, wire: &str) -> Option<&'static str> {
    table(kind)
        .iter()
        .find(|(_, w)| *w == wire)
        .map(|(model, _)| *model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_fields_round_trip() {
        assert_eq!(to_wire(EntityKind::Transaction, "reviewed"), "isReviewed");
        assert_eq!(to_wire(EntityKind::Transaction, "tags"), "tagIds");
        assert_eq!(
            from_wire(EntityKind::Transaction, "categoryId"),
            Some("category_id")
        );
        assert_eq!(from_wire(EntityKind::Transaction, "amount"), None);
    }

    #[test]
    fn every_model_field_has_a_wire_mapping() {
        for kind in [
            EntityKind::Transaction,
            EntityKind::Category,
            EntityKind::Tag,
            EntityKind::Recurring,
        ] {
            for spec in tally_engine::fields_for(kind) {
                let wire = to_wire(kind, spec.name);
                assert_eq!(from_wire(kind, wire), Some(spec.name));
            }
        }
    }
}
