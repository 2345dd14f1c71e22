//! The mutation planner: validate, capture, diff, write — per id, in
//! request order, with full isolation between ids.
//!
//! The planner never touches the journal. The [`crate::Engine`] facade
//! turns Applied outcomes into journal entries, which is what lets the undo
//! executor reuse this exact path for its reverse mutations.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use tally_journal::{EntityKind, EntityRef, FieldChange};

use crate::capture::{capture, CaptureError};
use crate::model::{validate, ValidationRejected};
use crate::remote::{RemoteReader, RemoteWriter, WriteError};

/// A caller's request: one entity kind, an ordered id batch, and the
/// desired value for each named field.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub kind: EntityKind,
    pub ids: Vec<String>,
    pub values: BTreeMap<String, Value>,
}

impl MutationRequest {
    pub fn new(
        kind: EntityKind,
        ids: impl IntoIterator<Item = impl Into<String>>,
        values: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            kind,
            ids: ids.into_iter().map(Into::into).collect(),
            values,
        }
    }

    pub fn entity(&self, id: &str) -> EntityRef {
        EntityRef::new(self.kind, id)
    }
}

/// Why one id's mutation failed. Attributed to exactly that id; sibling ids
/// in the batch are unaffected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    #[error(transparent)]
    Rejected(#[from] ValidationRejected),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// Outcome of one id within a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct PerIdOutcome {
    pub entity: EntityRef,
    pub status: OutcomeStatus,
    /// Sequence number of the journal entry recording this outcome, filled
    /// in by the engine facade for Applied outcomes.
    pub journal_seq: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    /// The write succeeded; `changes` holds (captured old, written new) for
    /// every field that actually changed. `noop_fields` already equalled
    /// the desired value and were not written.
    Applied {
        changes: Vec<FieldChange>,
        noop_fields: Vec<String>,
    },
    /// Every requested field already held the desired value; nothing was
    /// written and nothing is journaled.
    SkippedNoOp { noop_fields: Vec<String> },
    /// The id's mutation failed; see the error. No fields were written.
    Failed { error: MutationError },
}

impl PerIdOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed { .. })
    }

    pub fn applied_changes(&self) -> Option<&[FieldChange]> {
        match &self.status {
            OutcomeStatus::Applied { changes, .. } => Some(changes),
            _ => None,
        }
    }
}

/// Exit-code-relevant classification of a whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchDisposition {
    /// Every id Applied or SkippedNoOp.
    Success,
    /// Some ids failed, some did not.
    PartialFailure,
    /// Every id failed.
    TotalFailure,
}

pub fn disposition(outcomes: &[PerIdOutcome]) -> BatchDisposition {
    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    if failed == 0 {
        BatchDisposition::Success
    } else if failed == outcomes.len() {
        BatchDisposition::TotalFailure
    } else {
        BatchDisposition::PartialFailure
    }
}

/// A validated dry-run preview: what `apply` would send per id.
///
/// Dry runs perform no capture, so the preview is the full desired write
/// set; fields that would turn out to be no-ops are discovered only by a
/// real apply.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMutation {
    pub kind: EntityKind,
    pub ids: Vec<String>,
    pub values: BTreeMap<String, Value>,
}

/// Validate a request without any remote call, for dry-run rendering.
pub fn preview(request: &MutationRequest) -> Result<PlannedMutation, ValidationRejected> {
    for (field, value) in &request.values {
        validate(request.kind, field, value)?;
    }
    Ok(PlannedMutation {
        kind: request.kind,
        ids: request.ids.clone(),
        values: request.values.clone(),
    })
}

/// Apply a request id-by-id. Never aborts early; every id gets an outcome.
pub fn apply(
    reader: &dyn RemoteReader,
    writer: &dyn RemoteWriter,
    request: &MutationRequest,
) -> Vec<PerIdOutcome> {
    request
        .ids
        .iter()
        .map(|id| apply_one(reader, writer, request, id))
        .collect()
}

fn apply_one(
    reader: &dyn RemoteReader,
    writer: &dyn RemoteWriter,
    request: &MutationRequest,
    id: &str,
) -> PerIdOutcome {
    let entity = request.entity(id);
    let failed = |error: MutationError| PerIdOutcome {
        entity: entity.clone(),
        status: OutcomeStatus::Failed { error },
        journal_seq: None,
    };

    // 1. Local validation; any rejected field fails this id before any
    // remote call.
    for (field, value) in &request.values {
        if let Err(e) = validate(request.kind, field, value) {
            return failed(e.into());
        }
    }

    // 2. Capture preconditions for the requested fields.
    let fields: Vec<&str> = request.values.keys().map(String::as_str).collect();
    let snapshot = match capture(reader, &entity, &fields) {
        Ok(s) => s,
        Err(e) => return failed(e.into()),
    };

    // 3. Diff: desired == current is a no-op, recorded but not written.
    let mut write_set: BTreeMap<String, Value> = BTreeMap::new();
    let mut noop_fields = Vec::new();
    for (field, desired) in &request.values {
        let current = snapshot.get(field).unwrap_or(&Value::Null);
        if current == desired {
            noop_fields.push(field.clone());
        } else {
            write_set.insert(field.clone(), desired.clone());
        }
    }

    // 4. Nothing to write: distinct from Applied so callers can tell
    // "nothing needed to change" from "it changed".
    if write_set.is_empty() {
        debug!(entity = %entity, "skipping no-op mutation");
        return PerIdOutcome {
            entity,
            status: OutcomeStatus::SkippedNoOp { noop_fields },
            journal_seq: None,
        };
    }

    // 5. One atomic per-id write.
    if let Err(e) = writer.write_fields(&entity, &write_set) {
        return failed(e.into());
    }

    let changes = write_set
        .into_iter()
        .map(|(field, new)| {
            let old = snapshot.get(&field).cloned().unwrap_or(Value::Null);
            FieldChange::new(field, old, new)
        })
        .collect::<Vec<_>>();
    debug!(entity = %entity, fields = changes.len(), "applied mutation");

    PerIdOutcome {
        entity,
        status: OutcomeStatus::Applied {
            changes,
            noop_fields,
        },
        journal_seq: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::StaticRemote;
    use serde_json::json;

    fn txn(id: &str) -> EntityRef {
        EntityRef::new(EntityKind::Transaction, id)
    }

    fn remote_with(id: &str, reviewed: bool) -> StaticRemote {
        let remote = StaticRemote::new();
        remote.insert(
            txn(id),
            BTreeMap::from([("reviewed".into(), json!(reviewed))]),
        );
        remote
    }

    fn review_request(ids: &[&str]) -> MutationRequest {
        MutationRequest::new(
            EntityKind::Transaction,
            ids.iter().copied(),
            BTreeMap::from([("reviewed".into(), json!(true))]),
        )
    }

    #[test]
    fn apply_then_reapply_is_noop() {
        let remote = remote_with("t1", false);
        let request = review_request(&["t1"]);

        let first = apply(&remote, &remote, &request);
        assert!(matches!(first[0].status, OutcomeStatus::Applied { .. }));

        let second = apply(&remote, &remote, &request);
        assert!(matches!(
            second[0].status,
            OutcomeStatus::SkippedNoOp { .. }
        ));
        // Only the first run wrote anything.
        assert_eq!(remote.write_count(), 1);
    }

    #[test]
    fn invalid_field_fails_locally_without_remote_calls() {
        let remote = remote_with("t1", false);
        let request = MutationRequest::new(
            EntityKind::Transaction,
            ["t1"],
            BTreeMap::from([("reviewed".into(), json!("yes"))]),
        );

        let outcomes = apply(&remote, &remote, &request);
        assert!(matches!(
            &outcomes[0].status,
            OutcomeStatus::Failed {
                error: MutationError::Rejected(_)
            }
        ));
        assert_eq!(remote.write_count(), 0);
    }

    #[test]
    fn batch_isolation_valid_missing_valid() {
        let remote = StaticRemote::new();
        remote.insert(txn("x"), BTreeMap::from([("reviewed".into(), json!(false))]));
        remote.insert(txn("z"), BTreeMap::from([("reviewed".into(), json!(false))]));

        let outcomes = apply(&remote, &remote, &review_request(&["x", "y", "z"]));
        assert!(matches!(outcomes[0].status, OutcomeStatus::Applied { .. }));
        assert!(matches!(
            &outcomes[1].status,
            OutcomeStatus::Failed {
                error: MutationError::Capture(CaptureError::NotFound { .. })
            }
        ));
        assert!(matches!(outcomes[2].status, OutcomeStatus::Applied { .. }));
        assert_eq!(disposition(&outcomes), BatchDisposition::PartialFailure);
    }

    #[test]
    fn changed_and_unchanged_fields_split_into_writes_and_noops() {
        let remote = StaticRemote::new();
        remote.insert(
            txn("t1"),
            BTreeMap::from([
                ("reviewed".into(), json!(true)),
                ("notes".into(), Value::Null),
            ]),
        );

        let request = MutationRequest::new(
            EntityKind::Transaction,
            ["t1"],
            BTreeMap::from([
                ("reviewed".into(), json!(true)),
                ("notes".into(), json!("groceries")),
            ]),
        );
        let outcomes = apply(&remote, &remote, &request);
        match &outcomes[0].status {
            OutcomeStatus::Applied {
                changes,
                noop_fields,
            } => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].field, "notes");
                assert_eq!(changes[0].old, Value::Null);
                assert_eq!(changes[0].new, json!("groceries"));
                assert_eq!(noop_fields, &["reviewed"]);
            }
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[test]
    fn write_failure_is_whole_id_and_isolated() {
        let remote = StaticRemote::new();
        remote.insert(txn("a"), BTreeMap::from([("reviewed".into(), json!(false))]));
        remote.insert(txn("b"), BTreeMap::from([("reviewed".into(), json!(false))]));
        remote.fail_writes_for(txn("a"));

        let outcomes = apply(&remote, &remote, &review_request(&["a", "b"]));
        assert!(matches!(
            &outcomes[0].status,
            OutcomeStatus::Failed {
                error: MutationError::Write(_)
            }
        ));
        assert!(matches!(outcomes[1].status, OutcomeStatus::Applied { .. }));
    }

    #[test]
    fn disposition_classifies_batches() {
        let applied = PerIdOutcome {
            entity: txn("a"),
            status: OutcomeStatus::SkippedNoOp {
                noop_fields: vec![],
            },
            journal_seq: None,
        };
        let failed = PerIdOutcome {
            entity: txn("b"),
            status: OutcomeStatus::Failed {
                error: MutationError::Capture(CaptureError::NotFound { entity: txn("b") }),
            },
            journal_seq: None,
        };
        assert_eq!(disposition(&[applied.clone()]), BatchDisposition::Success);
        assert_eq!(
            disposition(&[applied.clone(), failed.clone()]),
            BatchDisposition::PartialFailure
        );
        assert_eq!(disposition(&[failed]), BatchDisposition::TotalFailure);
    }

    #[test]
    fn preview_validates_without_touching_the_remote() {
        let remote = StaticRemote::new();
        let request = review_request(&["t1"]);
        let plan = preview(&request).unwrap();
        assert_eq!(plan.values["reviewed"], json!(true));
        assert_eq!(remote.write_count(), 0);

        let bad = MutationRequest::new(
            EntityKind::Transaction,
            ["t1"],
            BTreeMap::from([("nope".into(), json!(1))]),
        );
        assert!(preview(&bad).is_err());
    }
}
