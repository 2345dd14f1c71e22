//! The undo executor: derive and replay reverse mutations from the journal.
//!
//! Undo re-verifies remote state before touching anything: a field whose
//! current value no longer matches what the original mutation set it to has
//! drifted, and the executor reports the conflict instead of guessing.
//! Restores go back through the planner, so an undo is journaled like any
//! other mutation — and can itself be undone.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, warn};

use tally_journal::{
    EntityRef, EntryOrigin, FieldChange, FieldState, JournalEntry, JournalError, JournalStore,
};

use crate::capture::{capture, CaptureError};
use crate::model::{UndoMode, ValidationRejected};
use crate::planner::{self, MutationError, MutationRequest, OutcomeStatus};
use crate::remote::{RemoteReader, RemoteWriter, WriteError};

/// Which entry to undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UndoTarget {
    /// The most recent entry that still has an undo-eligible field.
    Last,
    /// A specific entry by sequence number.
    Seq(u64),
}

/// Per-field result of an undo attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUndoOutcome {
    /// The old value was written back.
    Restored,
    /// The current value already equalled the old value (an out-of-band
    /// change flipped it back); settled as undone without a write.
    AlreadyAtOldValue,
    /// The current value matches neither what the mutation set nor the old
    /// value: a second writer changed it. Left untouched.
    Conflicted { expected: Value, actual: Value },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldUndo {
    pub field: String,
    pub outcome: FieldUndoOutcome,
}

/// What an undo did, field by field.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoReport {
    /// The entry that was undone (or partially undone).
    pub seq: u64,
    pub entity: EntityRef,
    pub mode: UndoMode,
    /// The new journal entry recording the reverse mutation, when one was
    /// written.
    pub undo_seq: Option<u64>,
    pub fields: Vec<FieldUndo>,
}

impl UndoReport {
    pub fn has_conflicts(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f.outcome, FieldUndoOutcome::Conflicted { .. }))
    }

    pub fn restored_fields(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| {
                matches!(
                    f.outcome,
                    FieldUndoOutcome::Restored | FieldUndoOutcome::AlreadyAtOldValue
                )
            })
            .count()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UndoError {
    #[error("nothing to undo")]
    NoHistory,

    #[error("no journal entry with sequence number {seq}")]
    UnknownSequence { seq: u64 },

    #[error("entry {seq} is already undone")]
    AlreadyUndone { seq: u64 },

    #[error("entry {seq} was superseded by a later mutation; undo the later entry first")]
    Superseded { seq: u64 },

    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The restoring write failed. The entry stays Applied; retry is safe.
    #[error("undo of entry {seq} failed: {source}")]
    WriteFailed {
        seq: u64,
        #[source]
        source: WriteError,
    },

    /// A recorded old value no longer passes the change model. Points at a
    /// model change since the entry was written.
    #[error("recorded old value rejected: {0}")]
    RestoreRejected(#[from] ValidationRejected),

    #[error(transparent)]
    Journal(#[from] JournalError),
}

pub(crate) fn execute(
    reader: &dyn RemoteReader,
    writer: &dyn RemoteWriter,
    journal: &JournalStore,
    target: UndoTarget,
    mode: UndoMode,
) -> Result<UndoReport, UndoError> {
    // Step 1: resolve the target on fresh durable state. `entry_fresh`
    // takes the store lock, so the eligibility decision below cannot act on
    // a stale supersede view.
    let entry = match target {
        UndoTarget::Seq(seq) => journal
            .entry_fresh(seq)?
            .ok_or(UndoError::UnknownSequence { seq })?,
        UndoTarget::Last => {
            let candidate = journal
                .recent(0)?
                .into_iter()
                .find(|e| e.applied_fields().next().is_some())
                .ok_or(UndoError::NoHistory)?;
            journal
                .entry_fresh(candidate.seq)?
                .ok_or(UndoError::NoHistory)?
        }
    };
    ensure_eligible(&entry)?;

    // Step 2: re-capture exactly the entry's still-applied fields.
    let fields: Vec<&str> = entry.applied_fields().map(|c| c.field.as_str()).collect();
    let snapshot = capture(reader, &entry.entity, &fields)?;

    // Step 3: drift check against the recorded post-mutation values.
    let mut restore: BTreeMap<String, Value> = BTreeMap::new();
    let mut already_old: Vec<String> = Vec::new();
    let mut conflicts: Vec<FieldUndo> = Vec::new();
    for change in entry.applied_fields() {
        let current = snapshot.get(&change.field).unwrap_or(&Value::Null);
        if *current == change.new {
            restore.insert(change.field.clone(), change.old.clone());
        } else if *current == change.old {
            already_old.push(change.field.clone());
        } else {
            warn!(
                seq = entry.seq,
                entity = %entry.entity,
                field = %change.field,
                "undo conflict: remote value drifted"
            );
            conflicts.push(FieldUndo {
                field: change.field.clone(),
                outcome: FieldUndoOutcome::Conflicted {
                    expected: change.new.clone(),
                    actual: current.clone(),
                },
            });
        }
    }

    // Steps 4–5: restore the non-conflicting fields and settle entry state.
    let mut report = match mode {
        UndoMode::JournalReplay => {
            replay(reader, writer, journal, &entry, restore, already_old)?
        }
        UndoMode::NativeUndo => {
            native(writer, journal, &entry, restore, already_old, &conflicts)?
        }
    };
    report.fields.extend(conflicts);
    Ok(report)
}

/// Replay path: the reverse write goes through the planner, so it is
/// validated, diffed, and journaled exactly like a forward mutation.
fn replay(
    reader: &dyn RemoteReader,
    writer: &dyn RemoteWriter,
    journal: &JournalStore,
    entry: &JournalEntry,
    restore: BTreeMap<String, Value>,
    mut already_old: Vec<String>,
) -> Result<UndoReport, UndoError> {
    let mut restored: Vec<String> = Vec::new();
    let mut undo_seq = None;

    if !restore.is_empty() {
        let request = MutationRequest::new(
            entry.entity.kind,
            [entry.entity.id.clone()],
            restore.clone(),
        );
        let outcome = planner::apply(reader, writer, &request)
            .into_iter()
            .next()
            .expect("one outcome per requested id");
        match outcome.status {
            OutcomeStatus::Applied { changes, .. } => {
                // Appending the reverse mutation marks the original entry's
                // fields Superseded; the marks below settle them as Undone.
                // A crash in between leaves them Superseded, never
                // doubly-eligible.
                let seq = journal.append(&entry.entity, EntryOrigin::UndoOf(entry.seq), changes)?;
                undo_seq = Some(seq);
                restored.extend(restore.keys().cloned());
            }
            OutcomeStatus::SkippedNoOp { .. } => {
                // Raced with an out-of-band restore between drift check and
                // write; nothing to journal.
                already_old.extend(restore.keys().cloned());
            }
            OutcomeStatus::Failed { error } => {
                return Err(match error {
                    MutationError::Write(source) => UndoError::WriteFailed {
                        seq: entry.seq,
                        source,
                    },
                    MutationError::Capture(e) => UndoError::Capture(e),
                    MutationError::Rejected(e) => UndoError::RestoreRejected(e),
                })
            }
        }
    }

    let mut fields = Vec::new();
    for field in restored {
        journal.mark(entry.seq, &field, FieldState::Undone)?;
        fields.push(FieldUndo {
            field,
            outcome: FieldUndoOutcome::Restored,
        });
    }
    for field in already_old {
        journal.mark(entry.seq, &field, FieldState::Undone)?;
        fields.push(FieldUndo {
            field,
            outcome: FieldUndoOutcome::AlreadyAtOldValue,
        });
    }
    debug!(seq = entry.seq, ?undo_seq, "undo replay complete");

    Ok(UndoReport {
        seq: entry.seq,
        entity: entry.entity.clone(),
        mode: UndoMode::JournalReplay,
        undo_seq,
        fields,
    })
}

/// Native path: the remote service reverses its own change. Whole-entity,
/// so it only proceeds when no field conflicts; the result is journaled as
/// an already-Undone entry to keep a single history view.
fn native(
    writer: &dyn RemoteWriter,
    journal: &JournalStore,
    entry: &JournalEntry,
    restore: BTreeMap<String, Value>,
    already_old: Vec<String>,
    conflicts: &[FieldUndo],
) -> Result<UndoReport, UndoError> {
    let mut fields = Vec::new();
    let mut undo_seq = None;

    if !conflicts.is_empty() {
        // A native undo cannot exclude fields; leave everything untouched
        // and let the caller resolve the drift.
        return Ok(UndoReport {
            seq: entry.seq,
            entity: entry.entity.clone(),
            mode: UndoMode::NativeUndo,
            undo_seq,
            fields,
        });
    }

    if !restore.is_empty() {
        writer
            .undo_native(&entry.entity)
            .map_err(|source| UndoError::WriteFailed {
                seq: entry.seq,
                source,
            })?;
        let reversed = restore
            .iter()
            .map(|(field, old)| {
                let new_value = entry
                    .change_for(field)
                    .map(|c| c.new.clone())
                    .unwrap_or(Value::Null);
                FieldChange::new(field.clone(), new_value, old.clone())
            })
            .collect();
        let seq = journal.append(
            &entry.entity,
            EntryOrigin::NativeUndoOf(entry.seq),
            reversed,
        )?;
        undo_seq = Some(seq);
    }

    for field in restore.into_keys() {
        journal.mark(entry.seq, &field, FieldState::Undone)?;
        fields.push(FieldUndo {
            field,
            outcome: FieldUndoOutcome::Restored,
        });
    }
    for field in already_old {
        journal.mark(entry.seq, &field, FieldState::Undone)?;
        fields.push(FieldUndo {
            field,
            outcome: FieldUndoOutcome::AlreadyAtOldValue,
        });
    }

    Ok(UndoReport {
        seq: entry.seq,
        entity: entry.entity.clone(),
        mode: UndoMode::NativeUndo,
        undo_seq,
        fields,
    })
}

fn ensure_eligible(entry: &JournalEntry) -> Result<(), UndoError> {
    if entry.applied_fields().next().is_some() {
        return Ok(());
    }
    if entry
        .states
        .values()
        .any(|s| *s == FieldState::Superseded)
    {
        Err(UndoError::Superseded { seq: entry.seq })
    } else {
        Err(UndoError::AlreadyUndone { seq: entry.seq })
    }
}
