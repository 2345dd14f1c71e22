//! The engine facade: the one entry point callers drive.
//!
//! Holds borrowed capabilities (reader, writer, journal handle) rather than
//! owning globals; every invocation passes its resources in explicitly.

use tracing::debug;

use tally_journal::{EntityRef, EntryOrigin, JournalEntry, JournalError, JournalStore};

use crate::model::{undo_mode, UndoMode, ValidationRejected};
use crate::planner::{
    self, BatchDisposition, MutationRequest, OutcomeStatus, PerIdOutcome, PlannedMutation,
};
use crate::remote::{RemoteReader, RemoteWriter};
use crate::undo::{self, UndoError, UndoReport, UndoTarget};

/// Result of applying one batch: per-id outcomes plus the journal sequence
/// numbers recorded for the applied ones.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub outcomes: Vec<PerIdOutcome>,
}

impl BatchResult {
    pub fn disposition(&self) -> BatchDisposition {
        planner::disposition(&self.outcomes)
    }
}

/// The mutation safety engine.
pub struct Engine<'a> {
    reader: &'a dyn RemoteReader,
    writer: &'a dyn RemoteWriter,
    journal: &'a JournalStore,
}

impl<'a> Engine<'a> {
    pub fn new(
        reader: &'a dyn RemoteReader,
        writer: &'a dyn RemoteWriter,
        journal: &'a JournalStore,
    ) -> Self {
        Self {
            reader,
            writer,
            journal,
        }
    }

    /// Validate a request locally and return the planned write set, for
    /// dry-run rendering. No capture, no write, no journaling.
    pub fn preview(&self, request: &MutationRequest) -> Result<PlannedMutation, ValidationRejected> {
        planner::preview(request)
    }

    /// Apply a request id-by-id and journal every Applied outcome.
    ///
    /// A crash between a remote write succeeding and its journal append
    /// leaves an applied-but-unrecorded change; this window is accepted and
    /// documented rather than hidden. A journal failure at append time
    /// surfaces as an error for the same reason — the remote change exists
    /// whether or not it was recorded.
    pub fn plan_and_apply(&self, request: &MutationRequest) -> Result<BatchResult, JournalError> {
        let mut outcomes = planner::apply(self.reader, self.writer, request);
        for outcome in &mut outcomes {
            if let OutcomeStatus::Applied { changes, .. } = &outcome.status {
                let seq =
                    self.journal
                        .append(&outcome.entity, EntryOrigin::Apply, changes.clone())?;
                outcome.journal_seq = Some(seq);
            }
        }
        debug!(
            ids = request.ids.len(),
            journaled = outcomes.iter().filter(|o| o.journal_seq.is_some()).count(),
            "batch applied"
        );
        Ok(BatchResult { outcomes })
    }

    /// Undo the most recent eligible entry, or a specific one, using the
    /// default undo mode for the entry's kind.
    pub fn undo(&self, target: UndoTarget) -> Result<UndoReport, UndoError> {
        // The mode is selected per entity kind; resolve the target first so
        // the kind is known, then let the executor re-resolve under the
        // store lock.
        let kind = match target {
            UndoTarget::Seq(seq) => self
                .journal
                .entry(seq)?
                .ok_or(UndoError::UnknownSequence { seq })?
                .entity
                .kind,
            UndoTarget::Last => {
                self.journal
                    .recent(0)?
                    .into_iter()
                    .find(|e| e.applied_fields().next().is_some())
                    .ok_or(UndoError::NoHistory)?
                    .entity
                    .kind
            }
        };
        self.undo_with_mode(target, undo_mode(kind))
    }

    /// Undo with an explicit mode, for transports that support native undo.
    pub fn undo_with_mode(
        &self,
        target: UndoTarget,
        mode: UndoMode,
    ) -> Result<UndoReport, UndoError> {
        undo::execute(self.reader, self.writer, self.journal, target, mode)
    }

    /// Journal history, newest first, optionally filtered to one entity.
    /// `limit` of 0 means everything.
    pub fn history(
        &self,
        entity: Option<&EntityRef>,
        limit: usize,
    ) -> Result<Vec<JournalEntry>, JournalError> {
        match entity {
            Some(entity) => {
                let mut entries = self.journal.entries_for(entity)?;
                if limit > 0 {
                    entries.truncate(limit);
                }
                Ok(entries)
            }
            None => self.journal.recent(limit),
        }
    }
}
