//! Mutation safety engine for tally.
//!
//! Writes against the remote service are gated, captured, diffed, applied
//! per id, and journaled, so that every applied change can later be
//! re-verified and reversed. The engine is transport-ignorant: it consumes
//! the [`RemoteReader`] and [`RemoteWriter`] capabilities and a
//! [`JournalStore`] handle, nothing else.
//!
//! Control flow for a write:
//!
//! 1. `gate::decide` — execute, dry-run, or require confirmation
//! 2. `capture` — snapshot current field values per id
//! 3. the planner — validate, diff, write, collect per-id outcomes
//! 4. `Engine::plan_and_apply` — journal each Applied outcome
//! 5. `Engine::undo` — later, re-verify and replay the reverse change

mod capture;
mod engine;
pub mod gate;
mod model;
mod planner;
mod remote;
mod undo;

pub use capture::{capture, CaptureError, Snapshot};
pub use engine::{BatchResult, Engine};
pub use gate::GateDecision;
pub use model::{
    field_spec, fields_for, undo_mode, validate, FieldSpec, UndoMode, ValidationRejected,
    ValueShape,
};
pub use planner::{
    disposition, BatchDisposition, MutationError, MutationRequest, OutcomeStatus, PerIdOutcome,
    PlannedMutation,
};
pub use remote::{ReadError, RemoteReader, RemoteWriter, StaticRemote, WriteError};
pub use undo::{FieldUndo, FieldUndoOutcome, UndoError, UndoReport, UndoTarget};

pub use tally_journal::{
    EntityKind, EntityRef, EntryOrigin, EntrySummary, FieldChange, FieldState, JournalEntry,
    JournalError, JournalStore,
};
