//! Durable undo journal for tally mutations.
//!
//! The journal is an append-only, sequence-ordered history of applied field
//! changes. Appending and state marking happen under a cross-process
//! exclusive lock and land atomically, so the invariant "at most one entry
//! is undo-eligible per (entity, field)" survives concurrent invocations
//! and crashes between writes.

mod entry;
mod error;
mod lock;
mod store;

pub use entry::{
    EntityKind, EntityRef, EntryOrigin, EntrySummary, FieldChange, FieldState, JournalEntry,
};
pub use error::JournalError;
pub use store::JournalStore;
