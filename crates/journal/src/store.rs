use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::entry::{EntityRef, EntryOrigin, FieldChange, FieldState, JournalEntry};
use crate::error::JournalError;
use crate::lock::StoreLock;

/// The on-disk document: last assigned sequence number plus all entries in
/// append order.
///
/// `last_seq` is persisted separately from the entries so sequence numbers
/// keep increasing even after entries are pruned by hand.
#[derive(Debug, Default, Serialize, Deserialize)]
struct JournalDocument {
    last_seq: u64,
    entries: Vec<JournalEntry>,
}

/// Handle to the durable journal at one filesystem path.
///
/// Every mutating operation (append, mark) acquires the store's exclusive
/// lock, re-reads the durable document, applies the change, and replaces the
/// file atomically (temp file + rename), so two concurrent invocations on
/// the same path never interleave half-written state and never assign the
/// same sequence number twice. Plain reads go against the last durable state
/// without locking.
#[derive(Debug, Clone)]
pub struct JournalStore {
    path: PathBuf,
}

impl JournalStore {
    /// Open (or lazily create) the journal at `path`.
    ///
    /// The file is not created until the first append; an existing file is
    /// parsed up front so corruption surfaces here rather than mid-write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let store = Self { path: path.into() };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a new entry and mark superseded prior state, atomically.
    ///
    /// Assigns `last_seq + 1`, then walks earlier entries for the same
    /// entity: any (entry, field) pair still `Applied` whose field is
    /// touched by `changes` becomes `Superseded`. Both the new entry and
    /// the supersede marks land in one durable write, so a crash can never
    /// leave two simultaneously undo-eligible entries for one field.
    ///
    /// Entries originating from a native undo are recorded already `Undone`;
    /// everything else starts `Applied`.
    pub fn append(
        &self,
        entity: &EntityRef,
        origin: EntryOrigin,
        changes: Vec<FieldChange>,
    ) -> Result<u64, JournalError> {
        let _lock = StoreLock::acquire(&self.path)?;
        let mut doc = self.load()?;

        let seq = doc.last_seq + 1;
        let initial_state = match origin {
            EntryOrigin::NativeUndoOf(_) => FieldState::Undone,
            EntryOrigin::Apply | EntryOrigin::UndoOf(_) => FieldState::Applied,
        };

        for prior in doc
            .entries
            .iter_mut()
            .filter(|e| e.entity == *entity)
        {
            for change in &changes {
                if prior.states.get(&change.field) == Some(&FieldState::Applied)
                    && prior.change_for(&change.field).is_some()
                {
                    prior
                        .states
                        .insert(change.field.clone(), FieldState::Superseded);
                    debug!(
                        seq = prior.seq,
                        field = %change.field,
                        superseded_by = seq,
                        "superseding journal field"
                    );
                }
            }
        }

        let states = changes
            .iter()
            .map(|c| (c.field.clone(), initial_state))
            .collect();
        doc.entries.push(JournalEntry {
            seq,
            at: now_rfc3339(),
            entity: entity.clone(),
            origin,
            changes,
            states,
        });
        doc.last_seq = seq;

        self.persist(&doc)?;
        debug!(seq, entity = %entity, "appended journal entry");
        Ok(seq)
    }

    /// Transition one (entry, field) state. Persisted under the lock.
    pub fn mark(&self, seq: u64, field: &str, state: FieldState) -> Result<(), JournalError> {
        let _lock = StoreLock::acquire(&self.path)?;
        let mut doc = self.load()?;

        let entry = doc
            .entries
            .iter_mut()
            .find(|e| e.seq == seq)
            .ok_or(JournalError::UnknownSequence { seq })?;
        if !entry.states.contains_key(field) {
            return Err(JournalError::UnknownField {
                seq,
                field: field.to_string(),
            });
        }
        entry.states.insert(field.to_string(), state);

        self.persist(&doc)?;
        debug!(seq, field, ?state, "marked journal field");
        Ok(())
    }

    /// Entries touching `entity`, most recent first.
    pub fn entries_for(&self, entity: &EntityRef) -> Result<Vec<JournalEntry>, JournalError> {
        let doc = self.load()?;
        let mut out: Vec<JournalEntry> = doc
            .entries
            .into_iter()
            .filter(|e| e.entity == *entity)
            .collect();
        out.reverse();
        Ok(out)
    }

    /// The most recently appended entry, if any.
    pub fn last_entry(&self) -> Result<Option<JournalEntry>, JournalError> {
        Ok(self.load()?.entries.into_iter().next_back())
    }

    /// Look up one entry by sequence number.
    pub fn entry(&self, seq: u64) -> Result<Option<JournalEntry>, JournalError> {
        Ok(self.load()?.entries.into_iter().find(|e| e.seq == seq))
    }

    /// The most recent `limit` entries (all of them when `limit` is 0),
    /// most recent first.
    pub fn recent(&self, limit: usize) -> Result<Vec<JournalEntry>, JournalError> {
        let mut entries = self.load()?.entries;
        entries.reverse();
        if limit > 0 {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    /// Re-read `seq` under the exclusive lock.
    ///
    /// Undo eligibility must be computed from fresh durable state, not from
    /// a read that may predate another invocation's append; this briefly
    /// takes the lock so the returned states reflect every durable
    /// supersede.
    pub fn entry_fresh(&self, seq: u64) -> Result<Option<JournalEntry>, JournalError> {
        let _lock = StoreLock::acquire(&self.path)?;
        Ok(self.load()?.entries.into_iter().find(|e| e.seq == seq))
    }

    /// Re-read the newest entry under the exclusive lock. See [`Self::entry_fresh`].
    pub fn last_entry_fresh(&self) -> Result<Option<JournalEntry>, JournalError> {
        let _lock = StoreLock::acquire(&self.path)?;
        Ok(self.load()?.entries.into_iter().next_back())
    }

    fn load(&self) -> Result<JournalDocument, JournalError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(JournalDocument::default())
            }
            Err(e) => return Err(JournalError::io(&self.path, e)),
        };
        serde_json::from_str(&raw).map_err(|e| JournalError::Corrupt {
            path: self.path.clone(),
            detail: e.to_string(),
        })
    }

    fn persist(&self, doc: &JournalDocument) -> Result<(), JournalError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| JournalError::io(&self.path, e))?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let body = serde_json::to_string_pretty(doc).map_err(|e| JournalError::Corrupt {
            path: self.path.clone(),
            detail: e.to_string(),
        })?;
        std::fs::write(&tmp, body).map_err(|e| JournalError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| JournalError::io(&self.path, e))
    }
}

fn now_rfc3339() -> String {
    // Rfc3339 formatting of a UTC timestamp cannot fail.
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("rfc3339 timestamp")
}
