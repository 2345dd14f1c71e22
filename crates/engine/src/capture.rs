//! Precondition capture: snapshot current field values before a write.
//!
//! Capture must happen strictly before the write for the same id — the
//! captured values are what undo restores. If capture fails, the id's
//! mutation is skipped entirely; no write is attempted.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use tally_journal::EntityRef;

use crate::remote::{ReadError, RemoteReader};

/// Captured pre-write values, field → value (`Null` = field had no value).
pub type Snapshot = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The id no longer resolves.
    #[error("{entity} not found")]
    NotFound { entity: EntityRef },

    /// Transport failure, propagated without retry.
    #[error("failed to read {entity}: {detail}")]
    ReadFailed { entity: EntityRef, detail: String },
}

/// Read the current value of exactly `fields` on `entity`.
pub fn capture(
    reader: &dyn RemoteReader,
    entity: &EntityRef,
    fields: &[&str],
) -> Result<Snapshot, CaptureError> {
    let mut snapshot = match reader.read_fields(entity, fields) {
        Ok(values) => values,
        Err(ReadError::NotFound { entity }) => return Err(CaptureError::NotFound { entity }),
        Err(ReadError::Transport { entity, detail }) => {
            return Err(CaptureError::ReadFailed { entity, detail })
        }
    };

    // Transports should return every requested field, but the contract of a
    // Snapshot (old value is Null when absent) is enforced here regardless.
    for field in fields {
        snapshot.entry(field.to_string()).or_insert(Value::Null);
    }
    debug!(entity = %entity, fields = fields.len(), "captured preconditions");
    Ok(snapshot)
}
