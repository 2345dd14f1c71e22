//! Capability traits the engine consumes from its transport.
//!
//! The engine is ignorant of transport details: it sees opaque entity ids,
//! a field-level read capability, and a field-level write capability.
//! Transports implement these; the engine never retries — any failure is
//! terminal for the id it belongs to.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;

use tally_journal::EntityRef;

/// Errors from the read capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// The id no longer resolves at the remote service.
    #[error("{entity} not found")]
    NotFound { entity: EntityRef },

    /// Transport-level failure, propagated verbatim.
    #[error("read failed for {entity}: {detail}")]
    Transport { entity: EntityRef, detail: String },
}

/// Errors from the write capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    /// Transport-level failure. The write is per-id atomic: the whole id
    /// failed, never individual fields.
    #[error("write failed for {entity}: {detail}")]
    Transport { entity: EntityRef, detail: String },

    /// The transport has no native undo for this entity.
    #[error("native undo is not supported for {entity}")]
    NativeUndoUnsupported { entity: EntityRef },
}

/// Field-level read access to current remote state.
pub trait RemoteReader {
    /// Return the current value of exactly `fields` on `entity`.
    ///
    /// A field the entity carries no value for comes back as `Value::Null`.
    fn read_fields(
        &self,
        entity: &EntityRef,
        fields: &[&str],
    ) -> Result<BTreeMap<String, Value>, ReadError>;
}

/// Field-level write access to remote state.
pub trait RemoteWriter {
    /// Apply `values` to `entity` as one atomic per-id write.
    ///
    /// If the remote service accepts only part of a multi-field write, the
    /// transport must report the whole id as failed; the engine assumes no
    /// finer grain than the transport actually provides.
    fn write_fields(
        &self,
        entity: &EntityRef,
        values: &BTreeMap<String, Value>,
    ) -> Result<(), WriteError>;

    /// Invoke the remote service's own undo for the latest change to
    /// `entity`. Only transports that really have this capability opt in.
    fn undo_native(&self, entity: &EntityRef) -> Result<(), WriteError> {
        Err(WriteError::NativeUndoUnsupported {
            entity: entity.clone(),
        })
    }
}

#[derive(Debug, Default)]
struct StaticRemoteState {
    entities: BTreeMap<EntityRef, BTreeMap<String, Value>>,
    fail_writes: Vec<EntityRef>,
    writes: Vec<(EntityRef, BTreeMap<String, Value>)>,
    native_undo: bool,
    native_undos: Vec<EntityRef>,
}

/// An in-memory remote holding a fixed set of entities.
///
/// Reads and writes go against the internal map, and every write is logged,
/// which makes it the harness for drift, isolation, and zero-side-effect
/// assertions. Out-of-band mutations (the "second, untracked writer") are
/// plain `set` calls between engine operations.
#[derive(Debug, Default)]
pub struct StaticRemote {
    state: Mutex<StaticRemoteState>,
}

impl StaticRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) an entity with the given field values.
    pub fn insert(&self, entity: EntityRef, values: BTreeMap<String, Value>) {
        self.state.lock().unwrap().entities.insert(entity, values);
    }

    /// Mutate one field out-of-band, bypassing the write log.
    pub fn set(&self, entity: &EntityRef, field: &str, value: Value) {
        if let Some(values) = self.state.lock().unwrap().entities.get_mut(entity) {
            values.insert(field.to_string(), value);
        }
    }

    /// Make every future write to `entity` fail with a transport error.
    pub fn fail_writes_for(&self, entity: EntityRef) {
        self.state.lock().unwrap().fail_writes.push(entity);
    }

    /// Let `undo_native` succeed by reverting nothing (callers assert the log).
    pub fn enable_native_undo(&self) {
        self.state.lock().unwrap().native_undo = true;
    }

    pub fn value_of(&self, entity: &EntityRef, field: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .entities
            .get(entity)
            .and_then(|v| v.get(field).cloned())
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    pub fn native_undo_count(&self) -> usize {
        self.state.lock().unwrap().native_undos.len()
    }
}

impl RemoteReader for StaticRemote {
    fn read_fields(
        &self,
        entity: &EntityRef,
        fields: &[&str],
    ) -> Result<BTreeMap<String, Value>, ReadError> {
        let state = self.state.lock().unwrap();
        let values = state.entities.get(entity).ok_or_else(|| ReadError::NotFound {
            entity: entity.clone(),
        })?;
        Ok(fields
            .iter()
            .map(|f| {
                (
                    f.to_string(),
                    values.get(*f).cloned().unwrap_or(Value::Null),
                )
            })
            .collect())
    }
}

impl RemoteWriter for StaticRemote {
    fn write_fields(
        &self,
        entity: &EntityRef,
        values: &BTreeMap<String, Value>,
    ) -> Result<(), WriteError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes.contains(entity) {
            return Err(WriteError::Transport {
                entity: entity.clone(),
                detail: "injected write failure".to_string(),
            });
        }
        let Some(current) = state.entities.get_mut(entity) else {
            return Err(WriteError::Transport {
                entity: entity.clone(),
                detail: "entity vanished mid-write".to_string(),
            });
        };
        for (field, value) in values {
            current.insert(field.clone(), value.clone());
        }
        state.writes.push((entity.clone(), values.clone()));
        Ok(())
    }

    fn undo_native(&self, entity: &EntityRef) -> Result<(), WriteError> {
        let mut state = self.state.lock().unwrap();
        if !state.native_undo {
            return Err(WriteError::NativeUndoUnsupported {
                entity: entity.clone(),
            });
        }
        state.native_undos.push(entity.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_journal::EntityKind;

    fn txn(id: &str) -> EntityRef {
        EntityRef::new(EntityKind::Transaction, id)
    }

    #[test]
    fn read_fields_fills_missing_with_null() {
        let remote = StaticRemote::new();
        remote.insert(txn("t1"), BTreeMap::from([("reviewed".into(), json!(true))]));

        let values = remote.read_fields(&txn("t1"), &["reviewed", "notes"]).unwrap();
        assert_eq!(values["reviewed"], json!(true));
        assert_eq!(values["notes"], Value::Null);
    }

    #[test]
    fn read_unknown_entity_is_not_found() {
        let remote = StaticRemote::new();
        assert!(matches!(
            remote.read_fields(&txn("missing"), &["reviewed"]),
            Err(ReadError::NotFound { .. })
        ));
    }

    #[test]
    fn writes_apply_and_are_logged() {
        let remote = StaticRemote::new();
        remote.insert(txn("t1"), BTreeMap::new());
        remote
            .write_fields(&txn("t1"), &BTreeMap::from([("notes".into(), json!("x"))]))
            .unwrap();
        assert_eq!(remote.value_of(&txn("t1"), "notes"), Some(json!("x")));
        assert_eq!(remote.write_count(), 1);
    }

    #[test]
    fn native_undo_defaults_to_unsupported() {
        let remote = StaticRemote::new();
        remote.insert(txn("t1"), BTreeMap::new());
        assert!(matches!(
            remote.undo_native(&txn("t1")),
            Err(WriteError::NativeUndoUnsupported { .. })
        ));
        remote.enable_native_undo();
        remote.undo_native(&txn("t1")).unwrap();
        assert_eq!(remote.native_undo_count(), 1);
    }
}
