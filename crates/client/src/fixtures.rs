//! Fixture-backed client mode: per-kind JSON documents standing in for the
//! remote service.
//!
//! Each kind lives in one file mapping id → entity object, with wire field
//! names exactly as the service would return them. Reads and writes go
//! through the same wire-name mapping as the HTTP mode, so engine behavior
//! is identical offline — which is what the CLI integration tests run
//! against.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use tally_engine::{EntityKind, EntityRef, ReadError, WriteError};

use crate::error::TransportError;
use crate::wire;

#[derive(Debug, Clone)]
pub struct FixtureStore {
    dir: PathBuf,
}

impl FixtureStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, kind: EntityKind) -> PathBuf {
        let file = match kind {
            EntityKind::Transaction => "transactions.json",
            EntityKind::Category => "categories.json",
            EntityKind::Tag => "tags.json",
            EntityKind::Recurring => "recurrings.json",
        };
        self.dir.join(file)
    }

    fn load(&self, kind: EntityKind) -> Result<Map<String, Value>, TransportError> {
        let path = self.path_for(kind);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                return Err(TransportError::Fixtures(format!(
                    "reading {}: {e}",
                    path.display()
                )))
            }
        };
        let doc: Value = serde_json::from_str(&raw).map_err(|e| {
            TransportError::Fixtures(format!("parsing {}: {e}", path.display()))
        })?;
        match doc {
            Value::Object(map) => Ok(map),
            _ => Err(TransportError::Fixtures(format!(
                "{} must hold an object of id -> entity",
                path.display()
            ))),
        }
    }

    fn save(&self, kind: EntityKind, map: Map<String, Value>) -> Result<(), TransportError> {
        let path = self.path_for(kind);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TransportError::Fixtures(format!("creating {}: {e}", parent.display()))
            })?;
        }
        let body = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|e| TransportError::Fixtures(e.to_string()))?;
        std::fs::write(&path, body).map_err(|e| {
            TransportError::Fixtures(format!("writing {}: {e}", path.display()))
        })
    }

    pub fn read_fields(
        &self,
        entity: &EntityRef,
        fields: &[&str],
    ) -> Result<BTreeMap<String, Value>, ReadError> {
        let map = self.load(entity.kind).map_err(|e| ReadError::Transport {
            entity: entity.clone(),
            detail: e.to_string(),
        })?;
        let Some(Value::Object(obj)) = map.get(&entity.id) else {
            return Err(ReadError::NotFound {
                entity: entity.clone(),
            });
        };
        Ok(fields
            .iter()
            .map(|&field| {
                let value = obj
                    .get(wire::to_wire(entity.kind, field))
                    .cloned()
                    .unwrap_or(Value::Null);
                (field.to_string(), value)
            })
            .collect())
    }

    pub fn write_fields(
        &self,
        entity: &EntityRef,
        values: &BTreeMap<String, Value>,
    ) -> Result<(), WriteError> {
        let transport = |detail: String| WriteError::Transport {
            entity: entity.clone(),
            detail,
        };
        let mut map = self
            .load(entity.kind)
            .map_err(|e| transport(e.to_string()))?;
        let Some(Value::Object(obj)) = map.get_mut(&entity.id) else {
            return Err(transport(format!("unknown id {}", entity.id)));
        };
        for (field, value) in values {
            obj.insert(wire::to_wire(entity.kind, field).to_string(), value.clone());
        }
        self.save(entity.kind, map)
            .map_err(|e| transport(e.to_string()))
    }

    /// Every entity of `kind` as a wire-shaped object with `id` injected.
    pub fn list(&self, kind: EntityKind) -> Result<Vec<Value>, TransportError> {
        Ok(self
            .load(kind)?
            .into_iter()
            .filter_map(|(id, value)| match value {
                Value::Object(mut obj) => {
                    obj.insert("id".to_string(), Value::String(id));
                    Some(Value::Object(obj))
                }
                _ => None,
            })
            .collect())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tally_engine::EntityKind;

    fn seed(dir: &Path) {
        std::fs::write(
            dir.join("transactions.json"),
            serde_json::to_string_pretty(&json!({
                "t1": {
                    "date": "2026-07-01",
                    "name": "Grocer",
                    "amount": "-42.10",
                    "isReviewed": false,
                    "categoryId": "c1",
                    "tagIds": []
                }
            }))
            .unwrap(),
        )
        .unwrap();
    }

    fn txn(id: &str) -> EntityRef {
        EntityRef::new(EntityKind::Transaction, id)
    }

    #[test]
    fn reads_map_wire_names_to_model_names() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path());
        let store = FixtureStore::new(tmp.path());

        let values = store
            .read_fields(&txn("t1"), &["reviewed", "category_id", "notes"])
            .unwrap();
        assert_eq!(values["reviewed"], json!(false));
        assert_eq!(values["category_id"], json!("c1"));
        assert_eq!(values["notes"], Value::Null);
    }

    #[test]
    fn unknown_id_reads_as_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path());
        let store = FixtureStore::new(tmp.path());
        assert!(matches!(
            store.read_fields(&txn("zzz"), &["reviewed"]),
            Err(ReadError::NotFound { .. })
        ));
    }

    #[test]
    fn writes_persist_across_instances() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path());

        FixtureStore::new(tmp.path())
            .write_fields(
                &txn("t1"),
                &BTreeMap::from([("reviewed".to_string(), json!(true))]),
            )
            .unwrap();

        let values = FixtureStore::new(tmp.path())
            .read_fields(&txn("t1"), &["reviewed"])
            .unwrap();
        assert_eq!(values["reviewed"], json!(true));
    }

    #[test]
    fn list_injects_ids() {
        let tmp = tempfile::tempdir().unwrap();
        seed(tmp.path());
        let items = FixtureStore::new(tmp.path())
            .list(EntityKind::Transaction)
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["id"], json!("t1"));
    }
}
