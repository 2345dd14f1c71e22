//! The service client: GraphQL over HTTP, or fixtures on disk.
//!
//! Both modes implement the engine's [`RemoteReader`] and [`RemoteWriter`]
//! capabilities, so the mutation engine cannot tell them apart — which is
//! exactly the point.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{json, Map, Value};
use tracing::debug;

use tally_engine::{EntityKind, EntityRef, ReadError, RemoteReader, RemoteWriter, WriteError};

use crate::error::TransportError;
use crate::fixtures::FixtureStore;
use crate::ops;
use crate::types::{Category, Recurring, Tag, Transaction};
use crate::wire;

#[derive(Debug, Clone)]
pub enum ClientMode {
    Http {
        base_url: String,
        token: Option<String>,
    },
    Fixtures(PathBuf),
}

pub struct ServiceClient {
    mode: ClientMode,
    agent: ureq::Agent,
}

impl ServiceClient {
    pub fn new(mode: ClientMode) -> Self {
        Self {
            mode,
            agent: ureq::Agent::new_with_defaults(),
        }
    }

    /// POST one GraphQL operation and return the parsed response body.
    ///
    /// GraphQL-level errors (the `errors` array) are mapped to
    /// [`TransportError::Graphql`] with the first error's extension code.
    fn graphql(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<Value, TransportError> {
        let ClientMode::Http { base_url, token } = &self.mode else {
            return Err(TransportError::Http(
                "graphql is only available in http mode".to_string(),
            ));
        };
        let url = format!("{}/api/graphql", base_url.trim_end_matches('/'));
        debug!(operation, url = %url, "graphql request");

        let mut request = self
            .agent
            .post(&url)
            .header("content-type", "application/json");
        if let Some(token) = token {
            request = request.header("authorization", &format!("Bearer {token}"));
        }
        let response = request
            .send_json(json!({
                "operationName": operation,
                "query": query,
                "variables": variables,
            }))
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let body: Value = response
            .into_body()
            .read_json()
            .map_err(|e| TransportError::Http(format!("reading response body: {e}")))?;

        if let Some(first) = body
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
        {
            return Err(TransportError::Graphql {
                code: first
                    .pointer("/extensions/code")
                    .and_then(Value::as_str)
                    .map(String::from),
                message: first
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }
        Ok(body)
    }

    fn http_read_fields(
        &self,
        entity: &EntityRef,
        fields: &[&str],
    ) -> Result<BTreeMap<String, Value>, TransportError> {
        let (operation, query, pointer) = by_id_operation(entity.kind);
        let body = self.graphql(operation, query, json!({ "id": entity.id }))?;

        let node = body
            .pointer(pointer)
            .ok_or_else(|| TransportError::Shape {
                operation: operation.to_string(),
            })?;
        let Value::Object(obj) = node else {
            // `data.<entity>: null` — the id does not resolve.
            return Err(TransportError::Graphql {
                code: Some("NOT_FOUND".to_string()),
                message: format!("{entity} does not resolve"),
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

    fn http_write_fields(
        &self,
        entity: &EntityRef,
        values: &BTreeMap<String, Value>,
    ) -> Result<(), TransportError> {
        let (operation, query) = edit_operation(entity.kind);
        let input: Map<String, Value> = values
            .iter()
            .map(|(field, value)| {
                (
                    wire::to_wire(entity.kind, field).to_string(),
                    value.clone(),
                )
            })
            .collect();
        self.graphql(
            operation,
            query,
            json!({ "id": entity.id, "input": Value::Object(input) }),
        )?;
        Ok(())
    }

    // ── List surface (read-only, outside the mutation core) ──────────────

    /// Fetch one transaction with its display fields, or `None` if the id
    /// does not resolve.
    pub fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, TransportError> {
        match &self.mode {
            ClientMode::Fixtures(dir) => {
                let rows = typed_list::<Transaction>(&FixtureStore::new(dir), EntityKind::Transaction)?;
                Ok(rows.into_iter().find(|t| t.id.as_str() == id))
            }
            ClientMode::Http { .. } => {
                let body = self.graphql(
                    "TransactionById",
                    ops::TRANSACTION_BY_ID,
                    json!({ "id": id }),
                )?;
                match body.pointer("/data/transaction") {
                    None => Err(TransportError::Shape {
                        operation: "TransactionById".to_string(),
                    }),
                    Some(Value::Null) => Ok(None),
                    Some(node) => serde_json::from_value(node.clone()).map(Some).map_err(|e| {
                        TransportError::Shape {
                            operation: format!("TransactionById: {e}"),
                        }
                    }),
                }
            }
        }
    }

    /// List transactions, newest page first, up to `limit`.
    pub fn list_transactions(
        &self,
        limit: usize,
        reviewed: Option<bool>,
    ) -> Result<Vec<Transaction>, TransportError> {
        match &self.mode {
            ClientMode::Fixtures(dir) => {
                let rows = typed_list::<Transaction>(&FixtureStore::new(dir), EntityKind::Transaction)?;
                Ok(rows
                    .into_iter()
                    .filter(|t| match reviewed {
                        Some(want) => t.reviewed.unwrap_or(false) == want,
                        None => true,
                    })
                    .take(if limit == 0 { usize::MAX } else { limit })
                    .collect())
            }
            ClientMode::Http { .. } => {
                let filter = reviewed.map(|want| json!({ "isReviewed": want }));
                let mut out: Vec<Transaction> = Vec::new();
                let mut cursor: Option<String> = None;
                let page_size = if limit == 0 { 100 } else { limit.min(100) };

                loop {
                    let body = self.graphql(
                        "Transactions",
                        ops::TRANSACTIONS,
                        json!({
                            "first": page_size,
                            "after": cursor,
                            "filter": filter.clone(),
                        }),
                    )?;
                    let edges = body
                        .pointer("/data/transactions/edges")
                        .and_then(Value::as_array)
                        .ok_or_else(|| TransportError::Shape {
                            operation: "Transactions".to_string(),
                        })?;
                    for edge in edges {
                        if let Some(node) = edge.get("node") {
                            let row: Transaction = serde_json::from_value(node.clone())
                                .map_err(|e| TransportError::Shape {
                                    operation: format!("Transactions: {e}"),
                                })?;
                            out.push(row);
                        }
                    }
                    if limit != 0 && out.len() >= limit {
                        out.truncate(limit);
                        break;
                    }
                    let has_next = body
                        .pointer("/data/transactions/pageInfo/hasNextPage")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    cursor = body
                        .pointer("/data/transactions/pageInfo/endCursor")
                        .and_then(Value::as_str)
                        .map(String::from);
                    if !has_next || cursor.is_none() {
                        break;
                    }
                }
                Ok(out)
            }
        }
    }

    pub fn list_categories(&self) -> Result<Vec<Category>, TransportError> {
        match &self.mode {
            ClientMode::Fixtures(dir) => {
                typed_list(&FixtureStore::new(dir), EntityKind::Category)
            }
            ClientMode::Http { .. } => {
                let body = self.graphql("Categories", ops::CATEGORIES, json!({}))?;
                flat_list(&body, "/data/categories", "Categories")
            }
        }
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>, TransportError> {
        match &self.mode {
            ClientMode::Fixtures(dir) => typed_list(&FixtureStore::new(dir), EntityKind::Tag),
            ClientMode::Http { .. } => {
                let body = self.graphql("Tags", ops::TAGS, json!({}))?;
                flat_list(&body, "/data/tags", "Tags")
            }
        }
    }

    pub fn list_recurrings(&self) -> Result<Vec<Recurring>, TransportError> {
        match &self.mode {
            ClientMode::Fixtures(dir) => {
                typed_list(&FixtureStore::new(dir), EntityKind::Recurring)
            }
            ClientMode::Http { .. } => {
                let body = self.graphql("Recurrings", ops::RECURRINGS, json!({}))?;
                flat_list(&body, "/data/recurrings", "Recurrings")
            }
        }
    }
}

fn by_id_operation(kind: EntityKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        EntityKind::Transaction => (
            "TransactionById",
            ops::TRANSACTION_BY_ID,
            "/data/transaction",
        ),
        EntityKind::Category => ("CategoryById", ops::CATEGORY_BY_ID, "/data/category"),
        EntityKind::Tag => ("TagById", ops::TAG_BY_ID, "/data/tag"),
        EntityKind::Recurring => ("RecurringById", ops::RECURRING_BY_ID, "/data/recurring"),
    }
}

fn edit_operation(kind: EntityKind) -> (&'static str, &'static str) {
    match kind {
        EntityKind::Transaction => ("EditTransaction", ops::EDIT_TRANSACTION),
        EntityKind::Category => ("EditCategory", ops::EDIT_CATEGORY),
        EntityKind::Tag => ("EditTag", ops::EDIT_TAG),
        EntityKind::Recurring => ("EditRecurring", ops::EDIT_RECURRING),
    }
}

fn typed_list<T: serde::de::DeserializeOwned>(
    store: &FixtureStore,
    kind: EntityKind,
) -> Result<Vec<T>, TransportError> {
    store
        .list(kind)?
        .into_iter()
        .map(|value| {
            serde_json::from_value(value).map_err(|e| TransportError::Fixtures(e.to_string()))
        })
        .collect()
}

fn flat_list<T: serde::de::DeserializeOwned>(
    body: &Value,
    pointer: &str,
    operation: &str,
) -> Result<Vec<T>, TransportError> {
    body.pointer(pointer)
        .and_then(Value::as_array)
        .ok_or_else(|| TransportError::Shape {
            operation: operation.to_string(),
        })?
        .iter()
        .map(|item| {
            serde_json::from_value(item.clone()).map_err(|e| TransportError::Shape {
                operation: format!("{operation}: {e}"),
            })
        })
        .collect()
}

impl RemoteReader for ServiceClient {
    fn read_fields(
        &self,
        entity: &EntityRef,
        fields: &[&str],
    ) -> Result<BTreeMap<String, Value>, ReadError> {
        match &self.mode {
            ClientMode::Fixtures(dir) => FixtureStore::new(dir).read_fields(entity, fields),
            ClientMode::Http { .. } => {
                self.http_read_fields(entity, fields).map_err(|e| {
                    if e.is_not_found() {
                        ReadError::NotFound {
                            entity: entity.clone(),
                        }
                    } else {
                        ReadError::Transport {
                            entity: entity.clone(),
                            detail: e.to_string(),
                        }
                    }
                })
            }
        }
    }
}

impl RemoteWriter for ServiceClient {
    fn write_fields(
        &self,
        entity: &EntityRef,
        values: &BTreeMap<String, Value>,
    ) -> Result<(), WriteError> {
        match &self.mode {
            ClientMode::Fixtures(dir) => FixtureStore::new(dir).write_fields(entity, values),
            ClientMode::Http { .. } => {
                self.http_write_fields(entity, values)
                    .map_err(|e| WriteError::Transport {
                        entity: entity.clone(),
                        detail: e.to_string(),
                    })
            }
        }
    }
}
