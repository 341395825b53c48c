//! In-memory CouchDB emulation.
//!
//! This module provides a [`Transport`] that answers requests from process memory the way a
//! single-node CouchDB server would, including multi-version concurrency control on every
//! document write.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde_json::{Map, Value, json};
use std::{collections::BTreeMap, sync::Arc};
use uuid::Uuid;

use couchlayer_core::{
    admin::{SYSTEM_DATABASES, is_valid_db_name},
    error::CouchResult,
    transport::{Method, Request, RequestBody, Response, Transport, TransportBuilder},
};

use crate::route::{QueryString, Route, parse};

const VERSION: &str = "3.3.3";
const MAX_UUIDS: u64 = 1000;

#[derive(Debug, Clone)]
struct StoredAttachment {
    content_type: String,
    data: Vec<u8>,
    revpos: u64,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    generation: u64,
    rev: String,
    deleted: bool,
    body: Map<String, Value>,
    attachments: BTreeMap<String, StoredAttachment>,
}

impl StoredDocument {
    fn to_json(&self, id: &str) -> Value {
        let mut doc = Map::new();
        doc.insert("_id".to_string(), Value::String(id.to_string()));
        doc.insert("_rev".to_string(), Value::String(self.rev.clone()));
        doc.extend(self.body.clone());

        if !self.attachments.is_empty() {
            let stubs = self
                .attachments
                .iter()
                .map(|(name, attachment)| {
                    (
                        name.clone(),
                        json!({
                            "content_type": attachment.content_type,
                            "length": attachment.data.len(),
                            "revpos": attachment.revpos,
                            "stub": true,
                        }),
                    )
                })
                .collect::<Map<_, _>>();
            doc.insert("_attachments".to_string(), Value::Object(stubs));
        }

        Value::Object(doc)
    }
}

#[derive(Debug, Clone)]
struct DatabaseState {
    docs: BTreeMap<String, StoredDocument>,
    security: Value,
    update_seq: u64,
    shards: u64,
    replicas: u64,
    partitioned: bool,
}

impl DatabaseState {
    fn live(&self, id: &str) -> Option<&StoredDocument> {
        self.docs.get(id).filter(|doc| !doc.deleted)
    }

    fn info(&self, name: &str) -> Value {
        let doc_count = self.docs.values().filter(|doc| !doc.deleted).count();
        let props = if self.partitioned {
            json!({ "partitioned": true })
        } else {
            json!({})
        };

        json!({
            "db_name": name,
            "doc_count": doc_count,
            "doc_del_count": self.docs.len() - doc_count,
            "update_seq": self.update_seq.to_string(),
            "props": props,
            "cluster": { "q": self.shards, "n": self.replicas, "w": 2, "r": 2 },
            "instance_start_time": "0",
        })
    }

    /// Writes a new revision of `id`, returning the new revision token.
    fn commit(
        &mut self,
        id: &str,
        body: Map<String, Value>,
        attachments: BTreeMap<String, StoredAttachment>,
        deleted: bool,
    ) -> String {
        let generation = self.docs.get(id).map_or(0, |doc| doc.generation) + 1;
        let rev = format!("{generation}-{}", Uuid::new_v4().simple());

        self.update_seq += 1;
        self.docs.insert(
            id.to_string(),
            StoredDocument {
                generation,
                rev: rev.clone(),
                deleted,
                body,
                attachments,
            },
        );

        rev
    }
}

type ServerMap = BTreeMap<String, DatabaseState>;

fn error(status: u16, error: &str, reason: &str) -> Response {
    Response::with_json(status, &json!({ "error": error, "reason": reason }))
}

fn quoted(rev: &str) -> String {
    format!("\"{rev}\"")
}

fn written(status: u16, id: &str, rev: &str) -> Response {
    Response::with_json(status, &json!({ "ok": true, "id": id, "rev": rev })).etag(quoted(rev))
}

fn ok() -> Response {
    Response::with_json(200, &json!({ "ok": true }))
}

fn database_missing() -> Response {
    error(404, "not_found", "Database does not exist.")
}

fn method_not_allowed(allowed: &str) -> Response {
    error(405, "method_not_allowed", &format!("Only {allowed} allowed"))
}

fn conflict() -> Response {
    error(409, "conflict", "Document update conflict.")
}

fn json_object(body: Option<&RequestBody>) -> Result<Map<String, Value>, Response> {
    match body {
        Some(RequestBody::Json(Value::Object(map))) => Ok(map.clone()),
        Some(RequestBody::Binary { data, .. }) => match serde_json::from_slice(data) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(error(400, "bad_request", "Document must be a JSON object")),
        },
        _ => Err(error(400, "bad_request", "Document must be a JSON object")),
    }
}

fn is_reserved_id(id: &str) -> bool {
    id.starts_with('_') && !id.starts_with("_design/") && !id.starts_with("_local/")
}

/// Applies `startkey`, `endkey`, `descending`, `skip` and `limit` to sorted names.
fn select_names<'a>(names: impl DoubleEndedIterator<Item = &'a String>, query: &QueryString) -> Vec<String> {
    let descending = query.flag("descending").unwrap_or(false);
    let start = query.key("startkey").or_else(|| query.key("start_key"));
    let end = query.key("endkey").or_else(|| query.key("end_key"));

    let ordered: Vec<&String> = if descending {
        names.rev().collect()
    } else {
        names.collect()
    };

    ordered
        .into_iter()
        .filter(|name| match (&start, descending) {
            (Some(start), false) => name.as_str() >= start.as_str(),
            (Some(start), true) => name.as_str() <= start.as_str(),
            (None, _) => true,
        })
        .filter(|name| match (&end, descending) {
            (Some(end), false) => name.as_str() <= end.as_str(),
            (Some(end), true) => name.as_str() >= end.as_str(),
            (None, _) => true,
        })
        .skip(query.number("skip").unwrap_or(0) as usize)
        .take(query.number("limit").map_or(usize::MAX, |limit| limit as usize))
        .cloned()
        .collect()
}

/// Thread-safe in-memory CouchDB emulator.
///
/// `InMemoryCouch` is cloneable and uses an `Arc`-wrapped internal state, so clones share
/// the same databases. Every request is answered while holding the state lock, which makes
/// each write atomic with respect to its revision check.
///
/// # Example
///
/// ```ignore
/// use couchlayer_memory::InMemoryCouch;
/// use couchlayer::prelude::*;
///
/// let client = CouchClient::new(InMemoryCouch::new());
/// client.admin().create_db("recipes", DbCreateParams::new()).await?;
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryCouch {
    state: Arc<RwLock<ServerMap>>,
}

impl InMemoryCouch {
    /// Creates an emulator with no databases.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ServerMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryCouch`.
    pub fn builder() -> InMemoryCouchBuilder {
        InMemoryCouchBuilder::default()
    }

    async fn dispatch(&self, request: &Request) -> Response {
        let (route, query) = parse(&request.uri);
        let method = request.method;
        let body = request.body.as_ref();

        match route {
            Route::Root => match method {
                Method::Get | Method::Head => Response::with_json(
                    200,
                    &json!({
                        "couchdb": "Welcome",
                        "version": VERSION,
                        "vendor": { "name": "couchlayer-memory" },
                    }),
                ),
                _ => method_not_allowed("GET,HEAD"),
            },
            Route::Session => match method {
                Method::Get | Method::Head => Response::with_json(
                    200,
                    &json!({
                        "ok": true,
                        "userCtx": { "name": null, "roles": ["_admin"] },
                        "info": { "authentication_handlers": ["default"] },
                    }),
                ),
                _ => method_not_allowed("GET,HEAD"),
            },
            Route::Uuids => match method {
                Method::Get | Method::Head => Self::uuids(&query),
                _ => method_not_allowed("GET,HEAD"),
            },
            Route::ActiveTasks => match method {
                Method::Get | Method::Head => Response::with_json(200, &json!([])),
                _ => method_not_allowed("GET,HEAD"),
            },
            Route::AllDbs => match method {
                Method::Get | Method::Head => {
                    let state = self.state.read().await;
                    Response::with_json(200, &json!(select_names(state.keys(), &query)))
                }
                _ => method_not_allowed("GET,HEAD"),
            },
            Route::DbsInfo => match method {
                Method::Get | Method::Head => {
                    let state = self.state.read().await;
                    let infos = select_names(state.keys(), &query)
                        .into_iter()
                        .filter_map(|name| {
                            state
                                .get(&name)
                                .map(|db| json!({ "key": name, "info": db.info(&name) }))
                        })
                        .collect::<Vec<_>>();
                    Response::with_json(200, &Value::Array(infos))
                }
                _ => method_not_allowed("GET,HEAD"),
            },
            Route::Database(name) => match method {
                Method::Get | Method::Head => {
                    let state = self.state.read().await;
                    match state.get(&name) {
                        Some(db) => Response::with_json(200, &db.info(&name)),
                        None => database_missing(),
                    }
                }
                Method::Put => self.create_database(&name, &query).await,
                Method::Delete => {
                    let mut state = self.state.write().await;
                    match state.remove(&name) {
                        Some(_) => ok(),
                        None => database_missing(),
                    }
                }
            },
            Route::Security(name) => match method {
                Method::Get | Method::Head => {
                    let state = self.state.read().await;
                    match state.get(&name) {
                        Some(db) => Response::with_json(200, &db.security),
                        None => database_missing(),
                    }
                }
                Method::Put => {
                    let security = match json_object(body) {
                        Ok(security) => security,
                        Err(response) => return response,
                    };
                    let mut state = self.state.write().await;
                    match state.get_mut(&name) {
                        Some(db) => {
                            db.security = Value::Object(security);
                            ok()
                        }
                        None => database_missing(),
                    }
                }
                Method::Delete => method_not_allowed("GET,PUT,HEAD"),
            },
            Route::DesignDocs(name) => match method {
                Method::Get | Method::Head => {
                    let state = self.state.read().await;
                    match state.get(&name) {
                        Some(db) => Self::design_docs(db),
                        None => database_missing(),
                    }
                }
                _ => method_not_allowed("GET,HEAD"),
            },
            Route::Document { db, id } => match method {
                Method::Get | Method::Head => self.read_document(&db, &id, &query).await,
                Method::Put => self.write_document(&db, &id, &query, body).await,
                Method::Delete => self.delete_document(&db, &id, &query).await,
            },
            Route::Attachment { db, id, name } => match method {
                Method::Get | Method::Head => self.read_attachment(&db, &id, &name, &query).await,
                Method::Put => self.write_attachment(&db, &id, &name, &query, body).await,
                Method::Delete => self.delete_attachment(&db, &id, &name, &query).await,
            },
            Route::Unknown(path) => error(400, "bad_request", &format!("Unsupported path {path}")),
        }
    }

    fn uuids(query: &QueryString) -> Response {
        let count = query.number("count").unwrap_or(1);
        if count > MAX_UUIDS {
            return error(400, "bad_request", "count parameter too large");
        }

        let uuids = (0..count)
            .map(|_| Uuid::new_v4().simple().to_string())
            .collect::<Vec<_>>();

        Response::with_json(200, &json!({ "uuids": uuids }))
    }

    fn design_docs(db: &DatabaseState) -> Response {
        let rows = db
            .docs
            .iter()
            .filter(|(id, doc)| id.starts_with("_design/") && !doc.deleted)
            .map(|(id, doc)| json!({ "id": id, "key": id, "value": { "rev": doc.rev } }))
            .collect::<Vec<_>>();

        Response::with_json(
            200,
            &json!({ "total_rows": rows.len(), "offset": 0, "rows": rows }),
        )
    }

    async fn create_database(&self, name: &str, query: &QueryString) -> Response {
        if !is_valid_db_name(name) && !SYSTEM_DATABASES.contains(&name) {
            return error(
                400,
                "illegal_database_name",
                &format!(
                    "Name: '{name}'. Only lowercase characters (a-z), digits (0-9), and any of \
                     the characters _, $, (, ), +, -, and / are allowed. Must begin with a letter."
                ),
            );
        }

        let mut state = self.state.write().await;
        if state.contains_key(name) {
            return error(
                412,
                "file_exists",
                "The database could not be created, the file already exists.",
            );
        }

        state.insert(
            name.to_string(),
            DatabaseState {
                docs: BTreeMap::new(),
                security: json!({}),
                update_seq: 0,
                shards: query.number("q").unwrap_or(2),
                replicas: query.number("n").unwrap_or(1),
                partitioned: query.flag("partitioned").unwrap_or(false),
            },
        );
        tracing::debug!(db = name, "created database");

        Response::with_json(201, &json!({ "ok": true }))
    }

    async fn read_document(&self, db: &str, id: &str, query: &QueryString) -> Response {
        let state = self.state.read().await;
        let Some(database) = state.get(db) else {
            return database_missing();
        };

        match database.docs.get(id) {
            Some(doc) if doc.deleted => error(404, "not_found", "deleted"),
            Some(doc) if query.get("rev").is_some_and(|rev| rev != doc.rev) => {
                error(404, "not_found", "missing")
            }
            Some(doc) => Response::with_json(200, &doc.to_json(id)).etag(quoted(&doc.rev)),
            None => error(404, "not_found", "missing"),
        }
    }

    async fn write_document(
        &self,
        db: &str,
        id: &str,
        query: &QueryString,
        body: Option<&RequestBody>,
    ) -> Response {
        if is_reserved_id(id) {
            return error(400, "bad_request", "Only reserved document ids may start with underscore.");
        }

        let mut doc = match json_object(body) {
            Ok(doc) => doc,
            Err(response) => return response,
        };

        let body_rev = doc.remove("_rev").and_then(|rev| rev.as_str().map(str::to_string));
        let rev = match (query.get("rev"), body_rev.as_deref()) {
            (Some(query_rev), Some(body_rev)) if query_rev != body_rev => {
                return error(
                    400,
                    "bad_request",
                    "Document rev from request body and query string have different values",
                );
            }
            (Some(rev), _) | (None, Some(rev)) => Some(rev.to_string()),
            (None, None) => None,
        };
        doc.remove("_id");
        let stubs = doc.remove("_attachments");

        let mut state = self.state.write().await;
        let Some(database) = state.get_mut(db) else {
            return database_missing();
        };

        let attachments = match (database.live(id), rev) {
            (Some(current), Some(rev)) if current.rev == rev => current
                .attachments
                .iter()
                .filter(|(name, _)| stubs.as_ref().is_some_and(|stubs| stubs.get(name.as_str()).is_some()))
                .map(|(name, attachment)| (name.clone(), attachment.clone()))
                .collect(),
            (Some(_), _) | (None, Some(_)) => {
                tracing::debug!(db, doc_id = id, "rejecting stale document write");
                return conflict();
            }
            (None, None) => BTreeMap::new(),
        };

        let rev = database.commit(id, doc, attachments, false);
        written(201, id, &rev)
    }

    async fn delete_document(&self, db: &str, id: &str, query: &QueryString) -> Response {
        let mut state = self.state.write().await;
        let Some(database) = state.get_mut(db) else {
            return database_missing();
        };

        let Some(current) = database.docs.get(id) else {
            return error(404, "not_found", "missing");
        };
        if query.get("rev") != Some(current.rev.as_str()) {
            return conflict();
        }
        if current.deleted {
            return error(404, "not_found", "deleted");
        }

        let rev = database.commit(id, Map::new(), BTreeMap::new(), true);
        written(200, id, &rev)
    }

    async fn read_attachment(&self, db: &str, id: &str, name: &str, query: &QueryString) -> Response {
        let state = self.state.read().await;
        let Some(database) = state.get(db) else {
            return database_missing();
        };

        let attachment = database
            .live(id)
            .filter(|doc| query.get("rev").is_none_or(|rev| rev == doc.rev))
            .and_then(|doc| doc.attachments.get(name).map(|attachment| (doc, attachment)));

        match attachment {
            Some((doc, attachment)) => Response {
                status: 200,
                etag: Some(quoted(&doc.rev)),
                content_type: Some(attachment.content_type.clone()),
                body: attachment.data.clone(),
            },
            None => error(404, "not_found", "Document is missing attachment"),
        }
    }

    async fn write_attachment(
        &self,
        db: &str,
        id: &str,
        name: &str,
        query: &QueryString,
        body: Option<&RequestBody>,
    ) -> Response {
        let (content_type, data) = match body {
            Some(RequestBody::Binary { content_type, data }) => (content_type.clone(), data.clone()),
            Some(RequestBody::Json(value)) => {
                ("application/json".to_string(), value.to_string().into_bytes())
            }
            None => ("application/octet-stream".to_string(), Vec::new()),
        };

        let mut state = self.state.write().await;
        let Some(database) = state.get_mut(db) else {
            return database_missing();
        };

        let (doc, mut attachments) = match (database.live(id), query.get("rev")) {
            (Some(current), Some(rev)) if current.rev == rev => {
                (current.body.clone(), current.attachments.clone())
            }
            (None, None) => (Map::new(), BTreeMap::new()),
            _ => return conflict(),
        };

        let revpos = database.docs.get(id).map_or(0, |doc| doc.generation) + 1;
        attachments.insert(
            name.to_string(),
            StoredAttachment {
                content_type,
                data,
                revpos,
            },
        );

        let rev = database.commit(id, doc, attachments, false);
        written(201, id, &rev)
    }

    async fn delete_attachment(&self, db: &str, id: &str, name: &str, query: &QueryString) -> Response {
        let mut state = self.state.write().await;
        let Some(database) = state.get_mut(db) else {
            return database_missing();
        };

        let Some(current) = database.live(id) else {
            return error(404, "not_found", "missing");
        };
        if query.get("rev") != Some(current.rev.as_str()) {
            return conflict();
        }
        if !current.attachments.contains_key(name) {
            return error(404, "not_found", "Document is missing attachment");
        }

        let body = current.body.clone();
        let mut attachments = current.attachments.clone();
        attachments.remove(name);

        let rev = database.commit(id, body, attachments, false);
        written(200, id, &rev)
    }
}

#[async_trait]
impl Transport for InMemoryCouch {
    async fn execute(&self, request: Request) -> CouchResult<Response> {
        tracing::trace!(method = %request.method, uri = %request.uri, "emulating request");

        let mut response = self.dispatch(&request).await;
        if request.method == Method::Head {
            response.body.clear();
        }

        Ok(response)
    }
}

/// Builder for constructing [`InMemoryCouch`] instances.
///
/// Optionally pre-creates databases, for tests that expect them to exist.
///
/// # Example
///
/// ```ignore
/// use couchlayer_memory::InMemoryCouch;
/// use couchlayer::transport::TransportBuilder;
///
/// let couch = InMemoryCouch::builder().database("recipes").build().await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryCouchBuilder {
    databases: Vec<String>,
}

impl InMemoryCouchBuilder {
    /// Adds a database that exists as soon as the emulator is built.
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.databases.push(name.into());
        self
    }
}

#[async_trait]
impl TransportBuilder for InMemoryCouchBuilder {
    type Transport = InMemoryCouch;

    async fn build(self) -> CouchResult<Self::Transport> {
        let couch = InMemoryCouch::new();

        for name in &self.databases {
            couch
                .put_json(&format!("/{name}"), None)
                .await?
                .error_for_status()?;
        }

        Ok(couch)
    }
}
