//! Design documents: named map/reduce views.
//!
//! A design document lives at `_design/<name>` and carries a `views` object mapping view
//! names to `{ "map": <source>, "reduce": <source or builtin> }`. The reduce side is one of
//! the server's builtin reducers, custom source text, or absent.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{
    document::WriteResult,
    error::{CouchError, CouchResult},
    revision::{Revision, RevisionControl},
    transport::Transport,
    uri::UriTemplate,
};

/// Id prefix shared by all design documents.
pub const DESIGN_PREFIX: &str = "_design/";

/// The reduce step of a view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Reduce {
    /// No reduce step.
    #[default]
    None,
    /// `_count`
    Count,
    /// `_sum`
    Sum,
    /// `_stats`
    Stats,
    /// `_approx_count_distinct`
    ApproxCountDistinct,
    /// Reduce function source, kept verbatim.
    Custom(String),
}

impl Reduce {
    /// Classifies a reduce value as found in a design document.
    pub fn parse(value: &str) -> Self {
        match value {
            "" => Reduce::None,
            "_count" => Reduce::Count,
            "_sum" => Reduce::Sum,
            "_stats" => Reduce::Stats,
            "_approx_count_distinct" => Reduce::ApproxCountDistinct,
            source => Reduce::Custom(source.to_string()),
        }
    }

    /// The wire text, or `None` when there is no reduce step.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reduce::None => None,
            Reduce::Count => Some("_count"),
            Reduce::Sum => Some("_sum"),
            Reduce::Stats => Some("_stats"),
            Reduce::ApproxCountDistinct => Some("_approx_count_distinct"),
            Reduce::Custom(source) if source.is_empty() => None,
            Reduce::Custom(source) => Some(source.as_str()),
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, Reduce::None | Reduce::Custom(_))
    }
}

/// A single view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct View {
    pub map: String,
    pub reduce: Reduce,
}

impl View {
    pub fn new(map: impl Into<String>) -> Self {
        Self {
            map: map.into(),
            reduce: Reduce::None,
        }
    }

    pub fn with_reduce(mut self, reduce: Reduce) -> Self {
        self.reduce = reduce;
        self
    }

    pub fn to_json(&self) -> Value {
        let mut view = Map::new();
        view.insert("map".to_string(), Value::String(self.map.clone()));
        if let Some(reduce) = self.reduce.as_str() {
            view.insert("reduce".to_string(), Value::String(reduce.to_string()));
        }
        Value::Object(view)
    }

    pub fn from_json(value: &Value) -> Self {
        Self {
            map: string_field(value, "map"),
            reduce: Reduce::parse(&string_field(value, "reduce")),
        }
    }
}

/// A design document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DesignDocument {
    /// Full id (`_design/<name>`); derived from `name` when empty.
    pub id: String,
    pub rev: Option<Revision>,
    pub name: String,
    pub language: String,
    pub views: BTreeMap<String, View>,
}

impl DesignDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_view(mut self, name: impl Into<String>, view: View) -> Self {
        self.views.insert(name.into(), view);
        self
    }

    pub fn add_view(&mut self, name: impl Into<String>, view: View) {
        self.views.insert(name.into(), view);
    }

    pub fn remove_view(&mut self, name: &str) -> Option<View> {
        self.views.remove(name)
    }

    /// The document id: `id` if set, otherwise `_design/<name>`.
    pub fn document_id(&self) -> String {
        if self.id.is_empty() {
            format!("{DESIGN_PREFIX}{}", self.name)
        } else {
            self.id.clone()
        }
    }

    /// The short name used in `/_design/<name>` paths.
    pub fn short_name(&self) -> String {
        if self.name.is_empty() {
            self.id
                .strip_prefix(DESIGN_PREFIX)
                .unwrap_or(&self.id)
                .to_string()
        } else {
            self.name.clone()
        }
    }

    /// Serializes to the stored JSON shape. `_rev` and `language` are always present.
    pub fn to_json(&self) -> Value {
        let views = self
            .views
            .iter()
            .map(|(name, view)| (name.clone(), view.to_json()))
            .collect::<Map<String, Value>>();

        let mut doc = Map::new();
        doc.insert("_id".to_string(), Value::String(self.document_id()));
        doc.insert(
            "_rev".to_string(),
            Value::String(self.rev.as_ref().map(|r| r.to_string()).unwrap_or_default()),
        );
        doc.insert("language".to_string(), Value::String(self.language.clone()));
        doc.insert("views".to_string(), Value::Object(views));

        Value::Object(doc)
    }

    /// Parses the stored JSON shape. Missing fields default to empty values, and view
    /// entries that are empty objects are skipped.
    pub fn from_json(value: &Value) -> Self {
        let id = string_field(value, "_id");
        let rev = Some(string_field(value, "_rev"))
            .filter(|r| !r.is_empty())
            .map(Revision::new);
        let name = id.strip_prefix(DESIGN_PREFIX).unwrap_or_default().to_string();

        let views = value
            .get("views")
            .and_then(Value::as_object)
            .map(|views| {
                views
                    .iter()
                    .filter(|(_, v)| v.as_object().is_some_and(|o| !o.is_empty()))
                    .map(|(name, v)| (name.clone(), View::from_json(v)))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id,
            rev,
            name,
            language: string_field(value, "language"),
            views,
        }
    }

    /// The body sent on writes: empty `_rev` and `language` fields are left out, since the
    /// server rejects an empty revision.
    fn request_body(&self) -> Value {
        let mut body = self.to_json();
        if let Some(doc) = body.as_object_mut() {
            for key in ["_rev", "language"] {
                if doc.get(key).and_then(Value::as_str) == Some("") {
                    doc.remove(key);
                }
            }
        }
        body
    }
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Design document operations on one database.
#[derive(Debug)]
pub struct DesignDocuments<'a, T: Transport> {
    db: String,
    transport: &'a T,
}

impl<'a, T: Transport> DesignDocuments<'a, T> {
    pub(crate) fn new(db: String, transport: &'a T) -> Self {
        Self { db, transport }
    }

    fn template(&self, name: &str) -> UriTemplate {
        UriTemplate::database_design_doc(&self.db, name)
    }

    fn checked_name(doc: &DesignDocument) -> CouchResult<String> {
        let name = doc.short_name();
        if name.is_empty() {
            return Err(CouchError::Validation("Design document has no name".to_string()));
        }
        Ok(name)
    }

    /// Creates a design document that does not exist yet.
    pub async fn create(&self, doc: &DesignDocument) -> CouchResult<WriteResult> {
        let name = Self::checked_name(doc)?;
        tracing::debug!(db = %self.db, design = %name, "creating design document");

        let result = RevisionControl::new(self.transport)
            .create(&self.template(&name), Some(doc.request_body()))
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    /// Replaces a design document, provided `rev` is current.
    pub async fn update(&self, doc: &DesignDocument, rev: &Revision) -> CouchResult<WriteResult> {
        let name = Self::checked_name(doc)?;
        tracing::debug!(db = %self.db, design = %name, %rev, "updating design document");

        let result = RevisionControl::new(self.transport)
            .update(&self.template(&name), rev, doc.request_body())
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    /// Fetches and parses a design document.
    pub async fn get(&self, name: &str) -> CouchResult<DesignDocument> {
        let value: Value = self
            .transport
            .get(&self.template(name).expand_plain())
            .await?
            .json()?;

        Ok(DesignDocument::from_json(&value))
    }

    /// Deletes a design document.
    pub async fn delete(&self, name: &str, rev: &Revision, force: bool) -> CouchResult<WriteResult> {
        tracing::debug!(db = %self.db, design = name, force, "deleting design document");

        let result = RevisionControl::new(self.transport)
            .delete(&self.template(name), rev, force)
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    /// Lists the ids of all design documents in the database.
    pub async fn list(&self) -> CouchResult<Vec<String>> {
        let listing: Value = self
            .transport
            .get(&UriTemplate::database_design_docs(&self.db).expand_plain())
            .await?
            .json()?;

        Ok(listing
            .get("rows")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.get("id").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::MockTransport,
        transport::{Method, RequestBody, Response},
    };
    use serde_json::json;

    fn all_reduce_kinds() -> Value {
        json!({
            "_id": "_design/stats",
            "_rev": "3-abc",
            "language": "javascript",
            "views": {
                "plain": { "map": "function(doc) { emit(doc._id, 1); }" },
                "count": { "map": "function(doc) { emit(doc.type, 1); }", "reduce": "_count" },
                "sum": { "map": "function(doc) { emit(doc.type, doc.n); }", "reduce": "_sum" },
                "stats": { "map": "function(doc) { emit(doc.type, doc.n); }", "reduce": "_stats" },
                "distinct": { "map": "function(doc) { emit(doc.user, null); }", "reduce": "_approx_count_distinct" },
                "custom": { "map": "function(doc) { emit(null, doc.n); }", "reduce": "function(k, v) { return sum(v); }" }
            }
        })
    }

    #[test]
    fn reduce_classification() {
        assert_eq!(Reduce::parse(""), Reduce::None);
        assert_eq!(Reduce::parse("_count"), Reduce::Count);
        assert_eq!(Reduce::parse("_sum"), Reduce::Sum);
        assert_eq!(Reduce::parse("_stats"), Reduce::Stats);
        assert_eq!(Reduce::parse("_approx_count_distinct"), Reduce::ApproxCountDistinct);
        assert_eq!(
            Reduce::parse("function(k, v) { return 1; }"),
            Reduce::Custom("function(k, v) { return 1; }".into())
        );
        assert!(Reduce::Stats.is_builtin());
        assert!(!Reduce::Custom("x".into()).is_builtin());
    }

    #[test]
    fn json_round_trip_preserves_views() {
        let original = all_reduce_kinds();
        let doc = DesignDocument::from_json(&original);

        assert_eq!(doc.name, "stats");
        assert_eq!(doc.rev, Some(Revision::new("3-abc")));
        assert_eq!(doc.views["plain"].reduce, Reduce::None);
        assert_eq!(doc.views["distinct"].reduce, Reduce::ApproxCountDistinct);
        assert_eq!(doc.to_json(), original);
    }

    #[test]
    fn to_json_derives_id_and_emits_empty_rev() {
        let doc = DesignDocument::new("by_type")
            .with_view("all", View::new("function(doc) { emit(doc.type); }").with_reduce(Reduce::Count));

        assert_eq!(
            doc.to_json(),
            json!({
                "_id": "_design/by_type",
                "_rev": "",
                "language": "",
                "views": {
                    "all": { "map": "function(doc) { emit(doc.type); }", "reduce": "_count" }
                }
            })
        );
    }

    #[test]
    fn from_json_tolerates_missing_fields() {
        let doc = DesignDocument::from_json(&json!({ "views": { "empty": {}, "v": { "map": "m" } } }));

        assert_eq!(doc.id, "");
        assert_eq!(doc.rev, None);
        assert_eq!(doc.language, "");
        assert_eq!(doc.views.len(), 1);
        assert_eq!(doc.views["v"], View::new("m"));
    }

    #[tokio::test]
    async fn create_strips_empty_revision_from_body() {
        let transport = MockTransport::new()
            .respond(Response::new(404))
            .respond(Response::with_json(201, &json!({ "ok": true, "id": "_design/by_type", "rev": "1-a" })));
        let designs = DesignDocuments::new("db".into(), &transport);

        let result = designs
            .create(&DesignDocument::new("by_type").with_view("all", View::new("m")))
            .await
            .unwrap();

        assert_eq!(result.id, "_design/by_type");
        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Head);
        assert_eq!(requests[1].uri, "/db/_design/by_type");
        match &requests[1].body {
            Some(RequestBody::Json(body)) => {
                assert!(body.get("_rev").is_none());
                assert_eq!(body["views"]["all"]["map"], "m");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_without_name_is_rejected_locally() {
        let transport = MockTransport::new();
        let designs = DesignDocuments::new("db".into(), &transport);

        let err = designs.create(&DesignDocument::default()).await.unwrap_err();

        assert!(matches!(err, CouchError::Validation(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn get_parses_design_document() {
        let transport = MockTransport::new().respond(Response::with_json(200, &all_reduce_kinds()));
        let designs = DesignDocuments::new("db".into(), &transport);

        let doc = designs.get("stats").await.unwrap();

        assert_eq!(doc.views.len(), 6);
        assert_eq!(transport.requests()[0].uri, "/db/_design/stats");
    }

    #[tokio::test]
    async fn list_collects_row_ids() {
        let transport = MockTransport::new().respond(Response::with_json(
            200,
            &json!({ "total_rows": 2, "offset": 0, "rows": [
                { "id": "_design/a", "key": "_design/a", "value": { "rev": "1-a" } },
                { "id": "_design/b", "key": "_design/b", "value": { "rev": "1-b" } }
            ]}),
        ));
        let designs = DesignDocuments::new("db".into(), &transport);

        assert_eq!(designs.list().await.unwrap(), vec!["_design/a", "_design/b"]);
    }
}
