//! Typed, whitelisted query parameters.
//!
//! All endpoint-specific parameter types share one generic mapping, [`QueryParameters`].
//! What differs between them is only the set of names each endpoint accepts, supplied by a
//! [`ParameterSchema`] marker type as a data constant.
//!
//! # Example
//!
//! ```ignore
//! use couchlayer::params::{DbCreateParams, DocumentGetParams};
//!
//! let create = DbCreateParams::new().shards(4).replicas(2);
//! assert_eq!(create.append_to_url("/mydb"), "/mydb?n=2&q=4");
//!
//! let mut get = DocumentGetParams::new().conflicts(true);
//! get.insert("not_a_param", true).unwrap(); // silently dropped
//! ```
//!
//! Unknown names added without `force` are dropped without complaint. Opt into
//! [`QueryParameters::strict`] to have them rejected instead.

use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, marker::PhantomData};

use crate::error::{CouchError, CouchResult};

/// The capability every parameter type provides: the set of names its endpoint knows.
pub trait ParameterSchema {
    /// Parameter names accepted without `force`.
    const KNOWN: &'static [&'static str];
}

/// Parameters for `GET /{db}/{docid}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentGet;

impl ParameterSchema for DocumentGet {
    const KNOWN: &'static [&'static str] = &[
        "att_encoding_info",
        "atts_since",
        "conflicts",
        "deleted_conflicts",
        "latest",
        "local_seq",
        "meta",
        "open_revs",
        "rev",
        "revs",
        "revs_info",
    ];
}

/// Parameters for `PUT /{db}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DbCreate;

impl ParameterSchema for DbCreate {
    const KNOWN: &'static [&'static str] = &["q", "n", "partitioned"];
}

/// Parameters for the server-wide listings (`/_all_dbs`, `/_dbs_info`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DbQuery;

impl ParameterSchema for DbQuery {
    const KNOWN: &'static [&'static str] = &["descending", "endkey", "startkey", "limit", "skip"];
}

/// A schema that knows nothing; only forced parameters are stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct Untyped;

impl ParameterSchema for Untyped {
    const KNOWN: &'static [&'static str] = &[];
}

pub type DocumentGetParams = QueryParameters<DocumentGet>;
pub type DbCreateParams = QueryParameters<DbCreate>;
pub type DbQueryParams = QueryParameters<DbQuery>;
pub type UntypedParams = QueryParameters<Untyped>;

/// A mapping of parameter name to JSON value, filtered by the schema `S`.
pub struct QueryParameters<S: ParameterSchema> {
    values: BTreeMap<String, Value>,
    strict: bool,
    _schema: PhantomData<S>,
}

impl<S: ParameterSchema> QueryParameters<S> {
    /// Creates an empty, permissive parameter set.
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
            strict: false,
            _schema: PhantomData,
        }
    }

    /// Switches to strict mode, where unknown unforced names are rejected.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Returns `true` when unknown names are rejected rather than dropped.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Names accepted without `force`.
    pub fn known_parameters(&self) -> &'static [&'static str] {
        S::KNOWN
    }

    /// Returns `true` if `name` is part of this schema's whitelist.
    pub fn is_known(name: &str) -> bool {
        S::KNOWN.contains(&name)
    }

    /// Adds a parameter.
    ///
    /// The value is stored when `force` is set or `name` is known. Otherwise the call does
    /// nothing, unless the set is strict, in which case it fails with
    /// [`CouchError::Validation`].
    ///
    /// String values for range keys (`startkey`, `endkey` and their `start_key`/`end_key`
    /// spellings) are stored JSON-quoted, the same way the typed setters store them. A value
    /// that is already a JSON string literal is kept as is.
    pub fn add_parameter(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        force: bool,
    ) -> CouchResult<()> {
        if force || Self::is_known(name) {
            self.values.insert(name.to_string(), range_value(name, value.into()));
            return Ok(());
        }

        if self.strict {
            return Err(CouchError::Validation(format!("Unknown query parameter: {name}")));
        }

        tracing::trace!(parameter = name, "dropping unknown query parameter");
        Ok(())
    }

    /// Like [`add_parameter`](Self::add_parameter) without `force`.
    pub fn insert(&mut self, name: &str, value: impl Into<Value>) -> CouchResult<()> {
        self.add_parameter(name, value, false)
    }

    /// Stores a parameter unconditionally.
    pub fn force(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    /// Retrieves a stored parameter.
    pub fn get_parameter(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// The stored parameters as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }

    /// Appends the parameters to `url` as a literal `name=value&...` query string.
    ///
    /// Nothing is escaped here; values that need escaping must already be encoded.
    pub fn append_to_url(&self, url: &str) -> String {
        if self.values.is_empty() {
            return url.to_string();
        }

        let query = self
            .values
            .iter()
            .map(|(name, value)| format!("{name}={}", render_value(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{url}?{query}")
    }

    /// Renders the parameters as string variables for `{?query*}` expansion.
    pub fn for_template(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), render_value(value)))
            .collect()
    }
}

impl<S: ParameterSchema> Default for QueryParameters<S> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<S: ParameterSchema> Clone for QueryParameters<S> {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            strict: self.strict,
            _schema: PhantomData,
        }
    }
}

impl<S: ParameterSchema> fmt::Debug for QueryParameters<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryParameters")
            .field("values", &self.values)
            .field("strict", &self.strict)
            .finish()
    }
}

/// Strings are emitted verbatim, compound values as compact JSON text.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

const RANGE_KEYS: [&str; 4] = ["startkey", "endkey", "start_key", "end_key"];

fn quoted_key(key: &str) -> String {
    Value::String(key.to_string()).to_string()
}

fn range_value(name: &str, value: Value) -> Value {
    match value {
        Value::String(key)
            if RANGE_KEYS.contains(&name)
                && serde_json::from_str::<String>(&key).is_err() =>
        {
            Value::String(quoted_key(&key))
        }
        other => other,
    }
}

impl QueryParameters<DocumentGet> {
    /// Creates document read parameters. Attachment bodies are excluded; fetch them with
    /// `Database::get_attachment`.
    pub fn new() -> Self {
        Self::empty().force("attachments", false)
    }

    pub fn att_encoding_info(self, value: bool) -> Self {
        self.force("att_encoding_info", value)
    }

    /// Includes attachments only since the given revisions.
    pub fn atts_since<I, R>(self, revisions: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.force(
            "atts_since",
            Value::Array(revisions.into_iter().map(|r| Value::String(r.into())).collect()),
        )
    }

    pub fn conflicts(self, value: bool) -> Self {
        self.force("conflicts", value)
    }

    pub fn deleted_conflicts(self, value: bool) -> Self {
        self.force("deleted_conflicts", value)
    }

    pub fn latest(self, value: bool) -> Self {
        self.force("latest", value)
    }

    pub fn local_seq(self, value: bool) -> Self {
        self.force("local_seq", value)
    }

    pub fn meta(self, value: bool) -> Self {
        self.force("meta", value)
    }

    /// Retrieves all leaf revisions.
    pub fn open_revs_all(self) -> Self {
        self.force("open_revs", "all")
    }

    /// Retrieves the given leaf revisions.
    pub fn open_revs<I, R>(self, revisions: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.force(
            "open_revs",
            Value::Array(revisions.into_iter().map(|r| Value::String(r.into())).collect()),
        )
    }

    pub fn rev(self, rev: impl Into<String>) -> Self {
        self.force("rev", rev.into())
    }

    pub fn revs(self, value: bool) -> Self {
        self.force("revs", value)
    }

    pub fn revs_info(self, value: bool) -> Self {
        self.force("revs_info", value)
    }
}

impl QueryParameters<DbCreate> {
    pub fn new() -> Self {
        Self::empty()
    }

    /// Number of shards (`q`).
    pub fn shards(self, shards: u32) -> Self {
        self.force("q", shards)
    }

    /// Number of replicas (`n`).
    pub fn replicas(self, replicas: u32) -> Self {
        self.force("n", replicas)
    }

    pub fn partitioned(self, partitioned: bool) -> Self {
        self.force("partitioned", partitioned)
    }
}

impl QueryParameters<DbQuery> {
    pub fn new() -> Self {
        Self::empty()
    }

    pub fn descending(self, descending: bool) -> Self {
        self.force("descending", descending)
    }

    /// Stops at `key`. The key is sent as a JSON string.
    pub fn endkey(self, key: &str) -> Self {
        self.force("endkey", quoted_key(key))
    }

    /// Starts at `key`. The key is sent as a JSON string.
    pub fn startkey(self, key: &str) -> Self {
        self.force("startkey", quoted_key(key))
    }

    pub fn limit(self, limit: u64) -> Self {
        self.force("limit", limit)
    }

    pub fn skip(self, skip: u64) -> Self {
        self.force("skip", skip)
    }
}

impl QueryParameters<Untyped> {
    pub fn new() -> Self {
        Self::empty()
    }
}
