//! Server administration: database creation, system databases and server-wide listings.

use futures::future::join_all;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt};

use crate::{
    document::Database,
    error::{CouchError, CouchResult},
    params::{DbCreateParams, DbQueryParams},
    revision::RevisionControl,
    transport::Transport,
    uri::UriTemplate,
};

/// Databases a CouchDB cluster expects to exist.
pub const SYSTEM_DATABASES: [&str; 4] = ["_users", "_replicator", "_global_changes", "_metadata"];

const DEFAULT_SHARDS: u32 = 8;
const DEFAULT_REPLICAS: u32 = 3;

/// `true` if `name` is a legal user database name.
///
/// Names start with a lowercase letter, followed by lowercase letters, digits, or any of
/// `_ $ ( ) + - /`.
pub fn is_valid_db_name(name: &str) -> bool {
    let mut chars = name.chars();

    chars.next().is_some_and(|c| c.is_ascii_lowercase())
        && chars.all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(c)
        })
}

/// The outcome of ensuring one system database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemDatabaseStatus {
    Exists,
    Created,
    Failed(String),
}

impl SystemDatabaseStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SystemDatabaseStatus::Exists => "exists",
            SystemDatabaseStatus::Created => "created",
            SystemDatabaseStatus::Failed(reason) => reason,
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, SystemDatabaseStatus::Failed(_))
    }
}

impl fmt::Display for SystemDatabaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-database outcome of [`Admin::check_or_create_system_databases`], ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemDatabases {
    statuses: BTreeMap<String, SystemDatabaseStatus>,
}

impl SystemDatabases {
    pub fn get(&self, name: &str) -> Option<&SystemDatabaseStatus> {
        self.statuses.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SystemDatabaseStatus)> {
        self.statuses.iter().map(|(name, status)| (name.as_str(), status))
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// `true` when no database failed.
    pub fn all_ok(&self) -> bool {
        self.statuses.values().all(SystemDatabaseStatus::is_ok)
    }

    /// Renders the outcomes as `{ name: "exists" | "created" | error text }`.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.statuses
                .iter()
                .map(|(name, status)| (name.clone(), Value::String(status.to_string())))
                .collect::<Map<_, _>>(),
        )
    }
}

impl FromIterator<(String, SystemDatabaseStatus)> for SystemDatabases {
    fn from_iter<I: IntoIterator<Item = (String, SystemDatabaseStatus)>>(iter: I) -> Self {
        Self {
            statuses: iter.into_iter().collect(),
        }
    }
}

/// Server administration operations.
#[derive(Debug)]
pub struct Admin<'a, T: Transport> {
    transport: &'a T,
}

impl<'a, T: Transport> Admin<'a, T> {
    pub(crate) fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Creates a database and returns a handle to it.
    ///
    /// Missing sharding options default to `q=8`, `n=3` and `partitioned=false`.
    ///
    /// # Errors
    ///
    /// - [`CouchError::Validation`] for an illegal name; nothing is sent.
    /// - [`CouchError::AlreadyExists`] if the database exists; nothing is written.
    pub async fn create_db(
        &self,
        name: &str,
        params: DbCreateParams,
    ) -> CouchResult<Database<'a, T>> {
        if !is_valid_db_name(name) {
            tracing::debug!(db = name, "rejecting illegal database name");
            return Err(CouchError::Validation(format!(
                "Invalid database name: {name}"
            )));
        }

        let mut params = params;
        if !params.contains("q") {
            params = params.shards(DEFAULT_SHARDS);
        }
        if !params.contains("n") {
            params = params.replicas(DEFAULT_REPLICAS);
        }
        if !params.contains("partitioned") {
            params = params.force("partitioned", false);
        }

        tracing::debug!(db = name, "creating database");

        RevisionControl::new(self.transport)
            .create_with(&UriTemplate::database(name), &params, None)
            .await?;

        Ok(Database::new(name.to_string(), self.transport))
    }

    /// Deletes a database.
    pub async fn delete_db(&self, name: &str) -> CouchResult<()> {
        tracing::debug!(db = name, "deleting database");

        self.transport
            .delete(&UriTemplate::database(name).expand_plain())
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Makes sure every system database exists, creating the missing ones.
    ///
    /// Each database is probed and created independently and concurrently. A failure for
    /// one database is recorded in the result and does not affect the others.
    pub async fn check_or_create_system_databases(&self) -> SystemDatabases {
        let outcomes = join_all(SYSTEM_DATABASES.iter().map(|name| async move {
            (name.to_string(), self.ensure_database(name).await)
        }))
        .await;

        outcomes.into_iter().collect()
    }

    async fn ensure_database(&self, name: &str) -> SystemDatabaseStatus {
        let outcome = RevisionControl::new(self.transport)
            .create(&UriTemplate::database(name), None)
            .await;

        match outcome {
            Ok(_) => SystemDatabaseStatus::Created,
            Err(CouchError::AlreadyExists(_)) => SystemDatabaseStatus::Exists,
            Err(err) => {
                tracing::warn!(db = name, error = %err, "failed to ensure system database");
                SystemDatabaseStatus::Failed(err.to_string())
            }
        }
    }

    /// Tasks currently running on the server (`GET /_active_tasks`).
    pub async fn active_tasks(&self) -> CouchResult<Vec<Value>> {
        self.transport
            .get(&UriTemplate::server("/_active_tasks").expand_plain())
            .await?
            .json()
    }

    /// Names of all databases (`GET /_all_dbs`).
    pub async fn all_dbs(&self, params: &DbQueryParams) -> CouchResult<Vec<String>> {
        self.transport
            .get(&UriTemplate::server("/_all_dbs").expand(params))
            .await?
            .json()
    }

    /// Information about all databases (`GET /_dbs_info`).
    pub async fn dbs_info(&self, params: &DbQueryParams) -> CouchResult<Vec<Value>> {
        self.transport
            .get(&UriTemplate::server("/_dbs_info").expand(params))
            .await?
            .json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        testing::MockTransport,
        transport::{Method, Response},
    };
    use serde_json::json;

    #[test]
    fn database_name_rules() {
        for name in ["sample", "some_db", "one23", "a/b", "x$(y)+z-w"] {
            assert!(is_valid_db_name(name), "{name} should be valid");
        }
        for name in ["", "_demo", "#somthing", "twoo parts", "1db", "someUpper", "hash!#bang"] {
            assert!(!is_valid_db_name(name), "{name} should be invalid");
        }
    }

    #[tokio::test]
    async fn invalid_name_is_rejected_before_any_request() {
        let transport = MockTransport::new();

        let err = Admin::new(&transport)
            .create_db("Bad Name", DbCreateParams::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CouchError::Validation(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn create_db_fills_missing_defaults() {
        let transport = MockTransport::new()
            .respond(Response::new(404))
            .respond(Response::with_json(201, &json!({ "ok": true })));

        let db = Admin::new(&transport)
            .create_db("test2", DbCreateParams::new().replicas(7))
            .await
            .unwrap();

        assert_eq!(db.name(), "test2");
        let requests = transport.requests();
        assert_eq!(requests[1].method, Method::Put);
        assert_eq!(requests[1].uri, "/test2?n=7&partitioned=false&q=8");
    }

    #[tokio::test]
    async fn create_db_on_existing_database_fails() {
        let transport = MockTransport::new().respond(Response::new(200));

        let err = Admin::new(&transport)
            .create_db("sample", DbCreateParams::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CouchError::AlreadyExists(_)));
        assert_eq!(transport.methods(), vec![Method::Head]);
    }

    #[tokio::test]
    async fn system_databases_report_existing() {
        let transport = MockTransport::new()
            .respond(Response::new(200))
            .respond(Response::new(200))
            .respond(Response::new(200))
            .respond(Response::new(200));

        let result = Admin::new(&transport).check_or_create_system_databases().await;

        assert_eq!(result.len(), 4);
        assert!(result.iter().all(|(_, status)| *status == SystemDatabaseStatus::Exists));
        assert_eq!(result.to_json()["_users"], "exists");
        assert_eq!(transport.methods(), vec![Method::Head; 4]);
    }

    #[tokio::test]
    async fn system_database_failures_do_not_short_circuit() {
        let transport = MockTransport::new()
            .fail("connection refused")
            .fail("connection refused")
            .fail("connection refused")
            .fail("connection refused");

        let result = Admin::new(&transport).check_or_create_system_databases().await;

        assert_eq!(result.len(), 4);
        assert!(!result.all_ok());
        for name in SYSTEM_DATABASES {
            assert_eq!(
                result.get(name),
                Some(&SystemDatabaseStatus::Failed("Transport error: connection refused".into()))
            );
        }
    }

    #[tokio::test]
    async fn all_dbs_sends_query_parameters() {
        let transport = MockTransport::new().respond(Response::with_json(200, &json!(["a", "b"])));

        let names = Admin::new(&transport)
            .all_dbs(&DbQueryParams::new().limit(2).descending(true))
            .await
            .unwrap();

        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(transport.requests()[0].uri, "/_all_dbs?descending=true&limit=2");
    }
}
