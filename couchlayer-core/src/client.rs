//! The client entry point.
//!
//! [`CouchClient`] owns a [`Transport`] and hands out borrowed handles for the operation
//! groups:
//!
//! - [`CouchClient::database`] - document, design document and security operations on one database
//! - [`CouchClient::admin`] - database creation, system databases and server-wide listings
//!
//! # Example
//!
//! ```ignore
//! use couchlayer::{prelude::*, memory::InMemoryCouch};
//!
//! let client = CouchClient::new(InMemoryCouch::builder().build().await?);
//!
//! client.admin().create_db("recipes", DbCreateParams::new()).await?;
//! let db = client.database("recipes");
//! ```

use serde::Deserialize;
use serde_json::Value;

use crate::{
    admin::Admin,
    document::Database,
    error::CouchResult,
    params::UntypedParams,
    transport::{Request, Response, Transport},
    uri::UriTemplate,
};

#[derive(Deserialize)]
struct Uuids {
    uuids: Vec<String>,
}

/// A CouchDB client bound to a specific transport.
///
/// # Type Parameters
///
/// * `T` - The transport implementation type
#[derive(Debug)]
pub struct CouchClient<T: Transport> {
    transport: T,
}

impl<T: Transport> CouchClient<T> {
    /// Creates a new client over the given transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Gets a handle to the named database.
    ///
    /// No request is made; the database need not exist yet.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the database
    pub fn database<'a>(&'a self, name: &str) -> Database<'a, T> {
        Database::new(name.to_string(), &self.transport)
    }

    /// Gets the administration operations.
    pub fn admin(&self) -> Admin<'_, T> {
        Admin::new(&self.transport)
    }

    /// The server welcome document (`GET /`).
    pub async fn status(&self) -> CouchResult<Value> {
        self.transport
            .get(&UriTemplate::root().expand_plain())
            .await?
            .json()
    }

    /// The current session (`GET /_session`).
    pub async fn session(&self) -> CouchResult<Value> {
        self.transport
            .get(&UriTemplate::server("/_session").expand_plain())
            .await?
            .json()
    }

    /// Fetches `count` server-generated UUIDs.
    ///
    /// # Arguments
    ///
    /// * `count` - The number of UUIDs to request
    pub async fn uuids(&self, count: u32) -> CouchResult<Vec<String>> {
        let params = UntypedParams::new().force("count", count);

        let response: Uuids = self
            .transport
            .get(&UriTemplate::server("/_uuids").expand(&params))
            .await?
            .json()?;

        Ok(response.uuids)
    }

    /// Sends a request as is and returns the response without interpreting its status.
    pub async fn raw(&self, request: Request) -> CouchResult<Response> {
        self.transport.execute(request).await
    }

    /// Shuts down the client, releasing its transport.
    pub async fn shutdown(self) -> CouchResult<()> {
        self.transport.shutdown().await
    }
}

impl<T: Transport + 'static> CouchClient<T> {
    /// Converts into a client whose transport type is erased.
    ///
    /// Useful when the transport is chosen at runtime.
    pub fn into_dyn(self) -> CouchClient<Box<dyn Transport>> {
        CouchClient::new(Box::new(self.transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing::MockTransport, transport::Method};
    use serde_json::json;

    #[tokio::test]
    async fn uuids_requests_count() {
        let transport = MockTransport::new().respond(Response::with_json(
            200,
            &json!({ "uuids": ["a", "b", "c"] }),
        ));
        let client = CouchClient::new(transport);

        let uuids = client.uuids(3).await.unwrap();

        assert_eq!(uuids, vec!["a", "b", "c"]);
        assert_eq!(client.transport().requests()[0].uri, "/_uuids?count=3");
    }

    #[tokio::test]
    async fn raw_does_not_interpret_status() {
        let transport = MockTransport::new().respond(Response::new(500));
        let client = CouchClient::new(transport);

        let response = client.raw(Request::get("/_up")).await.unwrap();

        assert_eq!(response.status, 500);
        assert_eq!(client.transport().methods(), vec![Method::Get]);
    }

    #[tokio::test]
    async fn dyn_client_delegates() {
        let transport = MockTransport::new()
            .respond(Response::with_json(200, &json!({ "couchdb": "Welcome" })));
        let client = CouchClient::new(transport).into_dyn();

        let status = client.status().await.unwrap();

        assert_eq!(status["couchdb"], "Welcome");
    }
}
