//! Transport abstraction for talking to a CouchDB server.
//!
//! This module defines the seam between the document operations and whatever actually moves
//! bytes over the wire: a real HTTP client, an in-process emulator, or a scripted mock.
//!
//! # Overview
//!
//! The [`Transport`] trait has a single required method, [`Transport::execute`], which takes
//! a [`Request`] and yields a [`Response`]. Any HTTP status, including 4xx and 5xx, is a
//! successful *transport* outcome; only failures to obtain a response at all (connection
//! refused, TLS errors, timeouts imposed by the underlying client) are reported as
//! [`CouchError::Transport`]. Interpreting the status is left to the caller, usually
//! through [`Response::json`] or [`Response::error`].
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync` and safe to share between tasks. Operations in this
//! crate borrow the transport immutably and hold no locks across awaits.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{fmt::{self, Debug}, sync::Arc};

use crate::{
    error::{CouchError, CouchResult},
    revision::Revision,
};

/// The HTTP methods this client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Head,
    Get,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Head => "HEAD",
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Sent as `application/json`.
    Json(Value),
    /// Sent verbatim with the given content type.
    Binary { content_type: String, data: Vec<u8> },
}

/// A request against the server, with `uri` relative to the server root.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub uri: String,
    pub body: Option<RequestBody>,
}

impl Request {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            body: None,
        }
    }

    pub fn head(uri: impl Into<String>) -> Self {
        Self::new(Method::Head, uri)
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::Get, uri)
    }

    pub fn put(uri: impl Into<String>) -> Self {
        Self::new(Method::Put, uri)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(Method::Delete, uri)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn binary(mut self, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.body = Some(RequestBody::Binary {
            content_type: content_type.into(),
            data,
        });
        self
    }
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    pub status: u16,
    /// The raw `ETag` header, quotes included.
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// A response carrying a JSON body.
    pub fn with_json(status: u16, body: &Value) -> Self {
        Self {
            status,
            etag: None,
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
        }
    }

    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The revision carried in the `ETag` header.
    pub fn revision(&self) -> Option<Revision> {
        self.etag.as_deref().map(Revision::from_etag)
    }

    /// The error this response represents, if it is not a success.
    pub fn error(&self) -> Option<CouchError> {
        (!self.is_success()).then(|| CouchError::from_status(self.status, &self.body))
    }

    /// Fails with the mapped error unless the status is 2xx.
    pub fn error_for_status(self) -> CouchResult<Self> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self),
        }
    }

    /// Decodes a 2xx JSON body.
    pub fn json<T: DeserializeOwned>(self) -> CouchResult<T> {
        let response = self.error_for_status()?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Returns a 2xx body as raw bytes.
    pub fn bytes(self) -> CouchResult<Vec<u8>> {
        Ok(self.error_for_status()?.body)
    }
}

/// Abstract interface for moving requests to a CouchDB-compatible server.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Sends `request` and waits for the response.
    ///
    /// Returns `Err` only when no HTTP response was obtained.
    async fn execute(&self, request: Request) -> CouchResult<Response>;

    /// `HEAD uri`
    async fn head(&self, uri: &str) -> CouchResult<Response> {
        self.execute(Request::head(uri)).await
    }

    /// `GET uri`
    async fn get(&self, uri: &str) -> CouchResult<Response> {
        self.execute(Request::get(uri)).await
    }

    /// `PUT uri` with an optional JSON body.
    async fn put_json(&self, uri: &str, body: Option<Value>) -> CouchResult<Response> {
        let request = Request::put(uri);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };

        self.execute(request).await
    }

    /// `DELETE uri`
    async fn delete(&self, uri: &str) -> CouchResult<Response> {
        self.execute(Request::delete(uri)).await
    }

    /// Releases transport resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> CouchResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<T> Transport for &T
where
    T: Transport + ?Sized,
{
    async fn execute(&self, request: Request) -> CouchResult<Response> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn execute(&self, request: Request) -> CouchResult<Response> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl Transport for Box<dyn Transport> {
    async fn execute(&self, request: Request) -> CouchResult<Response> {
        (**self).execute(request).await
    }
}

/// Factory trait for creating transport instances.
#[async_trait]
pub trait TransportBuilder {
    type Transport: Transport;

    async fn build(self) -> CouchResult<Self::Transport>;
}
