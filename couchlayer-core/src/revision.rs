//! Revision tokens and the optimistic concurrency protocol.
//!
//! CouchDB rejects any write that does not present the revision it is based on. This module
//! reproduces that model at the client boundary using only `HEAD` probes followed by a
//! single `PUT` or `DELETE`:
//!
//! - **create**: `HEAD` the target. A 2xx means it exists and the call fails with
//!   [`CouchError::AlreadyExists`] without writing. Any other status counts as absent and the
//!   body is `PUT` without a revision. A 412 answer to that `PUT` is reported as
//!   [`CouchError::AlreadyExists`] too.
//! - **update**: the body's own `_rev`, if any, must equal the given revision (checked before
//!   anything is sent). The `ETag` from a `HEAD` must equal it too, otherwise
//!   [`CouchError::Conflict`]. Then the body is `PUT` with `rev` in the query.
//! - **delete**: `HEAD` for the `ETag`; when forced or when it matches, `DELETE` with the
//!   fetched `ETag` as `rev`, otherwise [`CouchError::Conflict`].
//!
//! The probe and the write are two requests. Another client can write in between, and only
//! the server's own revision check decides the outcome in that case: a stale write comes
//! back as 409 and surfaces as [`CouchError::Conflict`]. Nothing here retries, and no
//! client-side lock is taken since it could not cover other processes anyway.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::{
    error::{CouchError, CouchResult},
    params::{ParameterSchema, QueryParameters, UntypedParams},
    transport::{Request, Transport},
    uri::UriTemplate,
};

/// An opaque revision token (`N-hash`), as found in `_rev` fields and `ETag` headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(rev: impl Into<String>) -> Self {
        Self(rev.into())
    }

    /// Parses an `ETag` header value, dropping the surrounding quotes.
    pub fn from_etag(etag: &str) -> Self {
        let trimmed = etag.trim();
        let trimmed = trimmed.strip_prefix("W/").unwrap_or(trimmed);

        Self(trimmed.trim_matches('"').to_string())
    }

    /// The `_rev` field of a document body, if it is a string.
    pub fn from_body(body: &Value) -> Option<Self> {
        body.get("_rev").and_then(Value::as_str).map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// The numeric prefix of the token, if it has the `N-hash` form.
    pub fn generation(&self) -> Option<u64> {
        self.0.split_once('-').and_then(|(n, _)| n.parse().ok())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Revision {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Revision {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Revision {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Runs the probe-then-write protocol against one transport.
#[derive(Debug)]
pub struct RevisionControl<'a, T: Transport> {
    transport: &'a T,
}

impl<'a, T: Transport> RevisionControl<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// `HEAD` the resource: its revision on 2xx, `None` on any other status.
    pub async fn probe(&self, template: &UriTemplate) -> CouchResult<Option<Revision>> {
        let response = self.transport.head(&template.expand_plain()).await?;

        if !response.is_success() {
            tracing::trace!(uri = template.path(), status = response.status, "probe found nothing");
            return Ok(None);
        }

        Ok(Some(response.revision().unwrap_or_else(|| Revision::new(""))))
    }

    /// `true` when a `HEAD` on the resource succeeds.
    pub async fn exists(&self, template: &UriTemplate) -> CouchResult<bool> {
        Ok(self.probe(template).await?.is_some())
    }

    /// The current revision of an existing resource.
    ///
    /// Fails with the status-derived error when the `HEAD` is not a success, and with
    /// [`CouchError::InvalidResponse`] when it carries no `ETag`.
    pub async fn current(&self, template: &UriTemplate) -> CouchResult<Revision> {
        let response = self
            .transport
            .head(&template.expand_plain())
            .await?
            .error_for_status()?;

        response.revision().ok_or_else(|| {
            CouchError::InvalidResponse(format!("No ETag returned for {}", template.path()))
        })
    }

    /// Creates the resource at `template` unless a probe finds it.
    pub async fn create(&self, template: &UriTemplate, body: Option<Value>) -> CouchResult<Value> {
        self.create_with(template, &UntypedParams::new(), body).await
    }

    /// Like [`create`](Self::create), sending `params` with the `PUT`.
    pub async fn create_with<S: ParameterSchema>(
        &self,
        template: &UriTemplate,
        params: &QueryParameters<S>,
        body: Option<Value>,
    ) -> CouchResult<Value> {
        if self.exists(template).await? {
            tracing::debug!(uri = template.path(), "resource exists, skipping create");
            return Err(CouchError::AlreadyExists(template.path().to_string()));
        }

        let response = self.transport.put_json(&template.expand(params), body).await?;

        if response.status == 412 {
            tracing::debug!(uri = template.path(), "server reports resource exists");
            return Err(CouchError::AlreadyExists(CouchError::status_message(
                response.status,
                &response.body,
            )));
        }

        response.json()
    }

    /// Replaces the resource at `template`, provided `rev` is still current.
    pub async fn update(
        &self,
        template: &UriTemplate,
        rev: &Revision,
        body: Value,
    ) -> CouchResult<Value> {
        if let Some(embedded) = Revision::from_body(&body) {
            if &embedded != rev {
                return Err(CouchError::Validation(format!(
                    "Document revision {embedded} does not match {rev}"
                )));
            }
        }

        let current = self.current(template).await?;
        if &current != rev {
            tracing::debug!(uri = template.path(), %current, %rev, "stale revision on update");
            return Err(CouchError::Conflict(format!(
                "Revision {rev} is not current ({current})"
            )));
        }

        let params = UntypedParams::new().force("rev", rev.as_str());

        self.transport
            .execute(Request::put(template.expand(&params)).json(body))
            .await?
            .json()
    }

    /// Deletes the resource at `template` when `rev` is current or `force` is set.
    pub async fn delete(
        &self,
        template: &UriTemplate,
        rev: &Revision,
        force: bool,
    ) -> CouchResult<Value> {
        let current = self.current(template).await?;

        if !force && &current != rev {
            tracing::debug!(uri = template.path(), %current, %rev, "stale revision on delete");
            return Err(CouchError::Conflict(format!(
                "Revision {rev} is not current ({current})"
            )));
        }

        let params = UntypedParams::new().force("rev", current.as_str());

        self.transport
            .delete(&template.expand(&params))
            .await?
            .json()
    }
}
