//! Document operations on a single database.
//!
//! A [`Database`] is a lightweight handle: a database name plus a borrowed transport. It
//! holds no cached state, so every read goes to the server.
//!
//! # Example
//!
//! ```ignore
//! use couchlayer::prelude::*;
//! use serde_json::json;
//!
//! let db = client.database("recipes");
//! let created = db.create("recipe_123", json!({ "name": "Spaghetti" })).await?;
//!
//! let updated = db
//!     .update("recipe_123", &created.rev, json!({ "name": "Spaghetti with meatballs" }))
//!     .await?;
//!
//! db.delete("recipe_123", &updated.rev, false).await?;
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    design::DesignDocuments,
    error::CouchResult,
    params::{DocumentGetParams, UntypedParams},
    revision::{Revision, RevisionControl},
    security::Security,
    transport::{Request, Transport},
    uri::UriTemplate,
};

/// The server's answer to a successful document write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub ok: bool,
    pub id: String,
    pub rev: Revision,
}

/// Raw attachment content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// A handle to one database.
#[derive(Debug)]
pub struct Database<'a, T: Transport> {
    name: String,
    transport: &'a T,
}

impl<'a, T: Transport> Database<'a, T> {
    /// Creates a new database handle (internal use).
    pub(crate) fn new(name: String, transport: &'a T) -> Self {
        Self { name, transport }
    }

    /// Returns the name of this database.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn revisions(&self) -> RevisionControl<'a, T> {
        RevisionControl::new(self.transport)
    }

    fn document(&self, doc_id: &str) -> UriTemplate {
        UriTemplate::database_document(&self.name, doc_id)
    }

    /// Returns the database information document (`GET /{db}`).
    pub async fn info(&self) -> CouchResult<Value> {
        self.transport
            .get(&UriTemplate::database(&self.name).expand_plain())
            .await?
            .json()
    }

    /// `true` when the database exists.
    pub async fn exists(&self) -> CouchResult<bool> {
        self.revisions()
            .exists(&UriTemplate::database(&self.name))
            .await
    }

    /// Creates a new document.
    ///
    /// # Errors
    ///
    /// - [`CouchError::AlreadyExists`](crate::error::CouchError::AlreadyExists) if a probe
    ///   finds the document; nothing is written.
    /// - [`CouchError::Conflict`](crate::error::CouchError::Conflict) if another writer
    ///   created it between the probe and the write.
    pub async fn create(&self, doc_id: &str, body: Value) -> CouchResult<WriteResult> {
        tracing::debug!(db = %self.name, doc_id, "creating document");

        let result = self
            .revisions()
            .create(&self.document(doc_id), Some(body))
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    /// Replaces a document, provided `rev` is its current revision.
    ///
    /// # Errors
    ///
    /// - [`CouchError::Validation`](crate::error::CouchError::Validation) if `body` carries
    ///   a `_rev` different from `rev`; nothing is sent.
    /// - [`CouchError::Conflict`](crate::error::CouchError::Conflict) if `rev` is stale.
    /// - [`CouchError::NotFound`](crate::error::CouchError::NotFound) if the document is absent.
    pub async fn update(
        &self,
        doc_id: &str,
        rev: &Revision,
        body: Value,
    ) -> CouchResult<WriteResult> {
        tracing::debug!(db = %self.name, doc_id, %rev, "updating document");

        let result = self
            .revisions()
            .update(&self.document(doc_id), rev, body)
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    /// Writes a document without probing first.
    ///
    /// When the body has a `_rev` it is sent as the `rev` parameter, so this creates new
    /// documents and updates existing ones, leaving the revision check to the server.
    pub async fn create_or_update(&self, doc_id: &str, body: Value) -> CouchResult<WriteResult> {
        let params = match Revision::from_body(&body) {
            Some(rev) => UntypedParams::new().force("rev", rev.into_inner()),
            None => UntypedParams::new(),
        };

        self.transport
            .execute(Request::put(self.document(doc_id).expand(&params)).json(body))
            .await?
            .json()
    }

    /// Fetches a document as JSON.
    pub async fn get(&self, doc_id: &str, options: &DocumentGetParams) -> CouchResult<Value> {
        self.transport
            .get(&self.document(doc_id).expand(options))
            .await?
            .json()
    }

    /// Fetches a document and deserializes it into `D`.
    pub async fn get_as<D: DeserializeOwned>(
        &self,
        doc_id: &str,
        options: &DocumentGetParams,
    ) -> CouchResult<D> {
        Ok(serde_json::from_value(self.get(doc_id, options).await?)?)
    }

    /// The current revision of a document, from a `HEAD` request.
    pub async fn revision(&self, doc_id: &str) -> CouchResult<Revision> {
        self.revisions().current(&self.document(doc_id)).await
    }

    /// Fetches an attachment body, optionally at a specific document revision.
    pub async fn get_attachment(
        &self,
        doc_id: &str,
        name: &str,
        rev: Option<&Revision>,
    ) -> CouchResult<Attachment> {
        let params = match rev {
            Some(rev) => UntypedParams::new().force("rev", rev.as_str()),
            None => UntypedParams::new(),
        };
        let uri = UriTemplate::attachment(&self.name, doc_id, name).expand(&params);

        let response = self.transport.get(&uri).await?.error_for_status()?;

        Ok(Attachment {
            content_type: response.content_type,
            data: response.body,
        })
    }

    /// Uploads an attachment to the document revision `rev`.
    pub async fn put_attachment(
        &self,
        doc_id: &str,
        name: &str,
        rev: &Revision,
        content_type: &str,
        data: Vec<u8>,
    ) -> CouchResult<WriteResult> {
        let params = UntypedParams::new().force("rev", rev.as_str());
        let uri = UriTemplate::attachment(&self.name, doc_id, name).expand(&params);

        self.transport
            .execute(Request::put(uri).binary(content_type, data))
            .await?
            .json()
    }

    /// Deletes a document.
    ///
    /// With `force`, the current revision is looked up and used regardless of `rev`.
    pub async fn delete(&self, doc_id: &str, rev: &Revision, force: bool) -> CouchResult<WriteResult> {
        tracing::debug!(db = %self.name, doc_id, %rev, force, "deleting document");

        let result = self
            .revisions()
            .delete(&self.document(doc_id), rev, force)
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    /// Design document operations on this database.
    pub fn design_documents(&self) -> DesignDocuments<'a, T> {
        DesignDocuments::new(self.name.clone(), self.transport)
    }

    /// Security document operations on this database.
    pub fn security(&self) -> Security<'a, T> {
        Security::new(self.name.clone(), self.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::CouchError,
        testing::MockTransport,
        transport::{Method, RequestBody, Response},
    };
    use serde_json::json;

    fn write_ok(rev: &str) -> Response {
        Response::with_json(201, &json!({ "ok": true, "id": "recipe_123", "rev": rev }))
    }

    #[tokio::test]
    async fn create_returns_write_result() {
        let transport = MockTransport::new()
            .respond(Response::new(404))
            .respond(write_ok("1-abc"));
        let db = Database::new("test_db".into(), &transport);

        let result = db
            .create("recipe_123", json!({ "name": "Spaghetti with meatballs" }))
            .await
            .unwrap();

        assert!(result.ok);
        assert_eq!(result.id, "recipe_123");
        assert_eq!(result.rev, Revision::new("1-abc"));
    }

    #[tokio::test]
    async fn create_on_existing_document_issues_no_put() {
        let transport = MockTransport::new().respond(Response::new(200).etag("\"1-abc\""));
        let db = Database::new("test_db".into(), &transport);

        let err = db.create("recipe_123", json!({})).await.unwrap_err();

        assert!(matches!(err, CouchError::AlreadyExists(_)));
        assert!(!transport.methods().contains(&Method::Put));
    }

    #[tokio::test]
    async fn get_sends_typed_options() {
        let transport = MockTransport::new().respond(Response::with_json(
            200,
            &json!({ "_id": "recipe_123", "_rev": "1-abc", "name": "Spaghetti" }),
        ));
        let db = Database::new("test_db".into(), &transport);

        let doc = db
            .get("recipe_123", &DocumentGetParams::new().conflicts(true))
            .await
            .unwrap();

        assert_eq!(doc["name"], "Spaghetti");
        assert_eq!(
            transport.requests()[0].uri,
            "/test_db/recipe_123?attachments=false&conflicts=true"
        );
    }

    #[tokio::test]
    async fn get_missing_document_is_not_found() {
        let transport = MockTransport::new().respond(Response::with_json(
            404,
            &json!({ "error": "not_found", "reason": "missing" }),
        ));
        let db = Database::new("test_db".into(), &transport);

        let err = db.get("nope", &DocumentGetParams::new()).await.unwrap_err();

        assert_eq!(err, CouchError::NotFound("not_found - missing".into()));
    }

    #[tokio::test]
    async fn transport_failures_pass_through() {
        let transport = MockTransport::new().fail("Failed to create document");
        let db = Database::new("test_db".into(), &transport);

        let err = db.create_or_update("recipe_123", json!({})).await.unwrap_err();

        assert_eq!(err, CouchError::Transport("Failed to create document".into()));
    }

    #[tokio::test]
    async fn create_or_update_forwards_body_revision() {
        let transport = MockTransport::new().respond(write_ok("2-def"));
        let db = Database::new("test_db".into(), &transport);

        db.create_or_update("recipe_123", json!({ "_rev": "1-abc" }))
            .await
            .unwrap();

        assert_eq!(transport.requests()[0].uri, "/test_db/recipe_123?rev=1-abc");
    }

    #[tokio::test]
    async fn attachment_round_trip_requests() {
        let mut attachment = Response::new(200);
        attachment.content_type = Some("text/plain".into());
        attachment.body = b"hello".to_vec();

        let transport = MockTransport::new()
            .respond(write_ok("2-def"))
            .respond(attachment);
        let db = Database::new("test_db".into(), &transport);

        db.put_attachment("recipe_123", "note.txt", &Revision::new("1-abc"), "text/plain", b"hello".to_vec())
            .await
            .unwrap();
        let fetched = db
            .get_attachment("recipe_123", "note.txt", Some(&Revision::new("2-def")))
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].uri, "/test_db/recipe_123/note.txt?rev=1-abc");
        assert!(matches!(requests[0].body, Some(RequestBody::Binary { .. })));
        assert_eq!(requests[1].uri, "/test_db/recipe_123/note.txt?rev=2-def");
        assert_eq!(fetched.data, b"hello");
        assert_eq!(fetched.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn delete_returns_new_revision() {
        let transport = MockTransport::new()
            .respond(Response::new(200).etag("\"1-abc\""))
            .respond(Response::with_json(200, &json!({ "ok": true, "id": "recipe_123", "rev": "2-del" })));
        let db = Database::new("test_db".into(), &transport);

        let result = db
            .delete("recipe_123", &Revision::new("1-abc"), false)
            .await
            .unwrap();

        assert_eq!(result.rev, Revision::new("2-del"));
    }
}
