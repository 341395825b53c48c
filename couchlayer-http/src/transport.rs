//! `reqwest`-backed transport.

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{CONTENT_TYPE, ETAG, HeaderMap, HeaderName},
};

use couchlayer_core::{
    config::{ClientOptions, Credentials},
    error::{CouchError, CouchResult},
    transport::{Method, Request, RequestBody, Response, Transport, TransportBuilder},
};

/// A transport that sends requests to a CouchDB server over HTTP.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
}

impl HttpTransport {
    pub fn new(client: Client, options: ClientOptions) -> Self {
        Self {
            client,
            base_url: options.base_url(),
            credentials: options.credentials,
        }
    }

    pub fn builder(options: ClientOptions) -> HttpTransportBuilder {
        HttpTransportBuilder::new(options)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn header(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> CouchResult<Response> {
        let method = match request.method {
            Method::Head => reqwest::Method::HEAD,
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let url = format!("{}{}", self.base_url, request.uri);

        tracing::trace!(method = %request.method, uri = %request.uri, "sending request");

        let mut builder = self.client.request(method, &url);

        builder = match &self.credentials {
            Some(Credentials::Basic { username, password }) => {
                builder.basic_auth(username, Some(password))
            }
            Some(Credentials::Token(token)) => builder.bearer_auth(token),
            None => builder,
        };

        builder = match request.body {
            Some(RequestBody::Json(body)) => builder.json(&body),
            Some(RequestBody::Binary { content_type, data }) => {
                builder.header(CONTENT_TYPE, content_type).body(data)
            }
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| CouchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let etag = header(response.headers(), ETAG);
        let content_type = header(response.headers(), CONTENT_TYPE);
        let body = response
            .bytes()
            .await
            .map_err(|e| CouchError::Transport(e.to_string()))?
            .to_vec();

        tracing::trace!(uri = %request.uri, status, "received response");

        Ok(Response {
            status,
            etag,
            content_type,
            body,
        })
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    options: ClientOptions,
    client: Option<Client>,
}

impl HttpTransportBuilder {
    pub fn new(options: ClientOptions) -> Self {
        Self {
            options,
            client: None,
        }
    }

    /// Uses a preconfigured `reqwest` client, e.g. one with timeouts or custom TLS roots.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }
}

#[async_trait]
impl TransportBuilder for HttpTransportBuilder {
    type Transport = HttpTransport;

    async fn build(self) -> CouchResult<Self::Transport> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .build()
                .map_err(|e| CouchError::Configuration(e.to_string()))?,
        };

        Ok(HttpTransport::new(client, self.options))
    }
}
