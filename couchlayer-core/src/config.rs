//! Connection settings.

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{CouchError, CouchResult};

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5984
}

/// How to authenticate against the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credentials {
    Basic { username: String, password: String },
    Token(String),
}

impl Credentials {
    /// Picks credentials from optional parts.
    ///
    /// A complete username/password pair wins over a token. Fails when neither is given.
    pub fn from_parts(
        username: Option<String>,
        password: Option<String>,
        token: Option<String>,
    ) -> CouchResult<Self> {
        match (username, password, token) {
            (Some(username), Some(password), _) => Ok(Credentials::Basic { username, password }),
            (_, _, Some(token)) => Ok(Credentials::Token(token)),
            _ => Err(CouchError::Configuration(
                "either a username and password or a token is required".to_string(),
            )),
        }
    }
}

/// Where and how to reach the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub https: bool,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            https: false,
            credentials: None,
        }
    }
}

impl ClientOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_https(mut self, https: bool) -> Self {
        self.https = https;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Loads options from `COUCHDB_HOST`, `COUCHDB_PORT`, `COUCHDB_HTTPS`, `COUCHDB_USER`,
    /// `COUCHDB_PASSWORD` and `COUCHDB_TOKEN`.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads options through `lookup`, using the same keys as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> CouchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("COUCHDB_HOST").unwrap_or_else(default_host);

        let port = match lookup("COUCHDB_PORT") {
            Some(port) => port.parse().map_err(|_| {
                CouchError::Configuration(format!("Invalid COUCHDB_PORT value: {port}"))
            })?,
            None => default_port(),
        };

        let https = match lookup("COUCHDB_HTTPS") {
            Some(flag) => parse_flag(&flag).ok_or_else(|| {
                CouchError::Configuration(format!("Invalid COUCHDB_HTTPS value: {flag}"))
            })?,
            None => false,
        };

        let user = lookup("COUCHDB_USER");
        let password = lookup("COUCHDB_PASSWORD");
        let token = lookup("COUCHDB_TOKEN");

        let credentials = if user.is_none() && password.is_none() && token.is_none() {
            None
        } else {
            Some(Credentials::from_parts(user, password, token)?)
        };

        Ok(Self {
            host,
            port,
            https,
            credentials,
        })
    }

    /// `http(s)://host:port`
    pub fn base_url(&self) -> String {
        let scheme = if self.https { "https" } else { "http" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let options = ClientOptions::from_lookup(lookup(&[])).unwrap();

        assert_eq!(options, ClientOptions::default());
        assert_eq!(options.base_url(), "http://localhost:5984");
    }

    #[test]
    fn reads_all_keys() {
        let options = ClientOptions::from_lookup(lookup(&[
            ("COUCHDB_HOST", "couch.internal"),
            ("COUCHDB_PORT", "6984"),
            ("COUCHDB_HTTPS", "true"),
            ("COUCHDB_USER", "admin"),
            ("COUCHDB_PASSWORD", "secret"),
        ]))
        .unwrap();

        assert_eq!(options.base_url(), "https://couch.internal:6984");
        assert_eq!(
            options.credentials,
            Some(Credentials::Basic {
                username: "admin".into(),
                password: "secret".into()
            })
        );
    }

    #[test]
    fn token_is_used_without_password() {
        let options = ClientOptions::from_lookup(lookup(&[
            ("COUCHDB_USER", "admin"),
            ("COUCHDB_TOKEN", "abc"),
        ]))
        .unwrap();

        assert_eq!(options.credentials, Some(Credentials::Token("abc".into())));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ClientOptions::from_lookup(lookup(&[("COUCHDB_PORT", "not-a-port")])),
            Err(CouchError::Configuration(_))
        ));
        assert!(matches!(
            ClientOptions::from_lookup(lookup(&[("COUCHDB_HTTPS", "maybe")])),
            Err(CouchError::Configuration(_))
        ));
        assert!(matches!(
            ClientOptions::from_lookup(lookup(&[("COUCHDB_USER", "admin")])),
            Err(CouchError::Configuration(_))
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let options: ClientOptions =
            serde_json::from_str(r#"{ "credentials": { "token": "abc" } }"#).unwrap();

        assert_eq!(options.host, "localhost");
        assert_eq!(options.port, 5984);
        assert_eq!(options.credentials, Some(Credentials::Token("abc".into())));
    }
}
