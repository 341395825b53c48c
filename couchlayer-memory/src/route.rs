//! Request URI parsing for the emulator.

use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::collections::BTreeMap;

/// The resource a request URI addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    Session,
    Uuids,
    AllDbs,
    DbsInfo,
    ActiveTasks,
    Database(String),
    Security(String),
    DesignDocs(String),
    Document { db: String, id: String },
    Attachment { db: String, id: String, name: String },
    Unknown(String),
}

/// Decoded query string parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    values: BTreeMap<String, String>,
}

impl QueryString {
    pub fn parse(query: &str) -> Self {
        let values = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((name, value)) => (decode(name), decode(value)),
                None => (decode(pair), String::new()),
            })
            .collect();

        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// The parameter decoded as JSON, falling back to a plain string.
    pub fn json(&self, name: &str) -> Option<Value> {
        self.get(name).map(|raw| {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
        })
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.json(name).and_then(|value| value.as_bool())
    }

    pub fn number(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(|raw| raw.parse().ok())
    }

    /// The parameter as a JSON string key, e.g. `startkey="abc"`.
    pub fn key(&self, name: &str) -> Option<String> {
        self.json(name).map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

/// Splits a request URI into its route and query string.
pub fn parse(uri: &str) -> (Route, QueryString) {
    let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(decode)
        .collect();

    let route = match segments.as_slice() {
        [] => Route::Root,
        [endpoint] if endpoint == "_session" => Route::Session,
        [endpoint] if endpoint == "_uuids" => Route::Uuids,
        [endpoint] if endpoint == "_all_dbs" => Route::AllDbs,
        [endpoint] if endpoint == "_dbs_info" => Route::DbsInfo,
        [endpoint] if endpoint == "_active_tasks" => Route::ActiveTasks,
        [db] => Route::Database(db.clone()),
        [db, endpoint] if endpoint == "_security" => Route::Security(db.clone()),
        [db, endpoint] if endpoint == "_design_docs" => Route::DesignDocs(db.clone()),
        [db, prefix, name] if prefix == "_design" => Route::Document {
            db: db.clone(),
            id: format!("_design/{name}"),
        },
        [db, prefix, name, attachment] if prefix == "_design" => Route::Attachment {
            db: db.clone(),
            id: format!("_design/{name}"),
            name: attachment.clone(),
        },
        [db, id] => Route::Document {
            db: db.clone(),
            id: id.clone(),
        },
        [db, id, name] => Route::Attachment {
            db: db.clone(),
            id: id.clone(),
            name: name.clone(),
        },
        _ => Route::Unknown(path.to_string()),
    };

    (route, QueryString::parse(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_endpoints() {
        assert_eq!(parse("/").0, Route::Root);
        assert_eq!(parse("/_uuids?count=3").0, Route::Uuids);
        assert_eq!(parse("/_all_dbs").0, Route::AllDbs);
    }

    #[test]
    fn encoded_design_document_ids_resolve_to_the_same_document() {
        let expected = Route::Document {
            db: "db".into(),
            id: "_design/recipes".into(),
        };

        assert_eq!(parse("/db/_design/recipes").0, expected);
        assert_eq!(parse("/db/_design%2Frecipes").0, expected);
    }

    #[test]
    fn attachments_and_database_names_are_decoded() {
        assert_eq!(
            parse("/a%2Fb/doc/note%20one.txt").0,
            Route::Attachment {
                db: "a/b".into(),
                id: "doc".into(),
                name: "note one.txt".into()
            }
        );
    }

    #[test]
    fn query_values() {
        let (_, query) = parse("/_all_dbs?descending=true&limit=2&startkey=%22b%22&rev=1-abc");

        assert_eq!(query.flag("descending"), Some(true));
        assert_eq!(query.number("limit"), Some(2));
        assert_eq!(query.key("startkey").as_deref(), Some("b"));
        assert_eq!(query.get("rev"), Some("1-abc"));
    }
}
