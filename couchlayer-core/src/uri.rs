//! URI templates for CouchDB resources.
//!
//! Every constructor returns a [`UriTemplate`] whose path variables are already expanded and
//! escaped, followed by the `{?query*}` placeholder. Path segments go through template
//! expansion, so reserved characters such as `/` inside a document id are percent-encoded
//! instead of being concatenated into the path.
//!
//! ```ignore
//! use couchlayer::uri::UriTemplate;
//! use couchlayer::params::DbCreateParams;
//!
//! let template = UriTemplate::database("test2");
//! assert_eq!(template.as_str(), "/test2{?query*}");
//! assert_eq!(template.expand(&DbCreateParams::new().replicas(7)), "/test2?n=7");
//! ```

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::{collections::BTreeMap, fmt};

use crate::params::{ParameterSchema, QueryParameters};

/// The query placeholder appended to every template.
pub const QUERY: &str = "{?query*}";

/// Everything outside RFC 3986 `unreserved` is encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// A resource path with a trailing `{?query*}` expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UriTemplate {
    path: String,
}

impl UriTemplate {
    /// Expands the `{name}` expressions of `raw` with `variables`.
    ///
    /// Undefined variables expand to nothing. Text outside expressions is kept as is.
    pub fn with_variables(raw: &str, variables: &[(&str, &str)]) -> Self {
        let mut path = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            path.push_str(&rest[..open]);

            match rest[open..].find('}') {
                Some(close) => {
                    let name = &rest[open + 1..open + close];
                    if let Some((_, value)) = variables.iter().find(|(n, _)| *n == name) {
                        path.push_str(&encode(value));
                    }
                    rest = &rest[open + close + 1..];
                }
                None => {
                    path.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        path.push_str(rest);

        Self { path }
    }

    /// `/`
    pub fn root() -> Self {
        Self::with_variables("/", &[])
    }

    /// A literal server endpoint such as `/_all_dbs`.
    pub fn server(path: &str) -> Self {
        Self {
            path: path.to_string(),
        }
    }

    /// `/{database}`
    pub fn database(db: &str) -> Self {
        Self::with_variables("/{database}", &[("database", db)])
    }

    /// `/{database}/{documentId}`
    pub fn database_document(db: &str, doc_id: &str) -> Self {
        Self::with_variables(
            "/{database}/{documentId}",
            &[("database", db), ("documentId", doc_id)],
        )
    }

    /// `/{database}/_security`
    pub fn database_security(db: &str) -> Self {
        Self::with_variables("/{database}/_security", &[("database", db)])
    }

    /// `/{database}/_design/{designDoc}`
    pub fn database_design_doc(db: &str, name: &str) -> Self {
        Self::with_variables(
            "/{database}/_design/{designDoc}",
            &[("database", db), ("designDoc", name)],
        )
    }

    /// `/{database}/_design_docs`
    pub fn database_design_docs(db: &str) -> Self {
        Self::with_variables("/{database}/_design_docs", &[("database", db)])
    }

    /// `/{database}/{documentId}/{attachmentName}`
    pub fn attachment(db: &str, doc_id: &str, attachment: &str) -> Self {
        Self::with_variables(
            "/{database}/{documentId}/{attachmentName}",
            &[
                ("database", db),
                ("documentId", doc_id),
                ("attachmentName", attachment),
            ],
        )
    }

    /// The expanded path, without the query expression.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The template text, including `{?query*}`.
    pub fn as_str(&self) -> String {
        format!("{}{QUERY}", self.path)
    }

    /// Expands the query expression with the given parameters.
    pub fn expand<S: ParameterSchema>(&self, params: &QueryParameters<S>) -> String {
        self.expand_with(&params.for_template())
    }

    /// Expands the query expression with a prepared variable map.
    pub fn expand_with(&self, query: &BTreeMap<String, String>) -> String {
        if query.is_empty() {
            return self.path.clone();
        }

        let rendered = query
            .iter()
            .map(|(name, value)| format!("{}={}", encode(name), encode(value)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{rendered}", self.path)
    }

    /// Expands without any query parameters.
    pub fn expand_plain(&self) -> String {
        self.path.clone()
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{QUERY}", self.path)
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, UNRESERVED).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{DbCreateParams, DbQueryParams, UntypedParams};

    #[test]
    fn database_template() {
        let template = UriTemplate::database("test");

        assert_eq!(template.as_str(), "/test{?query*}");
        assert_eq!(template.expand_plain(), "/test");
    }

    #[test]
    fn database_template_with_params() {
        let template = UriTemplate::database("test2");
        let params = DbCreateParams::new().replicas(7);

        assert_eq!(template.expand(&params), "/test2?n=7");
    }

    #[test]
    fn document_template() {
        assert_eq!(UriTemplate::database_document("test", "123").expand_plain(), "/test/123");
    }

    #[test]
    fn path_segments_are_escaped() {
        assert_eq!(UriTemplate::database("a/b$c").path(), "/a%2Fb%24c");
        assert_eq!(
            UriTemplate::database_document("db", "_design/x y").path(),
            "/db/_design%2Fx%20y"
        );
        assert_eq!(
            UriTemplate::attachment("db", "doc", "café.png").path(),
            "/db/doc/caf%C3%A9.png"
        );
    }

    #[test]
    fn design_and_security_templates() {
        assert_eq!(UriTemplate::database_design_doc("db", "views").path(), "/db/_design/views");
        assert_eq!(UriTemplate::database_security("db").path(), "/db/_security");
        assert_eq!(UriTemplate::database_design_docs("db").path(), "/db/_design_docs");
    }

    #[test]
    fn query_values_are_percent_encoded() {
        let params = DbQueryParams::new().startkey("a b").limit(2);

        assert_eq!(
            UriTemplate::server("/_all_dbs").expand(&params),
            "/_all_dbs?limit=2&startkey=%22a%20b%22"
        );
    }

    #[test]
    fn undefined_variables_expand_to_nothing() {
        let template = UriTemplate::with_variables("/{database}/{missing}", &[("database", "db")]);
        assert_eq!(template.path(), "/db/");
    }

    #[test]
    fn empty_params_leave_no_question_mark() {
        let template = UriTemplate::root();
        assert_eq!(template.expand(&UntypedParams::new()), "/");
    }
}
