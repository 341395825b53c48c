//! Convenient re-exports of commonly used types from couchlayer.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use couchlayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - The client and its operation handles
//! - Transports and builders
//! - Query parameter sets
//! - Design and security documents
//! - Error types and configuration

pub use couchlayer_core::{
    client::CouchClient,
    document::{Database, WriteResult, Attachment},
    design::{DesignDocument, DesignDocuments, View, Reduce},
    security::{Security, SecurityDocument, Acknowledged},
    admin::{Admin, SystemDatabases, SystemDatabaseStatus},
    params::{QueryParameters, ParameterSchema, DocumentGetParams, DbCreateParams, DbQueryParams, UntypedParams},
    revision::{Revision, RevisionControl},
    transport::{Transport, TransportBuilder, Request, Response, Method},
    uri::UriTemplate,
    config::{ClientOptions, Credentials},
    error::{CouchError, CouchResult},
};
