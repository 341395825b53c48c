//! A client-side access layer for CouchDB-compatible document databases.
//!
//! This crate is the core of the couchlayer project and provides:
//!
//! - **Query parameters** ([`params`]) - Whitelisted, typed parameter sets per endpoint
//! - **URI templates** ([`uri`]) - Resource paths with escaped segments and `{?query*}` expansion
//! - **Revisions** ([`revision`]) - Revision tokens and the probe-then-write concurrency protocol
//! - **Transport abstraction** ([`transport`]) - The request/response seam to the server
//! - **Documents** ([`document`]) - Document and attachment operations on one database
//! - **Design documents** ([`design`]) - View definitions and their storage
//! - **Security** ([`security`]) - Per-database admins and members
//! - **Administration** ([`admin`]) - Database creation and system databases
//! - **Client** ([`client`]) - The entry point tying the above to a transport
//! - **Configuration** ([`config`]) - Connection settings
//! - **Error handling** ([`error`]) - The error and result types
//!
//! # Example
//!
//! ```ignore
//! use couchlayer_core::{client::CouchClient, params::DocumentGetParams};
//! use serde_json::json;
//!
//! let client = CouchClient::new(transport);
//! let db = client.database("recipes");
//!
//! let created = db.create("recipe_123", json!({ "name": "Spaghetti" })).await?;
//! let doc = db.get("recipe_123", &DocumentGetParams::new()).await?;
//! ```

pub mod admin;
pub mod client;
pub mod config;
pub mod design;
pub mod document;
pub mod error;
pub mod params;
pub mod revision;
pub mod security;
pub mod transport;
pub mod uri;

#[cfg(test)]
mod testing;
