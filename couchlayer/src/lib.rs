//! Main couchlayer crate providing a client for CouchDB-compatible document databases.
//!
//! This crate is the primary entry point for users of couchlayer. It re-exports the core
//! types and functionality from the sub-crates and provides access to the transports.
//!
//! # Features
//!
//! - **Optimistic concurrency at the client boundary** - Creates, updates and deletes check
//!   revisions before writing and surface conflicts as typed errors
//! - **Typed query parameters** - Each endpoint accepts only the parameters it knows
//! - **Design and security documents** - Structured views and access lists
//! - **Pluggable transports** - An in-memory emulator and an HTTP client behind one trait
//!
//! # Quick Start
//!
//! ```ignore
//! use couchlayer::{prelude::*, memory::InMemoryCouch};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = CouchClient::new(InMemoryCouch::builder().build().await.unwrap());
//!
//!     // Create a database; missing sharding options get server defaults
//!     let db = client
//!         .admin()
//!         .create_db("recipes", DbCreateParams::new())
//!         .await
//!         .unwrap();
//!
//!     // Create, then update from the returned revision
//!     let created = db
//!         .create("recipe_123", json!({ "name": "Spaghetti" }))
//!         .await
//!         .unwrap();
//!     let updated = db
//!         .update("recipe_123", &created.rev, json!({ "name": "Spaghetti with meatballs" }))
//!         .await
//!         .unwrap();
//!
//!     // A second update from the old revision is refused
//!     let err = db
//!         .update("recipe_123", &created.rev, json!({ "name": "Lasagna" }))
//!         .await
//!         .unwrap_err();
//!     assert!(matches!(err, CouchError::Conflict(_)));
//!
//!     db.delete("recipe_123", &updated.rev, false).await.unwrap();
//!     client.shutdown().await.unwrap();
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! When the transport is chosen at runtime, erase its type with
//! [`CouchClient::into_dyn`](couchlayer_core::client::CouchClient::into_dyn):
//!
//! ```ignore
//! use couchlayer::{prelude::*, memory::InMemoryCouch};
//!
//! let client: CouchClient<Box<dyn Transport>> = CouchClient::new(InMemoryCouch::new()).into_dyn();
//! ```
//!
//! # Transports
//!
//! - [`memory`] - In-memory CouchDB emulator for development and testing
//! - [`http`] - HTTP client for real servers (requires `http` feature)

pub mod prelude;

pub use couchlayer_core::{admin, client, config, design, document, error, params, revision, security, transport, uri};

// Re-export JSON types for convenience
pub use serde_json;

/// In-memory transport implementations.
pub mod memory {
    pub use couchlayer_memory::{InMemoryCouch, InMemoryCouchBuilder};
}

/// HTTP transport implementations.
///
/// This module is only available when the `http` feature is enabled.
#[cfg(feature = "http")]
pub mod http {
    pub use couchlayer_http::{HttpTransport, HttpTransportBuilder};
}
