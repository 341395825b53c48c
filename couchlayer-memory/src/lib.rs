//! In-memory CouchDB emulator for couchlayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `Transport` trait that
//! behaves like a single CouchDB node. It is intended for development and tests, where a
//! real server is unavailable or unwanted.
//!
//! # Features
//!
//! - **Revision control** - Every write is checked against the current revision and answered
//!   with `409 conflict` when stale, atomically under an async-aware lock
//! - **Databases** - Creation with name validation, deletion, info and listings
//! - **Documents** - CRUD with `ETag` headers, tombstones, design documents and attachments
//! - **Security** - Per-database security documents
//!
//! # Quick Start
//!
//! ```ignore
//! use couchlayer::{prelude::*, memory::InMemoryCouch};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CouchClient::new(InMemoryCouch::builder().build().await?);
//!
//!     let db = client.admin().create_db("recipes", DbCreateParams::new()).await?;
//!     db.create("recipe_123", json!({ "name": "Spaghetti" })).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as couchlayer_memory;

pub mod route;
pub mod store;

pub use store::{InMemoryCouch, InMemoryCouchBuilder};
