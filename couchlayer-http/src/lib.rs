//! HTTP transport for couchlayer.
//!
//! This crate implements the `Transport` trait over [`reqwest`], talking to a real
//! CouchDB-compatible server. Authentication (Basic or bearer token) and the scheme, host and
//! port come from [`ClientOptions`](couchlayer_core::config::ClientOptions).
//!
//! # Quick Start
//!
//! ```ignore
//! use couchlayer::{prelude::*, http::HttpTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = HttpTransport::builder(ClientOptions::from_env()?).build().await?;
//!     let client = CouchClient::new(transport);
//!
//!     println!("{}", client.status().await?);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as couchlayer_http;

pub mod transport;

pub use transport::{HttpTransport, HttpTransportBuilder};
