//! Getweb
//!
//! Fetch a single resource over HTTPS, one blocking request per connection.
//!
//! A request walks through a fixed sequence of steps: the URL is parsed, a
//! transport connects, a TLS context and channel are created and handshake,
//! the `GET` request is written, the status line is scanned, and for `200`
//! responses a bounded amount of body is read. Whatever happens, every
//! resource acquired along the way is released before the call returns.
//!
//! ```no_run
//! # fn run() -> Result<(), getweb::Error> {
//! let response = getweb::Client::new().get("https://www.example.com/")?;
//! assert_eq!(response.status(), 200);
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod client;
pub mod url;

pub use client::{Client, Error, Response};

/// Boxed error type used by the transport and TLS seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
