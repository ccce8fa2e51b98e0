//! The HTTP/1.1 wire protocol, as far as a single `GET` needs it.
//!
//! - [`request`] formats the request into a bounded buffer.
//! - [`status`] scans the response head for the status code.
//! - [`body`] drains a bounded amount of the body.
//!
//! None of these know about sessions or TLS; they operate on any
//! [`std::io::Read`] or produce plain bytes.

pub mod body;
pub mod request;
pub mod status;

pub use body::read_content;
pub use request::{encode_get, RequestTooLarge};
pub use status::{scan_status, ScanError, StatusScanner};
