//! Generic API-client plumbing
//!
//! Everything here is independent of the device manager service: credentials,
//! status codes, call settings and retry, routing headers, pagination and the
//! transport abstraction.
//!
//! # Module Structure
//!
//! - [`auth`] - Credentials and access tokens via `gcp_auth`
//! - [`error`] - Crate error type and canonical code mapping
//! - [`http`] - RPC-over-HTTP transport
//! - [`pagination`] - Page, stream and channel views over list methods
//! - [`routing`] - `x-goog-request-params` header construction
//! - [`settings`] - Timeouts, retry policy and per-call overrides
//! - [`status`] - Canonical status codes
//! - [`transport`] - The seam between the client and the wire

pub mod auth;
pub mod error;
pub mod http;
pub mod pagination;
pub mod routing;
pub mod settings;
pub mod status;
pub mod transport;
