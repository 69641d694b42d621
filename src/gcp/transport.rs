//! Transport seam
//!
//! The client never talks to the network directly. Each call is handed to a
//! [`Transport`] as an [`RpcCall`]: the static method descriptor, the request
//! in its JSON wire encoding, and the routing header. The bundled
//! implementation is [`HttpTransport`](super::http::HttpTransport); a binary
//! RPC transport can be plugged in through the same trait.

use super::error::Result;
use crate::iot::methods::MethodDescriptor;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Name of the routing metadata header
pub const REQUEST_PARAMS_HEADER: &str = "x-goog-request-params";

/// A single RPC attempt
#[derive(Debug, Clone)]
pub struct RpcCall {
    pub method: &'static MethodDescriptor,
    pub request: Value,
    /// `key1=value1&key2=value2`, sent as [`REQUEST_PARAMS_HEADER`]
    pub request_params: String,
    /// Per-attempt timeout
    pub timeout: Duration,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one attempt of `call` and return the decoded response message
    async fn call(&self, call: &RpcCall) -> Result<Value>;
}
