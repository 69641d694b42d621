//! RPC-over-HTTP transport
//!
//! Transcodes each call to its REST binding: path variables are filled from
//! request fields, the declared body goes out as JSON, and everything else is
//! flattened into the query string.

use super::auth::GcpCredentials;
use super::error::{Error, Result};
use super::status::Status;
use super::transport::{RpcCall, Transport, REQUEST_PARAMS_HEADER};
use crate::iot::methods::{HttpBody, HttpRule, HttpVerb};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value};
use url::Url;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const API_CLIENT_HEADER: &str = "x-goog-api-client";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// An HTTP request ready to send
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<Value>,
}

/// Map an RPC request onto its REST binding
pub fn transcode(rule: &HttpRule, base_url: &str, request: &Value) -> Result<HttpRequest> {
    let Value::Object(fields) = request else {
        return Err(Error::Config("request must encode as a JSON object".to_string()));
    };
    let mut remaining = fields.clone();

    let mut path = String::new();
    let mut rest = rule.path;
    while let Some(start) = rest.find('{') {
        let end = rest[start..]
            .find('}')
            .map(|i| start + i)
            .ok_or_else(|| Error::Config(format!("unterminated variable in '{}'", rule.path)))?;
        let variable = &rest[start + 1..end];
        let segments: Vec<&str> = variable.split('.').collect();

        let value = super::routing::lookup(request, &segments)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::Config(format!("request field '{}' is required", variable)))?;

        path.push_str(&rest[..start]);
        path.push_str(&urlencoding::encode(value).replace("%2F", "/"));
        rest = &rest[end + 1..];

        let inside_body = matches!(rule.body, HttpBody::Field(field) if field == segments[0]);
        if !inside_body {
            remove_path(&mut remaining, &segments);
        }
    }
    path.push_str(rest);

    let body = match rule.body {
        HttpBody::None => None,
        HttpBody::Field(field) => Some(remaining.remove(field).unwrap_or_else(|| Value::Object(Map::new()))),
        HttpBody::All => Some(Value::Object(std::mem::take(&mut remaining))),
    };

    let mut url = Url::parse(&format!("{}{}", base_url.trim_end_matches('/'), path))
        .map_err(|e| Error::Config(format!("invalid endpoint '{}': {}", base_url, e)))?;

    let mut query = Vec::new();
    for (key, value) in &remaining {
        flatten_query(key, value, &mut query);
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    let method = match rule.verb {
        HttpVerb::Get => Method::GET,
        HttpVerb::Post => Method::POST,
        HttpVerb::Patch => Method::PATCH,
        HttpVerb::Delete => Method::DELETE,
    };

    Ok(HttpRequest { method, url, body })
}

fn remove_path(fields: &mut Map<String, Value>, segments: &[&str]) {
    match segments {
        [] => {}
        [last] => {
            fields.remove(*last);
        }
        [first, tail @ ..] => {
            if let Some(Value::Object(inner)) = fields.get_mut(*first) {
                remove_path(inner, tail);
                if inner.is_empty() {
                    fields.remove(*first);
                }
            }
        }
    }
}

/// Flatten a field into query parameters: nested messages use dotted keys,
/// repeated fields repeat the key
fn flatten_query(key: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push((key.to_string(), s.clone())),
        Value::Bool(b) => out.push((key.to_string(), b.to_string())),
        Value::Number(n) => out.push((key.to_string(), n.to_string())),
        Value::Array(items) => {
            for item in items {
                flatten_query(key, item, out);
            }
        }
        Value::Object(fields) => {
            for (sub, item) in fields {
                flatten_query(&format!("{}.{}", key, sub), item, out);
            }
        }
    }
}

/// HTTP transport for the device manager REST API
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    credentials: GcpCredentials,
    api_client: String,
}

impl HttpTransport {
    /// Create a transport against `base_url`, e.g. `https://cloudiot.googleapis.com`
    pub fn new(base_url: &str, credentials: GcpCredentials, user_agent: &str) -> Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            api_client: format!("gl-rust/{} gccl/{}", env!("CARGO_PKG_VERSION"), env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        call: &RpcCall,
        request: &HttpRequest,
        token: Option<String>,
    ) -> Result<(StatusCode, String)> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .header(REQUEST_PARAMS_HEADER, &call.request_params)
            .header(API_CLIENT_HEADER, &self.api_client)
            .timeout(call.timeout);

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, call: &RpcCall) -> Result<Value> {
        let request = transcode(&call.method.http, &self.base_url, &call.request)?;
        tracing::debug!("{} {} ({})", request.method, request.url, call.method.name);

        let token = self.credentials.get_token().await?;
        let had_token = token.is_some();
        let (mut status, mut body) = self.send(call, &request, token).await?;

        // A cached token can be revoked before its TTL runs out
        if status == StatusCode::UNAUTHORIZED && had_token {
            tracing::debug!("{} rejected the access token, refreshing", call.method.name);
            let token = self.credentials.refresh_token().await?;
            (status, body) = self.send(call, &request, token).await?;
        }

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!(
                "{} failed: {} - {}",
                call.method.name,
                status,
                sanitize_for_log(&body)
            );
            return Err(Status::from_http_response(status.as_u16(), &body).into());
        }

        if body.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iot::methods;
    use serde_json::json;

    const BASE: &str = "https://cloudiot.googleapis.com";

    #[test]
    fn test_get_binds_name_in_path() {
        let request = json!({
            "name": "projects/p0/locations/us-central1/registries/r0/devices/d0",
            "fieldMask": "config,state"
        });
        let http = transcode(&methods::GET_DEVICE.http, BASE, &request).unwrap();
        assert_eq!(http.method, Method::GET);
        assert_eq!(
            http.url.as_str(),
            "https://cloudiot.googleapis.com/v1/projects/p0/locations/us-central1/registries/r0/devices/d0?fieldMask=config%2Cstate"
        );
        assert!(http.body.is_none());
    }

    #[test]
    fn test_body_field_and_query_remainder() {
        let request = json!({
            "device": {"name": "projects/p/locations/l/registries/r/devices/d", "blocked": true},
            "updateMask": "blocked"
        });
        let http = transcode(&methods::UPDATE_DEVICE.http, BASE, &request).unwrap();
        assert_eq!(http.method, Method::PATCH);
        assert_eq!(http.url.path(), "/v1/projects/p/locations/l/registries/r/devices/d");
        assert_eq!(http.url.query(), Some("updateMask=blocked"));
        assert_eq!(
            http.body,
            Some(json!({"name": "projects/p/locations/l/registries/r/devices/d", "blocked": true}))
        );
    }

    #[test]
    fn test_body_all_excludes_path_fields() {
        let request = json!({
            "parent": "projects/p/locations/l/registries/r",
            "gatewayId": "gw1",
            "deviceId": "dev1"
        });
        let http = transcode(&methods::BIND_DEVICE_TO_GATEWAY.http, BASE, &request).unwrap();
        assert_eq!(http.url.path(), "/v1/projects/p/locations/l/registries/r:bindDeviceToGateway");
        assert_eq!(http.url.query(), None);
        assert_eq!(http.body, Some(json!({"gatewayId": "gw1", "deviceId": "dev1"})));
    }

    #[test]
    fn test_nested_and_repeated_query_parameters() {
        let request = json!({
            "parent": "projects/p/locations/l/registries/r",
            "deviceIds": ["a", "b"],
            "gatewayListOptions": {"associationsGatewayId": "gw1"},
            "pageSize": 2
        });
        let http = transcode(&methods::LIST_DEVICES.http, BASE, &request).unwrap();
        let pairs: Vec<(String, String)> = http.url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("deviceIds".into(), "a".into())));
        assert!(pairs.contains(&("deviceIds".into(), "b".into())));
        assert!(pairs.contains(&("gatewayListOptions.associationsGatewayId".into(), "gw1".into())));
        assert!(pairs.contains(&("pageSize".into(), "2".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "parent"));
    }

    #[test]
    fn test_missing_path_field_is_rejected() {
        let result = transcode(&methods::GET_DEVICE.http, BASE, &json!({}));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_sanitize_for_log() {
        let long = "x".repeat(500);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.contains("truncated, 500 bytes total"));
        assert_eq!(sanitize_for_log("a\nb"), "ab");
    }
}
