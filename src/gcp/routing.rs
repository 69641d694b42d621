//! Routing header construction
//!
//! Each request carries its identifying fields as `x-goog-request-params` so
//! the frontend can route it without decoding the payload.

use serde_json::Value;

/// A request field used for routing: the header key and its JSON path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingField {
    /// Key as it appears in the header, e.g. `device.name`
    pub key: &'static str,
    /// Path through the JSON-encoded request, e.g. `["device", "name"]`
    pub path: &'static [&'static str],
}

/// Look up a string value by path in a JSON message
pub fn lookup<'a>(message: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(message, |current, part| current.get(part))
        .and_then(Value::as_str)
}

/// Build the `key1=value1&key2=value2` routing string.
///
/// Missing fields route as empty values. Values are percent-encoded except
/// for `/`, which resource names keep as-is.
pub fn request_params(fields: &[RoutingField], request: &Value) -> String {
    fields
        .iter()
        .map(|field| {
            let value = lookup(request, field.path).unwrap_or_default();
            format!("{}={}", field.key, encode_value(value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_value(value: &str) -> String {
    urlencoding::encode(value).replace("%2F", "/")
}
