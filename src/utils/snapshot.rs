use axum::http::{HeaderMap, Method, Uri, Version, header};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Nested maps/sequences deeper than this are replaced by a marker string
pub const MAX_DEPTH: usize = 8;

const REDACTED: &str = "[redacted]";
const TRUNCATED: &str = "[truncated]";

/// Loggable view of an inbound request, stored as JSON in the connection log.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub args: BTreeMap<String, Vec<String>>,
    pub http_version: String,
    pub headers: BTreeMap<String, Vec<String>>,
    pub cookies: BTreeMap<String, String>,
    pub remote_addr: String,
    pub request_id: Option<String>,
}

impl RequestSnapshot {
    pub fn capture(
        method: &Method,
        uri: &Uri,
        version: Version,
        headers: &HeaderMap,
        remote_addr: String,
    ) -> Self {
        let query_string = uri.query().unwrap_or_default().to_string();

        let mut args: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in
            serde_urlencoded::from_str::<Vec<(String, String)>>(&query_string).unwrap_or_default()
        {
            args.entry(key).or_default().push(value);
        }

        let mut header_map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in headers {
            let value = if *name == header::AUTHORIZATION {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            header_map
                .entry(name.as_str().to_string())
                .or_default()
                .push(value);
        }

        let cookies = CookieJar::from_headers(headers)
            .iter()
            .map(|c| (c.name().to_string(), c.value_trimmed().to_string()))
            .collect();

        let request_id = headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Self {
            method: method.to_string(),
            path: uri.path().to_string(),
            query_string,
            args,
            http_version: format!("{:?}", version),
            headers: header_map,
            cookies,
            remote_addr,
            request_id,
        }
    }

    /// Serialize to JSON text, bounded to `MAX_DEPTH` levels of nesting
    pub fn to_json(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize request snapshot: {}", e);
            Value::Null
        });
        bound_depth(value, MAX_DEPTH).to_string()
    }
}

/// Replaces any map or sequence nested below `max_depth` with a marker string.
pub fn bound_depth(value: Value, max_depth: usize) -> Value {
    match value {
        Value::Object(map) if max_depth == 0 => {
            Value::String(format!("{} object({})", TRUNCATED, map.len()))
        }
        Value::Array(items) if max_depth == 0 => {
            Value::String(format!("{} array({})", TRUNCATED, items.len()))
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, bound_depth(v, max_depth - 1)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|v| bound_depth(v, max_depth - 1))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// Client address as recorded in the connection log
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
