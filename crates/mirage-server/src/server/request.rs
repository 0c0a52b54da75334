//! HTTP request -> [`LiveRequest`].

use crate::graphql::GraphqlOperation;
use crate::request::LiveRequest;
use hyper::header::{CONTENT_TYPE, COOKIE};
use hyper::http::request::Parts;
use serde_json::{Map, Value};

/// Parse request head and collected body.
pub(crate) fn live_request(parts: &Parts, body: &[u8]) -> LiveRequest {
    let mut request = LiveRequest::new(parts.method.as_str(), parts.uri.path());

    for name in parts.headers.keys() {
        let joined = parts
            .headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        request.headers.insert(name.as_str().to_string(), Value::String(joined));
    }

    for header in parts.headers.get_all(COOKIE) {
        if let Ok(header) = header.to_str() {
            request.cookies.extend(parse_cookies(header));
        }
    }

    if let Some(query) = parts.uri.query() {
        request.query = parse_pairs(query);
    }

    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    request.body = parse_body(content_type, body);
    request
}

/// `a=1; b=2` -> `{a: "1", b: "2"}`.
pub(crate) fn parse_cookies(header: &str) -> Map<String, Value> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let value = urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string());
            Some((name.to_string(), Value::String(value)))
        })
        .collect()
}

/// URL-encoded pairs. A repeated key collects its values into a list.
pub(crate) fn parse_pairs(query: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for pair in query.split('&').filter(|s| !s.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key);
        let value = Value::String(decode(value));
        match out.get_mut(&key) {
            None => {
                out.insert(key, value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    out
}

fn decode(component: &str) -> String {
    let component = component.replace('+', " ");
    urlencoding::decode(&component)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(component)
}

/// JSON when it parses, form fields for urlencoded bodies, otherwise text.
/// An empty body is absent.
pub(crate) fn parse_body(content_type: &str, body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    if content_type.starts_with("application/x-www-form-urlencoded") {
        return Some(Value::Object(parse_pairs(&String::from_utf8_lossy(body))));
    }
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(_) => Some(Value::String(String::from_utf8_lossy(body).into_owned())),
    }
}

/// GraphQL operation carried by `GET ?query=..&variables=..` or a JSON body
/// `{query, operationName?, variables?}`.
pub(crate) fn graphql_operation(request: &LiveRequest) -> Option<GraphqlOperation> {
    let source = match request.method.as_str() {
        "GET" => &request.query,
        "POST" => request.body.as_ref()?.as_object()?,
        _ => return None,
    };
    let query = source.get("query")?.as_str()?;
    let operation_name = source
        .get("operationName")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let variables = match source.get("variables") {
        Some(Value::String(text)) => serde_json::from_str(text).ok(),
        Some(Value::Null) | None => None,
        Some(value) => Some(value.clone()),
    };
    GraphqlOperation::parse(query, operation_name, variables)
}
