//! Rendering dispatch outcomes as HTTP responses.

use crate::dispatch::MatchedResponse;
use crate::error::DispatchError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, SET_COOKIE};
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};
use serde_json::{json, Value};
use std::path::Path;

pub(crate) struct ResponseBuilder {
    status: StatusCode,
    body: Bytes,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        ResponseBuilder {
            status,
            body: Bytes::new(),
            headers: HeaderMap::new(),
        }
    }

    pub fn json(self, body: &Value) -> Self {
        let payload = serde_json::to_vec(body).unwrap_or_default();
        self.header_if_absent(CONTENT_TYPE, "application/json")
            .body(payload)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Invalid names or values are dropped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn append_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            self.headers.append(name, value);
        }
        self
    }

    fn header_if_absent(mut self, name: HeaderName, value: &'static str) -> Self {
        if !self.headers.contains_key(&name) {
            self.headers.insert(name, HeaderValue::from_static(value));
        }
        self
    }

    pub fn build(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Status, headers and cookies from the control, then a JSON body or the
/// file's contents.
pub(crate) async fn render_matched(matched: MatchedResponse) -> Result<Response<Full<Bytes>>, DispatchError> {
    let MatchedResponse { data, control } = matched;
    let status = StatusCode::from_u16(control.status()).unwrap_or(StatusCode::OK);

    let mut builder = ResponseBuilder::new(status);
    let mut seen: Vec<&str> = Vec::new();
    for (name, value) in control.headers() {
        builder = if seen.contains(&name.as_str()) {
            builder.append_header(name, value)
        } else {
            seen.push(name);
            builder.header(name, value)
        };
    }
    for cookie in control.cookies() {
        builder = builder.append_header(SET_COOKIE.as_str(), &cookie.header_value());
    }

    let builder = match control.file() {
        Some(path) => {
            let contents = tokio::fs::read(path).await?;
            builder
                .header_if_absent(CONTENT_TYPE, content_type(path))
                .body(contents)
        }
        None => builder.json(&data),
    };
    Ok(builder.build())
}

pub(crate) fn not_found(method: &str, path: &str) -> Response<Full<Bytes>> {
    ResponseBuilder::new(StatusCode::NOT_FOUND)
        .json(&json!({"error": "Not found", "method": method, "path": path}))
        .build()
}

pub(crate) fn internal_error(error: &DispatchError) -> Response<Full<Bytes>> {
    ResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
        .json(&json!({"error": error.to_string()}))
        .build()
}

pub(crate) fn bad_request(message: &str) -> Response<Full<Bytes>> {
    ResponseBuilder::new(StatusCode::BAD_REQUEST)
        .json(&json!({"error": message}))
        .build()
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("json") => "application/json",
        Some("txt") => "text/plain; charset=utf-8",
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("csv") => "text/csv",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::{CookieOptions, ResponseControl};
    use http_body_util::BodyExt;
    use std::io::Write;

    async fn body_bytes(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_render_json() {
        let mut control = ResponseControl::new();
        control.set_status(201);
        control.set_header("X-Trace", "1");
        control.append_header("x-trace", "2");
        control.set_cookie("session", "abc", CookieOptions::default());

        let response = render_matched(MatchedResponse {
            data: json!({"id": 1}),
            control,
        })
        .await
        .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        let traces: Vec<_> = response.headers().get_all("x-trace").iter().collect();
        assert_eq!(traces, vec!["1", "2"]);
        assert_eq!(response.headers()[SET_COOKIE], "session=abc; Path=/");
        assert_eq!(body_bytes(response).await, Bytes::from_static(br#"{"id":1}"#));
    }

    #[tokio::test]
    async fn test_render_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "a,b\n1,2\n").unwrap();

        let mut control = ResponseControl::new();
        control.send_file(file.path());
        control.attachment("report.csv");

        let response = render_matched(MatchedResponse {
            data: Value::Null,
            control,
        })
        .await
        .unwrap();
        assert_eq!(response.headers()[CONTENT_TYPE], "text/csv");
        assert_eq!(
            response.headers()["content-disposition"],
            "attachment; filename=\"report.csv\""
        );
        assert_eq!(body_bytes(response).await, Bytes::from_static(b"a,b\n1,2\n"));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let mut control = ResponseControl::new();
        control.send_file("/definitely/not/here.json");
        let result = render_matched(MatchedResponse {
            data: Value::Null,
            control,
        })
        .await;
        assert!(matches!(result, Err(DispatchError::Io(_))));
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let response = not_found("GET", "/missing");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body, json!({"error": "Not found", "method": "GET", "path": "/missing"}));
    }
}
