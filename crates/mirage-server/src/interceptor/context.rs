//! Response-control state and the handle interceptor stages act through.

use crate::request::LiveRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Options for `Set-Cookie`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

/// One `Set-Cookie` instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub options: CookieOptions,
    pub expired: bool,
}

impl SetCookie {
    pub fn header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, urlencoding::encode(&self.value));
        let path = self.options.path.as_deref().unwrap_or("/");
        out.push_str(&format!("; Path={path}"));
        if let Some(domain) = &self.options.domain {
            out.push_str(&format!("; Domain={domain}"));
        }
        if self.expired {
            out.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
        } else if let Some(max_age) = self.options.max_age {
            out.push_str(&format!("; Max-Age={max_age}"));
        }
        if self.options.http_only {
            out.push_str("; HttpOnly");
        }
        if self.options.secure {
            out.push_str("; Secure");
        }
        if let Some(same_site) = &self.options.same_site {
            out.push_str(&format!("; SameSite={same_site}"));
        }
        out
    }
}

/// Accumulated response side effects for one request.
///
/// Effects are recorded in stage order and applied by the transport once the
/// interceptor chain has finished.
#[derive(Debug, Clone)]
pub struct ResponseControl {
    status: u16,
    headers: Vec<(String, String)>,
    cookies: Vec<SetCookie>,
    delay: Duration,
    file: Option<PathBuf>,
}

impl Default for ResponseControl {
    fn default() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            cookies: Vec::new(),
            delay: Duration::ZERO,
            file: None,
        }
    }
}

impl ResponseControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// Replace every value of a header (names are case-insensitive).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name.to_ascii_lowercase(), value.into()));
    }

    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
    }

    /// First value of a response header set so far.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>, options: CookieOptions) {
        self.cookies.push(SetCookie {
            name: name.into(),
            value: value.into(),
            options,
            expired: false,
        });
    }

    pub fn clear_cookie(&mut self, name: impl Into<String>, options: CookieOptions) {
        self.cookies.push(SetCookie {
            name: name.into(),
            value: String::new(),
            options,
            expired: true,
        });
    }

    pub fn cookies(&self) -> &[SetCookie] {
        &self.cookies
    }

    pub fn add_delay(&mut self, delay: Duration) {
        self.delay += delay;
    }

    /// Total delay declared by interceptor stages.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Mark the response as a download named `filename`.
    pub fn attachment(&mut self, filename: &str) {
        self.set_header(
            "content-disposition",
            format!("attachment; filename=\"{}\"", filename.replace('"', "")),
        );
    }

    /// Serve the contents of `path` instead of the data.
    pub fn send_file(&mut self, path: impl Into<PathBuf>) {
        self.file = Some(path.into());
    }

    pub fn file(&self) -> Option<&PathBuf> {
        self.file.as_ref()
    }
}

/// Handle given to each interceptor stage: the live request plus the
/// response controls.
pub struct InterceptorContext<'a> {
    request: &'a LiveRequest,
    control: &'a mut ResponseControl,
}

impl<'a> InterceptorContext<'a> {
    pub fn new(request: &'a LiveRequest, control: &'a mut ResponseControl) -> Self {
        Self { request, control }
    }

    pub fn request(&self) -> &LiveRequest {
        self.request
    }

    pub fn request_header(&self, name: &str) -> Option<&Value> {
        self.request.header(name)
    }

    pub fn request_cookie(&self, name: &str) -> Option<&Value> {
        self.request.cookie(name)
    }

    pub fn control(&self) -> &ResponseControl {
        self.control
    }

    pub fn set_status(&mut self, status: u16) {
        self.control.set_status(status);
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.control.set_header(name, value);
    }

    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.control.append_header(name, value);
    }

    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>, options: CookieOptions) {
        self.control.set_cookie(name, value, options);
    }

    pub fn clear_cookie(&mut self, name: impl Into<String>, options: CookieOptions) {
        self.control.clear_cookie(name, options);
    }

    pub fn attachment(&mut self, filename: &str) {
        self.control.attachment(filename);
    }

    /// Wait before yielding to the next stage.
    pub async fn set_delay(&mut self, delay: Duration) {
        self.control.add_delay(delay);
        tokio::time::sleep(delay).await;
    }

    pub fn log(&self, message: &str) {
        info!(
            target: "mirage_server::interceptor",
            method = %self.request.method,
            path = %self.request.path,
            "{message}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut control = ResponseControl::new();
        control.set_header("X-Trace", "a");
        control.append_header("x-trace", "b");
        assert_eq!(control.headers().len(), 2);
        control.set_header("X-TRACE", "c");
        assert_eq!(control.headers(), &[("x-trace".to_string(), "c".to_string())]);
        assert_eq!(control.header("x-Trace"), Some("c"));
    }

    #[test]
    fn test_cookie_header_values() {
        let cookie = SetCookie {
            name: "session".into(),
            value: "a b".into(),
            options: CookieOptions {
                max_age: Some(60),
                http_only: true,
                ..Default::default()
            },
            expired: false,
        };
        assert_eq!(cookie.header_value(), "session=a%20b; Path=/; Max-Age=60; HttpOnly");

        let mut control = ResponseControl::new();
        control.clear_cookie("session", CookieOptions::default());
        assert_eq!(
            control.cookies()[0].header_value(),
            "session=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
        );
    }

    #[test]
    fn test_attachment() {
        let mut control = ResponseControl::new();
        control.attachment("report.csv");
        assert_eq!(
            control.header("content-disposition"),
            Some("attachment; filename=\"report.csv\"")
        );
    }

    #[tokio::test]
    async fn test_delay_accumulates() {
        let request = LiveRequest::new("GET", "/");
        let mut control = ResponseControl::new();
        let mut ctx = InterceptorContext::new(&request, &mut control);
        ctx.set_delay(Duration::from_millis(5)).await;
        ctx.set_delay(Duration::from_millis(5)).await;
        assert_eq!(control.delay(), Duration::from_millis(10));
    }
}
