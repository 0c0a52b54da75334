//! `response` object exposed to interceptor scripts.
//!
//! Rhai evaluation is synchronous, so calls are recorded and replayed on the
//! interceptor context once the script returns. Delays are awaited then.

use super::convert::dynamic_to_json;
use crate::interceptor::{CookieOptions, InterceptorContext};
use parking_lot::Mutex;
use rhai::{Dynamic, Engine, Map};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ControlOp {
    Status(u16),
    SetHeader(String, String),
    AppendHeader(String, String),
    SetCookie(String, String, CookieOptions),
    ClearCookie(String, CookieOptions),
    Delay(Duration),
    Attachment(String),
    Log(String),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptResponse {
    ops: Arc<Mutex<Vec<ControlOp>>>,
}

impl ScriptResponse {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(engine: &mut Engine) {
        engine
            .register_type_with_name::<ScriptResponse>("Response")
            .register_fn("set_status", ScriptResponse::set_status)
            .register_fn("set_header", ScriptResponse::set_header)
            .register_fn("append_header", ScriptResponse::append_header)
            .register_fn("set_cookie", ScriptResponse::set_cookie)
            .register_fn("set_cookie", ScriptResponse::set_cookie_with)
            .register_fn("clear_cookie", ScriptResponse::clear_cookie)
            .register_fn("set_delay", ScriptResponse::set_delay)
            .register_fn("attachment", ScriptResponse::attachment)
            .register_fn("log", ScriptResponse::log);
    }

    fn push(&mut self, op: ControlOp) {
        self.ops.lock().push(op);
    }

    pub fn set_status(&mut self, status: i64) {
        match u16::try_from(status) {
            Ok(status) => self.push(ControlOp::Status(status)),
            Err(_) => warn!("script set an invalid status: {status}"),
        }
    }

    pub fn set_header(&mut self, name: String, value: Dynamic) {
        self.push(ControlOp::SetHeader(name, header_value(value)));
    }

    pub fn append_header(&mut self, name: String, value: Dynamic) {
        self.push(ControlOp::AppendHeader(name, header_value(value)));
    }

    pub fn set_cookie(&mut self, name: String, value: String) {
        self.push(ControlOp::SetCookie(name, value, CookieOptions::default()));
    }

    pub fn set_cookie_with(&mut self, name: String, value: String, options: Map) {
        let options = cookie_options(options);
        self.push(ControlOp::SetCookie(name, value, options));
    }

    pub fn clear_cookie(&mut self, name: String) {
        self.push(ControlOp::ClearCookie(name, CookieOptions::default()));
    }

    /// Milliseconds.
    pub fn set_delay(&mut self, millis: i64) {
        let millis = u64::try_from(millis).unwrap_or(0);
        self.push(ControlOp::Delay(Duration::from_millis(millis)));
    }

    pub fn attachment(&mut self, filename: String) {
        self.push(ControlOp::Attachment(filename));
    }

    pub fn log(&mut self, message: Dynamic) {
        self.push(ControlOp::Log(message.to_string()));
    }

    pub(crate) fn take(&self) -> Vec<ControlOp> {
        std::mem::take(&mut *self.ops.lock())
    }
}

fn header_value(value: Dynamic) -> String {
    if value.is_string() {
        value.into_string().unwrap_or_default()
    } else {
        value.to_string()
    }
}

fn cookie_options(options: Map) -> CookieOptions {
    let json = dynamic_to_json(Dynamic::from(options));
    serde_json::from_value(json).unwrap_or_else(|e| {
        warn!("ignoring invalid cookie options: {e}");
        CookieOptions::default()
    })
}

/// Replay recorded operations in call order.
pub(crate) async fn apply(ops: Vec<ControlOp>, ctx: &mut InterceptorContext<'_>) {
    for op in ops {
        match op {
            ControlOp::Status(status) => ctx.set_status(status),
            ControlOp::SetHeader(name, value) => ctx.set_header(&name, value),
            ControlOp::AppendHeader(name, value) => ctx.append_header(&name, value),
            ControlOp::SetCookie(name, value, options) => ctx.set_cookie(name, value, options),
            ControlOp::ClearCookie(name, options) => ctx.clear_cookie(name, options),
            ControlOp::Delay(delay) => ctx.set_delay(delay).await,
            ControlOp::Attachment(filename) => ctx.attachment(&filename),
            ControlOp::Log(message) => ctx.log(&message),
        }
    }
}
