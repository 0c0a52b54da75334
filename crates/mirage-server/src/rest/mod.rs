//! REST dispatch: endpoints identified by method and path.

mod path;

pub use path::PathPattern;
pub(crate) use path::strip_base;

use crate::dispatch::{respond, Dispatch, Scopes};
use crate::error::DispatchError;
use crate::interceptor::Interceptors;
use crate::request::LiveRequest;
use crate::route::{find_variant, rank, RouteVariant};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// HTTP methods a REST endpoint can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl RestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RestMethod::Get => "GET",
            RestMethod::Post => "POST",
            RestMethod::Put => "PUT",
            RestMethod::Patch => "PATCH",
            RestMethod::Delete => "DELETE",
            RestMethod::Options => "OPTIONS",
        }
    }

    /// Whether variants of this method may constrain the body.
    pub fn carries_body(&self) -> bool {
        matches!(
            self,
            RestMethod::Post | RestMethod::Put | RestMethod::Patch | RestMethod::Delete
        )
    }
}

impl fmt::Display for RestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RestMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(RestMethod::Get),
            "POST" => Ok(RestMethod::Post),
            "PUT" => Ok(RestMethod::Put),
            "PATCH" => Ok(RestMethod::Patch),
            "DELETE" => Ok(RestMethod::Delete),
            "OPTIONS" => Ok(RestMethod::Options),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

/// One declared REST endpoint with its ranked variants.
#[derive(Debug, Clone)]
pub struct RestEndpoint {
    path: PathPattern,
    method: RestMethod,
    variants: Vec<RouteVariant>,
    interceptors: Interceptors,
}

impl RestEndpoint {
    /// Variants are ranked here, once.
    pub fn new(path: PathPattern, method: RestMethod, variants: Vec<RouteVariant>) -> Self {
        Self {
            path,
            method,
            variants: rank(variants),
            interceptors: Interceptors::default(),
        }
    }

    pub fn with_interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn path(&self) -> &PathPattern {
        &self.path
    }

    pub fn method(&self) -> RestMethod {
        self.method
    }

    pub fn variants(&self) -> &[RouteVariant] {
        &self.variants
    }

    /// Path params when `method` and the base-relative `path` address this
    /// endpoint.
    fn identify(&self, method: &str, path: &str) -> Option<Map<String, Value>> {
        if !self.method.as_str().eq_ignore_ascii_case(method) {
            return None;
        }
        self.path.matches(path)
    }
}

/// REST dispatcher: endpoint identification, then variant matching.
#[derive(Debug, Clone, Default)]
pub struct RestDispatcher {
    base_url: String,
    endpoints: Vec<RestEndpoint>,
    interceptors: Interceptors,
    global: Interceptors,
}

impl RestDispatcher {
    pub fn new(endpoints: Vec<RestEndpoint>) -> Self {
        Self {
            endpoints,
            ..Default::default()
        }
    }

    /// Prefix every endpoint path is relative to.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Protocol-level interceptors.
    pub fn with_interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn with_global_interceptors(mut self, interceptors: Interceptors) -> Self {
        self.global = interceptors;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> &[RestEndpoint] {
        &self.endpoints
    }

    /// First declared endpoint whose method and path match, with the
    /// extracted path params.
    pub fn find_endpoint(&self, request: &LiveRequest) -> Option<(&RestEndpoint, Map<String, Value>)> {
        let path = strip_base(&request.path, &self.base_url)?;
        self.endpoints.iter().find_map(|endpoint| {
            endpoint
                .identify(&request.method, path)
                .map(|params| (endpoint, params))
        })
    }

    /// Endpoint and winning variant, without running interceptors or
    /// producers. `request.params` must already hold the path params.
    pub fn find_variant<'a>(
        &'a self,
        endpoint: &'a RestEndpoint,
        request: &LiveRequest,
    ) -> Option<&'a RouteVariant> {
        find_variant(endpoint.variants(), request)
    }

    /// Answer a request. Path params are merged into `request.params`.
    pub async fn dispatch(&self, mut request: LiveRequest) -> Result<Dispatch, DispatchError> {
        let Some((endpoint, params)) = self.find_endpoint(&request) else {
            debug!(method = %request.method, path = %request.path, "no rest endpoint matched");
            return Ok(Dispatch::Unmatched);
        };
        debug!(
            method = %request.method,
            path = %request.path,
            endpoint = %endpoint.path,
            "rest endpoint matched"
        );
        request.params.extend(params);

        respond(
            &request,
            endpoint.variants(),
            Scopes {
                endpoint: &endpoint.interceptors,
                protocol: &self.interceptors,
                global: &self.global,
            },
        )
        .await
    }
}
