//! GraphQL dispatch: endpoints identified by operation type plus operation
//! name, name pattern, or raw query text.

mod parse;

pub use parse::{normalize_query, parse_operation, select_operation};

use crate::dispatch::{respond, Dispatch, Scopes};
use crate::error::DispatchError;
use crate::interceptor::Interceptors;
use crate::request::LiveRequest;
use crate::route::{find_variant, rank, RouteVariant};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

pub const DEFAULT_GRAPHQL_BASE_URL: &str = "/graphql";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Query,
    Mutation,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationType::Query => "query",
            OperationType::Mutation => "mutation",
        })
    }
}

/// Parsed GraphQL operation of a live request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlOperation {
    pub operation_type: OperationType,
    pub operation_name: Option<String>,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl GraphqlOperation {
    /// Parse `query` text. A client's `operationName` selects which
    /// operation of the document is executed; without one the first
    /// operation is used. `None` when the named operation is not in the
    /// document.
    pub fn parse(query: &str, operation_name: Option<String>, variables: Option<Value>) -> Option<Self> {
        let (operation_type, operation_name) = select_operation(query, operation_name.as_deref())?;
        Some(Self {
            operation_type,
            operation_name,
            query: query.to_string(),
            variables,
        })
    }
}

/// How an endpoint recognises its operation.
#[derive(Clone)]
pub enum OperationMatcher {
    Name(String),
    Pattern(Regex),
    /// Whitespace-normalized query text.
    Query(String),
}

impl OperationMatcher {
    pub fn name(name: impl Into<String>) -> Self {
        OperationMatcher::Name(name.into())
    }

    pub fn pattern(regex: Regex) -> Self {
        OperationMatcher::Pattern(regex)
    }

    pub fn query(query: &str) -> Self {
        OperationMatcher::Query(normalize_query(query))
    }

    pub fn matches(&self, operation: &GraphqlOperation) -> bool {
        match self {
            OperationMatcher::Name(name) => operation.operation_name.as_deref() == Some(name.as_str()),
            OperationMatcher::Pattern(regex) => operation
                .operation_name
                .as_deref()
                .is_some_and(|name| regex.is_match(name)),
            OperationMatcher::Query(query) => normalize_query(&operation.query) == *query,
        }
    }
}

impl fmt::Debug for OperationMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for OperationMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationMatcher::Name(name) => f.write_str(name),
            OperationMatcher::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
            OperationMatcher::Query(query) => write!(f, "`{query}`"),
        }
    }
}

/// One declared GraphQL endpoint with its ranked variants.
#[derive(Debug, Clone)]
pub struct GraphqlEndpoint {
    operation_type: OperationType,
    matcher: OperationMatcher,
    variants: Vec<RouteVariant>,
    interceptors: Interceptors,
}

impl GraphqlEndpoint {
    pub fn new(operation_type: OperationType, matcher: OperationMatcher, variants: Vec<RouteVariant>) -> Self {
        Self {
            operation_type,
            matcher,
            variants: rank(variants),
            interceptors: Interceptors::default(),
        }
    }

    pub fn with_interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    pub fn matcher(&self) -> &OperationMatcher {
        &self.matcher
    }

    pub fn variants(&self) -> &[RouteVariant] {
        &self.variants
    }

    fn identify(&self, operation: &GraphqlOperation) -> bool {
        self.operation_type == operation.operation_type && self.matcher.matches(operation)
    }
}

/// GraphQL dispatcher: endpoint identification, then variant matching.
#[derive(Debug, Clone)]
pub struct GraphqlDispatcher {
    base_url: String,
    endpoints: Vec<GraphqlEndpoint>,
    interceptors: Interceptors,
    global: Interceptors,
}

impl GraphqlDispatcher {
    pub fn new(endpoints: Vec<GraphqlEndpoint>) -> Self {
        Self {
            base_url: DEFAULT_GRAPHQL_BASE_URL.to_string(),
            endpoints,
            interceptors: Interceptors::default(),
            global: Interceptors::default(),
        }
    }

    /// Path GraphQL requests are served on.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

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

    pub fn endpoints(&self) -> &[GraphqlEndpoint] {
        &self.endpoints
    }

    /// Whether `path` is this dispatcher's endpoint path.
    pub fn serves(&self, path: &str) -> bool {
        path.trim_end_matches('/') == self.base_url.trim_end_matches('/')
    }

    pub fn find_endpoint(&self, operation: &GraphqlOperation) -> Option<&GraphqlEndpoint> {
        self.endpoints.iter().find(|endpoint| endpoint.identify(operation))
    }

    pub fn find_variant<'a>(
        &'a self,
        endpoint: &'a GraphqlEndpoint,
        request: &LiveRequest,
    ) -> Option<&'a RouteVariant> {
        find_variant(endpoint.variants(), request)
    }

    /// Answer a request carrying a parsed operation. Requests without one are
    /// unmatched.
    pub async fn dispatch(&self, request: &LiveRequest) -> Result<Dispatch, DispatchError> {
        let Some(operation) = &request.graphql else {
            return Ok(Dispatch::Unmatched);
        };
        let Some(endpoint) = self.find_endpoint(operation) else {
            debug!(
                operation_type = %operation.operation_type,
                operation_name = ?operation.operation_name,
                "no graphql endpoint matched"
            );
            return Ok(Dispatch::Unmatched);
        };
        debug!(
            operation_type = %operation.operation_type,
            matcher = %endpoint.matcher,
            "graphql endpoint matched"
        );

        respond(
            request,
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

impl Default for GraphqlDispatcher {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
