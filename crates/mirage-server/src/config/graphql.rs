use super::{compile_regex, join_base, Compiler, InterceptorsConfig, RouteConfig, TextPattern};
use crate::entity::Entity;
use crate::error::ConfigError;
use crate::graphql::{
    GraphqlDispatcher, GraphqlEndpoint, OperationMatcher, OperationType, DEFAULT_GRAPHQL_BASE_URL,
};
use crate::interceptor::Interceptors;
use serde::{Deserialize, Serialize};

fn default_graphql_base_url() -> String {
    DEFAULT_GRAPHQL_BASE_URL.to_string()
}

/// `graphql` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraphqlConfig {
    #[serde(default = "default_graphql_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub interceptors: InterceptorsConfig,
    #[serde(default)]
    pub configs: Vec<GraphqlEndpointConfig>,
}

impl Default for GraphqlConfig {
    fn default() -> Self {
        Self {
            base_url: default_graphql_base_url(),
            interceptors: InterceptorsConfig::default(),
            configs: Vec::new(),
        }
    }
}

/// One GraphQL endpoint. `query` takes precedence over `operationName` when
/// both are given.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraphqlEndpointConfig {
    pub operation_type: OperationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<TextPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub interceptors: InterceptorsConfig,
}

const GRAPHQL_ENTITIES: [Entity; 4] = [Entity::Headers, Entity::Cookies, Entity::Query, Entity::Variables];

impl GraphqlConfig {
    pub(crate) fn compile(
        &self,
        server_base: &str,
        global: &Interceptors,
        compiler: &Compiler<'_>,
    ) -> Result<GraphqlDispatcher, ConfigError> {
        let endpoints = self
            .configs
            .iter()
            .enumerate()
            .map(|(i, endpoint)| endpoint.compile(&format!("graphql.configs[{i}]"), compiler))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GraphqlDispatcher::new(endpoints)
            .with_base_url(join_base(server_base, &self.base_url))
            .with_interceptors(compiler.interceptors(&self.interceptors, "graphql.interceptors")?)
            .with_global_interceptors(global.clone()))
    }
}

impl GraphqlEndpointConfig {
    fn compile(&self, location: &str, compiler: &Compiler<'_>) -> Result<GraphqlEndpoint, ConfigError> {
        let matcher = match (&self.query, &self.operation_name) {
            (Some(query), _) => OperationMatcher::query(query),
            (None, Some(TextPattern::Literal(name))) => OperationMatcher::name(name),
            (None, Some(TextPattern::Pattern { reg_exp })) => {
                OperationMatcher::pattern(compile_regex(reg_exp)?)
            }
            (None, None) => {
                return Err(ConfigError::invalid(
                    location,
                    "declare an 'operationName' or a 'query'",
                ))
            }
        };

        let variants = compiler.routes(&self.routes, &GRAPHQL_ENTITIES, location)?;
        Ok(GraphqlEndpoint::new(self.operation_type, matcher, variants)
            .with_interceptors(compiler.interceptors(&self.interceptors, &format!("{location}.interceptors"))?))
    }
}
