use super::{compile_regex, join_base, Compiler, InterceptorsConfig, RouteConfig, TextPattern};
use crate::entity::Entity;
use crate::error::ConfigError;
use crate::interceptor::Interceptors;
use crate::rest::{PathPattern, RestDispatcher, RestEndpoint, RestMethod};
use serde::{Deserialize, Serialize};

/// `rest` section.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RestConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub interceptors: InterceptorsConfig,
    #[serde(default)]
    pub configs: Vec<RestEndpointConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RestEndpointConfig {
    pub path: TextPattern,
    pub method: RestMethod,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub interceptors: InterceptorsConfig,
}

impl RestConfig {
    pub(crate) fn compile(
        &self,
        server_base: &str,
        global: &Interceptors,
        compiler: &Compiler<'_>,
    ) -> Result<RestDispatcher, ConfigError> {
        let endpoints = self
            .configs
            .iter()
            .enumerate()
            .map(|(i, endpoint)| endpoint.compile(&format!("rest.configs[{i}]"), compiler))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RestDispatcher::new(endpoints)
            .with_base_url(join_base(server_base, &self.base_url))
            .with_interceptors(compiler.interceptors(&self.interceptors, "rest.interceptors")?)
            .with_global_interceptors(global.clone()))
    }
}

impl RestEndpointConfig {
    fn compile(&self, location: &str, compiler: &Compiler<'_>) -> Result<RestEndpoint, ConfigError> {
        let path = match &self.path {
            TextPattern::Literal(path) => PathPattern::template(path),
            TextPattern::Pattern { reg_exp } => PathPattern::regex(compile_regex(reg_exp)?),
        };

        let mut allowed = vec![Entity::Headers, Entity::Cookies, Entity::Query, Entity::Params];
        if self.method.carries_body() {
            allowed.push(Entity::Body);
        } else if self.routes.iter().any(|route| route.entities.contains_key(&Entity::Body)) {
            return Err(ConfigError::invalid(
                location,
                format!("{} requests carry no body to constrain", self.method),
            ));
        }

        let variants = compiler.routes(&self.routes, &allowed, location)?;
        Ok(RestEndpoint::new(path, self.method, variants)
            .with_interceptors(compiler.interceptors(&self.interceptors, &format!("{location}.interceptors"))?))
    }
}
