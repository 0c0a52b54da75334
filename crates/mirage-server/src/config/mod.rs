//! Declaration files: serde types and their compilation into dispatchers.

mod graphql;
mod rest;

pub use graphql::{GraphqlConfig, GraphqlEndpointConfig};
pub use rest::{RestConfig, RestEndpointConfig};

use crate::entity::{normalize, CompiledDescriptor, Entity, EntityConstraints};
use crate::error::ConfigError;
use crate::interceptor::Interceptors;
use crate::route::{DataProducer, RouteVariant};
use crate::script::ScriptHost;
use crate::server::MockServer;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_PORT: u16 = 31299;

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Root of a declaration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix applied before the REST and GraphQL base URLs.
    #[serde(default)]
    pub base_url: String,

    /// Global interceptors.
    #[serde(default)]
    pub interceptors: InterceptorsConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest: Option<RestConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphql: Option<GraphqlConfig>,

    /// Directory relative `file` producers resolve against.
    #[serde(skip)]
    pub root: Option<PathBuf>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            base_url: String::new(),
            interceptors: InterceptorsConfig::default(),
            rest: None,
            graphql: None,
            root: None,
        }
    }
}

impl MockServerConfig {
    /// Load a YAML or JSON declaration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.root = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Compile every declaration into a ready-to-serve [`MockServer`].
    pub fn compile(&self) -> Result<MockServer, ConfigError> {
        let compiler = Compiler {
            scripts: ScriptHost::new(),
            root: self.root.as_deref(),
        };
        let global = compiler.interceptors(&self.interceptors, "interceptors")?;

        let mut server = MockServer::new();
        if let Some(rest) = &self.rest {
            server = server.with_rest(rest.compile(&self.base_url, &global, &compiler)?);
        }
        if let Some(graphql) = &self.graphql {
            server = server.with_graphql(graphql.compile(&self.base_url, &global, &compiler)?);
        }
        Ok(server)
    }
}

/// Request and response interceptor scripts at one scope.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InterceptorsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Variants only carry a response interceptor.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RouteInterceptorsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// A literal string or `{ regExp: <pattern> }`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TextPattern {
    Literal(String),
    Pattern {
        #[serde(rename = "regExp")]
        reg_exp: String,
    },
}

/// One route variant.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RouteConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entities: BTreeMap<Entity, Value>,

    /// Constant response data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Rhai script computing the response data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_script: Option<String>,

    /// File served as the response body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub interceptors: RouteInterceptorsConfig,
}

pub(crate) struct Compiler<'a> {
    scripts: ScriptHost,
    root: Option<&'a Path>,
}

impl Compiler<'_> {
    pub(crate) fn interceptors(
        &self,
        config: &InterceptorsConfig,
        location: &str,
    ) -> Result<Interceptors, ConfigError> {
        let mut interceptors = Interceptors::new();
        if let Some(source) = &config.request {
            interceptors = interceptors.with_request(
                self.scripts
                    .request_interceptor(source)
                    .map_err(|e| locate(e, location))?,
            );
        }
        if let Some(source) = &config.response {
            interceptors = interceptors.with_response(
                self.scripts
                    .response_interceptor(source)
                    .map_err(|e| locate(e, location))?,
            );
        }
        Ok(interceptors)
    }

    pub(crate) fn routes(
        &self,
        routes: &[RouteConfig],
        allowed: &[Entity],
        location: &str,
    ) -> Result<Vec<RouteVariant>, ConfigError> {
        routes
            .iter()
            .enumerate()
            .map(|(i, route)| self.route(route, allowed, &format!("{location}.routes[{i}]")))
            .collect()
    }

    fn route(&self, route: &RouteConfig, allowed: &[Entity], location: &str) -> Result<RouteVariant, ConfigError> {
        let data = match (&route.data, &route.data_script, &route.file) {
            (data, None, None) => DataProducer::Constant(data.clone().unwrap_or(Value::Null)),
            (None, Some(source), None) => DataProducer::Function(
                self.scripts.producer(source).map_err(|e| locate(e, location))?,
            ),
            (None, None, Some(file)) => DataProducer::File(self.resolve_file(file)),
            _ => {
                return Err(ConfigError::invalid(
                    location,
                    "declare only one of 'data', 'dataScript' or 'file'",
                ))
            }
        };

        let mut variant = RouteVariant::new(data).with_entities(self.entities(&route.entities, allowed, location)?);
        if let Some(source) = &route.interceptors.response {
            variant = variant.with_interceptor(
                self.scripts
                    .response_interceptor(source)
                    .map_err(|e| locate(e, location))?,
            );
        }
        debug!(location, weight = variant.weight(), "compiled route variant");
        Ok(variant)
    }

    fn entities(
        &self,
        entities: &BTreeMap<Entity, Value>,
        allowed: &[Entity],
        location: &str,
    ) -> Result<EntityConstraints, ConfigError> {
        let mut constraints = EntityConstraints::new();
        for (entity, value) in entities {
            if !allowed.contains(entity) {
                return Err(ConfigError::invalid(
                    location,
                    format!("entity '{entity}' is not available here"),
                ));
            }
            if entity.is_mapped() {
                let Value::Object(fields) = value else {
                    return Err(ConfigError::invalid(
                        location,
                        format!("'{entity}' must map field names to values"),
                    ));
                };
                for (key, raw) in fields {
                    let descriptor = CompiledDescriptor::compile(&normalize(raw), &self.scripts)
                        .map_err(|e| locate(e, &format!("{location}.entities.{entity}.{key}")))?;
                    constraints.insert_field(*entity, key.clone(), descriptor);
                }
            } else {
                let descriptor = CompiledDescriptor::compile(&normalize(value), &self.scripts)
                    .map_err(|e| locate(e, &format!("{location}.entities.{entity}")))?;
                constraints.insert_value(*entity, descriptor);
            }
        }
        Ok(constraints)
    }

    fn resolve_file(&self, file: &Path) -> PathBuf {
        match self.root {
            Some(root) if file.is_relative() => root.join(file),
            _ => file.to_path_buf(),
        }
    }
}

pub(crate) fn compile_regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

/// Attach a location to script errors, which carry none of their own.
fn locate(error: ConfigError, location: &str) -> ConfigError {
    match error {
        ConfigError::Script(message) => ConfigError::invalid(location, message),
        other => other,
    }
}

/// Join two URL prefixes: `("/api", "rest/")` is `/api/rest`, `("", "")` is
/// empty.
pub(crate) fn join_base(outer: &str, inner: &str) -> String {
    let mut joined = String::new();
    for part in [outer, inner] {
        let part = part.trim_matches('/');
        if !part.is_empty() {
            joined.push('/');
            joined.push_str(part);
        }
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = MockServerConfig::parse("{}").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.rest.is_none());
        assert!(config.graphql.is_none());
    }

    #[test]
    fn test_join_base() {
        assert_eq!(join_base("/api", "rest/"), "/api/rest");
        assert_eq!(join_base("", "/graphql"), "/graphql");
        assert_eq!(join_base("/", ""), "");
    }

    #[test]
    fn test_from_file_resolves_files_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirage.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
port: 8080
rest:
  configs:
    - path: /report
      method: get
      routes:
        - file: report.csv
"#
        )
        .unwrap();

        let config = MockServerConfig::from_file(&path).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.root.as_deref(), Some(dir.path()));

        let compiler = Compiler {
            scripts: ScriptHost::new(),
            root: config.root.as_deref(),
        };
        let routes = &config.rest.as_ref().unwrap().configs[0].routes;
        let variants = compiler.routes(routes, &[], "rest.configs[0]").unwrap();
        assert!(matches!(
            variants[0].data(),
            DataProducer::File(path) if path == &dir.path().join("report.csv")
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = MockServerConfig::from_file("/definitely/not/here.yaml");
        assert!(matches!(err, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_conflicting_producers() {
        let route: RouteConfig =
            serde_yaml::from_str("data: {a: 1}\ndataScript: '#{}'").unwrap();
        let compiler = Compiler {
            scripts: ScriptHost::new(),
            root: None,
        };
        let err = compiler.route(&route, &[], "route").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDeclaration { .. }));
    }

    #[test]
    fn test_entities_are_normalized() {
        let route: RouteConfig = serde_yaml::from_str(
            r#"
entities:
  headers:
    Authorization: { checkMode: startsWith, value: "Bearer " }
    x-id: 7
  query:
    tag: [a, b]
data: ok
"#,
        )
        .unwrap();
        let compiler = Compiler {
            scripts: ScriptHost::new(),
            root: None,
        };
        let variant = compiler
            .route(&route, &[Entity::Headers, Entity::Query], "route")
            .unwrap();
        assert_eq!(variant.weight(), 3);
        assert_eq!(
            variant.entities().to_json(),
            serde_json::json!({
                "headers": {
                    "authorization": {"checkMode": "startsWith", "value": "Bearer "},
                    "x-id": {"checkMode": "equals", "value": 7}
                },
                "query": {"tag": {"checkMode": "equals", "value": ["a", "b"]}}
            })
        );
    }

    #[test]
    fn test_disallowed_entity() {
        let route: RouteConfig = serde_yaml::from_str("entities: {body: {a: 1}}").unwrap();
        let compiler = Compiler {
            scripts: ScriptHost::new(),
            root: None,
        };
        let err = compiler.route(&route, &[Entity::Headers], "route").unwrap_err();
        assert!(err.to_string().contains("entity 'body' is not available here"));
    }

    #[test]
    fn test_bad_script_is_located() {
        let config = MockServerConfig::parse("interceptors: { response: 'let = ;' }").unwrap();
        let err = config.compile().unwrap_err();
        assert!(err.to_string().starts_with("invalid declaration at interceptors"));
    }
}
