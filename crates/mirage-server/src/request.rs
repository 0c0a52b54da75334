//! Live request: the already-parsed entity values the dispatcher matches against.

use crate::entity::Entity;
use crate::graphql::GraphqlOperation;
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Parsed request handed to the dispatchers.
///
/// Header names are lowercase. Query values are strings, or lists of strings
/// when a key repeats. `params` is filled by the REST dispatcher once an
/// endpoint path matched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveRequest {
    pub method: String,
    pub path: String,
    pub headers: Map<String, Value>,
    pub cookies: Map<String, Value>,
    pub query: Map<String, Value>,
    pub params: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphql: Option<GraphqlOperation>,
}

impl LiveRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_graphql(mut self, operation: GraphqlOperation) -> Self {
        self.graphql = Some(operation);
        self
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    pub fn cookie(&self, name: &str) -> Option<&Value> {
        self.cookies.get(name)
    }

    /// GraphQL variables, when this is a GraphQL request that carries them.
    pub fn variables(&self) -> Option<&Value> {
        self.graphql.as_ref().and_then(|op| op.variables.as_ref())
    }

    /// Entity as a key/value collection, for per-field constraints.
    pub fn fields(&self, entity: Entity) -> Option<Cow<'_, Map<String, Value>>> {
        match entity {
            Entity::Headers => Some(Cow::Borrowed(&self.headers)),
            Entity::Cookies => Some(Cow::Borrowed(&self.cookies)),
            Entity::Query => Some(Cow::Borrowed(&self.query)),
            Entity::Params => Some(Cow::Borrowed(&self.params)),
            Entity::Body => self.body.as_ref().and_then(Value::as_object).map(Cow::Borrowed),
            Entity::Variables => self.variables().and_then(Value::as_object).map(Cow::Borrowed),
        }
    }

    /// Entity as one whole value, for plain constraints.
    pub fn value(&self, entity: Entity) -> Option<Cow<'_, Value>> {
        match entity {
            Entity::Headers => Some(Cow::Owned(Value::Object(self.headers.clone()))),
            Entity::Cookies => Some(Cow::Owned(Value::Object(self.cookies.clone()))),
            Entity::Query => Some(Cow::Owned(Value::Object(self.query.clone()))),
            Entity::Params => Some(Cow::Owned(Value::Object(self.params.clone()))),
            Entity::Body => self.body.as_ref().map(Cow::Borrowed),
            Entity::Variables => self.variables().map(Cow::Borrowed),
        }
    }

    /// JSON snapshot for scripts.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
