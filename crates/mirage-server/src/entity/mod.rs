//! Entities and the constraints route variants place on them.
//!
//! An entity is a named facet of a request: headers, cookies, query, params,
//! body (REST) or variables (GraphQL). Mapped entities are constrained field by
//! field; plain entities are constrained as one whole value.
//!
//! ## Module Structure
//!
//! - `check_mode`: the comparison relations
//! - `descriptor`: canonical and compiled descriptors, plus `normalize`
//! - `predicate`: the `function` check mode and its `Checker` recursion handle

mod check_mode;
mod descriptor;
mod predicate;

pub use check_mode::{CheckMode, UnknownCheckMode};
pub use descriptor::{normalize, CompiledDescriptor, EntityDescriptor, ExpectedValue};
pub use predicate::{Checker, EntityPredicate};

use crate::request::LiveRequest;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Named request facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Entity {
    Headers,
    Cookies,
    Query,
    Params,
    Body,
    Variables,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Headers => "headers",
            Entity::Cookies => "cookies",
            Entity::Query => "query",
            Entity::Params => "params",
            Entity::Body => "body",
            Entity::Variables => "variables",
        }
    }

    /// Mapped entities are key/value collections constrained per field.
    pub fn is_mapped(&self) -> bool {
        matches!(
            self,
            Entity::Headers | Entity::Cookies | Entity::Query | Entity::Params
        )
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraint set of one route variant.
///
/// Every constrained entity must resolve true for the variant to match. An
/// empty set matches any request.
#[derive(Debug, Clone, Default)]
pub struct EntityConstraints {
    fields: BTreeMap<Entity, BTreeMap<String, CompiledDescriptor>>,
    whole: BTreeMap<Entity, CompiledDescriptor>,
}

impl EntityConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain one field of an entity. Header names are case-insensitive.
    pub fn with_field(
        mut self,
        entity: Entity,
        key: impl Into<String>,
        descriptor: CompiledDescriptor,
    ) -> Self {
        self.insert_field(entity, key, descriptor);
        self
    }

    /// Constrain an entity as one whole value.
    pub fn with_value(mut self, entity: Entity, descriptor: CompiledDescriptor) -> Self {
        self.insert_value(entity, descriptor);
        self
    }

    pub fn insert_field(&mut self, entity: Entity, key: impl Into<String>, descriptor: CompiledDescriptor) {
        let key = key.into();
        let key = if entity == Entity::Headers {
            key.to_ascii_lowercase()
        } else {
            key
        };
        self.fields.entry(entity).or_default().insert(key, descriptor);
    }

    pub fn insert_value(&mut self, entity: Entity, descriptor: CompiledDescriptor) {
        self.whole.insert(entity, descriptor);
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(BTreeMap::is_empty) && self.whole.is_empty()
    }

    /// Specificity weight: one per constrained field, plus each whole-value
    /// descriptor's own weight.
    pub fn weight(&self) -> usize {
        let mapped: usize = self.fields.values().map(BTreeMap::len).sum();
        let plain: usize = self.whole.values().map(CompiledDescriptor::weight).sum();
        mapped + plain
    }

    /// Whether every constrained entity of `request` satisfies its descriptors.
    pub fn matches(&self, request: &LiveRequest) -> bool {
        let fields_match = self.fields.iter().all(|(entity, fields)| {
            let live = request.fields(*entity);
            fields.iter().all(|(key, descriptor)| {
                descriptor.matches(live.as_deref().and_then(|map| map.get(key)))
            })
        });
        fields_match
            && self.whole.iter().all(|(entity, descriptor)| {
                descriptor.matches(request.value(*entity).as_deref())
            })
    }

    /// Canonical JSON view, keyed by entity name.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        for (entity, fields) in &self.fields {
            let fields: Map<String, Value> = fields
                .iter()
                .map(|(key, descriptor)| (key.clone(), descriptor_json(descriptor)))
                .collect();
            out.insert(entity.as_str().to_string(), Value::Object(fields));
        }
        for (entity, descriptor) in &self.whole {
            out.insert(entity.as_str().to_string(), descriptor_json(descriptor));
        }
        Value::Object(out)
    }
}

fn descriptor_json(descriptor: &CompiledDescriptor) -> Value {
    serde_json::to_value(descriptor.to_descriptor()).unwrap_or(Value::Null)
}
