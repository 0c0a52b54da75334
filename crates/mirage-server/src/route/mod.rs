//! Route variants: one candidate answer for an endpoint.

mod rank;

pub use rank::rank;

use crate::entity::EntityConstraints;
use crate::error::DispatchError;
use crate::interceptor::{ResponseControl, ResponseInterceptor};
use crate::request::LiveRequest;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Computes response data for a matched request.
pub trait ProduceData: Send + Sync {
    fn produce(
        &self,
        request: &LiveRequest,
        entities: &EntityConstraints,
    ) -> Result<Value, DispatchError>;
}

impl<F> ProduceData for F
where
    F: Fn(&LiveRequest, &EntityConstraints) -> Result<Value, DispatchError> + Send + Sync,
{
    fn produce(
        &self,
        request: &LiveRequest,
        entities: &EntityConstraints,
    ) -> Result<Value, DispatchError> {
        self(request, entities)
    }
}

/// Where a variant's response data comes from.
#[derive(Clone)]
pub enum DataProducer {
    Constant(Value),
    Function(Arc<dyn ProduceData>),
    /// Serve a file from disk. The data seen by interceptors is the path.
    File(PathBuf),
}

impl DataProducer {
    pub fn function(f: impl ProduceData + 'static) -> Self {
        DataProducer::Function(Arc::new(f))
    }

    pub(crate) fn produce(
        &self,
        request: &LiveRequest,
        entities: &EntityConstraints,
        control: &mut ResponseControl,
    ) -> Result<Value, DispatchError> {
        match self {
            DataProducer::Constant(value) => Ok(value.clone()),
            DataProducer::Function(f) => f.produce(request, entities),
            DataProducer::File(path) => {
                control.send_file(path.clone());
                Ok(Value::String(path.display().to_string()))
            }
        }
    }
}

impl fmt::Debug for DataProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataProducer::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            DataProducer::Function(_) => f.write_str("Function(..)"),
            DataProducer::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl From<Value> for DataProducer {
    fn from(value: Value) -> Self {
        DataProducer::Constant(value)
    }
}

/// Entity constraints, a data producer and an optional variant-level
/// response interceptor.
#[derive(Clone)]
pub struct RouteVariant {
    entities: EntityConstraints,
    data: DataProducer,
    interceptor: Option<Arc<dyn ResponseInterceptor>>,
    weight: usize,
}

impl RouteVariant {
    pub fn new(data: impl Into<DataProducer>) -> Self {
        Self {
            entities: EntityConstraints::new(),
            data: data.into(),
            interceptor: None,
            weight: 0,
        }
    }

    pub fn with_entities(mut self, entities: EntityConstraints) -> Self {
        self.weight = entities.weight();
        self.entities = entities;
        self
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn entities(&self) -> &EntityConstraints {
        &self.entities
    }

    pub fn data(&self) -> &DataProducer {
        &self.data
    }

    pub fn interceptor(&self) -> Option<&Arc<dyn ResponseInterceptor>> {
        self.interceptor.as_ref()
    }

    /// Specificity weight, fixed when the constraints are set.
    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn matches(&self, request: &LiveRequest) -> bool {
        self.entities.matches(request)
    }

    pub(crate) fn produce(
        &self,
        request: &LiveRequest,
        control: &mut ResponseControl,
    ) -> Result<Value, DispatchError> {
        self.data.produce(request, &self.entities, control)
    }
}

impl fmt::Debug for RouteVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteVariant")
            .field("entities", &self.entities.to_json())
            .field("data", &self.data)
            .field("interceptor", &self.interceptor.is_some())
            .field("weight", &self.weight)
            .finish()
    }
}

/// First variant of an already-ranked list whose constraints all hold.
pub fn find_variant<'a>(variants: &'a [RouteVariant], request: &LiveRequest) -> Option<&'a RouteVariant> {
    variants.iter().find(|variant| variant.matches(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CompiledDescriptor, Entity};
    use serde_json::json;

    #[test]
    fn test_weight_follows_entities() {
        let variant = RouteVariant::new(json!("ok")).with_entities(
            EntityConstraints::new()
                .with_field(Entity::Params, "id", CompiledDescriptor::equals(1))
                .with_value(Entity::Body, CompiledDescriptor::equals(json!({"a": 1, "b": {"c": 2}}))),
        );
        assert_eq!(variant.weight(), 3);
        assert_eq!(RouteVariant::new(json!(null)).weight(), 0);
    }

    #[test]
    fn test_function_producer_sees_request_and_entities() {
        let variant = RouteVariant::new(DataProducer::function(
            |request: &LiveRequest, entities: &EntityConstraints| {
                Ok::<_, DispatchError>(json!({
                    "path": request.path,
                    "entities": entities.to_json()
                }))
            },
        ))
        .with_entities(EntityConstraints::new().with_field(
            Entity::Query,
            "q",
            CompiledDescriptor::exists(),
        ));
        let request = LiveRequest::new("GET", "/search").with_query("q", "rust");
        let mut control = ResponseControl::new();

        let data = variant.produce(&request, &mut control).unwrap();
        assert_eq!(
            data,
            json!({"path": "/search", "entities": {"query": {"q": {"checkMode": "exists"}}}})
        );
    }

    #[test]
    fn test_file_producer_marks_response() {
        let variant = RouteVariant::new(DataProducer::File(PathBuf::from("fixtures/report.csv")));
        let mut control = ResponseControl::new();
        let data = variant
            .produce(&LiveRequest::new("GET", "/report"), &mut control)
            .unwrap();
        assert_eq!(data, json!("fixtures/report.csv"));
        assert_eq!(control.file(), Some(&PathBuf::from("fixtures/report.csv")));
    }

    #[test]
    fn test_find_variant_takes_first_match() {
        let variants = vec![
            RouteVariant::new(json!("admin")).with_entities(EntityConstraints::new().with_field(
                Entity::Headers,
                "x-role",
                CompiledDescriptor::equals("admin"),
            )),
            RouteVariant::new(json!("fallback")),
        ];
        let admin = LiveRequest::new("GET", "/").with_header("X-Role", "admin");
        let guest = LiveRequest::new("GET", "/");
        assert!(matches!(
            find_variant(&variants, &admin).map(RouteVariant::data),
            Some(DataProducer::Constant(v)) if v == &json!("admin")
        ));
        assert!(matches!(
            find_variant(&variants, &guest).map(RouteVariant::data),
            Some(DataProducer::Constant(v)) if v == &json!("fallback")
        ));
    }
}
