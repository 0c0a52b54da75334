//! Rhai scripting for declarations loaded from config files.
//!
//! Scripts are compiled once at load time and shared through `Arc<AST>`.
//! Available scopes:
//!
//! - entity predicates (`checkMode: function`): `actual`, plus the native
//!   `check(mode, actual, expected)` and `check_one_of(mode, actual, list)`
//! - data producers (`dataScript`): `request`, `entities`
//! - response interceptors: `data`, `request`, `response`; the script's value
//!   is the new data (`()` keeps the current data)
//! - request interceptors: `request`, `response`

mod convert;
mod response;

use crate::entity::{CheckMode, Checker, EntityConstraints, EntityPredicate};
use crate::error::{ConfigError, DispatchError};
use crate::interceptor::{InterceptorContext, RequestInterceptor, ResponseInterceptor};
use crate::request::LiveRequest;
use crate::route::ProduceData;
use async_trait::async_trait;
use convert::{dynamic_to_json, json_to_dynamic};
use response::{apply, ScriptResponse};
use rhai::{Dynamic, Engine, Scope, AST};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Operation budget for one script evaluation. A script that exceeds it
/// fails with a runtime error instead of stalling the worker thread.
pub const MAX_OPERATIONS: u64 = 1_000_000;

/// Shared Rhai engine with the mock-server API registered.
#[derive(Clone)]
pub struct ScriptHost {
    engine: Arc<Engine>,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptHost {
    pub fn new() -> Self {
        Self {
            engine: Arc::new(Self::create_engine()),
        }
    }

    fn create_engine() -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);

        engine.register_fn("check", |mode: String, actual: Dynamic, expected: Dynamic| -> bool {
            let Ok(mode) = mode.parse::<CheckMode>() else {
                warn!("check called with unknown mode '{mode}'");
                return false;
            };
            let actual = (!actual.is_unit()).then(|| dynamic_to_json(actual));
            Checker.check(mode, actual.as_ref(), &dynamic_to_json(expected))
        });
        engine.register_fn(
            "check_one_of",
            |mode: String, actual: Dynamic, expected: Dynamic| -> bool {
                let Ok(mode) = mode.parse::<CheckMode>() else {
                    warn!("check_one_of called with unknown mode '{mode}'");
                    return false;
                };
                let actual = (!actual.is_unit()).then(|| dynamic_to_json(actual));
                Checker.check_one_of(mode, actual.as_ref(), &dynamic_to_json(expected))
            },
        );

        ScriptResponse::register(&mut engine);
        engine
    }

    pub fn compile(&self, source: &str) -> Result<Arc<AST>, ConfigError> {
        self.engine
            .compile(source)
            .map(Arc::new)
            .map_err(|e| ConfigError::Script(format!("{e}")))
    }

    /// Entity predicate for `checkMode: function`.
    pub fn predicate(&self, source: &str) -> Result<Arc<dyn EntityPredicate>, ConfigError> {
        Ok(Arc::new(ScriptPredicate {
            engine: self.engine.clone(),
            ast: self.compile(source)?,
        }))
    }

    pub fn producer(&self, source: &str) -> Result<Arc<dyn ProduceData>, ConfigError> {
        Ok(Arc::new(ScriptProducer {
            engine: self.engine.clone(),
            ast: self.compile(source)?,
        }))
    }

    pub fn response_interceptor(&self, source: &str) -> Result<Arc<dyn ResponseInterceptor>, ConfigError> {
        Ok(Arc::new(ScriptResponseInterceptor {
            engine: self.engine.clone(),
            ast: self.compile(source)?,
        }))
    }

    pub fn request_interceptor(&self, source: &str) -> Result<Arc<dyn RequestInterceptor>, ConfigError> {
        Ok(Arc::new(ScriptRequestInterceptor {
            engine: self.engine.clone(),
            ast: self.compile(source)?,
        }))
    }
}

struct ScriptPredicate {
    engine: Arc<Engine>,
    ast: Arc<AST>,
}

impl EntityPredicate for ScriptPredicate {
    /// A failing script does not match.
    fn test(&self, actual: Option<&Value>, _checker: &Checker) -> bool {
        let mut scope = Scope::new();
        scope.push_dynamic("actual", actual.map(json_to_dynamic).unwrap_or(Dynamic::UNIT));
        match self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast) {
            Ok(result) => result.as_bool().unwrap_or(false),
            Err(e) => {
                warn!("predicate script failed: {e}");
                false
            }
        }
    }
}

struct ScriptProducer {
    engine: Arc<Engine>,
    ast: Arc<AST>,
}

impl ProduceData for ScriptProducer {
    fn produce(&self, request: &LiveRequest, entities: &EntityConstraints) -> Result<Value, DispatchError> {
        let mut scope = Scope::new();
        scope.push_dynamic("request", json_to_dynamic(&request.to_json()));
        scope.push_dynamic("entities", json_to_dynamic(&entities.to_json()));
        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
            .map(dynamic_to_json)
            .map_err(|e| DispatchError::Producer(format!("{e}")))
    }
}

struct ScriptResponseInterceptor {
    engine: Arc<Engine>,
    ast: Arc<AST>,
}

#[async_trait]
impl ResponseInterceptor for ScriptResponseInterceptor {
    async fn intercept(
        &self,
        data: Value,
        ctx: &mut InterceptorContext<'_>,
    ) -> Result<Value, DispatchError> {
        let response = ScriptResponse::new();
        let result = {
            let mut scope = Scope::new();
            scope.push_dynamic("data", json_to_dynamic(&data));
            scope.push_dynamic("request", json_to_dynamic(&ctx.request().to_json()));
            scope.push("response", response.clone());
            self.engine
                .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
                .map_err(|e| DispatchError::Script(format!("{e}")))?
        };

        apply(response.take(), ctx).await;
        if result.is_unit() {
            Ok(data)
        } else {
            Ok(dynamic_to_json(result))
        }
    }
}

struct ScriptRequestInterceptor {
    engine: Arc<Engine>,
    ast: Arc<AST>,
}

#[async_trait]
impl RequestInterceptor for ScriptRequestInterceptor {
    async fn intercept(&self, ctx: &mut InterceptorContext<'_>) -> Result<(), DispatchError> {
        let response = ScriptResponse::new();
        {
            let mut scope = Scope::new();
            scope.push_dynamic("request", json_to_dynamic(&ctx.request().to_json()));
            scope.push("response", response.clone());
            let _result = self
                .engine
                .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
                .map_err(|e| DispatchError::Script(format!("{e}")))?;
        }
        apply(response.take(), ctx).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CompiledDescriptor, Entity};
    use crate::interceptor::ResponseControl;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_predicate_script() {
        let host = ScriptHost::new();
        let predicate = host.predicate("actual > 10").unwrap();
        assert!(predicate.test(Some(&json!(11)), &Checker));
        assert!(!predicate.test(Some(&json!(3)), &Checker));
        // missing values arrive as `()`
        assert!(!predicate.test(None, &Checker));
    }

    #[test]
    fn test_predicate_recursion_through_check() {
        let host = ScriptHost::new();
        let predicate = host
            .predicate(r#"check("startsWith", actual, "ab") || check_one_of("equals", actual, ["x", "y"])"#)
            .unwrap();
        assert!(predicate.test(Some(&json!("abc")), &Checker));
        assert!(predicate.test(Some(&json!("y")), &Checker));
        assert!(!predicate.test(Some(&json!("z")), &Checker));
    }

    #[test]
    fn test_compile_error() {
        let host = ScriptHost::new();
        assert!(matches!(host.predicate("let = ;"), Err(ConfigError::Script(_))));
    }

    #[test]
    fn test_producer_script() {
        let host = ScriptHost::new();
        let producer = host
            .producer(r#"#{ id: request.params.id, method: request.method, constrained: entities.params.id.checkMode }"#)
            .unwrap();
        let mut request = LiveRequest::new("GET", "/users/7");
        request.params.insert("id".into(), json!("7"));
        let entities =
            EntityConstraints::new().with_field(Entity::Params, "id", CompiledDescriptor::exists());

        let data = producer.produce(&request, &entities).unwrap();
        assert_eq!(data, json!({"id": "7", "method": "GET", "constrained": "exists"}));
    }

    #[tokio::test]
    async fn test_response_interceptor_script() {
        let host = ScriptHost::new();
        let interceptor = host
            .response_interceptor(
                r#"
                response.set_status(201);
                response.set_header("X-Mock", "mirage");
                response.set_cookie("session", "abc", #{ httpOnly: true });
                response.set_delay(1);
                data.wrapped = true;
                data
                "#,
            )
            .unwrap();
        let request = LiveRequest::new("POST", "/users");
        let mut control = ResponseControl::new();
        let mut ctx = InterceptorContext::new(&request, &mut control);

        let data = interceptor.intercept(json!({"id": 1}), &mut ctx).await.unwrap();
        assert_eq!(data, json!({"id": 1, "wrapped": true}));
        assert_eq!(control.status(), 201);
        assert_eq!(control.header("x-mock"), Some("mirage"));
        assert!(control.cookies()[0].options.http_only);
        assert_eq!(control.delay(), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_unit_result_keeps_data() {
        let host = ScriptHost::new();
        let interceptor = host.response_interceptor(r#"response.log("seen");"#).unwrap();
        let request = LiveRequest::new("GET", "/");
        let mut control = ResponseControl::new();
        let mut ctx = InterceptorContext::new(&request, &mut control);
        let data = interceptor.intercept(json!([1, 2]), &mut ctx).await.unwrap();
        assert_eq!(data, json!([1, 2]));
    }

    #[tokio::test]
    async fn test_request_interceptor_script() {
        let host = ScriptHost::new();
        let interceptor = host
            .request_interceptor(r#"if request.headers["x-slow"] == "1" { response.set_delay(2); }"#)
            .unwrap();
        let request = LiveRequest::new("GET", "/").with_header("X-Slow", "1");
        let mut control = ResponseControl::new();
        let mut ctx = InterceptorContext::new(&request, &mut control);
        interceptor.intercept(&mut ctx).await.unwrap();
        assert_eq!(control.delay(), Duration::from_millis(2));
    }

    #[tokio::test]
    async fn test_runaway_scripts_are_cut_off() {
        let host = ScriptHost::new();

        let predicate = host.predicate("let n = 0; loop { n += 1; } n > 0").unwrap();
        assert!(!predicate.test(Some(&json!(1)), &Checker));

        let producer = host.producer("let n = 0; loop { n += 1; }").unwrap();
        let request = LiveRequest::new("GET", "/");
        assert!(matches!(
            producer.produce(&request, &EntityConstraints::new()),
            Err(DispatchError::Producer(_))
        ));

        let interceptor = host.request_interceptor("let n = 0; while true { n += 1; }").unwrap();
        let mut control = ResponseControl::new();
        let mut ctx = InterceptorContext::new(&request, &mut control);
        assert!(matches!(
            interceptor.intercept(&mut ctx).await,
            Err(DispatchError::Script(_))
        ));
    }

    #[tokio::test]
    async fn test_script_runtime_error() {
        let host = ScriptHost::new();
        let interceptor = host.response_interceptor("throw \"nope\"").unwrap();
        let request = LiveRequest::new("GET", "/");
        let mut control = ResponseControl::new();
        let mut ctx = InterceptorContext::new(&request, &mut control);
        let result = interceptor.intercept(Value::Null, &mut ctx).await;
        assert!(matches!(result, Err(DispatchError::Script(_))));
    }
}
