//! Interceptor stages and the chain runner.
//!
//! Response interceptors receive the current data and return the data passed
//! to the next stage. The chain for a matched request always runs in the order
//! variant, endpoint, protocol, global. Request interceptors run before the
//! variant is chosen, global first.

mod context;

pub use context::{CookieOptions, InterceptorContext, ResponseControl, SetCookie};

use crate::error::DispatchError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Transforms response data and controls the outgoing response.
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    async fn intercept(
        &self,
        data: Value,
        ctx: &mut InterceptorContext<'_>,
    ) -> Result<Value, DispatchError>;
}

/// Observes a request before its response is produced.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn intercept(&self, ctx: &mut InterceptorContext<'_>) -> Result<(), DispatchError>;
}

struct FnResponseInterceptor<F>(F);

#[async_trait]
impl<F> ResponseInterceptor for FnResponseInterceptor<F>
where
    F: Fn(Value, &mut InterceptorContext<'_>) -> Result<Value, DispatchError> + Send + Sync,
{
    async fn intercept(
        &self,
        data: Value,
        ctx: &mut InterceptorContext<'_>,
    ) -> Result<Value, DispatchError> {
        (self.0)(data, ctx)
    }
}

struct FnRequestInterceptor<F>(F);

#[async_trait]
impl<F> RequestInterceptor for FnRequestInterceptor<F>
where
    F: Fn(&mut InterceptorContext<'_>) -> Result<(), DispatchError> + Send + Sync,
{
    async fn intercept(&self, ctx: &mut InterceptorContext<'_>) -> Result<(), DispatchError> {
        (self.0)(ctx)
    }
}

/// Wrap a synchronous closure as a response interceptor.
pub fn response_fn<F>(f: F) -> Arc<dyn ResponseInterceptor>
where
    F: Fn(Value, &mut InterceptorContext<'_>) -> Result<Value, DispatchError> + Send + Sync + 'static,
{
    Arc::new(FnResponseInterceptor(f))
}

/// Wrap a synchronous closure as a request interceptor.
pub fn request_fn<F>(f: F) -> Arc<dyn RequestInterceptor>
where
    F: Fn(&mut InterceptorContext<'_>) -> Result<(), DispatchError> + Send + Sync + 'static,
{
    Arc::new(FnRequestInterceptor(f))
}

/// Optional request and response stage declared at one scope.
#[derive(Clone, Default)]
pub struct Interceptors {
    pub request: Option<Arc<dyn RequestInterceptor>>,
    pub response: Option<Arc<dyn ResponseInterceptor>>,
}

impl Interceptors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.request = Some(interceptor);
        self
    }

    pub fn with_response(mut self, interceptor: Arc<dyn ResponseInterceptor>) -> Self {
        self.response = Some(interceptor);
        self
    }
}

impl std::fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptors")
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .finish()
    }
}

/// Run the present request stages in order.
pub(crate) async fn run_request_chain(
    stages: &[Option<&Arc<dyn RequestInterceptor>>],
    ctx: &mut InterceptorContext<'_>,
) -> Result<(), DispatchError> {
    for stage in stages.iter().flatten() {
        stage.intercept(ctx).await?;
    }
    Ok(())
}

/// Thread `data` through the present response stages in order. Absent stages
/// are skipped; the first error aborts the chain.
pub(crate) async fn run_response_chain(
    mut data: Value,
    stages: &[Option<&Arc<dyn ResponseInterceptor>>],
    ctx: &mut InterceptorContext<'_>,
) -> Result<Value, DispatchError> {
    for stage in stages.iter().flatten() {
        data = stage.intercept(data, ctx).await?;
    }
    Ok(data)
}
