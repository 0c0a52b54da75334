//! Second dispatch stage shared by the REST and GraphQL dispatchers: request
//! interceptors, variant choice, data production, then the response chain.

use crate::error::DispatchError;
use crate::interceptor::{
    run_request_chain, run_response_chain, InterceptorContext, Interceptors, ResponseControl,
};
use crate::request::LiveRequest;
use crate::route::{find_variant, RouteVariant};
use serde_json::Value;
use tracing::debug;

/// Outcome of dispatching one request.
#[derive(Debug)]
pub enum Dispatch {
    Matched(MatchedResponse),
    /// No endpoint, or no variant of the identified endpoint, matched.
    Unmatched,
}

impl Dispatch {
    pub fn is_matched(&self) -> bool {
        matches!(self, Dispatch::Matched(_))
    }

    pub fn into_matched(self) -> Option<MatchedResponse> {
        match self {
            Dispatch::Matched(response) => Some(response),
            Dispatch::Unmatched => None,
        }
    }
}

/// Final data plus the response effects accumulated by interceptors.
#[derive(Debug)]
pub struct MatchedResponse {
    pub data: Value,
    pub control: ResponseControl,
}

/// The three interceptor scopes above a variant.
#[derive(Clone, Copy)]
pub(crate) struct Scopes<'a> {
    pub endpoint: &'a Interceptors,
    pub protocol: &'a Interceptors,
    pub global: &'a Interceptors,
}

/// Answer a request for an identified endpoint.
///
/// `variants` must already be ranked. Producer and interceptor errors
/// propagate unchanged.
pub(crate) async fn respond(
    request: &LiveRequest,
    variants: &[RouteVariant],
    scopes: Scopes<'_>,
) -> Result<Dispatch, DispatchError> {
    let mut control = ResponseControl::new();

    {
        let mut ctx = InterceptorContext::new(request, &mut control);
        run_request_chain(
            &[
                scopes.global.request.as_ref(),
                scopes.protocol.request.as_ref(),
                scopes.endpoint.request.as_ref(),
            ],
            &mut ctx,
        )
        .await?;
    }

    let Some(variant) = find_variant(variants, request) else {
        debug!(method = %request.method, path = %request.path, "no variant matched");
        return Ok(Dispatch::Unmatched);
    };
    debug!(
        method = %request.method,
        path = %request.path,
        weight = variant.weight(),
        "variant matched"
    );

    let data = variant.produce(request, &mut control)?;

    let mut ctx = InterceptorContext::new(request, &mut control);
    let data = run_response_chain(
        data,
        &[
            variant.interceptor(),
            scopes.endpoint.response.as_ref(),
            scopes.protocol.response.as_ref(),
            scopes.global.response.as_ref(),
        ],
        &mut ctx,
    )
    .await?;

    Ok(Dispatch::Matched(MatchedResponse { data, control }))
}
