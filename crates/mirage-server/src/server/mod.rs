//! HTTP/1.1 transport: parses requests, routes them to the GraphQL or REST
//! dispatcher and renders the outcome.

mod request;
mod response;

use crate::dispatch::Dispatch;
use crate::error::DispatchError;
use crate::graphql::GraphqlDispatcher;
use crate::request::LiveRequest;
use crate::rest::RestDispatcher;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use request::{graphql_operation, live_request};
use response::{bad_request, internal_error, not_found, render_matched};
use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Compiled REST and GraphQL declarations behind one listener.
#[derive(Debug, Clone, Default)]
pub struct MockServer {
    rest: Option<RestDispatcher>,
    graphql: Option<GraphqlDispatcher>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rest(mut self, rest: RestDispatcher) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn with_graphql(mut self, graphql: GraphqlDispatcher) -> Self {
        self.graphql = Some(graphql);
        self
    }

    pub fn rest(&self) -> Option<&RestDispatcher> {
        self.rest.as_ref()
    }

    pub fn graphql(&self) -> Option<&GraphqlDispatcher> {
        self.graphql.as_ref()
    }

    /// Route a parsed request. Requests on the GraphQL path that carry an
    /// operation go to the GraphQL dispatcher; everything else is REST.
    pub async fn dispatch(&self, mut request: LiveRequest) -> Result<Dispatch, DispatchError> {
        if let Some(graphql) = self.graphql.as_ref().filter(|g| g.serves(&request.path)) {
            if request.graphql.is_none() {
                request.graphql = graphql_operation(&request);
            }
            if request.graphql.is_some() {
                return graphql.dispatch(&request).await;
            }
        }
        match &self.rest {
            Some(rest) => rest.dispatch(request).await,
            None => Ok(Dispatch::Unmatched),
        }
    }

    /// Answer one HTTP request. Never fails: errors become 4xx/5xx responses.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Display,
    {
        let started = Instant::now();
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("failed to read request body: {e}");
                return bad_request("failed to read request body");
            }
        };

        let live = live_request(&parts, &body);
        let method = live.method.clone();
        let path = live.path.clone();

        let response = match self.dispatch(live).await {
            Ok(Dispatch::Matched(matched)) => {
                let delay = matched.control.delay();
                match render_matched(matched).await {
                    Ok(response) => {
                        debug!(delay_ms = delay.as_millis() as u64, "rendered matched response");
                        response
                    }
                    Err(e) => {
                        error!(%method, %path, "failed to render response: {e}");
                        internal_error(&e)
                    }
                }
            }
            Ok(Dispatch::Unmatched) => not_found(&method, &path),
            Err(e) => {
                error!(%method, %path, "dispatch failed: {e}");
                internal_error(&e)
            }
        };

        info!(
            "{} {} -> {} ({}ms)",
            method,
            path,
            response.status().as_u16(),
            started.elapsed().as_millis()
        );
        response
    }

    /// Accept connections on `listener` until `shutdown` fires.
    pub async fn serve(self: Arc<Self>, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) {
        let addr = listener.local_addr().ok();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote)) => {
                            let server = Arc::clone(&self);
                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req| {
                                    let server = Arc::clone(&server);
                                    async move { Ok::<_, Infallible>(server.handle(req).await) }
                                });
                                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                    debug!("connection error from {remote}: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            error!("accept error: {e}");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("mock server on {} shutting down", display_addr(addr));
                    break;
                }
            }
        }
    }

    /// Bind `addr` and serve in a background task. Sending on (or dropping)
    /// the returned sender stops the listener.
    pub async fn spawn(self, addr: SocketAddr) -> std::io::Result<(SocketAddr, broadcast::Sender<()>)> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        info!("mock server listening on {local}");
        tokio::spawn(Arc::new(self).serve(listener, shutdown_rx));
        Ok((local, shutdown_tx))
    }
}

fn display_addr(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_else(|| "<unknown>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{CompiledDescriptor, Entity, EntityConstraints};
    use crate::graphql::{GraphqlEndpoint, OperationMatcher, OperationType};
    use crate::rest::{PathPattern, RestEndpoint, RestMethod};
    use crate::route::RouteVariant;
    use hyper::StatusCode;
    use serde_json::{json, Value};

    fn server() -> MockServer {
        MockServer::new()
            .with_rest(RestDispatcher::new(vec![RestEndpoint::new(
                PathPattern::template("/users/:id"),
                RestMethod::Get,
                vec![RouteVariant::new(json!({"id": "any"}))],
            )]))
            .with_graphql(GraphqlDispatcher::new(vec![GraphqlEndpoint::new(
                OperationType::Query,
                OperationMatcher::name("Ping"),
                vec![RouteVariant::new(json!({"data": {"ping": "pong"}})).with_entities(
                    EntityConstraints::new().with_field(Entity::Headers, "x-client", CompiledDescriptor::exists()),
                )],
            )]))
    }

    async fn json_body(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_handle_rest() {
        let response = server()
            .handle(Request::get("/users/5").body(Full::new(Bytes::new())).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"id": "any"}));
    }

    #[tokio::test]
    async fn test_handle_graphql() {
        let body = json!({"query": "query Ping { ping }"}).to_string();
        let request = Request::post("/graphql")
            .header("content-type", "application/json")
            .header("x-client", "test")
            .body(Full::new(Bytes::from(body)))
            .unwrap();
        let response = server().handle(request).await;
        assert_eq!(json_body(response).await, json!({"data": {"ping": "pong"}}));
    }

    #[tokio::test]
    async fn test_handle_unmatched() {
        let response = server()
            .handle(Request::delete("/users/5").body(Full::new(Bytes::new())).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Not found", "method": "DELETE", "path": "/users/5"})
        );
    }

    #[test]
    fn test_dispatch_blocking() {
        let dispatch = tokio_test::block_on(server().dispatch(LiveRequest::new("GET", "/users/9"))).unwrap();
        assert!(dispatch.is_matched());
    }
}
