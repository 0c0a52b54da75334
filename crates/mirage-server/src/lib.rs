//! Mirage: a configuration-driven mock server for REST and GraphQL APIs.
//!
//! Requests are answered in two stages. An endpoint is identified by method
//! and path (REST) or operation type and name (GraphQL). Then the endpoint's
//! route variants, ranked by specificity, are tested against the request's
//! entities and the first match produces the response data, which flows
//! through the interceptor chain.

pub mod config;
pub mod dispatch;
pub mod entity;
pub mod error;
pub mod graphql;
pub mod interceptor;
pub mod matching;
pub mod request;
pub mod rest;
pub mod route;
pub mod script;
pub mod server;

pub use config::MockServerConfig;
pub use dispatch::{Dispatch, MatchedResponse};
pub use error::{ConfigError, DispatchError};
pub use request::LiveRequest;
pub use server::MockServer;
