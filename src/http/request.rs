//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for requests that arrive without one
//! - Convert the axum request head into the container `Request`
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Bodies are not read: the container works on the request head only

use axum::http::{request::Parts, HeaderValue};
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::request::Request;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID generator backed by UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Build the container request from the HTTP request head.
pub fn into_container(parts: &Parts) -> Request {
    let mut request = Request::new(parts.method.clone(), parts.uri.clone(), parts.headers.clone());
    let id = parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    request.set_request_id(id);
    request
}
