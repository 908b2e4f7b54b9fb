//! Response handling and transformation.
//!
//! # Responsibilities
//! - Convert the container `Response` into an axum response
//! - Carry the content type over as a header
//!
//! # Design Decisions
//! - The container buffers the full body; it is sent in one piece
//! - Out-of-range status codes become 500

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};

use crate::response::Response;

pub fn into_http(response: Response) -> axum::response::Response {
    let (status, mut headers, content_type, body) = response.into_parts();
    if let Some(value) = content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
        headers.insert(header::CONTENT_TYPE, value);
    }

    let mut out = axum::response::Response::new(Body::from(body));
    *out.status_mut() = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    *out.headers_mut() = headers;
    out
}
