//! HTTP middleware functions: request metrics and standard response headers.

use axum::{
    extract::{MatchedPath, Request},
    http::header::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

use crate::middleware::auth::REQUEST_ID_HEADER;
use crate::telemetry::RequestDurationHistogram;

/// Record duration and count per matched route.
///
/// Unmatched requests are grouped under a single label to keep cardinality
/// bounded.
pub async fn request_metrics(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    RequestDurationHistogram::record(
        &method,
        &route,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Settle the request ID, echo it and set `nosniff`.
///
/// Runs outside the auth layer. A missing or unusable `X-Request-ID` is
/// replaced with a fresh UUID and written back onto the request, so the auth
/// layer and the handlers see the same ID that the response carries.
pub async fn response_headers(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|v| v.to_str().map_or(false, |s| !s.is_empty()))
        .cloned()
        .unwrap_or_else(fresh_request_id);
    req.headers_mut().insert(REQUEST_ID, request_id.clone());

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(REQUEST_ID, request_id);
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    response
}

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn fresh_request_id() -> HeaderValue {
    // A hyphenated UUID is always a valid header value.
    HeaderValue::from_str(&Uuid::new_v4().to_string())
        .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
}
