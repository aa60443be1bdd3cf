//! Fixed response headers.
//!
//! Every response, including errors and unmatched routes, carries the same
//! permissive CORS headers and disables caching. Preflight `OPTIONS` requests
//! are answered by the relay handler itself so that plain `OPTIONS` probes
//! without `Origin` headers get the same treatment.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CACHE_CONTROL,
};
use axum::http::{HeaderName, HeaderValue};
use tower::layer::util::{Identity, Stack};
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type";
pub const CACHE_POLICY: &str = "no-store";

type Set = SetResponseHeaderLayer<HeaderValue>;

/// Layer stack that overwrites the four fixed headers on every response.
pub fn fixed_headers_layer() -> ServiceBuilder<Stack<Set, Stack<Set, Stack<Set, Stack<Set, Identity>>>>> {
    ServiceBuilder::new()
        .layer(set(ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN))
        .layer(set(ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS))
        .layer(set(ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS))
        .layer(set(CACHE_CONTROL, CACHE_POLICY))
}

fn set(name: HeaderName, value: &'static str) -> Set {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}
