//! HTTP-boundary helpers for the upgrade handshake.

use axum::body::Body;
use axum::http::header::SEC_WEBSOCKET_PROTOCOL;
use axum::http::{HeaderMap, Response, StatusCode};
use axum::response::IntoResponse;
use portico_core::negotiate::parse_protocol_header;

/// Subprotocols the client requested, in client order.
pub fn requested_protocols(headers: &HeaderMap) -> Vec<String> {
    parse_protocol_header(
        headers
            .get_all(SEC_WEBSOCKET_PROTOCOL)
            .iter()
            .filter_map(|value| value.to_str().ok()),
    )
}

/// Body-less 400 response advertising every supported subprotocol, so the
/// client can retry with a valid choice.
pub fn reject_response(protocols: &[String]) -> Response<Body> {
    let mut response = Response::builder().status(StatusCode::BAD_REQUEST);
    for protocol in protocols {
        response = response.header(SEC_WEBSOCKET_PROTOCOL, protocol);
    }
    response
        .body(Body::empty())
        .unwrap_or_else(|_| StatusCode::BAD_REQUEST.into_response())
}
