//! Byte-range pass-through for native direct playback.
//!
//! TVs that can decode the source container get the raw bytes; the proxy
//! exists so the browser origin stays ours while `Range` seeking still
//! reaches the upstream server. Dropping the response mid-stream (client
//! disconnect) drops the upstream request with it.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::Response;

use crate::error::ApiError;
use crate::state::SharedState;

/// Upstream headers relayed back to the client.
const RELAYED_HEADERS: [header::HeaderName; 4] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
];

pub async fn direct_stream(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let url = params.get("url").ok_or(ApiError::MissingParam("url"))?;

    let mut request = if method == Method::HEAD {
        state.http.head(url)
    } else {
        state.http.get(url)
    };
    if let Some(range) = headers.get(header::RANGE) {
        request = request.header(header::RANGE, range);
    }
    if let Some(ua) = headers.get(header::USER_AGENT) {
        request = request.header(header::USER_AGENT, ua);
    }

    let upstream = request
        .send()
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    let mut response = Response::builder().status(status);
    for name in RELAYED_HEADERS {
        if let Some(value) = upstream.headers().get(&name) {
            response = response.header(name, value);
        }
    }

    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from_stream(upstream.bytes_stream())
    };

    response
        .body(body)
        .map_err(|e| ApiError::Upstream(e.to_string()))
}
