//! Serves the HLS artifacts a session's transcoder writes.
//!
//! Playlists are re-read on every request (they grow while the encoder
//! runs, so caching would stall the player); segments are immutable and
//! streamed straight from disk.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::Response;
use tokio_util::io::ReaderStream;

use hls_session::store::is_valid_session_id;

use crate::error::ApiError;
use crate::state::SharedState;

/// Artifact names are transcoder output: playlists and segments only.
fn is_valid_artifact_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 128 || name.contains("..") {
        return false;
    }
    let mut chars = name.chars();
    chars.clone().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        && chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
}

pub async fn serve(
    State(state): State<SharedState>,
    Path((session, file)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    if !is_valid_session_id(&session) || !is_valid_artifact_name(&file) {
        return Err(ApiError::BadRequest("invalid artifact path".to_string()));
    }

    let path = state.store.root().join(&session).join(&file);
    let handle = match tokio::fs::File::open(&path).await {
        Ok(handle) => handle,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ApiError::NotFound),
        Err(e) => return Err(e.into()),
    };

    let mut response = Response::builder();
    if file.ends_with(".m3u8") {
        response = response
            .header(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")
            .header(header::CACHE_CONTROL, "no-cache");
    } else if file.ends_with(".ts") {
        response = response.header(header::CONTENT_TYPE, "video/mp2t");
    } else {
        response = response.header(header::CONTENT_TYPE, "application/octet-stream");
    }

    response
        .body(Body::from_stream(ReaderStream::new(handle)))
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}
