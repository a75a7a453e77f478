//! Stateless subtitle extraction.
//!
//! One transcoder run per request: the selected source stream is
//! converted to WebVTT and piped straight to the response. No session is
//! involved; the client passes the absolute stream index it got from
//! `metadata`.

use std::collections::HashMap;
use std::process::Stdio;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::Response;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::error::ApiError;
use crate::state::SharedState;

pub async fn extract(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let url = params.get("url").ok_or(ApiError::MissingParam("url"))?;
    let index: usize = params
        .get("index")
        .ok_or(ApiError::MissingParam("index"))?
        .parse()
        .map_err(|_| ApiError::BadRequest("index must be a stream number".to_string()))?;

    let mut child = Command::new(&state.config.ffmpeg)
        .args([
            "-loglevel",
            "error",
            "-i",
            url,
            "-map",
            &format!("0:{}", index),
            "-f",
            "webvtt",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        // The extraction dies with the request.
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ApiError::BadRequest("no extractor output".to_string()))?;

    let stream = async_stream::stream! {
        let mut reader = BufReader::with_capacity(65536, stdout);
        let mut buf = vec![0u8; 65536];

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => yield Ok::<_, std::io::Error>(Bytes::copy_from_slice(&buf[..n])),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }

        let _ = child.wait().await;
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "text/vtt")
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}
