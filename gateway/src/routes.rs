use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use hls_session::args::TranscodeJob;
use hls_session::{playlist, select_mode, AudioPlan, DeviceClass, Mode};
use media_probe::ProbeReport;

use crate::error::ApiError;
use crate::state::SharedState;
use crate::{artifacts, proxy, subtitle};

/// Build the gateway router. Every endpoint answers CORS preflight with
/// 204; the permissive CORS layer decorates the real responses.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/metadata", get(metadata).options(preflight))
        .route("/start", get(start).options(preflight))
        .route("/ping", get(ping).options(preflight))
        .route("/stop", get(stop).options(preflight))
        .route("/subtitle", get(subtitle::extract).options(preflight))
        .route("/direct-stream", get(proxy::direct_stream).options(preflight))
        .route("/client-log", post(client_log).options(preflight))
        .route("/hls/{session}/{file}", get(artifacts::serve).options(preflight))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Probe within the response budget. `start` treats any failure as
/// "unknown source, assume transcode", so this flattens errors to None.
async fn probe_best_effort(state: &SharedState, url: &str) -> Option<ProbeReport> {
    match tokio::time::timeout(state.config.probe_timeout(), state.prober.probe_url(url)).await {
        Ok(Ok(report)) => Some(report),
        Ok(Err(e)) => {
            tracing::warn!("probe of {} failed: {}", url, e);
            None
        }
        Err(_) => {
            tracing::warn!("probe of {} timed out", url);
            None
        }
    }
}

#[derive(Serialize)]
struct AudioOut {
    index: usize,
    lang: String,
    codec: String,
}

#[derive(Serialize)]
struct SubOut {
    index: usize,
    lang: String,
    title: String,
    codec: String,
}

#[derive(Serialize)]
struct MetadataResponse {
    audio: Vec<AudioOut>,
    subs: Vec<SubOut>,
    duration: f64,
}

async fn metadata(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<MetadataResponse>, ApiError> {
    let url = params.get("url").ok_or(ApiError::MissingParam("url"))?;

    let report = tokio::time::timeout(state.config.probe_timeout(), state.prober.probe_url(url))
        .await
        .map_err(|_| ApiError::ProbeTimeout)??;

    Ok(Json(MetadataResponse {
        audio: report
            .audio
            .into_iter()
            .map(|t| AudioOut {
                index: t.index,
                lang: t.lang,
                codec: t.codec,
            })
            .collect(),
        subs: report
            .subtitles
            .into_iter()
            .map(|t| SubOut {
                index: t.index,
                lang: t.lang,
                title: t.title,
                codec: t.codec,
            })
            .collect(),
        duration: report.duration,
    }))
}

#[derive(Serialize)]
struct StartResponse {
    status: &'static str,
    mode: &'static str,
    #[serde(rename = "streamUrl", skip_serializing_if = "Option::is_none")]
    stream_url: Option<String>,
}

async fn start(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<StartResponse>, ApiError> {
    let url = params.get("url").ok_or(ApiError::MissingParam("url"))?;
    let session_id = params.get("session").ok_or(ApiError::MissingParam("session"))?;
    let user_force = params.get("transcode").is_some_and(|v| v == "true");
    let force_tv = params.get("device").is_some_and(|v| v == "tv");
    let ua = user_agent(&headers);

    // Held for the whole operation: starts within one session linearize
    // in arrival order, and an eviction pass that raced us for the lock
    // has already been resolved (fresh entry) before we proceed.
    let mut session = state.store.lock_or_create(session_id).await?;
    session.touch();

    if session.is_transcoding() && session.source_url.as_deref() == Some(url.as_str()) {
        let mode = session
            .transcoder
            .as_ref()
            .map(|h| h.mode_name())
            .unwrap_or("FULL_TRANSCODE");
        tracing::info!("session {} resumed for {}", session.id, url);
        return Ok(Json(StartResponse {
            status: "resumed",
            mode,
            stream_url: None,
        }));
    }

    // New source (or dead transcoder): whatever ran before goes away
    // before anything new is spawned.
    session.kill_transcoder().await;

    let device = DeviceClass::from_request(ua, force_tv);
    let report = probe_best_effort(&state, url).await;
    let mode = select_mode(report.as_ref(), &device, user_force, session.force_transcode);
    tracing::info!(
        "session {} starting {} as {}",
        session.id,
        url,
        mode.api_name()
    );

    session.source_url = Some(url.clone());

    if !mode.spawns_transcoder() {
        return Ok(Json(StartResponse {
            status: "started",
            mode: mode.api_name(),
            stream_url: Some(format!(
                "/direct-stream?url={}",
                urlencoding::encode(url)
            )),
        }));
    }

    session.clear_dir().await?;
    let job = TranscodeJob {
        url,
        user_agent: ua,
        report: report.as_ref(),
        mode: &mode,
        dir: &session.dir,
    };
    let fallback = mode.is_speculative().then(|| Mode::FullTranscode {
        audio: AudioPlan::for_device(&device),
    });

    let outcome = state.supervisor.start(&job, fallback).await?;
    if outcome.fell_back {
        session.force_transcode = true;
    }
    let mode_name = outcome.mode_name;
    session.transcoder = Some(outcome.handle);

    Ok(Json(StartResponse {
        status: "started",
        mode: mode_name,
        stream_url: None,
    }))
}

fn invalid_session() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"status": "invalid_session"})),
    )
        .into_response()
}

async fn ping(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let session_id = params.get("session").ok_or(ApiError::MissingParam("session"))?;

    let Some(mut session) = state.store.lock_current(session_id).await else {
        return Ok(invalid_session());
    };
    session.touch();
    let dir = session.dir.clone();
    drop(session);

    let progress = playlist::session_progress(&dir).await;
    Ok(Json(json!({
        "status": "active",
        "encodedDuration": progress.encoded_duration,
        "liveEdgeTime": progress.live_edge,
    }))
    .into_response())
}

async fn stop(
    State(state): State<SharedState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let session_id = params.get("session").ok_or(ApiError::MissingParam("session"))?;

    let Some(mut session) = state.store.lock_current(session_id).await else {
        return Ok(invalid_session());
    };

    // The session record stays; only eviction forgets it. A later start
    // reuses the directory.
    session.touch();
    session.kill_transcoder().await;
    Ok(Json(json!({"status": "stopped"})).into_response())
}

/// Player-side diagnostics end up in the server log.
async fn client_log(body: String) -> StatusCode {
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        tracing::info!(target: "client", "{}", line);
    }
    StatusCode::OK
}
