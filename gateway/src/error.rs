use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hls_session::SessionError;
use media_probe::ProbeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("missing query parameter: {0}")]
    MissingParam(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("probe timed out")]
    ProbeTimeout,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::MissingParam(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Session(SessionError::InvalidSessionId(_)) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!("request failed: {}", self);
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::MissingParam("url"), StatusCode::BAD_REQUEST),
            (
                ApiError::Session(SessionError::InvalidSessionId("../x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (ApiError::Upstream("refused".into()), StatusCode::BAD_GATEWAY),
            (ApiError::ProbeTimeout, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
