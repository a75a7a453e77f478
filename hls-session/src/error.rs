use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("transcoder exited with code {code} before becoming ready")]
    StartupExit { code: i32 },

    #[error("transcoder produced no master playlist within {seconds}s")]
    ReadinessTimeout { seconds: u64 },

    #[error("mode {0} does not spawn a transcoder")]
    NoTranscoderForMode(&'static str),
}
