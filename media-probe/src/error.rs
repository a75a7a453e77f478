use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffprobe exited with code {code}: {stderr}")]
    Inspector { code: i32, stderr: String },

    #[error("unparsable ffprobe output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no video stream in source")]
    NoVideoStream,
}
