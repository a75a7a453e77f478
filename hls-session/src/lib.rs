//! Streaming session engine for the HLS gateway.
//!
//! This crate owns everything between "a client asked to stream this URL"
//! and "segments are appearing on disk":
//!
//! - **Device capabilities**: which codecs a client can play natively
//! - **Strategy selection**: pass-through, copy-video/transcode-audio,
//!   or full transcode, per device and source
//! - **Argument synthesis**: the exact transcoder command line, including
//!   the per-track 5.1 audio filter graph and the HLS variant map
//! - **Supervision**: spawning the transcoder, tailing stderr, waiting for
//!   the master playlist to appear, falling back to full transcode when a
//!   speculative mode dies early
//! - **Session bookkeeping**: the in-memory session table, heartbeats, and
//!   the background eviction loop that reaps idle sessions
//!
//! The HTTP surface lives in the `gateway` binary crate; this crate knows
//! nothing about axum.

pub mod args;
pub mod device;
pub mod error;
pub mod evict;
pub mod playlist;
pub mod store;
pub mod strategy;
pub mod supervisor;

pub use device::{Capabilities, DeviceClass, TvBrand};
pub use error::SessionError;
pub use store::{Session, SessionStore};
pub use strategy::{select_mode, AudioPlan, Mode};
pub use supervisor::{ReadinessDeadlines, Supervisor, TranscoderHandle};
