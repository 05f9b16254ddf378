//! Error types.

use thiserror::Error;

/// Rejected player operations. The cursor is never modified when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerError {
    #[error("invalid juz {0}: expected 1..=30")]
    InvalidJuz(u32),

    #[error("unknown reciter: {0}")]
    UnknownReciter(String),

    #[error("ayah index {index} out of range ({len} ayahs loaded)")]
    AyahOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MixerError {
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    #[error("unknown ambient sound: {0}")]
    UnknownSound(String),
}

/// Failure to obtain a juz from the content source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("content source returned status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Outcome of a rejected play request on an audio channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayError {
    /// The request was overtaken by a newer source; expected during rapid changes.
    #[error("play request superseded")]
    Superseded,

    #[error("playback failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error(transparent)]
    Mixer(#[from] MixerError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Narration events can only be reported to a headless engine.
    #[error("narration events are produced by the engine's own audio output")]
    NoNarrationFeed,
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
