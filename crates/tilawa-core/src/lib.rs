//! tilawa-core — themeable Quran recitation player kernel.
//!
//! Two independent state machines and the effects they drive:
//!
//! ```text
//! Engine ──┬── SegmentPlayer ── narration AudioChannel
//!          │        └── ContentSource (juz lookups, ticketed)
//!          ├── AmbientMixer ─── rain / thunder / birds AudioChannels
//!          └── PreferenceStore (theme)
//! ```
//!
//! The state machines are pure with respect to I/O: they mutate channels
//! through the [`effects::AudioChannel`] trait and ask the engine to fetch.

pub mod effects;
pub mod engine;
pub mod error;
pub mod mixer;
pub mod models;
pub mod paths;
pub mod player;
pub mod settings;
pub mod store;

pub use engine::Engine;
pub use error::{EngineError, Result};
pub use mixer::{AmbientMixer, ChannelFailure, MixerSnapshot};
pub use models::*;
pub use player::{JuzChange, LoadStatus, Phase, PlayerSnapshot, SegmentPlayer};
pub use settings::Settings;
