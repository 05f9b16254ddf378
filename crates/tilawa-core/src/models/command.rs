//! Player and mixer commands.
//!
//! Tagged enums so outer surfaces (FFI, CLI) can issue every operation as
//! `{"action": "...", ...}` JSON. Hosts that render narration audio
//! themselves report its notifications as `{"event": "...", ...}`.

use serde::{Deserialize, Serialize};

use super::ambient::SoundKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerCommand {
    TogglePlay,
    Play,
    Pause,
    SelectJuz {
        juz: u8,
        #[serde(default = "default_true")]
        auto_advance: bool,
        #[serde(default = "default_true")]
        reset_index: bool,
    },
    NextJuz,
    PreviousJuz,
    SelectReciter { reciter: String },
    SelectAyah { index: usize },
    NextAyah,
    PreviousAyah,
    /// Fraction of the current ayah's duration, 0.0–1.0.
    Seek { fraction: f64 },
    SeekTo { seconds: f64 },
    Skip { seconds: f64 },
    /// Skip by the configured `skip_seconds`.
    SkipForward,
    SkipBackward,
    SetVolume { volume: f32 },
    ToggleMute,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MixerCommand {
    SetSoundVolume { sound: SoundKind, volume: f32 },
    SetMasterVolume { volume: f32 },
    ToggleMute,
    TogglePlay,
    ApplyPreset { preset: String },
    ResetAll,
}

/// Narration notification reported by a host that renders audio itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NarrationEvent {
    Ended,
    TimeUpdate { seconds: f64 },
    DurationKnown { seconds: f64 },
    PlayFailed { reason: String },
}

fn default_true() -> bool {
    true
}
