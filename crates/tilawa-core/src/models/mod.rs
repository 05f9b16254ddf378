//! tilawa data models.
//!
//! Fixed catalogs (reciters, ambient sounds, presets, themes) are `const`
//! tables. Types exist where Rust type safety genuinely helps: a range-checked
//! juz number, tagged command enums for dispatch, and the wire shape of an ayah.

pub mod ambient;
pub mod command;
pub mod quran;
pub mod theme;

pub use ambient::{AmbientSound, Preset, SoundKind, PRESETS, SOUNDS};
pub use command::{MixerCommand, NarrationEvent, PlayerCommand};
pub use quran::{Ayah, Juz, Reciter, Surah, RECITERS};
pub use theme::{ThemeKey, THEMES};
