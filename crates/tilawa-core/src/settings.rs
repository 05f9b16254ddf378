//! User-editable settings (`settings.json` in the data root).
//!
//! Every field is optional; a missing file yields the defaults.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::effects::http::DEFAULT_API_URL;
use crate::error::StoreError;
use crate::models::{Juz, Reciter, SoundKind, SOUNDS};
use crate::paths;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    pub default_juz: Juz,
    pub default_reciter: String,
    pub volume: f32,
    pub master_volume: f32,
    pub heartbeat_ms: u64,
    pub skip_seconds: f64,
    /// Per-sound source override (path relative to the root, absolute, or URL).
    pub sounds: BTreeMap<SoundKind, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout_ms: 15_000,
            default_juz: Juz::FIRST,
            default_reciter: Reciter::default_reciter().id.to_string(),
            volume: 0.8,
            master_volume: 0.8,
            heartbeat_ms: 250,
            skip_seconds: 10.0,
            sounds: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Read `settings.json` under `root` and apply environment overrides.
    pub fn load(root: &Path) -> Result<Self, StoreError> {
        let path = paths::settings_path(root);
        let mut settings = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(e.into()),
        };
        if let Ok(url) = std::env::var(paths::API_URL_ENV) {
            if !url.is_empty() {
                settings.api_base_url = url;
            }
        }
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms.max(10))
    }

    /// Resolved source for an ambient sound.
    pub fn sound_source(&self, root: &Path, sound: SoundKind) -> String {
        let configured = self.sounds.get(&sound).map(String::as_str).or_else(|| {
            SOUNDS
                .iter()
                .find(|s| s.kind == sound)
                .map(|s| s.default_source)
        });
        paths::resolve_source(root, configured.unwrap_or_default())
    }
}
