//! Durable preferences (`preferences.json` in the data root).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::ThemeKey;
use crate::paths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: ThemeKey,
}

/// Loaded once at startup, written through on every change.
pub struct PreferenceStore {
    path: PathBuf,
    prefs: Preferences,
}

impl PreferenceStore {
    /// Missing file → defaults. A corrupt file is logged and replaced on
    /// the next write.
    pub fn open(root: &Path) -> Self {
        let path = paths::preferences_path(root);
        let prefs = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                log::warn!("tilawa: ignoring corrupt {}: {}", path.display(), e);
                Preferences::default()
            }),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("tilawa: cannot read {}: {}", path.display(), e);
                }
                Preferences::default()
            }
        };
        Self { path, prefs }
    }

    pub fn theme(&self) -> ThemeKey {
        self.prefs.theme
    }

    pub fn set_theme(&mut self, theme: ThemeKey) -> Result<(), StoreError> {
        let mut next = self.prefs.clone();
        next.theme = theme;
        self.write(&next)?;
        self.prefs = next;
        Ok(())
    }

    fn write(&self, prefs: &Preferences) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(prefs)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
