//! Data-root layout.
//!
//! Pure functions mapping tilawa concepts to files under the data root.

use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

/// Environment variable overriding the data root.
pub const ROOT_ENV: &str = "TILAWA_ROOT";

/// Environment variable overriding the content API base URL.
pub const API_URL_ENV: &str = "TILAWA_API_URL";

/// `$TILAWA_ROOT`, else `$HOME/.tilawa`, else `./.tilawa`.
pub fn data_root() -> PathBuf {
    if let Some(root) = std::env::var_os(ROOT_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(root);
    }
    let home = std::env::var_os("HOME").unwrap_or_else(|| ".".into());
    PathBuf::from(home).join(".tilawa")
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

pub const SETTINGS_FILE: &str = "settings.json";
pub const PREFERENCES_FILE: &str = "preferences.json";

pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE)
}

pub fn preferences_path(root: &Path) -> PathBuf {
    root.join(PREFERENCES_FILE)
}

// ---------------------------------------------------------------------------
// Ambient sources
// ---------------------------------------------------------------------------

/// URLs and absolute paths pass through; relative paths land under the root.
pub fn resolve_source(root: &Path, source: &str) -> String {
    if source.contains("://") || Path::new(source).is_absolute() {
        source.to_string()
    } else {
        root.join(source).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_sources_resolve_under_root() {
        let root = Path::new("/data/tilawa");
        assert_eq!(
            resolve_source(root, "sounds/rain.mp3"),
            "/data/tilawa/sounds/rain.mp3"
        );
        assert_eq!(resolve_source(root, "/srv/birds.ogg"), "/srv/birds.ogg");
        assert_eq!(
            resolve_source(root, "https://cdn.example.com/thunder.mp3"),
            "https://cdn.example.com/thunder.mp3"
        );
    }

    #[test]
    fn file_names() {
        let root = Path::new("/r");
        assert_eq!(settings_path(root), PathBuf::from("/r/settings.json"));
        assert_eq!(preferences_path(root), PathBuf::from("/r/preferences.json"));
    }
}
