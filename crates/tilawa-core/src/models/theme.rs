//! Visual theme keys. The colour token tables live with the UI.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeKey {
    Pearl,
    Cream,
    Mint,
    Lavender,
    Sand,
    Rose,
    #[default]
    Dark,
}

/// Every theme, in display order.
pub const THEMES: [ThemeKey; 7] = [
    ThemeKey::Pearl,
    ThemeKey::Cream,
    ThemeKey::Mint,
    ThemeKey::Lavender,
    ThemeKey::Sand,
    ThemeKey::Rose,
    ThemeKey::Dark,
];

impl ThemeKey {
    pub fn key(self) -> &'static str {
        match self {
            ThemeKey::Pearl => "pearl",
            ThemeKey::Cream => "cream",
            ThemeKey::Mint => "mint",
            ThemeKey::Lavender => "lavender",
            ThemeKey::Sand => "sand",
            ThemeKey::Rose => "rose",
            ThemeKey::Dark => "dark",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ThemeKey::Pearl => "Pearl White",
            ThemeKey::Cream => "Cream Gold",
            ThemeKey::Mint => "Mint Fresh",
            ThemeKey::Lavender => "Lavender Sky",
            ThemeKey::Sand => "Desert Sand",
            ThemeKey::Rose => "Rose Garden",
            ThemeKey::Dark => "Midnight",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ThemeKey::Pearl => "Clean and elegant with soft emerald accents",
            ThemeKey::Cream => "Warm beige with golden highlights",
            ThemeKey::Mint => "Refreshing mint with teal touches",
            ThemeKey::Lavender => "Soft purple with peaceful vibes",
            ThemeKey::Sand => "Natural sandy tones with warmth",
            ThemeKey::Rose => "Gentle rose with elegant touches",
            ThemeKey::Dark => "Deep and peaceful dark theme",
        }
    }

    pub fn to_json(self) -> serde_json::Value {
        serde_json::json!({
            "key": self.key(),
            "name": self.name(),
            "description": self.description(),
        })
    }
}

impl fmt::Display for ThemeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for ThemeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        THEMES
            .into_iter()
            .find(|t| t.key() == s)
            .ok_or_else(|| format!("unknown theme: {}", s))
    }
}
