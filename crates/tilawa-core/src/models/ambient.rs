//! Ambient sound catalog and mixer presets.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MixerError;

/// One looping background sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundKind {
    Rain,
    Thunder,
    Birds,
}

impl SoundKind {
    pub const ALL: [SoundKind; 3] = [SoundKind::Rain, SoundKind::Thunder, SoundKind::Birds];

    pub fn id(self) -> &'static str {
        match self {
            SoundKind::Rain => "rain",
            SoundKind::Thunder => "thunder",
            SoundKind::Birds => "birds",
        }
    }
}

impl fmt::Display for SoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SoundKind {
    type Err = MixerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SoundKind::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| MixerError::UnknownSound(s.to_string()))
    }
}

/// Catalog entry for an ambient sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmbientSound {
    pub kind: SoundKind,
    pub label: &'static str,
    /// Default source, relative to the data root.
    pub default_source: &'static str,
}

pub const SOUNDS: &[AmbientSound] = &[
    AmbientSound {
        kind: SoundKind::Rain,
        label: "Rain",
        default_source: "sounds/rain.mp3",
    },
    AmbientSound {
        kind: SoundKind::Thunder,
        label: "Thunder",
        default_source: "sounds/thunder.mp3",
    },
    AmbientSound {
        kind: SoundKind::Birds,
        label: "Birds",
        default_source: "sounds/birds.mp3",
    },
];

/// A named, fixed assignment of volumes across every ambient channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub rain: f32,
    pub thunder: f32,
    pub birds: f32,
}

pub const PRESETS: &[Preset] = &[
    Preset {
        id: "calm",
        name: "Calm",
        rain: 0.4,
        thunder: 0.0,
        birds: 0.0,
    },
    Preset {
        id: "storm",
        name: "Storm",
        rain: 0.7,
        thunder: 0.5,
        birds: 0.0,
    },
    Preset {
        id: "forest",
        name: "Forest",
        rain: 0.2,
        thunder: 0.0,
        birds: 0.6,
    },
];

impl Preset {
    pub fn find(id: &str) -> Option<&'static Preset> {
        PRESETS.iter().find(|p| p.id == id)
    }

    pub fn volume(&self, kind: SoundKind) -> f32 {
        match kind {
            SoundKind::Rain => self.rain,
            SoundKind::Thunder => self.thunder,
            SoundKind::Birds => self.birds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_kind() {
        for kind in SoundKind::ALL {
            assert_eq!(SOUNDS.iter().filter(|s| s.kind == kind).count(), 1);
        }
    }

    #[test]
    fn sound_kind_parses_ids() {
        assert_eq!("thunder".parse::<SoundKind>().unwrap(), SoundKind::Thunder);
        assert!(matches!(
            "waves".parse::<SoundKind>(),
            Err(MixerError::UnknownSound(s)) if s == "waves"
        ));
        assert_eq!(serde_json::to_string(&SoundKind::Birds).unwrap(), "\"birds\"");
    }

    #[test]
    fn preset_volumes() {
        let storm = Preset::find("storm").unwrap();
        assert_eq!(storm.volume(SoundKind::Rain), 0.7);
        assert_eq!(storm.volume(SoundKind::Thunder), 0.5);
        assert_eq!(storm.volume(SoundKind::Birds), 0.0);
        assert!(Preset::find("ocean").is_none());
    }
}
