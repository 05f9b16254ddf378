//! Juz, reciter and ayah types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PlayerError;

/// One of the 30 juz. Out-of-range numbers cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Juz(u8);

impl Juz {
    pub const FIRST: Juz = Juz(1);
    pub const LAST: Juz = Juz(30);

    pub fn new(number: u8) -> Option<Self> {
        (1..=30).contains(&number).then_some(Juz(number))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn next(self) -> Option<Self> {
        Juz::new(self.0 + 1)
    }

    pub fn previous(self) -> Option<Self> {
        self.0.checked_sub(1).and_then(Juz::new)
    }
}

impl Default for Juz {
    fn default() -> Self {
        Juz::FIRST
    }
}

impl TryFrom<u8> for Juz {
    type Error = PlayerError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Juz::new(number).ok_or(PlayerError::InvalidJuz(number as u32))
    }
}

impl From<Juz> for u8 {
    fn from(juz: Juz) -> u8 {
        juz.0
    }
}

impl fmt::Display for Juz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Juz {}", self.0)
    }
}

/// A narration track. Purely descriptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reciter {
    pub id: &'static str,
    pub name: &'static str,
    pub language: &'static str,
}

/// The selectable reciters. The first entry is the default.
pub const RECITERS: &[Reciter] = &[
    Reciter {
        id: "ar.abdulbasitmurattal",
        name: "Abdul Basit (Murattal)",
        language: "Arabic",
    },
    Reciter {
        id: "en.walk",
        name: "Ibrahim Walk",
        language: "English",
    },
    Reciter {
        id: "ur.khan",
        name: "Fateh Muhammad Jalandhari",
        language: "Urdu",
    },
];

impl Reciter {
    pub fn find(id: &str) -> Option<&'static Reciter> {
        RECITERS.iter().find(|r| r.id == id)
    }

    pub fn default_reciter() -> &'static Reciter {
        &RECITERS[0]
    }
}

/// Owning surah of an ayah.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surah {
    pub number: u32,
    pub name: String,
    #[serde(default)]
    pub english_name: String,
}

/// One narrated unit, as returned by the content API for a (juz, reciter) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ayah {
    pub number: u32,
    /// Audio asset for the selected reciter. Text-only editions have none.
    #[serde(default)]
    pub audio: Option<String>,
    pub text: String,
    pub number_in_surah: u32,
    pub surah: Surah,
    pub juz: u8,
}

impl Ayah {
    /// Audio URL, treating an empty string as absent.
    pub fn audio_url(&self) -> Option<&str> {
        self.audio.as_deref().filter(|url| !url.is_empty())
    }
}
