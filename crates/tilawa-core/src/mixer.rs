//! Ambient mixer — independently volumed looping background sounds.
//!
//! A channel sounds iff the mixer is active, its own volume is above zero
//! and the mixer is not muted. Emitted volume is `volume * master`, or 0
//! when muted. Stored volumes are never touched by mute or master changes.

use serde::Serialize;

use crate::effects::{AudioChannel, ChannelEvent};
use crate::error::{MixerError, PlayError};
use crate::models::{Preset, SoundKind, SOUNDS};
use crate::player::clamp_unit;

/// One ambient sound wired to its channel.
pub struct AmbientTrack {
    pub sound: SoundKind,
    pub source: String,
    pub channel: Box<dyn AudioChannel>,
}

/// A channel that refused to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelFailure {
    pub sound: SoundKind,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SoundLevel {
    pub sound: SoundKind,
    pub label: &'static str,
    pub volume: f32,
    pub effective: f32,
    pub sounding: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MixerSnapshot {
    pub sounds: Vec<SoundLevel>,
    pub master_volume: f32,
    pub muted: bool,
    pub active: bool,
    pub preset: Option<&'static str>,
    pub has_active_sounds: bool,
    pub last_failure: Option<ChannelFailure>,
}

struct Track {
    sound: SoundKind,
    volume: f32,
    channel: Box<dyn AudioChannel>,
}

pub struct AmbientMixer {
    tracks: Vec<Track>,
    master: f32,
    muted: bool,
    active: bool,
    preset: Option<&'static str>,
    failures: Vec<ChannelFailure>,
    last_failure: Option<ChannelFailure>,
    released: bool,
}

impl AmbientMixer {
    /// Channels are primed with their source, looping on, volume 0.
    pub fn new(tracks: impl IntoIterator<Item = AmbientTrack>, master_volume: f32) -> Self {
        let tracks = tracks
            .into_iter()
            .map(|t| {
                t.channel.set_source(&t.source);
                t.channel.set_looping(true);
                t.channel.set_volume(0.0);
                t.channel.load();
                Track {
                    sound: t.sound,
                    volume: 0.0,
                    channel: t.channel,
                }
            })
            .collect();
        Self {
            tracks,
            master: clamp_unit(master_volume).unwrap_or(0.8),
            muted: false,
            active: false,
            preset: None,
            failures: Vec::new(),
            last_failure: None,
            released: false,
        }
    }

    /// Set one sound's volume. Clears the preset label; a non-zero volume
    /// starts an inactive mixer.
    pub fn set_sound_volume(&mut self, sound: SoundKind, volume: f32) -> Result<(), MixerError> {
        let volume = clamp_unit(volume).unwrap_or(0.0);
        let track = self
            .tracks
            .iter_mut()
            .find(|t| t.sound == sound)
            .ok_or_else(|| MixerError::UnknownSound(sound.id().into()))?;
        track.volume = volume;
        self.preset = None;
        if !self.active && volume > 0.0 {
            self.active = true;
        }
        self.sync();
        Ok(())
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        if let Some(v) = clamp_unit(volume) {
            self.master = v;
            self.sync();
        }
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.sync();
    }

    pub fn toggle_play(&mut self) {
        self.active = !self.active;
        self.sync();
    }

    pub fn apply_preset(&mut self, id: &str) -> Result<(), MixerError> {
        let preset = Preset::find(id).ok_or_else(|| MixerError::UnknownPreset(id.into()))?;
        for track in &mut self.tracks {
            track.volume = preset.volume(track.sound);
        }
        self.preset = Some(preset.id);
        self.active = true;
        self.sync();
        Ok(())
    }

    pub fn reset_all(&mut self) {
        for track in &mut self.tracks {
            track.volume = 0.0;
        }
        self.preset = None;
        self.active = false;
        self.sync();
    }

    /// Drain channel notifications; only late play failures matter here.
    pub fn pump(&mut self) {
        if self.released {
            return;
        }
        for i in 0..self.tracks.len() {
            let sound = self.tracks[i].sound;
            for event in self.tracks[i].channel.poll_events() {
                if let ChannelEvent::PlayFailed(e) = event {
                    self.record_failure(sound, e);
                }
            }
        }
    }

    /// Pause every channel; later state changes no longer reach them.
    pub fn release(&mut self) {
        self.released = true;
        self.active = false;
        for track in &self.tracks {
            track.channel.pause();
        }
    }

    pub fn take_failures(&mut self) -> Vec<ChannelFailure> {
        std::mem::take(&mut self.failures)
    }

    pub fn volume(&self, sound: SoundKind) -> f32 {
        self.track(sound).map_or(0.0, |t| t.volume)
    }

    pub fn effective_volume(&self, sound: SoundKind) -> f32 {
        self.track(sound)
            .map_or(0.0, |t| effective(t.volume, self.master, self.muted))
    }

    pub fn master_volume(&self) -> f32 {
        self.master
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn active_preset(&self) -> Option<&'static str> {
        self.preset
    }

    pub fn has_active_sounds(&self) -> bool {
        self.tracks.iter().any(|t| t.volume > 0.0)
    }

    pub fn snapshot(&self) -> MixerSnapshot {
        let sounds = self
            .tracks
            .iter()
            .map(|t| SoundLevel {
                sound: t.sound,
                label: SOUNDS
                    .iter()
                    .find(|s| s.kind == t.sound)
                    .map_or("", |s| s.label),
                volume: t.volume,
                effective: effective(t.volume, self.master, self.muted),
                sounding: self.should_play(t),
            })
            .collect();
        MixerSnapshot {
            sounds,
            master_volume: self.master,
            muted: self.muted,
            active: self.active,
            preset: self.preset,
            has_active_sounds: self.has_active_sounds(),
            last_failure: self.last_failure.clone(),
        }
    }

    fn track(&self, sound: SoundKind) -> Option<&Track> {
        self.tracks.iter().find(|t| t.sound == sound)
    }

    fn should_play(&self, track: &Track) -> bool {
        self.active && track.volume > 0.0 && !self.muted
    }

    /// Re-assert volume and transport on every channel. Idempotent.
    fn sync(&mut self) {
        if self.released {
            return;
        }
        let mut failed = Vec::new();
        for track in &self.tracks {
            track
                .channel
                .set_volume(effective(track.volume, self.master, self.muted));
            if self.should_play(track) {
                if track.channel.is_paused() {
                    if let Err(e) = track.channel.play() {
                        failed.push((track.sound, e));
                    }
                }
            } else if !track.channel.is_paused() {
                track.channel.pause();
            }
        }
        for (sound, e) in failed {
            self.record_failure(sound, e);
        }
    }

    fn record_failure(&mut self, sound: SoundKind, error: PlayError) {
        match error {
            PlayError::Superseded => {
                log::debug!("tilawa: {} play request superseded", sound);
            }
            PlayError::Failed(reason) => {
                log::warn!("tilawa: ambient {} failed to start: {}", sound, reason);
                let failure = ChannelFailure { sound, reason };
                self.last_failure = Some(failure.clone());
                self.failures.push(failure);
            }
        }
    }
}

fn effective(volume: f32, master: f32, muted: bool) -> f32 {
    if muted {
        0.0
    } else {
        volume * master
    }
}
