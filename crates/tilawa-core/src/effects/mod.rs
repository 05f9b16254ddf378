//! Effects: the two external collaborators of the core state machines.
//!
//! - [`AudioChannel`]: one physical audio output (narration or ambient loop).
//! - [`ContentSource`]: juz lookup for a (juz, reciter) pair.
//!
//! All channel methods take `&self`; implementations manage their own
//! concurrency. Notifications (ended, time, duration, late play failures)
//! are queued by the channel and drained with [`AudioChannel::poll_events`].

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{FetchError, PlayError};
use crate::models::{Ayah, Juz, NarrationEvent};

#[cfg(feature = "native")]
pub mod audio;
pub mod http;
#[cfg(test)]
pub(crate) mod scripted;

/// Notification raised by an audio channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Playback reached the end of a non-looping source.
    Ended,
    /// Current playback position, in seconds.
    TimeUpdate(f64),
    /// Metadata for the current source is loaded; total length in seconds.
    DurationKnown(f64),
    /// An earlier `play()` was rejected after it returned.
    PlayFailed(PlayError),
}

impl From<NarrationEvent> for ChannelEvent {
    fn from(event: NarrationEvent) -> Self {
        match event {
            NarrationEvent::Ended => ChannelEvent::Ended,
            NarrationEvent::TimeUpdate { seconds } => ChannelEvent::TimeUpdate(seconds),
            NarrationEvent::DurationKnown { seconds } => ChannelEvent::DurationKnown(seconds),
            NarrationEvent::PlayFailed { reason } => {
                ChannelEvent::PlayFailed(PlayError::Failed(reason))
            }
        }
    }
}

/// Contract of a single physical audio channel.
pub trait AudioChannel: Send + Sync {
    fn set_source(&self, url: &str);
    fn source(&self) -> Option<String>;
    /// Reset position and begin fetching the current source.
    fn load(&self);
    /// Request playback. May be rejected immediately, or later through
    /// [`ChannelEvent::PlayFailed`].
    fn play(&self) -> Result<(), PlayError>;
    fn pause(&self);
    fn is_paused(&self) -> bool;
    fn set_volume(&self, volume: f32);
    fn volume(&self) -> f32;
    fn set_looping(&self, looping: bool);
    fn seek(&self, seconds: f64);
    fn current_time(&self) -> f64;
    /// `None` until the source's metadata is known.
    fn duration(&self) -> Option<f64>;
    fn poll_events(&self) -> Vec<ChannelEvent>;
}

/// Remote lookup of a juz's ordered ayah list.
pub trait ContentSource: Send + Sync {
    fn fetch_juz(&self, juz: Juz, reciter: &str) -> Result<Vec<Ayah>, FetchError>;
}

/// In-memory channel for headless use (UI shells that render audio
/// themselves, tests, CI without an output device).
///
/// Never produces sound. Notifications come from the host through
/// [`HeadlessChannel::report`]; clones share state.
#[derive(Clone, Default)]
pub struct HeadlessChannel {
    state: Arc<Mutex<HeadlessState>>,
}

struct HeadlessState {
    source: Option<String>,
    paused: bool,
    volume: f32,
    looping: bool,
    position: f64,
    duration: Option<f64>,
    events: VecDeque<ChannelEvent>,
}

impl Default for HeadlessState {
    fn default() -> Self {
        Self {
            source: None,
            paused: true,
            volume: 1.0,
            looping: false,
            position: 0.0,
            duration: None,
            events: VecDeque::new(),
        }
    }
}

impl HeadlessChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    /// Queue a notification for the current source, as the host's own
    /// audio output observed it.
    pub fn report(&self, event: ChannelEvent) {
        let mut s = self.state.lock();
        match event {
            ChannelEvent::TimeUpdate(t) if t.is_finite() => s.position = t.max(0.0),
            ChannelEvent::DurationKnown(d) if d.is_finite() && d > 0.0 => s.duration = Some(d),
            _ => {}
        }
        s.events.push_back(event);
    }
}

impl AudioChannel for HeadlessChannel {
    fn set_source(&self, url: &str) {
        let mut s = self.state.lock();
        s.source = Some(url.to_string());
        s.position = 0.0;
        s.duration = None;
        s.events.clear();
    }

    fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    fn load(&self) {
        let mut s = self.state.lock();
        s.position = 0.0;
        s.duration = None;
    }

    fn play(&self) -> Result<(), PlayError> {
        let mut s = self.state.lock();
        if s.source.is_none() {
            return Err(PlayError::Failed("no source".into()));
        }
        s.paused = false;
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn set_looping(&self, looping: bool) {
        self.state.lock().looping = looping;
    }

    fn seek(&self, seconds: f64) {
        self.state.lock().position = seconds.max(0.0);
    }

    fn current_time(&self) -> f64 {
        self.state.lock().position
    }

    fn duration(&self) -> Option<f64> {
        self.state.lock().duration
    }

    fn poll_events(&self) -> Vec<ChannelEvent> {
        self.state.lock().events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_play_requires_source() {
        let ch = HeadlessChannel::new();
        assert!(ch.is_paused());
        assert!(matches!(ch.play(), Err(PlayError::Failed(_))));

        ch.set_source("https://cdn.example.com/1.mp3");
        ch.play().unwrap();
        assert!(!ch.is_paused());
        ch.pause();
        assert!(ch.is_paused());
    }

    #[test]
    fn headless_clamps_volume() {
        let ch = HeadlessChannel::new();
        ch.set_volume(1.7);
        assert_eq!(ch.volume(), 1.0);
        ch.set_volume(-0.2);
        assert_eq!(ch.volume(), 0.0);
    }

    #[test]
    fn headless_reports_reach_every_clone() {
        let ch = HeadlessChannel::new();
        let host = ch.clone();
        ch.set_source("https://cdn.example.com/1.mp3");
        assert_eq!(ch.duration(), None);

        host.report(ChannelEvent::DurationKnown(9.0));
        host.report(ChannelEvent::TimeUpdate(4.5));
        host.report(ChannelEvent::Ended);
        assert_eq!(ch.duration(), Some(9.0));
        assert_eq!(ch.current_time(), 4.5);
        assert_eq!(
            ch.poll_events(),
            vec![
                ChannelEvent::DurationKnown(9.0),
                ChannelEvent::TimeUpdate(4.5),
                ChannelEvent::Ended
            ]
        );
        assert!(ch.poll_events().is_empty());

        // A new source forgets the previous one's metadata.
        host.report(ChannelEvent::TimeUpdate(1.0));
        ch.set_source("https://cdn.example.com/2.mp3");
        assert_eq!(ch.duration(), None);
        assert!(ch.poll_events().is_empty());
    }

    #[test]
    fn narration_event_maps_to_channel_event() {
        assert_eq!(ChannelEvent::from(NarrationEvent::Ended), ChannelEvent::Ended);
        assert_eq!(
            ChannelEvent::from(NarrationEvent::PlayFailed {
                reason: "blocked".into()
            }),
            ChannelEvent::PlayFailed(PlayError::Failed("blocked".into()))
        );
    }
}
