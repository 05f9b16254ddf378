//! Scripted audio channel for tests.
//!
//! Clones share state, so a test keeps one handle while the component under
//! test owns another. Records every call; notifications and play results are
//! injected by the test.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{AudioChannel, ChannelEvent};
use crate::error::PlayError;

#[derive(Clone, Default)]
pub(crate) struct ScriptedChannel {
    inner: Arc<Mutex<Script>>,
}

#[derive(Default)]
pub(crate) struct Script {
    pub source: Option<String>,
    pub playing: bool,
    pub volume: f32,
    pub looping: bool,
    pub position: f64,
    pub duration: Option<f64>,
    pub events: VecDeque<ChannelEvent>,
    pub play_results: VecDeque<Result<(), PlayError>>,
    pub play_calls: usize,
    pub pause_calls: usize,
    pub loads: usize,
    pub sources: Vec<String>,
    pub seeks: Vec<f64>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Box<dyn AudioChannel> {
        Box::new(self.clone())
    }

    pub fn script(&self) -> parking_lot::MutexGuard<'_, Script> {
        self.inner.lock()
    }

    pub fn push_event(&self, event: ChannelEvent) {
        self.inner.lock().events.push_back(event);
    }

    /// Next `play()` returns `result` instead of succeeding.
    pub fn reject_next_play(&self, error: PlayError) {
        self.inner.lock().play_results.push_back(Err(error));
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().playing
    }
}

impl AudioChannel for ScriptedChannel {
    fn set_source(&self, url: &str) {
        let mut s = self.inner.lock();
        s.source = Some(url.to_string());
        s.sources.push(url.to_string());
        s.position = 0.0;
        s.duration = None;
    }

    fn source(&self) -> Option<String> {
        self.inner.lock().source.clone()
    }

    fn load(&self) {
        let mut s = self.inner.lock();
        s.loads += 1;
        s.playing = false;
    }

    fn play(&self) -> Result<(), PlayError> {
        let mut s = self.inner.lock();
        s.play_calls += 1;
        let result = s.play_results.pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            s.playing = true;
        }
        result
    }

    fn pause(&self) {
        let mut s = self.inner.lock();
        s.pause_calls += 1;
        s.playing = false;
    }

    fn is_paused(&self) -> bool {
        !self.inner.lock().playing
    }

    fn set_volume(&self, volume: f32) {
        self.inner.lock().volume = volume;
    }

    fn volume(&self) -> f32 {
        self.inner.lock().volume
    }

    fn set_looping(&self, looping: bool) {
        self.inner.lock().looping = looping;
    }

    fn seek(&self, seconds: f64) {
        let mut s = self.inner.lock();
        s.position = seconds;
        s.seeks.push(seconds);
    }

    fn current_time(&self) -> f64 {
        self.inner.lock().position
    }

    fn duration(&self) -> Option<f64> {
        self.inner.lock().duration
    }

    fn poll_events(&self) -> Vec<ChannelEvent> {
        self.inner.lock().events.drain(..).collect()
    }
}
