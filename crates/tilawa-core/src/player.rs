//! Segment player — sequential ayah playback across the 30 juz.
//!
//! Owns exactly one narration [`AudioChannel`]. The player never performs
//! network I/O itself: operations that need data queue a [`FetchRequest`]
//! (drained with [`SegmentPlayer::take_fetch`]) and the owner hands the
//! outcome back through [`SegmentPlayer::complete_fetch`]. Every request
//! carries a ticket; only the most recent ticket may commit, so rapid
//! juz/reciter changes can never apply stale data.
//!
//! Channel notifications are read through [`SegmentPlayer::pump`], which
//! always decides against the player's current state rather than anything
//! captured when the notification was raised.

use serde::Serialize;

use crate::effects::{AudioChannel, ChannelEvent};
use crate::error::{FetchError, PlayError, PlayerError};
use crate::models::{Ayah, Juz, Reciter};

/// Data-loading status of the current (juz, reciter) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    Error { message: String },
}

/// Observable player phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Loading,
    Playing,
    Paused,
    Error,
}

/// A juz lookup the owner must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub ticket: u64,
    pub juz: Juz,
    pub reciter: &'static str,
}

/// Options for [`SegmentPlayer::select_juz`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JuzChange {
    /// Start playing once the juz is loaded.
    pub auto_advance: bool,
    /// Move the cursor back to the first ayah.
    pub reset_index: bool,
}

impl Default for JuzChange {
    fn default() -> Self {
        Self {
            auto_advance: true,
            reset_index: true,
        }
    }
}

/// Point-in-time view of the player for UIs.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub juz: Juz,
    pub reciter: &'static str,
    pub reciter_name: &'static str,
    pub index: usize,
    pub ayah_count: usize,
    pub ayah: Option<Ayah>,
    pub phase: Phase,
    pub status: LoadStatus,
    pub playing: bool,
    pub muted: bool,
    pub volume: f32,
    pub current_time: f64,
    pub duration: f64,
    /// Percentage of the current ayah played, 0–100.
    pub progress: f64,
    pub error: Option<String>,
}

pub struct SegmentPlayer {
    channel: Box<dyn AudioChannel>,
    juz: Juz,
    reciter: &'static Reciter,
    ayahs: Vec<Ayah>,
    index: usize,
    status: LoadStatus,
    playing: bool,
    muted: bool,
    volume: f32,
    current_time: f64,
    duration: f64,
    /// Ticket of the most recently requested fetch.
    ticket: u64,
    pending: Option<FetchRequest>,
    last_error: Option<String>,
    released: bool,
}

impl SegmentPlayer {
    pub fn new(
        channel: Box<dyn AudioChannel>,
        juz: Juz,
        reciter: &str,
        volume: f32,
    ) -> Result<Self, PlayerError> {
        let reciter =
            Reciter::find(reciter).ok_or_else(|| PlayerError::UnknownReciter(reciter.into()))?;
        let player = Self {
            channel,
            juz,
            reciter,
            ayahs: Vec::new(),
            index: 0,
            status: LoadStatus::Idle,
            playing: false,
            muted: false,
            volume: clamp_unit(volume).unwrap_or(0.8),
            current_time: 0.0,
            duration: 0.0,
            ticket: 0,
            pending: None,
            last_error: None,
            released: false,
        };
        player.apply_volume();
        Ok(player)
    }

    // -----------------------------------------------------------------------
    // Data loading
    // -----------------------------------------------------------------------

    /// Fetch the current (juz, reciter) without changing the playing flag.
    pub fn reload(&mut self) {
        self.begin_fetch();
    }

    /// Take the outstanding fetch request, if any.
    pub fn take_fetch(&mut self) -> Option<FetchRequest> {
        self.pending.take()
    }

    /// Commit the outcome of a fetch. Returns `false` when the result was
    /// discarded (stale ticket, already settled, or player released).
    pub fn complete_fetch(&mut self, ticket: u64, result: Result<Vec<Ayah>, FetchError>) -> bool {
        if self.released || ticket != self.ticket || self.status != LoadStatus::Loading {
            log::debug!(
                "tilawa: discarding fetch #{} (latest #{})",
                ticket,
                self.ticket
            );
            return false;
        }
        if self.pending.as_ref().is_some_and(|p| p.ticket == ticket) {
            self.pending = None;
        }

        match result {
            Ok(ayahs) => {
                self.ayahs = ayahs;
                if self.index >= self.ayahs.len() {
                    self.index = self.ayahs.len().saturating_sub(1);
                }
                self.status = LoadStatus::Ready;
                self.last_error = None;
                self.sync_playback();
            }
            Err(e) => {
                log::error!(
                    "tilawa: failed to load {} ({}): {}",
                    self.juz,
                    self.reciter.id,
                    e
                );
                self.status = LoadStatus::Error {
                    message: e.to_string(),
                };
                self.last_error = Some(e.to_string());
                self.playing = false;
                self.channel.pause();
            }
        }
        true
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    pub fn select_juz(&mut self, juz: Juz, change: JuzChange) {
        self.reset_time();
        if change.auto_advance {
            self.playing = true;
        }
        if change.reset_index {
            self.index = 0;
        }
        self.juz = juz;
        self.begin_fetch();
    }

    pub fn next_juz(&mut self) {
        if let Some(next) = self.juz.next() {
            self.select_juz(next, JuzChange::default());
        }
    }

    pub fn previous_juz(&mut self) {
        if let Some(prev) = self.juz.previous() {
            self.select_juz(prev, JuzChange::default());
        }
    }

    /// Switch narration track; restarts the juz from its first ayah and plays.
    pub fn select_reciter(&mut self, id: &str) -> Result<(), PlayerError> {
        let reciter = Reciter::find(id).ok_or_else(|| PlayerError::UnknownReciter(id.into()))?;
        self.playing = true;
        self.index = 0;
        self.reset_time();
        self.reciter = reciter;
        self.begin_fetch();
        Ok(())
    }

    pub fn select_ayah(&mut self, index: usize) -> Result<(), PlayerError> {
        if index >= self.ayahs.len() {
            return Err(PlayerError::AyahOutOfRange {
                index,
                len: self.ayahs.len(),
            });
        }
        self.index = index;
        self.playing = true;
        self.sync_playback();
        Ok(())
    }

    pub fn next_ayah(&mut self) {
        if self.index + 1 < self.ayahs.len() {
            self.index += 1;
            self.sync_playback();
        }
    }

    pub fn previous_ayah(&mut self) {
        if self.index > 0 {
            self.index -= 1;
            self.sync_playback();
        }
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Flip the playing flag. With nothing addressable yet, the start is
    /// deferred until data arrives.
    pub fn toggle_play(&mut self) {
        self.playing = !self.playing;
        self.sync_playback();
    }

    pub fn play(&mut self) {
        if !self.playing {
            self.toggle_play();
        }
    }

    pub fn pause(&mut self) {
        if self.playing {
            self.toggle_play();
        }
    }

    /// Seek to `fraction` (0–1) of the current ayah. Ignored until the
    /// duration is known.
    pub fn seek(&mut self, fraction: f64) {
        if !self.duration_known() || fraction.is_nan() {
            return;
        }
        self.seek_to(fraction.clamp(0.0, 1.0) * self.duration);
    }

    /// Absolute seek, clamped to `[0, duration]`.
    pub fn seek_to(&mut self, seconds: f64) {
        if !self.duration_known() || seconds.is_nan() {
            return;
        }
        let target = seconds.clamp(0.0, self.duration);
        self.channel.seek(target);
        self.current_time = target;
    }

    /// Jump relative to the channel's current position.
    pub fn skip(&mut self, delta_seconds: f64) {
        if delta_seconds.is_nan() {
            return;
        }
        self.seek_to(self.channel.current_time() + delta_seconds);
    }

    pub fn set_volume(&mut self, volume: f32) {
        if let Some(v) = clamp_unit(volume) {
            self.volume = v;
            self.apply_volume();
        }
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.apply_volume();
    }

    /// Volume actually applied to the channel.
    pub fn effective_volume(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    // -----------------------------------------------------------------------
    // Channel notifications
    // -----------------------------------------------------------------------

    /// Drain and apply pending channel notifications.
    pub fn pump(&mut self) {
        for event in self.channel.poll_events() {
            if self.released {
                return;
            }
            match event {
                ChannelEvent::Ended => {
                    self.handle_ended();
                    // Anything after the end in this batch predates the transition.
                    return;
                }
                ChannelEvent::TimeUpdate(t) => self.current_time = t,
                ChannelEvent::DurationKnown(d) => {
                    if d.is_finite() && d > 0.0 {
                        self.duration = d;
                    }
                }
                ChannelEvent::PlayFailed(e) => self.settle_play(Err(e)),
            }
        }
    }

    /// End of the current ayah's audio: advance within the juz, roll over
    /// to the next juz, or stop after the last ayah of juz 30.
    pub fn handle_ended(&mut self) {
        if self.released || self.status != LoadStatus::Ready || self.ayahs.is_empty() {
            return;
        }
        let was_playing = self.playing;

        if self.index + 1 < self.ayahs.len() {
            self.index += 1;
            self.sync_playback();
        } else if let Some(next) = self.juz.next() {
            self.select_juz(
                next,
                JuzChange {
                    auto_advance: was_playing,
                    reset_index: false,
                },
            );
            // The arriving list always starts from its first ayah.
            self.index = 0;
        } else {
            self.playing = false;
            self.sync_playback();
        }
    }

    /// Tear down: pause the channel and ignore everything that arrives later.
    pub fn release(&mut self) {
        self.released = true;
        self.playing = false;
        self.pending = None;
        self.channel.pause();
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn juz(&self) -> Juz {
        self.juz
    }

    pub fn reciter(&self) -> &'static Reciter {
        self.reciter
    }

    pub fn ayahs(&self) -> &[Ayah] {
        &self.ayahs
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_ayah(&self) -> Option<&Ayah> {
        self.ayahs.get(self.index)
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn phase(&self) -> Phase {
        match self.status {
            LoadStatus::Idle => Phase::Idle,
            LoadStatus::Loading => Phase::Loading,
            LoadStatus::Error { .. } => Phase::Error,
            LoadStatus::Ready if self.playing && !self.ayahs.is_empty() => Phase::Playing,
            LoadStatus::Ready => Phase::Paused,
        }
    }

    pub fn progress(&self) -> f64 {
        if self.duration_known() {
            (self.current_time / self.duration * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            juz: self.juz,
            reciter: self.reciter.id,
            reciter_name: self.reciter.name,
            index: self.index,
            ayah_count: self.ayahs.len(),
            ayah: self.current_ayah().cloned(),
            phase: self.phase(),
            status: self.status.clone(),
            playing: self.playing,
            muted: self.muted,
            volume: self.volume,
            current_time: self.current_time,
            duration: self.duration,
            progress: self.progress(),
            error: self.last_error.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn begin_fetch(&mut self) {
        self.ticket += 1;
        self.ayahs.clear();
        self.status = LoadStatus::Loading;
        self.pending = Some(FetchRequest {
            ticket: self.ticket,
            juz: self.juz,
            reciter: self.reciter.id,
        });
        // Old narration must not continue under the new selection.
        self.channel.pause();
    }

    /// Bring the channel in line with (cursor, playing flag, data).
    fn sync_playback(&mut self) {
        if self.released {
            return;
        }
        if !self.playing {
            self.channel.pause();
            return;
        }
        if self.status != LoadStatus::Ready || self.ayahs.is_empty() {
            return;
        }

        let url = loop {
            let ayah = &self.ayahs[self.index];
            if let Some(url) = ayah.audio_url() {
                break url.to_string();
            }
            log::warn!(
                "tilawa: no audio for ayah {} in {} ({})",
                ayah.number,
                self.juz,
                self.reciter.id
            );
            if self.index + 1 < self.ayahs.len() {
                self.index += 1;
            } else {
                self.playing = false;
                self.channel.pause();
                return;
            }
        };

        if self.channel.source().as_deref() != Some(url.as_str()) {
            self.reset_time();
            self.channel.set_source(&url);
            self.channel.load();
        }
        if self.channel.is_paused() {
            let result = self.channel.play();
            self.settle_play(result);
        }
    }

    fn settle_play(&mut self, result: Result<(), PlayError>) {
        match result {
            Ok(()) => {}
            Err(PlayError::Superseded) => {
                log::debug!("tilawa: play request superseded");
            }
            Err(PlayError::Failed(reason)) => {
                if self.released {
                    return;
                }
                log::error!("tilawa: playback failed: {}", reason);
                self.playing = false;
                self.channel.pause();
                self.last_error = Some(reason);
            }
        }
    }

    fn apply_volume(&self) {
        self.channel.set_volume(self.effective_volume());
    }

    fn reset_time(&mut self) {
        self.current_time = 0.0;
        self.duration = 0.0;
    }

    fn duration_known(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0
    }
}

/// Clamp to 0–1, rejecting NaN.
pub(crate) fn clamp_unit(v: f32) -> Option<f32> {
    if v.is_nan() {
        None
    } else {
        Some(v.clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::scripted::ScriptedChannel;
    use crate::models::Surah;

    const ABDUL_BASIT: &str = "ar.abdulbasitmurattal";
    const WALK: &str = "en.walk";

    fn juz(n: u8) -> Juz {
        Juz::new(n).unwrap()
    }

    fn audio_url(juz: u8, reciter: &str, i: usize) -> String {
        format!("https://cdn.test/{}/{}/{}.mp3", reciter, juz, i)
    }

    fn ayahs_for(juz: u8, reciter: &str, count: usize) -> Vec<Ayah> {
        (0..count)
            .map(|i| Ayah {
                number: (juz as u32) * 1000 + i as u32,
                audio: Some(audio_url(juz, reciter, i)),
                text: format!("ayah {}", i),
                number_in_surah: i as u32 + 1,
                surah: Surah {
                    number: 1,
                    name: "s".into(),
                    english_name: "S".into(),
                },
                juz,
            })
            .collect()
    }

    fn player_at(n: u8) -> (SegmentPlayer, ScriptedChannel) {
        let ch = ScriptedChannel::new();
        let player = SegmentPlayer::new(ch.boxed(), juz(n), ABDUL_BASIT, 0.8).unwrap();
        (player, ch)
    }

    /// Serve the outstanding fetch with `count` ayahs.
    fn serve(player: &mut SegmentPlayer, count: usize) {
        let req = player.take_fetch().expect("fetch requested");
        let data = ayahs_for(req.juz.number(), req.reciter, count);
        assert!(player.complete_fetch(req.ticket, Ok(data)));
    }

    #[test]
    fn initial_load_does_not_autoplay() {
        let (mut player, ch) = player_at(1);
        assert_eq!(player.phase(), Phase::Idle);

        player.reload();
        assert_eq!(player.phase(), Phase::Loading);
        serve(&mut player, 7);

        assert_eq!(player.phase(), Phase::Paused);
        assert_eq!(player.ayahs().len(), 7);
        assert_eq!(ch.script().play_calls, 0);
    }

    #[test]
    fn toggle_play_starts_current_ayah() {
        let (mut player, ch) = player_at(1);
        player.reload();
        serve(&mut player, 3);

        player.toggle_play();
        assert_eq!(player.phase(), Phase::Playing);
        assert_eq!(ch.source().as_deref(), Some(audio_url(1, ABDUL_BASIT, 0).as_str()));
        assert!(ch.is_playing());

        player.toggle_play();
        assert_eq!(player.phase(), Phase::Paused);
        assert!(!ch.is_playing());
    }

    #[test]
    fn play_before_data_is_deferred() {
        let (mut player, ch) = player_at(2);
        player.reload();
        player.toggle_play();

        assert!(player.is_playing());
        assert_eq!(ch.script().play_calls, 0);

        serve(&mut player, 4);
        assert!(ch.is_playing());
        assert_eq!(ch.script().play_calls, 1);
    }

    #[test]
    fn ended_advances_within_juz() {
        let (mut player, ch) = player_at(3);
        player.reload();
        serve(&mut player, 4);
        player.toggle_play();

        ch.push_event(ChannelEvent::Ended);
        player.pump();

        assert_eq!(player.index(), 1);
        assert!(player.is_playing());
        assert_eq!(ch.source().as_deref(), Some(audio_url(3, ABDUL_BASIT, 1).as_str()));
        assert!(player.take_fetch().is_none());
    }

    #[test]
    fn last_ayah_rolls_over_to_next_juz() {
        // juz 5, 10 ayahs, last one ends while playing
        let (mut player, ch) = player_at(5);
        player.reload();
        serve(&mut player, 10);
        player.select_ayah(9).unwrap();
        assert!(player.is_playing());

        ch.push_event(ChannelEvent::Ended);
        player.pump();

        let req = player.take_fetch().expect("next juz requested");
        assert_eq!(req.juz, juz(6));
        assert_eq!(req.reciter, ABDUL_BASIT);
        assert_eq!(player.index(), 0);
        assert!(player.is_playing());

        let data = ayahs_for(6, ABDUL_BASIT, 8);
        assert!(player.complete_fetch(req.ticket, Ok(data)));
        assert_eq!(player.index(), 0);
        assert_eq!(ch.source().as_deref(), Some(audio_url(6, ABDUL_BASIT, 0).as_str()));
        assert!(ch.is_playing());
    }

    #[test]
    fn every_juz_before_the_last_rolls_over_with_cursor_reset() {
        for n in 1..30u8 {
            let (mut player, ch) = player_at(n);
            player.reload();
            serve(&mut player, 3);
            player.select_ayah(2).unwrap();

            ch.push_event(ChannelEvent::Ended);
            player.pump();

            let req = player.take_fetch().expect("rollover fetch");
            assert_eq!(req.juz.number(), n + 1);
            assert_eq!(player.index(), 0, "juz {}", n);
            assert!(player.is_playing(), "juz {}", n);
        }
    }

    #[test]
    fn rollover_preserves_paused_state_seen_at_end() {
        let (mut player, ch) = player_at(8);
        player.reload();
        serve(&mut player, 2);
        player.select_ayah(1).unwrap();
        player.pause();

        // End notification raised just before the pause was applied.
        ch.push_event(ChannelEvent::Ended);
        player.pump();

        assert!(player.take_fetch().is_some());
        assert!(!player.is_playing());
    }

    #[test]
    fn end_of_juz_thirty_stops() {
        let (mut player, ch) = player_at(30);
        player.reload();
        serve(&mut player, 5);
        player.select_ayah(4).unwrap();

        ch.push_event(ChannelEvent::Ended);
        player.pump();

        assert!(!player.is_playing());
        assert_eq!(player.index(), 4);
        assert_eq!(player.juz(), Juz::LAST);
        assert!(player.take_fetch().is_none());
        assert!(!ch.is_playing());
    }

    #[test]
    fn stale_fetch_after_reciter_change_is_discarded() {
        let (mut player, _ch) = player_at(1);
        player.reload();
        let first = player.take_fetch().unwrap();

        player.select_reciter(WALK).unwrap();
        let second = player.take_fetch().unwrap();
        assert_eq!(second.reciter, WALK);
        assert!(second.ticket > first.ticket);

        assert!(!player.complete_fetch(first.ticket, Ok(ayahs_for(1, ABDUL_BASIT, 5))));
        assert!(player.ayahs().is_empty());
        assert_eq!(player.phase(), Phase::Loading);

        assert!(player.complete_fetch(second.ticket, Ok(ayahs_for(1, WALK, 6))));
        assert_eq!(player.ayahs().len(), 6);
        assert!(player
            .ayahs()
            .iter()
            .all(|a| a.audio.as_deref().unwrap().contains(WALK)));
    }

    #[test]
    fn ticket_commits_only_once() {
        let (mut player, _ch) = player_at(1);
        player.reload();
        let req = player.take_fetch().unwrap();
        assert!(player.complete_fetch(req.ticket, Ok(ayahs_for(1, ABDUL_BASIT, 2))));
        assert!(!player.complete_fetch(req.ticket, Ok(ayahs_for(1, ABDUL_BASIT, 9))));
        assert_eq!(player.ayahs().len(), 2);
    }

    #[test]
    fn missing_audio_skips_forward() {
        let (mut player, ch) = player_at(4);
        player.reload();
        let req = player.take_fetch().unwrap();
        let mut data = ayahs_for(4, ABDUL_BASIT, 3);
        data[0].audio = None;
        player.complete_fetch(req.ticket, Ok(data));

        player.toggle_play();
        assert_eq!(player.index(), 1);
        assert!(player.is_playing());
        assert_eq!(ch.source().as_deref(), Some(audio_url(4, ABDUL_BASIT, 1).as_str()));
    }

    #[test]
    fn missing_audio_everywhere_stops_without_looping() {
        let (mut player, ch) = player_at(4);
        player.reload();
        let req = player.take_fetch().unwrap();
        let data: Vec<Ayah> = ayahs_for(4, ABDUL_BASIT, 3)
            .into_iter()
            .map(|a| Ayah { audio: None, ..a })
            .collect();
        player.complete_fetch(req.ticket, Ok(data));

        player.toggle_play();
        assert!(!player.is_playing());
        assert_eq!(player.index(), 2);
        assert_eq!(ch.script().play_calls, 0);
    }

    #[test]
    fn superseded_play_is_swallowed() {
        let (mut player, ch) = player_at(1);
        player.reload();
        serve(&mut player, 3);

        ch.reject_next_play(PlayError::Superseded);
        player.toggle_play();

        assert!(player.is_playing());
        assert!(player.last_error().is_none());
    }

    #[test]
    fn genuine_play_failure_stops_and_reports() {
        let (mut player, ch) = player_at(1);
        player.reload();
        serve(&mut player, 3);

        ch.reject_next_play(PlayError::Failed("no output device".into()));
        player.toggle_play();

        assert!(!player.is_playing());
        assert!(!ch.is_playing());
        assert_eq!(player.last_error(), Some("no output device"));
    }

    #[test]
    fn late_play_failure_from_channel_stops() {
        let (mut player, ch) = player_at(1);
        player.reload();
        serve(&mut player, 3);
        player.toggle_play();

        ch.push_event(ChannelEvent::PlayFailed(PlayError::Superseded));
        player.pump();
        assert!(player.is_playing());

        ch.push_event(ChannelEvent::PlayFailed(PlayError::Failed("decode error".into())));
        player.pump();
        assert!(!player.is_playing());
        assert_eq!(player.phase(), Phase::Paused);
    }

    #[test]
    fn out_of_range_ayah_is_rejected() {
        let (mut player, _ch) = player_at(1);
        player.reload();
        serve(&mut player, 3);
        player.select_ayah(1).unwrap();

        assert_eq!(
            player.select_ayah(3),
            Err(PlayerError::AyahOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(player.index(), 1);
    }

    #[test]
    fn ayah_navigation_clamps() {
        let (mut player, _ch) = player_at(1);
        player.reload();
        serve(&mut player, 2);

        player.previous_ayah();
        assert_eq!(player.index(), 0);
        player.next_ayah();
        player.next_ayah();
        assert_eq!(player.index(), 1);
    }

    #[test]
    fn seek_requires_known_duration() {
        let (mut player, ch) = player_at(1);
        player.reload();
        serve(&mut player, 2);
        player.toggle_play();

        player.seek(0.5);
        assert!(ch.script().seeks.is_empty());

        ch.push_event(ChannelEvent::DurationKnown(20.0));
        player.pump();
        player.seek(0.25);
        assert_eq!(player.current_time(), 5.0);
        assert_eq!(ch.current_time(), 5.0);
        assert_eq!(player.progress(), 25.0);
    }

    #[test]
    fn skip_clamps_to_duration() {
        let (mut player, ch) = player_at(1);
        player.reload();
        serve(&mut player, 2);
        player.toggle_play();
        ch.push_event(ChannelEvent::DurationKnown(12.0));
        player.pump();

        ch.seek(8.0);
        player.skip(10.0);
        assert_eq!(player.current_time(), 12.0);

        player.skip(-30.0);
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn mute_restores_previous_volume() {
        let (mut player, ch) = player_at(1);
        player.set_volume(0.6);
        assert_eq!(ch.volume(), 0.6);

        player.toggle_mute();
        assert_eq!(ch.volume(), 0.0);
        assert_eq!(player.volume(), 0.6);

        player.toggle_mute();
        assert_eq!(ch.volume(), 0.6);
    }

    #[test]
    fn set_volume_is_idempotent_and_clamped() {
        let (mut player, ch) = player_at(1);
        player.set_volume(0.5);
        player.set_volume(0.5);
        assert_eq!(player.effective_volume(), 0.5);
        assert_eq!(ch.volume(), 0.5);

        player.set_volume(3.0);
        assert_eq!(player.volume(), 1.0);
        player.set_volume(f32::NAN);
        assert_eq!(player.volume(), 1.0);
    }

    #[test]
    fn fetch_error_enters_error_and_recovers_on_next_selection() {
        let (mut player, ch) = player_at(9);
        player.reload();
        player.toggle_play();
        let req = player.take_fetch().unwrap();
        player.complete_fetch(req.ticket, Err(FetchError::Status(500)));

        assert_eq!(player.phase(), Phase::Error);
        assert!(!player.is_playing());
        assert!(player.last_error().unwrap().contains("500"));

        player.select_juz(juz(10), JuzChange::default());
        serve(&mut player, 3);
        assert_eq!(player.phase(), Phase::Playing);
        assert!(player.last_error().is_none());
        assert!(ch.is_playing());
    }

    #[test]
    fn ended_while_loading_is_ignored() {
        let (mut player, ch) = player_at(1);
        player.reload();
        serve(&mut player, 2);
        player.toggle_play();
        player.select_juz(juz(2), JuzChange::default());
        let req = player.take_fetch().unwrap();

        ch.push_event(ChannelEvent::Ended);
        player.pump();

        assert_eq!(player.juz(), juz(2));
        assert!(player.take_fetch().is_none());
        assert!(player.complete_fetch(req.ticket, Ok(ayahs_for(2, ABDUL_BASIT, 2))));
    }

    #[test]
    fn events_after_end_in_same_batch_are_dropped() {
        let (mut player, ch) = player_at(1);
        player.reload();
        serve(&mut player, 3);
        player.toggle_play();

        ch.push_event(ChannelEvent::Ended);
        ch.push_event(ChannelEvent::Ended);
        ch.push_event(ChannelEvent::TimeUpdate(42.0));
        player.pump();

        assert_eq!(player.index(), 1);
        assert_eq!(player.current_time(), 0.0);
    }

    #[test]
    fn juz_navigation_starts_playing_from_first_ayah() {
        let (mut player, _ch) = player_at(30);
        player.next_juz();
        assert!(player.take_fetch().is_none());

        player.previous_juz();
        let req = player.take_fetch().unwrap();
        assert_eq!(req.juz, juz(29));
        assert!(player.is_playing());
        assert_eq!(player.index(), 0);
    }

    #[test]
    fn unknown_reciter_is_rejected() {
        let (mut player, _ch) = player_at(1);
        assert_eq!(
            player.select_reciter("xx.nobody"),
            Err(PlayerError::UnknownReciter("xx.nobody".into()))
        );
        assert!(player.take_fetch().is_none());
        assert!(SegmentPlayer::new(ScriptedChannel::new().boxed(), juz(1), "bad", 0.5).is_err());
    }

    #[test]
    fn release_suppresses_late_results() {
        let (mut player, ch) = player_at(1);
        player.reload();
        player.toggle_play();
        let req = player.take_fetch().unwrap();

        player.release();
        assert!(!player.complete_fetch(req.ticket, Ok(ayahs_for(1, ABDUL_BASIT, 2))));
        assert!(player.ayahs().is_empty());
        assert!(!ch.is_playing());
    }
}
