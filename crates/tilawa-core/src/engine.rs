//! Tilawa engine — composition root for the player, the mixer and their
//! effects.
//!
//! Player and mixer each sit behind their own mutex; every transition
//! (user command, fetch completion, channel notification) runs under that
//! lock, so transitions are applied one at a time in arrival order.
//!
//! - Fetches run on short-lived worker threads and commit through the
//!   player's ticket check.
//! - A heartbeat thread drains channel notifications for all channels.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

#[cfg(feature = "native")]
use crate::effects::audio::NativeChannel;
use crate::effects::http::AlQuranCloud;
use crate::effects::{AudioChannel, ContentSource, HeadlessChannel};
use crate::error::{EngineError, FetchError, Result};
use crate::mixer::{AmbientMixer, AmbientTrack, ChannelFailure, MixerSnapshot};
use crate::models::{Ayah, Juz, MixerCommand, NarrationEvent, PlayerCommand, SoundKind, ThemeKey};
use crate::player::{JuzChange, PlayerSnapshot, SegmentPlayer};
use crate::settings::Settings;
use crate::store::PreferenceStore;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    root: PathBuf,
    settings: Settings,
    source: Arc<dyn ContentSource>,
    player: Arc<Mutex<SegmentPlayer>>,
    mixer: Arc<Mutex<AmbientMixer>>,
    prefs: Mutex<PreferenceStore>,
    /// Host-side end of the narration channel, headless engines only.
    narration_feed: Option<HeadlessChannel>,
    /// Shutdown signal for the heartbeat.
    shutdown: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Boot with native (cpal) audio and the alquran.cloud content API.
    #[cfg(feature = "native")]
    pub fn open(root: &Path) -> Result<Self> {
        let settings = Settings::load(root)?;
        let source = Arc::new(AlQuranCloud::new(
            &settings.api_base_url,
            settings.request_timeout(),
        ));
        Self::with_channels(
            root,
            settings,
            source,
            Box::new(NativeChannel::new()),
            |_| Box::new(NativeChannel::new()),
        )
    }

    /// Boot without audio output. State machines behave identically; the
    /// host renders sound itself and reports narration notifications
    /// through [`Engine::report_narration_event`].
    pub fn headless(root: &Path) -> Result<Self> {
        let settings = Settings::load(root)?;
        let source = Arc::new(AlQuranCloud::new(
            &settings.api_base_url,
            settings.request_timeout(),
        ));
        Self::headless_with(root, settings, source)
    }

    pub fn headless_with(
        root: &Path,
        settings: Settings,
        source: Arc<dyn ContentSource>,
    ) -> Result<Self> {
        let feed = HeadlessChannel::new();
        let mut engine = Self::with_channels(
            root,
            settings,
            source,
            Box::new(feed.clone()),
            |_| Box::new(HeadlessChannel::new()),
        )?;
        engine.narration_feed = Some(feed);
        Ok(engine)
    }

    /// Boot with explicit collaborators.
    pub fn with_channels(
        root: &Path,
        settings: Settings,
        source: Arc<dyn ContentSource>,
        narration: Box<dyn AudioChannel>,
        mut ambient: impl FnMut(SoundKind) -> Box<dyn AudioChannel>,
    ) -> Result<Self> {
        let player = SegmentPlayer::new(
            narration,
            settings.default_juz,
            &settings.default_reciter,
            settings.volume,
        )?;
        let tracks: Vec<AmbientTrack> = SoundKind::ALL
            .into_iter()
            .map(|sound| AmbientTrack {
                sound,
                source: settings.sound_source(root, sound),
                channel: ambient(sound),
            })
            .collect();
        let mixer = AmbientMixer::new(tracks, settings.master_volume);

        Ok(Self {
            root: root.to_path_buf(),
            prefs: Mutex::new(PreferenceStore::open(root)),
            narration_feed: None,
            settings,
            source,
            player: Arc::new(Mutex::new(player)),
            mixer: Arc::new(Mutex::new(mixer)),
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Load the configured juz (without playing) and start the heartbeat.
    /// Idempotent.
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() || self.shutdown.load(Ordering::SeqCst) {
            return;
        }
        self.player.lock().reload();
        self.dispatch_fetch();
        handles.push(self.start_heartbeat());
    }

    /// Release both components and wait for the heartbeat to exit.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.player.lock().release();
        self.mixer.lock().release();

        let mut handles = self.handles.lock();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
    }

    fn start_heartbeat(&self) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        let player = Arc::clone(&self.player);
        let mixer = Arc::clone(&self.mixer);
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.settings.heartbeat();

        thread::spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                thread::sleep(interval);
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                pump(&source, &player, &mixer);
            }
        })
    }

    /// Drain channel notifications once. The heartbeat does this on its
    /// own; hosts without one may call it directly.
    pub fn tick(&self) {
        pump(&self.source, &self.player, &self.mixer);
    }

    /// Feed a notification from the host's narration output and apply it
    /// right away (ended ayahs advance, a finished juz rolls over).
    pub fn report_narration_event(&self, event: NarrationEvent) -> Result<()> {
        let feed = self
            .narration_feed
            .as_ref()
            .ok_or(EngineError::NoNarrationFeed)?;
        feed.report(event.into());
        self.tick();
        Ok(())
    }

    fn dispatch_fetch(&self) {
        let request = self.player.lock().take_fetch();
        if let Some(request) = request {
            spawn_fetch(Arc::clone(&self.source), Arc::clone(&self.player), request);
        }
    }

    // -----------------------------------------------------------------------
    // Player
    // -----------------------------------------------------------------------

    pub fn command(&self, cmd: PlayerCommand) -> Result<()> {
        {
            let mut p = self.player.lock();
            match cmd {
                PlayerCommand::TogglePlay => p.toggle_play(),
                PlayerCommand::Play => p.play(),
                PlayerCommand::Pause => p.pause(),
                PlayerCommand::SelectJuz {
                    juz,
                    auto_advance,
                    reset_index,
                } => p.select_juz(
                    Juz::try_from(juz)?,
                    JuzChange {
                        auto_advance,
                        reset_index,
                    },
                ),
                PlayerCommand::NextJuz => p.next_juz(),
                PlayerCommand::PreviousJuz => p.previous_juz(),
                PlayerCommand::SelectReciter { reciter } => p.select_reciter(&reciter)?,
                PlayerCommand::SelectAyah { index } => p.select_ayah(index)?,
                PlayerCommand::NextAyah => p.next_ayah(),
                PlayerCommand::PreviousAyah => p.previous_ayah(),
                PlayerCommand::Seek { fraction } => p.seek(fraction),
                PlayerCommand::SeekTo { seconds } => p.seek_to(seconds),
                PlayerCommand::Skip { seconds } => p.skip(seconds),
                PlayerCommand::SkipForward => p.skip(self.settings.skip_seconds),
                PlayerCommand::SkipBackward => p.skip(-self.settings.skip_seconds),
                PlayerCommand::SetVolume { volume } => p.set_volume(volume),
                PlayerCommand::ToggleMute => p.toggle_mute(),
            }
        }
        self.dispatch_fetch();
        Ok(())
    }

    pub fn player_state(&self) -> PlayerSnapshot {
        self.player.lock().snapshot()
    }

    /// Ayahs of the loaded juz (empty while loading).
    pub fn ayahs(&self) -> Vec<Ayah> {
        self.player.lock().ayahs().to_vec()
    }

    /// One-off lookup that bypasses the player.
    pub fn lookup(&self, juz: Juz, reciter: &str) -> std::result::Result<Vec<Ayah>, FetchError> {
        self.source.fetch_juz(juz, reciter)
    }

    // -----------------------------------------------------------------------
    // Mixer
    // -----------------------------------------------------------------------

    pub fn mixer_command(&self, cmd: MixerCommand) -> Result<()> {
        let mut m = self.mixer.lock();
        match cmd {
            MixerCommand::SetSoundVolume { sound, volume } => m.set_sound_volume(sound, volume)?,
            MixerCommand::SetMasterVolume { volume } => m.set_master_volume(volume),
            MixerCommand::ToggleMute => m.toggle_mute(),
            MixerCommand::TogglePlay => m.toggle_play(),
            MixerCommand::ApplyPreset { preset } => m.apply_preset(&preset)?,
            MixerCommand::ResetAll => m.reset_all(),
        }
        Ok(())
    }

    pub fn mixer_state(&self) -> MixerSnapshot {
        self.mixer.lock().snapshot()
    }

    pub fn take_mixer_failures(&self) -> Vec<ChannelFailure> {
        self.mixer.lock().take_failures()
    }

    // -----------------------------------------------------------------------
    // Preferences & settings
    // -----------------------------------------------------------------------

    pub fn theme(&self) -> ThemeKey {
        self.prefs.lock().theme()
    }

    pub fn set_theme(&self, theme: ThemeKey) -> Result<()> {
        self.prefs.lock().set_theme(theme)?;
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.player.lock().release();
        self.mixer.lock().release();
        // Don't join here; the heartbeat exits on its next wake.
    }
}

// ---------------------------------------------------------------------------
// Effect dispatch
// ---------------------------------------------------------------------------

fn pump(
    source: &Arc<dyn ContentSource>,
    player: &Arc<Mutex<SegmentPlayer>>,
    mixer: &Arc<Mutex<AmbientMixer>>,
) {
    let request = {
        let mut p = player.lock();
        p.pump();
        // An ended last ayah rolls over into a fetch for the next juz.
        p.take_fetch()
    };
    if let Some(request) = request {
        spawn_fetch(Arc::clone(source), Arc::clone(player), request);
    }
    mixer.lock().pump();
}

fn spawn_fetch(
    source: Arc<dyn ContentSource>,
    player: Arc<Mutex<SegmentPlayer>>,
    request: crate::player::FetchRequest,
) {
    thread::spawn(move || {
        let result = source.fetch_juz(request.juz, request.reciter);
        if !player.lock().complete_fetch(request.ticket, result) {
            log::debug!(
                "tilawa: {} ({}) no longer wanted",
                request.juz,
                request.reciter
            );
        }
    });
}
