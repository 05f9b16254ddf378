//! tilawa CLI — Quran recitation player powered by the tilawa engine.
//!
//! Commands:
//!   tilawa play [juz] [--reciter ID] [--preset ID] [--volume 0-100]
//!                                   Recite from a juz onward (Ctrl+C stops)
//!   tilawa ayahs <juz> [--reciter ID]
//!                                   Print a juz's ayahs
//!   tilawa reciters                 List reciters
//!   tilawa presets                  List ambient presets
//!   tilawa themes                   List themes
//!   tilawa theme [key]              Show or set the theme

use std::path::PathBuf;
use std::time::Duration;

use tilawa_core::{
    paths, Engine, Juz, MixerCommand, Phase, PlayerCommand, PlayerSnapshot, Reciter, ThemeKey,
    PRESETS, RECITERS, THEMES,
};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return;
    }

    match args[0].as_str() {
        "play" => cmd_play(&args[1..]),
        "ayahs" => cmd_ayahs(&args[1..]),
        "reciters" => cmd_reciters(),
        "presets" => cmd_presets(),
        "themes" => cmd_themes(),
        "theme" => cmd_theme(&args[1..]),
        other => {
            eprintln!("unknown command: {}", other);
            print_usage();
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_play(args: &[String]) {
    let juz = match positional(args).map(parse_juz) {
        Some(Ok(juz)) => Some(juz),
        Some(Err(e)) => {
            eprintln!("{}", e);
            return;
        }
        None => None,
    };

    let Some(root) = data_root() else { return };
    let engine = match Engine::open(&root) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to start engine: {}", e);
            return;
        }
    };
    engine.start();

    if let Some(juz) = juz {
        run(&engine, PlayerCommand::SelectJuz {
            juz: juz.number(),
            auto_advance: true,
            reset_index: true,
        });
    }
    if let Some(reciter) = flag(args, "--reciter") {
        run(&engine, PlayerCommand::SelectReciter {
            reciter: reciter.to_string(),
        });
    }
    run(&engine, PlayerCommand::Play);
    if let Some(v) = flag(args, "--volume") {
        match v.parse::<u32>() {
            Ok(v) => run(&engine, PlayerCommand::SetVolume {
                volume: v.min(100) as f32 / 100.0,
            }),
            Err(_) => eprintln!("invalid volume: {}", v),
        }
    }
    if let Some(preset) = flag(args, "--preset") {
        if let Err(e) = engine.mixer_command(MixerCommand::ApplyPreset {
            preset: preset.to_string(),
        }) {
            eprintln!("{}", e);
        }
    }

    // Block showing progress until recitation stops (Ctrl+C exits via Drop)
    let mut started = false;
    loop {
        std::thread::sleep(Duration::from_millis(250));

        for failure in engine.take_mixer_failures() {
            eprintln!("\nambient {} unavailable: {}", failure.sound, failure.reason);
        }

        let state = engine.player_state();
        match sample(&state, &mut started) {
            Sample::Waiting => continue,
            Sample::Stopped(None) => break,
            Sample::Stopped(Some(msg)) => {
                println!();
                eprintln!("{}", msg);
                break;
            }
            Sample::Playing => {}
        }

        let (surah, ayah_no) = state
            .ayah
            .as_ref()
            .map(|a| (a.surah.english_name.as_str(), a.number_in_surah))
            .unwrap_or(("", 0));
        print_progress(
            &format!("{} · {} {}", state.juz, surah, ayah_no),
            state.index + 1,
            state.ayah_count,
            state.current_time,
            state.duration,
            (state.volume * 100.0).round() as u32,
        );
    }
    println!();
    engine.shutdown();
}

fn cmd_ayahs(args: &[String]) {
    let juz = match positional(args).map(parse_juz) {
        Some(Ok(juz)) => juz,
        Some(Err(e)) => {
            eprintln!("{}", e);
            return;
        }
        None => {
            eprintln!("usage: tilawa ayahs <juz> [--reciter ID]");
            return;
        }
    };
    let reciter = flag(args, "--reciter").unwrap_or(Reciter::default_reciter().id);
    if Reciter::find(reciter).is_none() {
        eprintln!("unknown reciter: {}", reciter);
        return;
    }

    let Some(root) = data_root() else { return };
    let engine = match Engine::headless(&root) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to start engine: {}", e);
            return;
        }
    };
    match engine.lookup(juz, reciter) {
        Ok(ayahs) => {
            for ayah in &ayahs {
                let audio = if ayah.audio_url().is_some() { "" } else { "  (no audio)" };
                println!(
                    "{:>4}  {} {}:  {}{}",
                    ayah.number, ayah.surah.english_name, ayah.number_in_surah, ayah.text, audio
                );
            }
            println!("{} ayahs in {}", ayahs.len(), juz);
        }
        Err(e) => eprintln!("cannot load {}: {}", juz, e),
    }
}

fn cmd_reciters() {
    for (i, r) in RECITERS.iter().enumerate() {
        let marker = if i == 0 { " (default)" } else { "" };
        println!("{:<24} {} — {}{}", r.id, r.name, r.language, marker);
    }
}

fn cmd_presets() {
    for p in PRESETS {
        println!(
            "{:<8} rain {:>3}%  thunder {:>3}%  birds {:>3}%",
            p.id,
            (p.rain * 100.0).round(),
            (p.thunder * 100.0).round(),
            (p.birds * 100.0).round(),
        );
    }
}

fn cmd_themes() {
    for t in THEMES {
        println!("{:<9} {} — {}", t.key(), t.name(), t.description());
    }
}

fn cmd_theme(args: &[String]) {
    let Some(root) = data_root() else { return };
    let engine = match Engine::headless(&root) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("failed to start engine: {}", e);
            return;
        }
    };
    match args.first() {
        None => {
            let t = engine.theme();
            println!("{} ({})", t.key(), t.name());
        }
        Some(key) => {
            let theme: ThemeKey = match key.parse() {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("{}", e);
                    return;
                }
            };
            match engine.set_theme(theme) {
                Ok(()) => println!("theme: {}", theme.name()),
                Err(e) => eprintln!("failed to save theme: {}", e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

enum Sample {
    Waiting,
    Playing,
    /// Recitation is over; carries the message to print, if any.
    Stopped(Option<String>),
}

/// Classify one progress sample. `play` requests playback before the loop
/// starts, so once loading is over a cleared `playing` flag means it stopped.
fn sample(state: &PlayerSnapshot, started: &mut bool) -> Sample {
    match state.phase {
        Phase::Error => {
            return Sample::Stopped(Some(format!(
                "cannot load {}: {}",
                state.juz,
                state.error.as_deref().unwrap_or("unknown error")
            )))
        }
        Phase::Loading | Phase::Idle => return Sample::Waiting,
        Phase::Playing => *started = true,
        Phase::Paused => {}
    }
    if state.playing {
        return Sample::Playing;
    }
    match &state.error {
        Some(err) => Sample::Stopped(Some(format!("playback stopped: {}", err))),
        None if !*started => Sample::Stopped(Some(format!("no playable audio in {}", state.juz))),
        None => Sample::Stopped(None),
    }
}

/// Data root defaults to ~/.tilawa
fn data_root() -> Option<PathBuf> {
    let root = paths::data_root();
    if let Err(e) = std::fs::create_dir_all(&root) {
        eprintln!("cannot create {}: {}", root.display(), e);
        return None;
    }
    log::debug!("tilawa: data root {}", root.display());
    Some(root)
}

fn run(engine: &Engine, cmd: PlayerCommand) {
    if let Err(e) = engine.command(cmd) {
        eprintln!("{}", e);
    }
}

/// First argument that is neither a flag nor a flag's value.
fn positional(args: &[String]) -> Option<&str> {
    let mut i = 0;
    while i < args.len() {
        if args[i].starts_with("--") {
            i += 2;
            continue;
        }
        return Some(args[i].as_str());
    }
    None
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn parse_juz(s: &str) -> Result<Juz, String> {
    s.parse::<u8>()
        .ok()
        .and_then(Juz::new)
        .ok_or_else(|| format!("invalid juz: {} (expected 1-30)", s))
}

fn print_progress(title: &str, n: usize, total: usize, pos: f64, dur: f64, vol: u32) {
    let bar_width = 30;
    let filled = if dur > 0.0 {
        ((pos / dur).clamp(0.0, 1.0) * bar_width as f64) as usize
    } else {
        0
    };
    let empty = bar_width - filled;

    print!(
        "\r  {}  ({}/{})  [{}{}] {} / {}  vol: {}%    ",
        title,
        n,
        total,
        "=".repeat(filled),
        " ".repeat(empty),
        fmt_time(pos),
        fmt_time(dur),
        vol,
    );
    use std::io::Write;
    let _ = std::io::stdout().flush();
}

fn fmt_time(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn print_usage() {
    eprintln!("tilawa — Quran recitation player");
    eprintln!();
    eprintln!("usage: tilawa <command> [args]");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  play [juz] [--reciter ID] [--preset ID] [--volume 0-100]");
    eprintln!("                            Recite from a juz onward");
    eprintln!("  ayahs <juz> [--reciter ID]  Print a juz's ayahs");
    eprintln!("  reciters                  List reciters");
    eprintln!("  presets                   List ambient presets");
    eprintln!("  themes                    List themes");
    eprintln!("  theme [key]               Show or set the theme");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilawa_core::effects::{AudioChannel, ChannelEvent, HeadlessChannel};
    use tilawa_core::{Ayah, SegmentPlayer, Surah};

    fn juz_of(count: usize, audio: bool) -> Vec<Ayah> {
        (0..count)
            .map(|i| Ayah {
                number: i as u32 + 1,
                audio: audio.then(|| format!("https://cdn.test/{}.mp3", i)),
                text: String::new(),
                number_in_surah: i as u32 + 1,
                surah: Surah {
                    number: 1,
                    name: "s".into(),
                    english_name: "S".into(),
                },
                juz: 1,
            })
            .collect()
    }

    /// Loaded player that has been asked to play.
    fn playing(ayahs: Vec<Ayah>) -> (SegmentPlayer, HeadlessChannel) {
        let ch = HeadlessChannel::new();
        let mut player =
            SegmentPlayer::new(Box::new(ch.clone()), Juz::FIRST, "en.walk", 0.8).unwrap();
        player.reload();
        player.play();
        let request = player.take_fetch().unwrap();
        assert!(player.complete_fetch(request.ticket, Ok(ayahs)));
        (player, ch)
    }

    #[test]
    fn sample_waits_while_loading() {
        let ch = HeadlessChannel::new();
        let mut player =
            SegmentPlayer::new(Box::new(ch), Juz::FIRST, "en.walk", 0.8).unwrap();
        player.reload();
        player.play();
        let mut started = false;
        assert!(matches!(sample(&player.snapshot(), &mut started), Sample::Waiting));
    }

    #[test]
    fn sample_stops_when_first_play_fails() {
        let (mut player, ch) = playing(juz_of(2, true));
        let mut started = false;
        assert!(matches!(sample(&player.snapshot(), &mut started), Sample::Playing));

        ch.report(ChannelEvent::PlayFailed(tilawa_core::error::PlayError::Failed(
            "no output device".into(),
        )));
        player.pump();
        match sample(&player.snapshot(), &mut started) {
            Sample::Stopped(Some(msg)) => assert!(msg.contains("no output device")),
            _ => panic!("expected a stop with the failure"),
        }
    }

    #[test]
    fn sample_stops_when_nothing_has_audio() {
        let (player, ch) = playing(juz_of(3, false));
        assert!(ch.is_paused());
        let mut started = false;
        match sample(&player.snapshot(), &mut started) {
            Sample::Stopped(Some(msg)) => assert!(msg.contains("no playable audio")),
            _ => panic!("expected a stop"),
        }
    }

    #[test]
    fn sample_stops_quietly_after_last_ayah() {
        let (mut player, _ch) = playing(juz_of(1, true));
        let mut started = false;
        assert!(matches!(sample(&player.snapshot(), &mut started), Sample::Playing));
        assert!(started);

        player.pause();
        assert!(matches!(sample(&player.snapshot(), &mut started), Sample::Stopped(None)));
    }

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn positional_skips_flags() {
        let a = args(&["--reciter", "en.walk", "12"]);
        assert_eq!(positional(&a), Some("12"));
        assert_eq!(flag(&a, "--reciter"), Some("en.walk"));
        assert_eq!(flag(&a, "--preset"), None);
        assert_eq!(positional(&args(&["--volume", "40"])), None);
    }

    #[test]
    fn juz_parsing() {
        assert_eq!(parse_juz("30").unwrap(), Juz::LAST);
        assert!(parse_juz("0").is_err());
        assert!(parse_juz("abc").is_err());
    }

    #[test]
    fn time_format() {
        assert_eq!(fmt_time(0.0), "0:00");
        assert_eq!(fmt_time(75.9), "1:15");
        assert_eq!(fmt_time(-3.0), "0:00");
    }
}
