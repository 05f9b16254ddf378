//! Native audio channel — symphonia decode + cpal output.
//!
//! Each `set_source`/`load` starts a new generation. A play session (one
//! decoder thread, one output thread) belongs to the generation that
//! started it and winds down as soon as the generation moves on; its late
//! failures and end-of-stream are dropped instead of reported.
//!
//! Samples are decoded, remixed to the device's channel count, resampled
//! to the device rate and queued; the cpal callback pulls from the queue.
//! Position is counted from frames actually handed to the device.

use std::collections::VecDeque;
use std::error::Error;
use std::fs::File;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as DecodeError;
use symphonia::core::formats::{FormatOptions, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

use super::http::{extension_from_url, is_http_url, open_url};
use super::{AudioChannel, ChannelEvent};
use crate::error::PlayError;

/// About four seconds of 48 kHz stereo.
const QUEUE_CAPACITY: usize = 48_000 * 2 * 4;

/// Decoded audio needed before a bitrate-based duration estimate.
const ESTIMATE_AFTER_SECS: f64 = 2.0;

/// Output stream shape chosen when a session starts.
#[derive(Debug, Clone, Copy)]
struct OutputFormat {
    rate: u32,
    channels: usize,
}

enum Finish {
    Ended,
    Interrupted,
}

pub struct NativeChannel {
    shared: Arc<Shared>,
}

struct Shared {
    /// Bumped by every source change or reload.
    generation: AtomicU64,
    /// Generation of the running session; 0 when none.
    session: AtomicU64,
    paused: AtomicBool,
    looping: AtomicBool,
    /// f32 bits.
    volume: AtomicU32,
    source: Mutex<Option<String>>,
    /// Pending seek, in seconds. Also the start offset of the next session.
    seek: Mutex<Option<f64>>,
    /// Position at which `played` was last reset.
    origin: Mutex<f64>,
    /// Frames handed to the device since `origin`.
    played: AtomicU64,
    out_rate: AtomicU32,
    duration: Mutex<Option<f64>>,
    queue: Mutex<SampleQueue>,
    events: Mutex<Vec<ChannelEvent>>,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Queue an event unless its generation has been superseded.
    fn emit(&self, generation: u64, event: ChannelEvent) {
        let mut events = self.events.lock();
        if self.is_current(generation) {
            events.push(event);
        }
    }

    fn reset_clock(&self, at: f64) {
        *self.origin.lock() = at;
        self.played.store(0, Ordering::SeqCst);
    }

    fn position(&self) -> f64 {
        let rate = self.out_rate.load(Ordering::SeqCst).max(1) as f64;
        *self.origin.lock() + self.played.load(Ordering::SeqCst) as f64 / rate
    }

    /// Close the session of `generation` if it is still the running one.
    fn end_session(&self, generation: u64) -> bool {
        let closed = self
            .session
            .compare_exchange(generation, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if closed {
            self.paused.store(true, Ordering::SeqCst);
        }
        closed
    }

    /// Enqueue with back-pressure. `false` once the generation is stale.
    fn enqueue(&self, generation: u64, samples: &[f32]) -> bool {
        loop {
            if !self.is_current(generation) {
                return false;
            }
            if self.seek.lock().is_some() {
                // Stale audio; the seek clears the queue anyway.
                return true;
            }
            {
                let mut queue = self.queue.lock();
                if queue.space() >= samples.len() {
                    queue.push(samples);
                    return true;
                }
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl NativeChannel {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                generation: AtomicU64::new(1),
                session: AtomicU64::new(0),
                paused: AtomicBool::new(true),
                looping: AtomicBool::new(false),
                volume: AtomicU32::new(1.0f32.to_bits()),
                source: Mutex::new(None),
                seek: Mutex::new(None),
                origin: Mutex::new(0.0),
                played: AtomicU64::new(0),
                out_rate: AtomicU32::new(48_000),
                duration: Mutex::new(None),
                queue: Mutex::new(SampleQueue::new(QUEUE_CAPACITY)),
                events: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Abandon the running session and rewind.
    fn restart(&self) {
        let s = &self.shared;
        {
            let mut events = s.events.lock();
            s.generation.fetch_add(1, Ordering::SeqCst);
            events.clear();
        }
        s.session.store(0, Ordering::SeqCst);
        s.paused.store(true, Ordering::SeqCst);
        s.queue.lock().clear();
        *s.seek.lock() = None;
        *s.duration.lock() = None;
        s.reset_clock(0.0);
    }
}

impl Default for NativeChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeChannel {
    fn drop(&mut self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.session.store(0, Ordering::SeqCst);
    }
}

impl AudioChannel for NativeChannel {
    fn set_source(&self, url: &str) {
        *self.shared.source.lock() = Some(url.to_string());
        self.restart();
    }

    fn source(&self) -> Option<String> {
        self.shared.source.lock().clone()
    }

    fn load(&self) {
        self.restart();
    }

    fn play(&self) -> Result<(), PlayError> {
        let s = &self.shared;
        let url = s
            .source
            .lock()
            .clone()
            .ok_or_else(|| PlayError::Failed("no source".into()))?;
        let generation = s.generation.load(Ordering::SeqCst);
        if s.session.load(Ordering::SeqCst) == generation {
            s.paused.store(false, Ordering::SeqCst);
            return Ok(());
        }

        let format = output_format().map_err(PlayError::Failed)?;
        s.out_rate.store(format.rate, Ordering::SeqCst);
        s.queue.lock().clear();
        let start_at = s.seek.lock().take().unwrap_or(0.0);
        s.reset_clock(start_at);
        s.session.store(generation, Ordering::SeqCst);
        s.paused.store(false, Ordering::SeqCst);

        let decoder_shared = Arc::clone(s);
        thread::spawn(move || run_decoder(decoder_shared, generation, url, format, start_at));

        let output_shared = Arc::clone(s);
        thread::spawn(move || {
            if let Err(e) = run_output(&output_shared, generation, format) {
                if output_shared.end_session(generation) {
                    log::error!("tilawa: audio output failed: {}", e);
                    output_shared.emit(
                        generation,
                        ChannelEvent::PlayFailed(PlayError::Failed(e.to_string())),
                    );
                }
            }
        });
        Ok(())
    }

    fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
    }

    fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    fn set_volume(&self, volume: f32) {
        let v = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.shared.volume.store(v.to_bits(), Ordering::SeqCst);
    }

    fn volume(&self) -> f32 {
        f32::from_bits(self.shared.volume.load(Ordering::SeqCst))
    }

    fn set_looping(&self, looping: bool) {
        self.shared.looping.store(looping, Ordering::SeqCst);
    }

    fn seek(&self, seconds: f64) {
        let target = seconds.max(0.0);
        *self.shared.seek.lock() = Some(target);
        self.shared.reset_clock(target);
    }

    fn current_time(&self) -> f64 {
        self.shared.position()
    }

    fn duration(&self) -> Option<f64> {
        *self.shared.duration.lock()
    }

    fn poll_events(&self) -> Vec<ChannelEvent> {
        let mut events: Vec<ChannelEvent> = self.shared.events.lock().drain(..).collect();
        let generation = self.shared.generation.load(Ordering::SeqCst);
        if !self.is_paused() && self.shared.session.load(Ordering::SeqCst) == generation {
            events.push(ChannelEvent::TimeUpdate(self.current_time()));
        }
        events
    }
}

// ---------------------------------------------------------------------------
// Session threads
// ---------------------------------------------------------------------------

fn run_decoder(shared: Arc<Shared>, generation: u64, url: String, out: OutputFormat, start_at: f64) {
    let mut offset = start_at;
    let outcome = loop {
        match stream_source(&shared, generation, &url, out, offset) {
            Ok(Finish::Ended)
                if shared.looping.load(Ordering::SeqCst) && shared.is_current(generation) =>
            {
                offset = 0.0;
                shared.reset_clock(0.0);
            }
            other => break other,
        }
    };

    match outcome {
        Ok(Finish::Ended) => {
            // Let the device drain before announcing the end.
            while shared.is_current(generation) && shared.queue.lock().len() > 0 {
                thread::sleep(Duration::from_millis(20));
            }
            if shared.end_session(generation) {
                shared.emit(generation, ChannelEvent::Ended);
            }
        }
        Ok(Finish::Interrupted) => {}
        Err(e) => {
            if shared.end_session(generation) {
                log::error!("tilawa: cannot play {}: {}", url, e);
                shared.emit(
                    generation,
                    ChannelEvent::PlayFailed(PlayError::Failed(e.to_string())),
                );
            } else {
                log::debug!("tilawa: {} superseded: {}", url, e);
            }
        }
    }
}

/// Open the source, returning its byte length when known.
fn open_media(url: &str) -> Result<(MediaSourceStream, Option<u64>), Box<dyn Error>> {
    let (source, length): (Box<dyn MediaSource>, Option<u64>) = if is_http_url(url) {
        let (reader, length) = open_url(url)?;
        (Box::new(ReadOnlySource::new(reader)), length)
    } else {
        let file = File::open(url.strip_prefix("file://").unwrap_or(url))?;
        let length = file.metadata().ok().map(|m| m.len());
        (Box::new(file), length)
    };
    Ok((MediaSourceStream::new(source, Default::default()), length))
}

fn publish_duration(shared: &Shared, generation: u64, seconds: f64) {
    if !seconds.is_finite() || seconds <= 0.0 {
        return;
    }
    *shared.duration.lock() = Some(seconds);
    shared.emit(generation, ChannelEvent::DurationKnown(seconds));
}

/// Duration guess for streams whose container carries no frame count
/// (e.g. MP3 without a Xing/Info header): total bytes over the average
/// bitrate of the packets decoded so far.
struct DurationEstimate {
    total_bytes: u64,
    rate: u32,
    bytes: u64,
    frames: u64,
}

impl DurationEstimate {
    fn new(total_bytes: u64, rate: u32) -> Self {
        Self {
            total_bytes,
            rate: rate.max(1),
            bytes: 0,
            frames: 0,
        }
    }

    /// Record one packet; yields the estimate once enough audio was seen.
    fn observe(&mut self, packet_bytes: usize, frames: usize) -> Option<f64> {
        self.bytes += packet_bytes as u64;
        self.frames += frames as u64;
        let seen = self.frames as f64 / self.rate as f64;
        if seen < ESTIMATE_AFTER_SECS || self.bytes == 0 {
            return None;
        }
        Some(self.total_bytes as f64 * seen / self.bytes as f64)
    }
}

/// Decode one pass over the source into the queue.
fn stream_source(
    shared: &Shared,
    generation: u64,
    url: &str,
    out: OutputFormat,
    start_at: f64,
) -> Result<Finish, Box<dyn Error>> {
    let (mss, byte_len) = open_media(url)?;
    let mut hint = Hint::new();
    if let Some(ext) = extension_from_url(url) {
        hint.with_extension(&ext);
    }
    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    if !shared.is_current(generation) {
        return Ok(Finish::Interrupted);
    }

    let mut format = probed.format;
    let track = format.default_track().ok_or("no default track")?;
    let track_id = track.id;
    let rate = track.codec_params.sample_rate.unwrap_or(44_100);
    let time_base = track.codec_params.time_base;
    let mut estimate = None;
    if let Some(frames) = track.codec_params.n_frames {
        publish_duration(shared, generation, frames as f64 / rate as f64);
    } else if shared.duration.lock().is_none() {
        estimate = byte_len.map(|len| DurationEstimate::new(len, rate));
    }
    let mut decoded_end = 0.0;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    let mut resampler = Resampler::new(rate, out.rate);

    let mut pending_seek = (start_at > 0.0).then_some(start_at);
    loop {
        if !shared.is_current(generation) {
            return Ok(Finish::Interrupted);
        }

        if let Some(target) = pending_seek.take().or_else(|| shared.seek.lock().take()) {
            let time = Time::new(target.trunc() as u64, target.fract());
            match format.seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(track_id),
                },
            ) {
                Ok(_) => {
                    decoder.reset();
                    resampler.reset();
                    shared.queue.lock().clear();
                    shared.reset_clock(target);
                }
                Err(e) => log::debug!("tilawa: seek to {:.1}s failed: {}", target, e),
            }
        }

        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(DecodeError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                if shared.duration.lock().is_none() {
                    publish_duration(shared, generation, decoded_end);
                }
                return Ok(Finish::Ended);
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        if let Some(tb) = time_base {
            let end = tb.calc_time(packet.ts() + packet.dur());
            decoded_end = end.seconds as f64 + end.frac;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(DecodeError::DecodeError(e)) => {
                log::debug!("tilawa: skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if let Some(est) = estimate.as_mut() {
            if let Some(seconds) = est.observe(packet.data.len(), decoded.frames()) {
                publish_duration(shared, generation, seconds);
                estimate = None;
            }
        }
        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        let remixed = remix(buf.samples(), spec.channels.count(), out.channels);
        let samples = resampler.process(&remixed, out.channels);
        if !shared.enqueue(generation, &samples) {
            return Ok(Finish::Interrupted);
        }
    }
}

/// Keep a cpal stream alive for as long as the session runs.
fn run_output(shared: &Arc<Shared>, generation: u64, out: OutputFormat) -> Result<(), Box<dyn Error>> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or("no output device")?;
    let config = cpal::StreamConfig {
        channels: out.channels as u16,
        sample_rate: cpal::SampleRate(out.rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let cb = Arc::clone(shared);
    let channels = out.channels.max(1);
    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if !cb.is_current(generation) || cb.paused.load(Ordering::SeqCst) {
                data.fill(0.0);
                return;
            }
            let pulled = cb.queue.lock().pull(data);
            let volume = f32::from_bits(cb.volume.load(Ordering::SeqCst));
            for s in data.iter_mut() {
                *s *= volume;
            }
            cb.played
                .fetch_add((pulled / channels) as u64, Ordering::SeqCst);
        },
        |err| log::error!("tilawa: cpal stream error: {}", err),
        None,
    )?;
    stream.play()?;

    while shared.session.load(Ordering::SeqCst) == generation {
        thread::sleep(Duration::from_millis(25));
    }
    Ok(())
}

fn output_format() -> Result<OutputFormat, String> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| "no output device".to_string())?;
    let config = device.default_output_config().map_err(|e| e.to_string())?;
    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(format!(
            "device does not support f32 output (got {:?})",
            config.sample_format()
        ));
    }
    Ok(OutputFormat {
        rate: config.sample_rate().0,
        channels: config.channels() as usize,
    })
}

// ---------------------------------------------------------------------------
// Sample plumbing
// ---------------------------------------------------------------------------

/// Bounded FIFO of interleaved samples.
struct SampleQueue {
    samples: VecDeque<f32>,
    capacity: usize,
}

impl SampleQueue {
    fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }

    fn space(&self) -> usize {
        self.capacity - self.samples.len()
    }

    /// Excess beyond capacity is dropped.
    fn push(&mut self, samples: &[f32]) {
        let n = samples.len().min(self.space());
        self.samples.extend(&samples[..n]);
    }

    /// Fill `out`, padding with silence. Returns samples actually taken.
    fn pull(&mut self, out: &mut [f32]) -> usize {
        let n = out.len().min(self.samples.len());
        for (slot, sample) in out.iter_mut().zip(self.samples.drain(..n)) {
            *slot = sample;
        }
        out[n..].fill(0.0);
        n
    }

    fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Streaming linear-interpolation resampler over interleaved frames.
struct Resampler {
    /// Input frames consumed per output frame.
    step: f64,
    /// Read position; 0 is the last frame of the previous chunk.
    pos: f64,
    last: Vec<f32>,
}

impl Resampler {
    fn new(from: u32, to: u32) -> Self {
        Self {
            step: from.max(1) as f64 / to.max(1) as f64,
            pos: 0.0,
            last: Vec::new(),
        }
    }

    fn is_identity(&self) -> bool {
        (self.step - 1.0).abs() < 1e-3
    }

    fn reset(&mut self) {
        self.pos = 0.0;
        self.last.clear();
    }

    fn process(&mut self, input: &[f32], channels: usize) -> Vec<f32> {
        if self.is_identity() || channels == 0 {
            return input.to_vec();
        }
        let frames = input.len() / channels;
        if frames == 0 {
            return Vec::new();
        }
        let last = if self.last.len() == channels {
            std::mem::take(&mut self.last)
        } else {
            input[..channels].to_vec()
        };
        // Virtual frame 0 is `last`, frame i + 1 is input frame i.
        let frame = |i: usize, c: usize| {
            if i == 0 {
                last[c]
            } else {
                input[(i - 1) * channels + c]
            }
        };

        let mut out = Vec::with_capacity(((frames as f64 / self.step) as usize + 1) * channels);
        let mut pos = self.pos;
        while pos < frames as f64 {
            let i = pos as usize;
            let frac = (pos - i as f64) as f32;
            for c in 0..channels {
                let a = frame(i, c);
                let b = frame(i + 1, c);
                out.push(a + (b - a) * frac);
            }
            pos += self.step;
        }
        self.pos = pos - frames as f64;
        self.last = input[(frames - 1) * channels..frames * channels].to_vec();
        out
    }
}

/// Convert interleaved samples between channel counts.
fn remix(src: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return src.to_vec();
    }
    let frames = src.len() / from;
    let mut out = Vec::with_capacity(frames * to);
    for frame in src.chunks_exact(from) {
        if from == 1 {
            out.extend(std::iter::repeat(frame[0]).take(to));
        } else if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            let shared = from.min(to);
            out.extend_from_slice(&frame[..shared]);
            out.extend(std::iter::repeat(0.0).take(to - shared));
        }
    }
    out
}
