use crate::catalog::{SourceLocation, resolve_source};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use rodio::Source;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink};
use std::collections::HashMap;
#[cfg(unix)]
use std::ffi::CString;
use std::fs::{self, File};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

const MAX_VOLUME: f32 = 1.0;
const TIMEUPDATE_INTERVAL: Duration = Duration::from_millis(250);

/// Notifications emitted by an audio resource for its current source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioEvent {
    DataLoaded {
        duration: Option<Duration>,
        position: Duration,
    },
    PositionAdvanced(Duration),
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of one subscription. Dropping it discards anything still
/// buffered.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    events: Receiver<AudioEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn try_next(&self) -> Option<AudioEvent> {
        self.events.try_recv().ok()
    }
}

/// Registry of live subscriptions, shared by the resource implementations.
#[derive(Debug, Default)]
pub struct Subscribers {
    next_id: u64,
    senders: HashMap<SubscriptionId, Sender<AudioEvent>>,
}

impl Subscribers {
    pub fn subscribe(&mut self) -> Subscription {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let (tx, rx) = mpsc::channel();
        self.senders.insert(id, tx);
        debug!("attached audio subscription {id:?}");
        Subscription { id, events: rx }
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        if self.senders.remove(&id).is_some() {
            debug!("detached audio subscription {id:?}");
        }
    }

    pub fn emit(&mut self, event: AudioEvent) {
        self.senders.retain(|id, sender| {
            let alive = sender.send(event).is_ok();
            if !alive {
                debug!("pruned dropped audio subscription {id:?}");
            }
            alive
        });
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// A single playback object, bound to one source at a time.
///
/// Loading, progress and end of playback are reported asynchronously through
/// subscriptions; `tick` must be called regularly to pump them.
pub trait AudioResource {
    fn set_source(&mut self, url: &str);
    /// Starts playback. May reject, e.g. when the source cannot be played.
    fn play(&mut self) -> Result<()>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn position(&self) -> Duration;
    /// Moves the playhead. Fails when the source cannot seek there yet.
    fn set_position(&mut self, position: Duration) -> Result<()>;
    fn duration(&self) -> Option<Duration>;
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn is_looping(&self) -> bool;
    fn set_loop(&mut self, looping: bool);
    fn subscribe(&mut self) -> Subscription;
    fn unsubscribe(&mut self, id: SubscriptionId);
    fn tick(&mut self);
    fn output_name(&self) -> String;
}

type EncodedAudio = Arc<[u8]>;
type AudioDecoder = Decoder<Cursor<EncodedAudio>>;

enum LoadStatus {
    Pending(Receiver<Result<EncodedAudio>>),
    Ready {
        bytes: EncodedAudio,
        duration: Option<Duration>,
        ended: bool,
    },
    Failed,
}

struct BoundSource {
    url: String,
    status: LoadStatus,
}

pub struct RodioAudioResource {
    stream: OutputStream,
    sink: Sink,
    subscribers: Subscribers,
    source: Option<BoundSource>,
    volume: f32,
    looping: bool,
    play_requested: bool,
    last_report: Instant,
}

impl RodioAudioResource {
    pub fn new() -> Result<Self> {
        let stream = open_output_stream()?;
        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        info!("opened audio output stream");

        Ok(Self {
            stream,
            sink,
            subscribers: Subscribers::default(),
            source: None,
            volume: 1.0,
            looping: false,
            play_requested: false,
            last_report: Instant::now(),
        })
    }

    fn append_from_start(&mut self, bytes: &EncodedAudio) -> Result<()> {
        let decoded = decode(bytes)?;
        self.sink.append(decoded);
        Ok(())
    }

    fn poll_loader(&mut self) {
        let Some(bound) = self.source.as_mut() else {
            return;
        };
        let LoadStatus::Pending(rx) = &bound.status else {
            return;
        };

        let loaded = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err(anyhow::anyhow!("loader exited early")),
        };

        let decoded = loaded.and_then(|bytes| decode(&bytes).map(|source| (bytes, source)));
        match decoded {
            Ok((bytes, decoded)) => {
                let duration = decoded
                    .total_duration()
                    .filter(|duration| !duration.is_zero());
                self.sink.append(decoded);
                if self.play_requested {
                    self.sink.play();
                }
                debug!("loaded {} ({duration:?})", bound.url);
                bound.status = LoadStatus::Ready {
                    bytes,
                    duration,
                    ended: false,
                };
                self.last_report = Instant::now();
                self.subscribers.emit(AudioEvent::DataLoaded {
                    duration,
                    position: Duration::ZERO,
                });
            }
            Err(err) => {
                warn!("failed to load {}: {err:#}", bound.url);
                if self.play_requested {
                    warn!("pending playback of {} was dropped", bound.url);
                }
                self.play_requested = false;
                bound.status = LoadStatus::Failed;
            }
        }
    }

    fn check_finished(&mut self) {
        let Some(BoundSource {
            status: LoadStatus::Ready { bytes, ended, .. },
            url,
        }) = self.source.as_mut()
        else {
            return;
        };
        if *ended || !self.sink.empty() {
            return;
        }

        if self.looping {
            match decode(bytes) {
                Ok(decoded) => {
                    self.sink.append(decoded);
                    self.sink.play();
                    self.subscribers
                        .emit(AudioEvent::PositionAdvanced(Duration::ZERO));
                    return;
                }
                Err(err) => warn!("failed to restart {url} for looping: {err:#}"),
            }
        }

        *ended = true;
        self.play_requested = false;
        self.sink.pause();
        self.subscribers.emit(AudioEvent::Ended);
    }

    fn report_position(&mut self) {
        if !self.play_requested || self.last_report.elapsed() < TIMEUPDATE_INTERVAL {
            return;
        }
        if !matches!(
            self.source,
            Some(BoundSource {
                status: LoadStatus::Ready { ended: false, .. },
                ..
            })
        ) {
            return;
        }
        self.last_report = Instant::now();
        self.subscribers
            .emit(AudioEvent::PositionAdvanced(self.sink.get_pos()));
    }

    /// Re-appends the source if it already ran out, so it can be played or
    /// seeked again.
    fn rewind_if_ended(&mut self) -> Result<()> {
        let bytes = match self.source.as_mut() {
            Some(BoundSource {
                status: LoadStatus::Ready { bytes, ended, .. },
                ..
            }) if *ended => {
                *ended = false;
                bytes.clone()
            }
            _ => return Ok(()),
        };
        self.append_from_start(&bytes)
    }
}

impl AudioResource for RodioAudioResource {
    fn set_source(&mut self, url: &str) {
        self.sink.stop();
        self.sink = Sink::connect_new(self.stream.mixer());
        self.sink.pause();
        self.sink.set_volume(self.volume);
        self.play_requested = false;
        self.last_report = Instant::now();
        self.source = Some(BoundSource {
            url: url.to_string(),
            status: LoadStatus::Pending(spawn_loader(url)),
        });
        debug!("source set to {url}");
    }

    fn play(&mut self) -> Result<()> {
        let Some(bound) = &self.source else {
            anyhow::bail!("no source set");
        };
        match &bound.status {
            LoadStatus::Failed => anyhow::bail!("no supported source for {}", bound.url),
            LoadStatus::Pending(_) => {
                self.play_requested = true;
                Ok(())
            }
            LoadStatus::Ready { .. } => {
                self.rewind_if_ended()?;
                self.play_requested = true;
                self.sink.play();
                Ok(())
            }
        }
    }

    fn pause(&mut self) {
        self.play_requested = false;
        self.sink.pause();
    }

    fn is_paused(&self) -> bool {
        !self.play_requested
    }

    fn position(&self) -> Duration {
        match &self.source {
            Some(BoundSource {
                status: LoadStatus::Ready { .. },
                ..
            }) => self.sink.get_pos(),
            _ => Duration::ZERO,
        }
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if !matches!(
            self.source,
            Some(BoundSource {
                status: LoadStatus::Ready { .. },
                ..
            })
        ) {
            anyhow::bail!("source is not loaded yet");
        }
        self.rewind_if_ended()
            .context("failed to reload source for seek")?;
        let seeked = self
            .sink
            .try_seek(position)
            .map_err(|err| anyhow::anyhow!("failed to seek to {position:?}: {err:?}"));
        if !self.play_requested {
            self.sink.pause();
        }
        seeked
    }

    fn duration(&self) -> Option<Duration> {
        match &self.source {
            Some(BoundSource {
                status: LoadStatus::Ready { duration, .. },
                ..
            }) => *duration,
            _ => None,
        }
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
        self.sink.set_volume(self.volume);
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn subscribe(&mut self) -> Subscription {
        self.subscribers.subscribe()
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.unsubscribe(id);
    }

    fn tick(&mut self) {
        self.poll_loader();
        self.check_finished();
        self.report_position();
    }

    fn output_name(&self) -> String {
        String::from("System default output (CPAL)")
    }
}

/// Length and seekability must be declared for in-memory data, otherwise
/// backward seeks and bitrate-based durations are unavailable.
fn decode(bytes: &EncodedAudio) -> Result<AudioDecoder> {
    Decoder::builder()
        .with_data(Cursor::new(bytes.clone()))
        .with_byte_len(bytes.len() as u64)
        .with_seekable(true)
        .build()
        .context("failed to decode audio")
}

fn spawn_loader(url: &str) -> Receiver<Result<EncodedAudio>> {
    let (tx, rx) = mpsc::channel();
    let url = url.to_string();
    thread::spawn(move || {
        // The receiver is gone once another source was set; nothing to do then.
        let _ = tx.send(fetch_source(&url));
    });
    rx
}

fn fetch_source(url: &str) -> Result<EncodedAudio> {
    match resolve_source(url)? {
        SourceLocation::File(path) => {
            let bytes =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            Ok(EncodedAudio::from(bytes))
        }
        SourceLocation::Remote(remote) => {
            let response = reqwest::blocking::get(remote.clone())
                .with_context(|| format!("failed to request {remote}"))?
                .error_for_status()
                .with_context(|| format!("bad response for {remote}"))?;
            let bytes = response
                .bytes()
                .with_context(|| format!("failed to download {remote}"))?;
            Ok(EncodedAudio::from(&bytes[..]))
        }
    }
}

fn open_output_stream() -> Result<OutputStream> {
    let mut stream = with_silenced_stderr(|| {
        let default_err = match OutputStreamBuilder::from_default_device()
            .context("failed to open default system output stream")
            .and_then(|builder| {
                builder
                    .with_error_callback(|_| {})
                    .open_stream_or_fallback()
                    .context("failed to start default output stream")
            }) {
            Ok(stream) => return Ok(stream),
            Err(err) => err,
        };

        let host = rodio::cpal::default_host();
        let mut candidates: Vec<_> = host
            .output_devices()
            .ok()
            .into_iter()
            .flatten()
            .filter_map(|device| device.name().ok().map(|name| (name, device)))
            .collect();
        candidates.sort_by_cached_key(|(name, _)| {
            let lower = name.to_ascii_lowercase();
            let rank = if lower.contains("pulse") {
                0_u8
            } else if lower.contains("pipewire") {
                1_u8
            } else if lower.contains("default") {
                2_u8
            } else {
                3_u8
            };
            (rank, lower)
        });

        for (name, device) in candidates {
            let opened = OutputStreamBuilder::from_device(device)
                .context("failed to open fallback output device")
                .and_then(|builder| {
                    builder
                        .with_error_callback(|_| {})
                        .open_stream_or_fallback()
                        .context("failed to start fallback output stream")
                });
            match opened {
                Ok(stream) => {
                    info!("using fallback output device {name}");
                    return Ok(stream);
                }
                Err(err) => debug!("output device {name} unavailable: {err:#}"),
            }
        }

        Err(default_err).context("unable to start any audio output stream")
    })?;
    stream.log_on_drop(false);
    Ok(stream)
}

#[cfg(unix)]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    let saved = unsafe { libc::dup(libc::STDERR_FILENO) };
    if saved < 0 {
        return operation();
    }

    let devnull = CString::new("/dev/null")
        .ok()
        .map(|path| unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) })
        .unwrap_or(-1);

    if devnull >= 0 {
        unsafe {
            libc::dup2(devnull, libc::STDERR_FILENO);
            libc::close(devnull);
        }
    }

    let result = operation();

    unsafe {
        libc::dup2(saved, libc::STDERR_FILENO);
        libc::close(saved);
    }

    result
}

#[cfg(not(unix))]
fn with_silenced_stderr<T>(operation: impl FnOnce() -> T) -> T {
    operation()
}

/// Silent resource driven by the wall clock. Used when no output device can
/// be opened, with `--null-audio`, and in tests.
pub struct NullAudioResource {
    subscribers: Subscribers,
    source: Option<String>,
    loaded: bool,
    paused: bool,
    ended: bool,
    looping: bool,
    volume: f32,
    started_at: Option<Instant>,
    position_offset: Duration,
    track_duration: Option<Duration>,
    fixed_duration: Option<Duration>,
}

impl NullAudioResource {
    pub fn new() -> Self {
        Self {
            subscribers: Subscribers::default(),
            source: None,
            loaded: false,
            paused: true,
            ended: false,
            looping: false,
            volume: 1.0,
            started_at: None,
            position_offset: Duration::ZERO,
            track_duration: None,
            fixed_duration: None,
        }
    }

    /// Reports `duration` for every source instead of probing files.
    pub fn with_fixed_duration(duration: Duration) -> Self {
        Self {
            fixed_duration: Some(duration),
            ..Self::new()
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn detect_duration(url: &str) -> Option<Duration> {
        let SourceLocation::File(path) = resolve_source(url).ok()? else {
            return None;
        };
        Self::estimate_duration(&path)
    }

    fn estimate_duration(path: &Path) -> Option<Duration> {
        let file = File::open(path).ok()?;
        let source = Decoder::try_from(file).ok()?;
        source
            .total_duration()
            .filter(|duration| !duration.is_zero())
    }

    fn current_position(&self) -> Duration {
        let mut position = self.position_offset;
        if !self.paused
            && let Some(started_at) = self.started_at
        {
            position = position.saturating_add(started_at.elapsed());
        }
        if let Some(duration) = self.track_duration {
            return position.min(duration);
        }
        position
    }

    fn restart_clock(&mut self, offset: Duration) {
        self.position_offset = offset;
        self.started_at = (!self.paused).then(Instant::now);
    }
}

impl Default for NullAudioResource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioResource for NullAudioResource {
    fn set_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
        self.loaded = false;
        self.paused = true;
        self.ended = false;
        self.started_at = None;
        self.position_offset = Duration::ZERO;
        self.track_duration = None;
    }

    fn play(&mut self) -> Result<()> {
        if self.source.is_none() {
            anyhow::bail!("no source set");
        }
        if self.ended {
            self.ended = false;
            self.position_offset = Duration::ZERO;
        }
        self.paused = false;
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) {
        self.position_offset = self.current_position();
        self.started_at = None;
        self.paused = true;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn position(&self) -> Duration {
        if self.loaded {
            self.current_position()
        } else {
            Duration::ZERO
        }
    }

    fn set_position(&mut self, position: Duration) -> Result<()> {
        if !self.loaded {
            anyhow::bail!("source is not loaded yet");
        }
        self.ended = false;
        let target = self
            .track_duration
            .map_or(position, |duration| position.min(duration));
        self.restart_clock(target);
        Ok(())
    }

    fn duration(&self) -> Option<Duration> {
        self.track_duration
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    fn is_looping(&self) -> bool {
        self.looping
    }

    fn set_loop(&mut self, looping: bool) {
        self.looping = looping;
    }

    fn subscribe(&mut self) -> Subscription {
        self.subscribers.subscribe()
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.unsubscribe(id);
    }

    fn tick(&mut self) {
        let Some(url) = self.source.as_deref() else {
            return;
        };

        if !self.loaded {
            self.track_duration = self.fixed_duration.or_else(|| Self::detect_duration(url));
            self.loaded = true;
            self.restart_clock(Duration::ZERO);
            self.subscribers.emit(AudioEvent::DataLoaded {
                duration: self.track_duration,
                position: Duration::ZERO,
            });
        }

        if self.paused || self.ended {
            return;
        }

        let position = self.current_position();
        if let Some(duration) = self.track_duration
            && position >= duration
        {
            if self.looping {
                self.restart_clock(Duration::ZERO);
                self.subscribers
                    .emit(AudioEvent::PositionAdvanced(Duration::ZERO));
            } else {
                self.pause();
                self.ended = true;
                self.subscribers.emit(AudioEvent::Ended);
            }
            return;
        }

        self.subscribers.emit(AudioEvent::PositionAdvanced(position));
    }

    fn output_name(&self) -> String {
        String::from("Null audio output")
    }
}
