use crate::audio::{AudioEvent, AudioResource, Subscription};
use crate::catalog::Catalog;
use crate::model::{PlayerState, Track};
use log::{debug, info, warn};
use std::rc::Rc;
use std::time::Duration;

/// Single source of truth for playback intent. Owns the audio resource and
/// keeps it in step with `PlayerState`.
pub struct PlayerController {
    catalog: Rc<Catalog>,
    audio: Box<dyn AudioResource>,
    binding: Option<Subscription>,
    state: PlayerState,
    pub dirty: bool,
    pub status: String,
}

impl PlayerController {
    pub fn new(catalog: Rc<Catalog>, audio: Box<dyn AudioResource>) -> Self {
        let mut controller = Self {
            catalog,
            audio,
            binding: None,
            state: PlayerState::default(),
            dirty: true,
            status: String::from("Ready"),
        };
        controller.audio.set_volume(controller.state.volume);
        controller.bind(0);
        controller
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn current_track(&self) -> &Track {
        &self.catalog[self.state.current_index]
    }

    pub fn output_name(&self) -> String {
        self.audio.output_name()
    }

    pub fn select_track(&mut self, index: usize) {
        let index = self.catalog.wrap(index);
        self.bind(index);
        let track = self.current_track();
        let message = format!("Selected {} by {}", track.name, track.artist);
        self.set_status(&message);
    }

    pub fn next_song(&mut self) {
        self.select_track(self.catalog.next_index(self.state.current_index));
    }

    pub fn prev_song(&mut self) {
        self.select_track(self.catalog.prev_index(self.state.current_index));
    }

    pub fn toggle_play_pause(&mut self) {
        self.state.is_playing = !self.state.is_playing;
        if self.state.is_playing {
            self.request_play();
            self.set_status("Playing");
        } else {
            self.audio.pause();
            self.set_status("Paused");
        }
    }

    pub fn toggle_loop(&mut self) {
        self.state.is_looping = !self.state.is_looping;
        self.audio.set_loop(self.state.is_looping);
        self.set_status(if self.state.is_looping {
            "Looping current track"
        } else {
            "Loop off"
        });
    }

    /// Seeks to `fraction` of the known duration. No-op while the duration is
    /// unknown.
    pub fn seek(&mut self, fraction: f64) {
        if !fraction.is_finite() {
            debug!("ignoring non-finite seek fraction");
            return;
        }
        let Some(duration) = self.state.duration else {
            debug!("ignoring seek before duration is known");
            return;
        };
        let target = duration.mul_f64(fraction.clamp(0.0, 1.0)).min(duration);
        self.move_to(target);
    }

    /// Relative seek by a signed number of seconds.
    pub fn scrub(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        let Some(duration) = self.state.duration else {
            return;
        };
        let current = self.state.position.as_secs_f64();
        let target = (current + seconds).clamp(0.0, duration.as_secs_f64());
        self.move_to(Duration::from_secs_f64(target).min(duration));
    }

    pub fn set_volume(&mut self, level: f32) {
        if !level.is_finite() {
            debug!("ignoring non-finite volume");
            return;
        }
        let level = level.clamp(0.0, 1.0);
        self.audio.set_volume(level);
        self.state.volume = level;
        let message = format!("Volume: {}%", (level * 100.0).round() as u16);
        self.set_status(&message);
    }

    pub fn nudge_volume(&mut self, delta: f32) {
        self.set_volume(self.state.volume + delta);
    }

    /// Drives the resource and applies whatever it reported for the current
    /// binding.
    pub fn tick(&mut self) {
        self.audio.tick();
        self.pump();
    }

    /// Applies pending notifications. Stops as soon as a notification rebinds
    /// the resource; anything queued on the old subscription is dropped with it.
    pub fn pump(&mut self) {
        while let Some(event) = self.binding.as_ref().and_then(Subscription::try_next) {
            let rebound = self.apply(event);
            if rebound {
                break;
            }
        }
    }

    /// Detaches from the resource, pauses it and hands it back. Dropping the
    /// controller instead drops the resource along with its subscription.
    pub fn into_resource(mut self) -> Box<dyn AudioResource> {
        self.detach();
        self.audio.pause();
        self.audio
    }

    fn apply(&mut self, event: AudioEvent) -> bool {
        match event {
            AudioEvent::DataLoaded { duration, position } => {
                self.state.duration = duration;
                self.state.position = self.state.clamp_to_duration(position);
                self.dirty = true;
                false
            }
            AudioEvent::PositionAdvanced(position) => {
                self.state.position = self.state.clamp_to_duration(position);
                self.dirty = true;
                false
            }
            AudioEvent::Ended => self.handle_track_end(),
        }
    }

    fn handle_track_end(&mut self) -> bool {
        if self.state.is_looping {
            self.move_to(Duration::ZERO);
            if self.state.is_playing {
                self.request_play();
            }
            return false;
        }

        debug!("track {} ended, advancing", self.state.current_index);
        self.next_song();
        true
    }

    fn bind(&mut self, index: usize) {
        self.detach();

        let url = self.catalog[index].audio_url.clone();
        self.audio.set_source(&url);
        self.audio.set_loop(self.state.is_looping);
        self.binding = Some(self.audio.subscribe());

        self.state.current_index = index;
        self.state.position = Duration::ZERO;
        self.state.duration = None;
        self.dirty = true;
        info!("bound track {index} ({url})");

        if self.state.is_playing {
            self.request_play();
        }
    }

    fn detach(&mut self) {
        if let Some(old) = self.binding.take() {
            self.audio.unsubscribe(old.id());
        }
    }

    fn move_to(&mut self, target: Duration) {
        match self.audio.set_position(target) {
            Ok(()) => {
                self.state.position = target;
                self.dirty = true;
            }
            Err(err) => warn!("Seek was refused: {err:#}"),
        }
    }

    fn request_play(&mut self) {
        if let Err(err) = self.audio.play() {
            warn!("Playback was prevented: {err:#}");
        }
    }

    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
        self.dirty = true;
    }
}
