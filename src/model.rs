use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    #[serde(alias = "song_name")]
    pub name: String,
    #[serde(alias = "artist_name")]
    pub artist: String,
    #[serde(alias = "song_url")]
    pub audio_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Landing,
    Player,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Player => "/track",
        }
    }
}

/// Transport state mirrored from the audio resource.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub current_index: usize,
    pub is_playing: bool,
    pub is_looping: bool,
    pub position: Duration,
    /// `None` until the resource reports loaded data.
    pub duration: Option<Duration>,
    pub volume: f32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            current_index: 0,
            is_playing: false,
            is_looping: false,
            position: Duration::ZERO,
            duration: None,
            volume: 1.0,
        }
    }
}

impl PlayerState {
    pub fn progress_ratio(&self) -> Option<f64> {
        let total = self.duration?.as_secs_f64();
        (total > 0.0).then_some((self.position.as_secs_f64() / total).clamp(0.0, 1.0))
    }

    pub(crate) fn clamp_to_duration(&self, position: Duration) -> Duration {
        self.duration.map_or(position, |duration| position.min(duration))
    }
}
