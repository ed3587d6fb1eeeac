use crate::model::Track;
use anyhow::{Context, Result, bail};
use std::ops::Index;
use std::path::PathBuf;
use url::Url;

const BUILTIN_CATALOG: &str = include_str!("../catalog.json");

/// Where an audio URL points once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    File(PathBuf),
    Remote(Url),
}

pub fn resolve_source(raw: &str) -> Result<SourceLocation> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("audio url is empty");
    }

    match Url::parse(trimmed) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(SourceLocation::Remote(url)),
            "file" => url
                .to_file_path()
                .map(SourceLocation::File)
                .map_err(|_| anyhow::anyhow!("file url has no local path: {trimmed}")),
            // Windows drive letters parse as one-letter schemes.
            scheme if scheme.len() == 1 => Ok(SourceLocation::File(PathBuf::from(trimmed))),
            other => bail!("unsupported audio url scheme {other}: {trimmed}"),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Ok(SourceLocation::File(PathBuf::from(trimmed)))
        }
        Err(err) => Err(err).with_context(|| format!("malformed audio url {trimmed}")),
    }
}

/// Ordered, non-empty list of tracks. Tracks are identified by position.
#[derive(Debug, Clone)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    pub fn new(tracks: Vec<Track>) -> Result<Self> {
        if tracks.is_empty() {
            bail!("catalog has no tracks");
        }
        for (index, track) in tracks.iter().enumerate() {
            resolve_source(&track.audio_url)
                .with_context(|| format!("track {index} ({}) has a bad url", track.name))?;
        }
        Ok(Self { tracks })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("built-in catalog is invalid")
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let tracks: Vec<Track> = serde_json::from_str(raw).context("failed to parse catalog")?;
        Self::new(tracks)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Never true: construction rejects empty track lists.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn wrap(&self, index: usize) -> usize {
        index % self.tracks.len()
    }

    pub fn next_index(&self, current: usize) -> usize {
        self.wrap(current.saturating_add(1))
    }

    pub fn prev_index(&self, current: usize) -> usize {
        let current = self.wrap(current);
        if current == 0 {
            self.tracks.len() - 1
        } else {
            current - 1
        }
    }
}

impl Index<usize> for Catalog {
    type Output = Track;

    fn index(&self, index: usize) -> &Self::Output {
        &self.tracks[self.wrap(index)]
    }
}
