//! The models used to represent what a catalog provider reports.
//!
//! The represented data is the video information, its stream descriptors, and playlist entries.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// The container every selection step filters on.
pub const CANONICAL_CONTAINER: &str = "mp4";

static RESOLUTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2,5})p$").expect("valid resolution pattern"));

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)").expect("valid number pattern"));

/// Describes one remote stream of a video, as reported by the catalog.
///
/// Descriptors are immutable and owned by the catalog; selection only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// The catalog's identifier for this stream (itag, format id, ...).
    pub id: String,
    /// Whether the stream carries both audio and video.
    pub is_progressive: bool,
    /// Whether the stream carries a video track.
    pub has_video: bool,
    /// Whether the stream carries an audio track.
    pub has_audio: bool,
    /// The container/extension, e.g. `mp4`.
    pub extension: String,
    /// The resolution of the video track, e.g. `1080p`.
    pub resolution: Option<String>,
    /// The bitrate of the audio track, e.g. `128kbps`.
    pub bitrate: Option<String>,
    /// The advertised size in bytes, zero when unknown.
    pub size_bytes: u64,
    /// Where the bytes can be fetched from.
    pub url: String,
}

impl StreamDescriptor {
    /// Whether the stream only carries a video track.
    pub fn is_video_only(&self) -> bool {
        self.has_video && !self.has_audio
    }

    /// Whether the stream only carries an audio track.
    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }

    /// Whether the stream is in the given container.
    pub fn is_container(&self, container: &str) -> bool {
        self.extension.eq_ignore_ascii_case(container)
    }

    /// The numeric height declared by `resolution`, zero when absent or unparseable.
    pub fn height(&self) -> u32 {
        self.resolution
            .as_deref()
            .and_then(leading_number)
            .map(|h| h as u32)
            .unwrap_or(0)
    }

    /// The numeric bitrate declared by `bitrate`, zero when absent or unparseable.
    pub fn bitrate_kbps(&self) -> f64 {
        self.bitrate.as_deref().and_then(leading_number).unwrap_or(0.0)
    }

    /// Whether the declared resolution is exactly the requested one.
    pub fn has_resolution(&self, resolution: &Resolution) -> bool {
        self.resolution
            .as_deref()
            .is_some_and(|r| r.trim().eq_ignore_ascii_case(&resolution.to_string()))
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match (self.is_progressive, self.has_video) {
            (true, _) => "progressive",
            (false, true) => "video-only",
            (false, false) => "audio-only",
        };

        write!(f, "{} [{} {}", self.id, kind, self.extension)?;
        if let Some(resolution) = &self.resolution {
            write!(f, " {}", resolution)?;
        }
        if let Some(bitrate) = &self.bitrate {
            write!(f, " {}", bitrate)?;
        }
        write!(f, "]")
    }
}

fn leading_number(value: &str) -> Option<f64> {
    LEADING_NUMBER
        .captures(value)
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse().ok())
}

/// A video as reported by the catalog: its title and its streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// The ID of the video.
    pub id: String,
    /// The title of the video, used to derive filenames.
    pub title: String,
    /// The available streams, in catalog enumeration order.
    pub streams: Vec<StreamDescriptor>,
}

/// The video identifiers of a playlist, materialized once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntries {
    /// The title of the playlist, if the catalog reports one.
    pub title: Option<String>,
    /// The video identifiers, in playlist order.
    pub video_ids: Vec<String>,
}

/// A requested vertical resolution such as `1080p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Resolution(pub u32);

impl Resolution {
    /// Parses a resolution string strictly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the value is not `<digits>p`.
    pub fn parse(value: &str) -> Result<Self> {
        let normalized = value.trim().to_lowercase();
        let height = RESOLUTION_PATTERN
            .captures(&normalized)
            .and_then(|captures| captures.get(1))
            .and_then(|height| height.as_str().parse().ok())
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "invalid resolution {:?}, expected something like 1080p",
                    value
                ))
            })?;

        Ok(Self(height))
    }

    /// Parses an optional resolution, degrading malformed input to "best available".
    pub fn lenient(value: Option<&str>) -> Option<Self> {
        let value = value.map(str::trim).filter(|v| !v.is_empty())?;

        match Self::parse(value) {
            Ok(resolution) => Some(resolution),
            Err(e) => {
                log::warn!("{}. Using the best available resolution.", e);
                None
            }
        }
    }

    /// The height in pixels.
    pub fn height(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.0)
    }
}
