//! Configuration file handling.
//!
//! Values come from, in increasing priority: built-in defaults, the TOML file in the
//! user's config directory, and command line flags.

use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use streamkit::utils::find_executable;

/// Default destination folder.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";
/// Default deadline for one external tool invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// The optional settings read from `config.toml`.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub output_dir: Option<PathBuf>,
    pub resolution: Option<String>,
    pub yt_dlp: Option<PathBuf>,
    pub ffmpeg: Option<PathBuf>,
    pub parallel_streams: Option<bool>,
    pub command_timeout_secs: Option<u64>,
}

impl Config {
    /// Where the config file lives, `None` when the platform has no config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tubemux").join("config.toml"))
    }

    /// Loads the config at the default path.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this platform, using defaults.");
                Self::default()
            }
        }
    }

    /// Loads a config file. Missing, unreadable or malformed files yield the defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.is_file() {
            debug!("No config file at {}", path.display());
            return Self::default();
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                error!("Could not read config file {}: {}", path.display(), e);
                return Self::default();
            }
        };

        match toml::from_str::<Config>(&content) {
            Ok(config) => {
                debug!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                error!("Malformed config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

/// Fully resolved options handed to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// The destination folder, created if absent.
    pub output_dir: PathBuf,
    /// The path to the 'yt-dlp' executable.
    pub yt_dlp: PathBuf,
    /// The path to the 'ffmpeg' executable.
    pub ffmpeg: PathBuf,
    /// Fetch the video and audio of an adaptive pair concurrently.
    pub parallel_streams: bool,
    /// Deadline for one external tool invocation.
    pub command_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            yt_dlp: PathBuf::from(find_executable("yt-dlp")),
            ffmpeg: PathBuf::from(find_executable("ffmpeg")),
            parallel_streams: false,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl PipelineOptions {
    /// Applies the config file on top of the defaults.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();

        Self {
            output_dir: config.output_dir.clone().unwrap_or(defaults.output_dir),
            yt_dlp: config.yt_dlp.clone().unwrap_or(defaults.yt_dlp),
            ffmpeg: config.ffmpeg.clone().unwrap_or(defaults.ffmpeg),
            parallel_streams: config.parallel_streams.unwrap_or(defaults.parallel_streams),
            command_timeout: config
                .command_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.command_timeout),
        }
    }
}
