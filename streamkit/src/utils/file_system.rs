//! Tools for working with the file system.

use crate::error::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Characters that are replaced by `_` in titles used as filenames.
static RESERVED_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\[\]()]"#).expect("valid reserved characters pattern"));

/// Prefix of the provisional video-only file.
pub const TEMP_VIDEO_PREFIX: &str = "temp_video_";
/// Prefix of the provisional audio-only file.
pub const TEMP_AUDIO_PREFIX: &str = "temp_audio_";

/// Stands in for a title with nothing usable as a filename.
pub const UNTITLED: &str = "untitled";

/// Replaces every reserved character of the given title by `_`.
/// A blank title becomes [`UNTITLED`] so the file never ends up as a bare extension.
///
/// The function is idempotent: sanitizing an already sanitized title returns it unchanged.
pub fn sanitize_filename(title: &str) -> String {
    if title.trim().is_empty() {
        return UNTITLED.to_string();
    }

    RESERVED_CHARACTERS.replace_all(title, "_").into_owned()
}

/// The provisional and final paths of one pipeline run, derived from the video title.
///
/// Two runs on the same sanitized title in the same folder would share these paths,
/// callers must not run them concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFileSet {
    /// Where the video-only stream is downloaded.
    pub video: PathBuf,
    /// Where the audio-only stream is downloaded.
    pub audio: PathBuf,
    /// The final, playable file.
    pub output: PathBuf,
}

impl TempFileSet {
    /// Derives the file set of a title inside a destination folder.
    ///
    /// # Arguments
    ///
    /// * `folder` - The destination folder.
    /// * `title` - The raw video title, sanitized here.
    /// * `extension` - The container extension, without the dot.
    pub fn new(folder: impl AsRef<Path>, title: &str, extension: &str) -> Self {
        let folder = folder.as_ref();
        let safe_title = sanitize_filename(title);

        Self {
            video: folder.join(format!("{TEMP_VIDEO_PREFIX}{safe_title}.{extension}")),
            audio: folder.join(format!("{TEMP_AUDIO_PREFIX}{safe_title}.{extension}")),
            output: folder.join(format!("{safe_title}.{extension}")),
        }
    }

    /// The provisional members that currently exist on disk.
    pub fn leftovers(&self) -> Vec<PathBuf> {
        [&self.video, &self.audio]
            .into_iter()
            .filter(|path| path.exists())
            .cloned()
            .collect()
    }
}

/// Creates a new directory at the given destination.
/// If the directory already exists, nothing is done.
///
/// # Arguments
///
/// * `destination` - The path to create the directory at.
pub async fn create_dir(destination: impl AsRef<Path>) -> Result<()> {
    tokio::fs::create_dir_all(destination).await?;
    Ok(())
}

/// Creates the parent directory of the given destination.
/// If the parent directory already exists, nothing is done.
///
/// # Arguments
///
/// * `destination` - The path to create the parent directory for.
pub async fn create_parent_dir(destination: impl AsRef<Path>) -> Result<()> {
    if let Some(parent) = destination.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    Ok(())
}

/// Removes a temporary file and logs any errors.
/// Does not propagate errors to avoid interrupting the execution flow.
///
/// # Returns
///
/// `true` if the file was successfully deleted, `false` otherwise
pub async fn remove_temp_file(file_path: impl AsRef<Path> + std::fmt::Debug) -> bool {
    let result = tokio::fs::remove_file(&file_path).await;

    if let Err(ref e) = result {
        log::warn!("Failed to remove temporary file {:?}: {}", file_path, e);
    }

    result.is_ok()
}
