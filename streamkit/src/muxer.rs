//! Lossless muxing of a video-only and an audio-only file with 'ffmpeg'.
//!
//! Both tracks are stream-copied, nothing is re-encoded. The transcoder writes to a
//! staging file next to the output which replaces the output only once the tool
//! succeeded. Inputs are deleted on success and left untouched on failure.

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::utils::{self, file_system};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runs the external transcoder.
///
/// # Example
///
/// ```rust,no_run
/// # use streamkit::muxer::Muxer;
/// # use std::time::Duration;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let muxer = Muxer::new("ffmpeg", Duration::from_secs(300));
/// muxer
///     .mux("temp_video_clip.mp4", "temp_audio_clip.mp4", "clip.mp4")
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Muxer {
    /// The path to the 'ffmpeg' executable.
    pub executable: PathBuf,
    /// The timeout for one invocation.
    pub timeout: Duration,
}

impl fmt::Display for Muxer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Muxer(executable={})", self.executable.display())
    }
}

impl Muxer {
    /// Creates a muxer using the given 'ffmpeg' executable.
    pub fn new(executable: impl AsRef<Path>, timeout: Duration) -> Self {
        Self {
            executable: executable.as_ref().to_path_buf(),
            timeout,
        }
    }

    /// Checks the transcoder can be run and returns its version line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] if the executable is missing.
    pub async fn check(&self) -> Result<String> {
        let executor = Executor {
            executable_path: self.executable.clone(),
            timeout: self.timeout,
            args: utils::to_owned(vec!["-version"]),
        };

        let output = executor.execute().await?;
        Ok(output.stdout.lines().next().unwrap_or_default().to_string())
    }

    /// Combines the video track of `video` and the audio track of `audio` into `output`.
    ///
    /// An existing `output` is replaced. On success both inputs are deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolNotFound`] or [`Error::ExternalTool`] (with the tool's
    /// diagnostics) if the transcoder fails. Inputs are then kept and `output` is
    /// neither created nor modified.
    pub async fn mux(
        &self,
        video: impl AsRef<Path>,
        audio: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<()> {
        let (video, audio, output) = (video.as_ref(), audio.as_ref(), output.as_ref());
        log::debug!(
            "Combining video {} and audio {} into {}",
            video.display(),
            audio.display(),
            output.display()
        );

        let staging = staging_path(output)?;
        file_system::create_parent_dir(output).await?;

        if let Err(e) = self.execute_copy(video, audio, &staging).await {
            if staging.exists() {
                file_system::remove_temp_file(&staging).await;
            }
            log::error!(
                "Muxing failed, keeping {} and {}",
                video.display(),
                audio.display()
            );
            return Err(e);
        }

        tokio::fs::rename(&staging, output).await?;

        file_system::remove_temp_file(video).await;
        file_system::remove_temp_file(audio).await;

        log::debug!("Muxed {}", output.display());
        Ok(())
    }

    async fn execute_copy(&self, video: &Path, audio: &Path, staging: &Path) -> Result<()> {
        let video = path_str(video, "video")?;
        let audio = path_str(audio, "audio")?;
        let staging = path_str(staging, "output")?;

        let args = vec![
            "-hide_banner",
            "-y",
            "-i",
            video,
            "-i",
            audio,
            "-c:v",
            "copy",
            "-c:a",
            "copy",
            staging,
        ];

        let executor = Executor {
            executable_path: self.executable.clone(),
            timeout: self.timeout,
            args: utils::to_owned(args),
        };

        executor.execute().await?;
        Ok(())
    }
}

/// `dir/name.ext` stages as `dir/.name.muxing.ext`, the extension is kept so the
/// transcoder picks the same container. The extension is whatever follows the last dot,
/// so `dir/.ext` stages as `dir/.muxing.ext`.
fn staging_path(output: &Path) -> Result<PathBuf> {
    let name = output
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::Path(format!("Invalid output path {}", output.display())))?;

    let staged = match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => format!(".{}.muxing.{}", stem, ext),
        _ => format!(".{}.muxing", name),
    };

    Ok(output.with_file_name(staged))
}

fn path_str<'a>(path: &'a Path, what: &str) -> Result<&'a str> {
    path.to_str()
        .ok_or_else(|| Error::Path(format!("Invalid {} path {}", what, path.display())))
}
