use {
    crate::config::PipelineOptions,
    crate::progress::Progress,
    log::{error, info, warn},
    std::fmt,
    std::path::{Path, PathBuf},
    std::sync::Arc,
    streamkit::catalog::{CatalogProvider, YtDlpCatalog},
    streamkit::fetcher::Fetcher,
    streamkit::model::{Resolution, StreamDescriptor},
    streamkit::muxer::Muxer,
    streamkit::selector::{self, Degradation, SelectionResult},
    streamkit::utils::file_system::{self, TempFileSet, sanitize_filename},
    streamkit::Error,
};

pub mod config;
pub mod progress;

/// The stage of the single-video pipeline where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Catalog,
    Selection,
    Download,
    Mux,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Catalog => "catalog lookup",
            Stage::Selection => "stream selection",
            Stage::Download => "download",
            Stage::Mux => "mux",
        };
        write!(f, "{}", name)
    }
}

/// A failure of one video, tagged with the stage it happened in.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub source: Error,
}

impl PipelineError {
    fn at(stage: Stage) -> impl FnOnce(Error) -> Self {
        move |source| Self { stage, source }
    }
}

/// How the final file was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// One progressive stream, downloaded straight to its final name.
    Progressive,
    /// A video-only and an audio-only stream, muxed together.
    Muxed,
}

/// A successfully acquired video.
#[derive(Debug, Clone, PartialEq)]
pub struct Downloaded {
    pub path: PathBuf,
    pub method: Method,
    /// Set when the requested resolution was substituted.
    pub degraded: Option<Degradation>,
}

/// The result of running the pipeline on one video.
#[derive(Debug)]
pub struct VideoOutcome {
    pub video_id: String,
    /// Known once the catalog answered.
    pub title: Option<String>,
    pub result: Result<Downloaded, PipelineError>,
}

impl VideoOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// The result of walking a playlist whose entries could be enumerated.
#[derive(Debug)]
pub enum PlaylistOutcome {
    /// The playlist has no videos.
    Empty { title: Option<String> },
    /// Every video was attempted, in order.
    Completed {
        title: Option<String>,
        outcomes: Vec<VideoOutcome>,
    },
}

/// Runs selection, download and mux for videos of one catalog.
pub struct Pipeline {
    catalog: Arc<dyn CatalogProvider>,
    muxer: Muxer,
    options: PipelineOptions,
    progress: Progress,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("muxer", &self.muxer)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline reading from the given catalog.
    pub fn new(catalog: Arc<dyn CatalogProvider>, options: PipelineOptions) -> Self {
        Self {
            catalog,
            muxer: Muxer::new(&options.ffmpeg, options.command_timeout),
            options,
            progress: Progress::hidden(),
        }
    }

    /// Creates a pipeline backed by the 'yt-dlp' executable from the options.
    pub fn with_yt_dlp(options: PipelineOptions) -> Result<Self, Error> {
        let catalog = YtDlpCatalog::new(&options.yt_dlp, options.command_timeout)?;
        Ok(Self::new(Arc::new(catalog), options))
    }

    /// Draws progress bars on the given set.
    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn muxer(&self) -> &Muxer {
        &self.muxer
    }

    /// Acquires one video as a single playable file in the output folder.
    ///
    /// Never panics on per-video failures, they are reported in the outcome.
    pub async fn download_video(
        &self,
        video_id: &str,
        resolution: Option<Resolution>,
    ) -> VideoOutcome {
        let mut title = None;
        let result = self.run(video_id, resolution, &mut title).await;

        match &result {
            Ok(downloaded) => info!("Saved {}", downloaded.path.display()),
            Err(e) => error!("{}: {}", video_id, e),
        }

        VideoOutcome {
            video_id: video_id.to_string(),
            title,
            result,
        }
    }

    async fn run(
        &self,
        video_id: &str,
        resolution: Option<Resolution>,
        title: &mut Option<String>,
    ) -> Result<Downloaded, PipelineError> {
        let video = self
            .catalog
            .video(video_id)
            .await
            .map_err(PipelineError::at(Stage::Catalog))?;
        info!("Downloading: {}", video.title);
        *title = Some(video.title.clone());

        let selection = selector::select(&video.streams, resolution);
        if let Some(degraded) = &selection.degraded {
            warn!("{}: {}", video.title, degraded);
        }

        let (path, method) = match selection.result {
            SelectionResult::Progressive(stream) => {
                info!("Selected progressive stream {}", stream);
                self.prepare_output_dir().await?;
                let path = self.fetch_progressive(&video.title, &stream).await?;
                (path, Method::Progressive)
            }
            SelectionResult::AdaptivePair { video: track, audio } => {
                info!("Selected video stream {} and audio stream {}", track, audio);
                self.prepare_output_dir().await?;
                let path = self.fetch_adaptive(&video.title, &track, &audio).await?;
                (path, Method::Muxed)
            }
            // Nothing is written for a video without viable streams, not even the folder.
            SelectionResult::Unavailable(reason) => {
                return Err(PipelineError {
                    stage: Stage::Selection,
                    source: Error::Unavailable(reason),
                });
            }
        };

        Ok(Downloaded {
            path,
            method,
            degraded: selection.degraded,
        })
    }

    async fn prepare_output_dir(&self) -> Result<(), PipelineError> {
        file_system::create_dir(&self.options.output_dir)
            .await
            .map_err(PipelineError::at(Stage::Download))
    }

    async fn fetch_progressive(
        &self,
        title: &str,
        stream: &StreamDescriptor,
    ) -> Result<PathBuf, PipelineError> {
        let path = self
            .options
            .output_dir
            .join(format!("{}.{}", sanitize_filename(title), stream.extension));

        let bar = self.progress.transfer("stream", stream.size_bytes);
        let result = Fetcher::new(self.catalog.as_ref())
            .download(stream, &path, bar.callback())
            .await;
        bar.finish();

        result.map_err(PipelineError::at(Stage::Download))?;
        Ok(path)
    }

    async fn fetch_adaptive(
        &self,
        title: &str,
        video: &StreamDescriptor,
        audio: &StreamDescriptor,
    ) -> Result<PathBuf, PipelineError> {
        let files = TempFileSet::new(&self.options.output_dir, title, &video.extension);
        let fetcher = Fetcher::new(self.catalog.as_ref());

        let video_bar = self.progress.transfer("video", video.size_bytes);
        let audio_bar = self.progress.transfer("audio", audio.size_bytes);
        let video_download = fetcher.download(video, &files.video, video_bar.callback());
        let audio_download = fetcher.download(audio, &files.audio, audio_bar.callback());

        // The mux below must only ever see fully written files.
        let downloaded = if self.options.parallel_streams {
            tokio::try_join!(video_download, audio_download).map(|_| ())
        } else {
            match video_download.await {
                Ok(_) => audio_download.await.map(|_| ()),
                Err(e) => Err(e),
            }
        };
        video_bar.finish();
        audio_bar.finish();

        if let Err(e) = downloaded {
            report_leftovers(&files);
            return Err(PipelineError::at(Stage::Download)(e));
        }

        info!("Combining video and audio with {}", self.muxer.executable.display());
        if let Err(e) = self.muxer.mux(&files.video, &files.audio, &files.output).await {
            report_leftovers(&files);
            return Err(PipelineError::at(Stage::Mux)(e));
        }

        Ok(files.output)
    }

    /// Runs the pipeline on every video of a playlist, in order.
    ///
    /// Per-video failures are recorded in the outcomes and do not stop the walk.
    ///
    /// # Errors
    ///
    /// Only a failure to enumerate the playlist itself is returned as an error.
    pub async fn walk_playlist(
        &self,
        playlist_id: &str,
        resolution: Option<Resolution>,
    ) -> Result<PlaylistOutcome, PipelineError> {
        let entries = self
            .catalog
            .playlist_video_ids(playlist_id)
            .await
            .map_err(PipelineError::at(Stage::Catalog))?;

        let title = entries.title;
        if entries.video_ids.is_empty() {
            warn!("Playlist {} is empty", title.as_deref().unwrap_or(playlist_id));
            return Ok(PlaylistOutcome::Empty { title });
        }

        info!(
            "Downloading playlist {} ({} videos)",
            title.as_deref().unwrap_or(playlist_id),
            entries.video_ids.len()
        );

        let bar = self.progress.videos(entries.video_ids.len() as u64);
        let mut outcomes = Vec::with_capacity(entries.video_ids.len());
        for video_id in &entries.video_ids {
            bar.set_message(video_id.clone());
            outcomes.push(self.download_video(video_id, resolution).await);
            bar.inc(1);
        }
        bar.finish_and_clear();

        Ok(PlaylistOutcome::Completed { title, outcomes })
    }

    /// The folder where files are written.
    pub fn output_dir(&self) -> &Path {
        &self.options.output_dir
    }
}

fn report_leftovers(files: &TempFileSet) {
    for path in files.leftovers() {
        warn!("Kept {}", path.display());
    }
}
