//! A catalog backed by the 'yt-dlp' executable.

use crate::catalog::{ByteStream, CatalogProvider};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::model::{CANONICAL_CONTAINER, PlaylistEntries, StreamDescriptor, VideoInfo};
use crate::utils;
use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Lists streams and playlists with 'yt-dlp', then fetches stream bytes over HTTP.
///
/// # Example
///
/// ```rust,no_run
/// # use streamkit::catalog::{CatalogProvider, YtDlpCatalog};
/// # use std::time::Duration;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let catalog = YtDlpCatalog::new("yt-dlp", Duration::from_secs(120))?;
///
/// let video = catalog.video("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
/// println!("{} has {} streams", video.title, video.streams.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct YtDlpCatalog {
    /// The path to the 'yt-dlp' executable.
    pub executable: PathBuf,
    /// The timeout for metadata commands.
    pub timeout: Duration,
    /// Extra arguments passed before every command.
    pub args: Vec<String>,
    client: reqwest::Client,
}

impl fmt::Display for YtDlpCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "YtDlpCatalog(executable={})", self.executable.display())
    }
}

impl YtDlpCatalog {
    /// Creates a catalog using the given 'yt-dlp' executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client could not be built.
    pub fn new(executable: impl AsRef<Path>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            executable: executable.as_ref().to_path_buf(),
            timeout,
            args: Vec::new(),
            client,
        })
    }

    /// Adds an argument passed to every 'yt-dlp' invocation.
    pub fn with_arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    async fn dump_json(&self, args: Vec<&str>) -> Result<String> {
        let mut final_args = self.args.clone();
        final_args.append(&mut utils::to_owned(args));

        let executor = Executor {
            executable_path: self.executable.clone(),
            timeout: self.timeout,
            args: final_args,
        };

        match executor.execute().await {
            Ok(output) => Ok(output.stdout),
            Err(Error::ExternalTool { stderr, .. }) => Err(Error::Catalog(last_error_line(&stderr))),
            Err(Error::Timeout(after)) => Err(Error::Catalog(format!(
                "yt-dlp did not answer within {:?}",
                after
            ))),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CatalogProvider for YtDlpCatalog {
    async fn video(&self, video_id: &str) -> Result<VideoInfo> {
        log::debug!("Fetching stream catalog for {}", video_id);

        let stdout = self
            .dump_json(vec![
                "--no-progress",
                "--no-warnings",
                "--no-playlist",
                "--dump-single-json",
                video_id,
            ])
            .await?;

        let raw: RawVideo = serde_json::from_str(&stdout)?;
        Ok(raw.into_video_info())
    }

    async fn playlist_video_ids(&self, playlist_id: &str) -> Result<PlaylistEntries> {
        log::debug!("Enumerating playlist {}", playlist_id);

        let stdout = self
            .dump_json(vec![
                "--no-progress",
                "--no-warnings",
                "--flat-playlist",
                "--dump-single-json",
                playlist_id,
            ])
            .await?;

        let raw: RawPlaylist = serde_json::from_str(&stdout)?;
        if raw.kind.as_deref() != Some("playlist") {
            return Err(Error::Catalog(format!("Not a playlist: {}", playlist_id)));
        }

        Ok(PlaylistEntries {
            title: raw.title,
            video_ids: raw.entries.into_iter().flatten().map(|e| e.id).collect(),
        })
    }

    async fn open_stream(&self, descriptor: &StreamDescriptor) -> Result<ByteStream> {
        log::debug!("Opening stream {}", descriptor);

        let url = reqwest::Url::parse(&descriptor.url)
            .map_err(|e| Error::Catalog(format!("Malformed stream URL for {}: {}", descriptor.id, e)))?;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(Error::Catalog(format!(
                "Stream {} rejected with status {}, the URL may have expired",
                descriptor.id, status
            )));
        }

        let response = response.error_for_status()?;
        Ok(response.bytes_stream().map_err(Error::Network).boxed())
    }
}

/// Keeps the last `ERROR:` line of the tool's diagnostics, or all of it when there is none.
fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .map(|line| line.trim_start_matches("ERROR:").trim().to_string())
        .unwrap_or_else(|| stderr.trim().to_string())
}

#[derive(Debug, Deserialize)]
struct RawVideo {
    id: String,
    title: String,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

#[derive(Debug, Deserialize)]
struct RawFormat {
    format_id: String,
    ext: String,
    url: Option<String>,
    protocol: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    height: Option<u32>,
    abr: Option<f64>,
    filesize: Option<u64>,
    filesize_approx: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawPlaylist {
    #[serde(rename = "_type")]
    kind: Option<String>,
    title: Option<String>,
    #[serde(default)]
    entries: Vec<Option<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: String,
}

impl RawVideo {
    fn into_video_info(self) -> VideoInfo {
        let streams = self
            .formats
            .into_iter()
            .filter_map(RawFormat::into_descriptor)
            .collect();

        VideoInfo {
            id: self.id,
            title: self.title,
            streams,
        }
    }
}

impl RawFormat {
    /// Maps a yt-dlp format to a descriptor, skipping storyboards and manifest-based formats.
    fn into_descriptor(self) -> Option<StreamDescriptor> {
        let url = self.url?;
        let direct = matches!(self.protocol.as_deref(), None | Some("http") | Some("https"));
        if !direct {
            return None;
        }

        let has_video = self.vcodec.as_deref().is_some_and(is_codec);
        let has_audio = self.acodec.as_deref().is_some_and(is_codec);
        if !has_video && !has_audio {
            return None;
        }

        // MP4 audio-only streams are reported as m4a, they live in the same container.
        let extension = match self.ext.as_str() {
            "m4a" => CANONICAL_CONTAINER.to_string(),
            other => other.to_string(),
        };

        Some(StreamDescriptor {
            id: self.format_id,
            is_progressive: has_video && has_audio,
            has_video,
            has_audio,
            extension,
            resolution: self.height.filter(|_| has_video).map(|h| format!("{}p", h)),
            bitrate: self
                .abr
                .filter(|_| has_audio)
                .map(|abr| format!("{}kbps", abr.round() as u64)),
            size_bytes: self.filesize.or(self.filesize_approx).unwrap_or(0),
            url,
        })
    }
}

fn is_codec(codec: &str) -> bool {
    !codec.is_empty() && codec != "none"
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO_JSON: &str = r#"{
        "id": "abc123def45",
        "title": "Demo: Clip (Live)",
        "formats": [
            {"format_id": "sb0", "ext": "mhtml", "url": "https://i.invalid/sb", "protocol": "mhtml",
             "vcodec": "none", "acodec": "none"},
            {"format_id": "140", "ext": "m4a", "url": "https://media.invalid/140", "protocol": "https",
             "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.475, "filesize": 3400000},
            {"format_id": "18", "ext": "mp4", "url": "https://media.invalid/18", "protocol": "https",
             "vcodec": "avc1.42001E", "acodec": "mp4a.40.2", "height": 360, "abr": 96.0,
             "filesize_approx": 8000000},
            {"format_id": "137", "ext": "mp4", "url": "https://media.invalid/137", "protocol": "https",
             "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "filesize": 90000000},
            {"format_id": "248", "ext": "webm", "url": "https://media.invalid/248", "protocol": "https",
             "vcodec": "vp9", "acodec": "none", "height": 1080},
            {"format_id": "hls-720", "ext": "mp4", "url": "https://media.invalid/720.m3u8",
             "protocol": "m3u8_native", "vcodec": "avc1", "acodec": "mp4a", "height": 720}
        ]
    }"#;

    #[test]
    fn test_video_json_maps_to_descriptors() {
        let raw: RawVideo = serde_json::from_str(VIDEO_JSON).unwrap();
        let video = raw.into_video_info();

        assert_eq!(video.title, "Demo: Clip (Live)");
        let ids: Vec<&str> = video.streams.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["140", "18", "137", "248"]);

        let audio = &video.streams[0];
        assert!(audio.is_audio_only());
        assert_eq!(audio.extension, "mp4");
        assert_eq!(audio.bitrate.as_deref(), Some("129kbps"));
        assert_eq!(audio.resolution, None);
        assert_eq!(audio.size_bytes, 3_400_000);

        let progressive = &video.streams[1];
        assert!(progressive.is_progressive);
        assert_eq!(progressive.resolution.as_deref(), Some("360p"));
        assert_eq!(progressive.size_bytes, 8_000_000);

        let video_only = &video.streams[2];
        assert!(video_only.is_video_only());
        assert_eq!(video_only.resolution.as_deref(), Some("1080p"));
        assert_eq!(video_only.bitrate, None);

        assert_eq!(video.streams[3].extension, "webm");
        assert_eq!(video.streams[3].size_bytes, 0);
    }

    #[test]
    fn test_playlist_json_skips_unavailable_entries() {
        let json = r#"{
            "_type": "playlist",
            "title": "Mix",
            "entries": [{"id": "a"}, null, {"id": "c", "title": "ignored"}]
        }"#;

        let raw: RawPlaylist = serde_json::from_str(json).unwrap();
        let ids: Vec<String> = raw.entries.into_iter().flatten().map(|e| e.id).collect();
        assert_eq!(raw.title.as_deref(), Some("Mix"));
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_last_error_line() {
        let stderr = "WARNING: something\nERROR: [youtube] xyz: Video unavailable\n";
        assert_eq!(last_error_line(stderr), "[youtube] xyz: Video unavailable");
        assert_eq!(last_error_line("  plain failure \n"), "plain failure");
    }

    fn descriptor(url: &str) -> StreamDescriptor {
        StreamDescriptor {
            id: "137".to_string(),
            is_progressive: false,
            has_video: true,
            has_audio: false,
            extension: "mp4".to_string(),
            resolution: Some("1080p".to_string()),
            bitrate: None,
            size_bytes: 0,
            url: url.to_string(),
        }
    }

    /// Serves one connection with a fixed status line and an empty body.
    async fn serve_status(status: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let response =
                format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}/videoplayback")
    }

    #[tokio::test]
    async fn test_rejected_stream_url_is_a_catalog_error() {
        let url = serve_status("403 Forbidden").await;
        let catalog = YtDlpCatalog::new("yt-dlp", Duration::from_secs(5)).unwrap();

        let err = match catalog.open_stream(&descriptor(&url)).await {
            Ok(_) => panic!("a 403 must not open a stream"),
            Err(e) => e,
        };

        assert!(err.is_catalog(), "unexpected error: {err:?}");
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn test_malformed_stream_url_is_a_catalog_error() {
        let catalog = YtDlpCatalog::new("yt-dlp", Duration::from_secs(5)).unwrap();

        let err = match catalog.open_stream(&descriptor("not a url")).await {
            Ok(_) => panic!("a malformed URL must not open a stream"),
            Err(e) => e,
        };

        assert!(matches!(err, Error::Catalog(_)), "unexpected error: {err:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_yt_dlp_is_a_catalog_error() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let script = temp.path().join("slow-yt-dlp");
        std::fs::write(&script, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let catalog = YtDlpCatalog::new(&script, Duration::from_millis(100)).unwrap();

        let err = catalog.video("abc123def45").await.unwrap_err();

        assert!(err.is_catalog(), "unexpected error: {err:?}");
        assert!(!err.is_external_tool());
    }
}
