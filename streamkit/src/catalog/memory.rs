//! An in-memory catalog.

use crate::catalog::{ByteStream, CatalogProvider};
use crate::error::{Error, Result};
use crate::model::{PlaylistEntries, StreamDescriptor, VideoInfo};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use std::collections::HashMap;

/// Serves videos, playlists and stream bodies registered up front.
///
/// Stream bodies are keyed by descriptor URL and served in the registered chunks.
/// A body may be truncated by a network failure to exercise error paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    videos: HashMap<String, VideoInfo>,
    playlists: HashMap<String, PlaylistEntries>,
    bodies: HashMap<String, Body>,
}

#[derive(Debug, Clone)]
struct Body {
    chunks: Vec<Bytes>,
    reset: bool,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a video.
    pub fn with_video(mut self, video: VideoInfo) -> Self {
        self.videos.insert(video.id.clone(), video);
        self
    }

    /// Registers a playlist.
    pub fn with_playlist(mut self, id: impl Into<String>, entries: PlaylistEntries) -> Self {
        self.playlists.insert(id.into(), entries);
        self
    }

    /// Registers the body served for a stream URL, as a sequence of chunks.
    pub fn with_body(mut self, url: impl Into<String>, chunks: Vec<Vec<u8>>) -> Self {
        let chunks = chunks.into_iter().map(Bytes::from).collect();
        self.bodies.insert(
            url.into(),
            Body {
                chunks,
                reset: false,
            },
        );
        self
    }

    /// Registers a body that yields `chunks` and then fails like a dropped connection.
    pub fn with_failing_body(mut self, url: impl Into<String>, chunks: Vec<Vec<u8>>) -> Self {
        let chunks = chunks.into_iter().map(Bytes::from).collect();
        self.bodies.insert(
            url.into(),
            Body {
                chunks,
                reset: true,
            },
        );
        self
    }
}

#[async_trait]
impl CatalogProvider for MemoryCatalog {
    async fn video(&self, video_id: &str) -> Result<VideoInfo> {
        self.videos
            .get(video_id)
            .cloned()
            .ok_or_else(|| Error::Catalog(format!("Video unavailable: {}", video_id)))
    }

    async fn playlist_video_ids(&self, playlist_id: &str) -> Result<PlaylistEntries> {
        self.playlists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| Error::Catalog(format!("Invalid playlist: {}", playlist_id)))
    }

    async fn open_stream(&self, descriptor: &StreamDescriptor) -> Result<ByteStream> {
        let body = self.bodies.get(&descriptor.url).cloned().ok_or_else(|| {
            Error::Catalog(format!("Stream URL expired: {}", descriptor.url))
        })?;

        let chunks = body.chunks.into_iter().map(Ok);
        let stream = if body.reset {
            let failure =
                std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset by peer");
            stream::iter(chunks)
                .chain(stream::once(async move { Err(Error::IO(failure)) }))
                .boxed()
        } else {
            stream::iter(chunks).boxed()
        };

        Ok(stream)
    }
}
