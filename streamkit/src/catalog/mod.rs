//! Catalog providers: where stream descriptors, playlist entries and stream bytes come from.
//!
//! [`YtDlpCatalog`] asks the 'yt-dlp' executable for metadata and fetches media over HTTP.
//! [`MemoryCatalog`] serves canned data and is meant for tests and offline runs.

use crate::error::Result;
use crate::model::{PlaylistEntries, StreamDescriptor, VideoInfo};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

pub mod memory;
pub mod ytdlp;

pub use memory::MemoryCatalog;
pub use ytdlp::YtDlpCatalog;

/// The bytes of one remote stream, chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// A provider of stream catalogs.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Returns the title and the available streams of a video.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`](crate::error::Error::Catalog) for invalid identifiers
    /// and unavailable videos.
    async fn video(&self, video_id: &str) -> Result<VideoInfo>;

    /// Enumerates the video identifiers of a playlist, once.
    async fn playlist_video_ids(&self, playlist_id: &str) -> Result<PlaylistEntries>;

    /// Opens the byte stream of a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Catalog`](crate::error::Error::Catalog) for malformed or expired
    /// stream URLs and [`Error::Network`](crate::error::Error::Network) for transport failures.
    async fn open_stream(&self, descriptor: &StreamDescriptor) -> Result<ByteStream>;
}
