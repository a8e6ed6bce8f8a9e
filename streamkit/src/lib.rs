//! Building blocks to acquire a remote video as one local, playable file.
//!
//! A [catalog](catalog::CatalogProvider) lists the streams of a video, the
//! [selector](selector::select) picks either one progressive stream or a video/audio pair,
//! the [fetcher](fetcher::Fetcher) downloads them and the [muxer](muxer::Muxer) combines a
//! pair losslessly with 'ffmpeg'.
//!
//! # Examples
//!
//! ```rust, no_run
//! # use streamkit::catalog::{CatalogProvider, YtDlpCatalog};
//! # use streamkit::fetcher::Fetcher;
//! # use streamkit::selector::{self, SelectionResult};
//! # use streamkit::model::Resolution;
//! # use std::time::Duration;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = YtDlpCatalog::new("yt-dlp", Duration::from_secs(120))?;
//! let video = catalog.video("dQw4w9WgXcQ").await?;
//!
//! let selection = selector::select(&video.streams, Resolution::lenient(Some("720p")));
//! if let SelectionResult::Progressive(stream) = &selection.result {
//!     Fetcher::new(&catalog)
//!         .download(stream, "downloads/video.mp4", |_| {})
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod model;
pub mod muxer;
pub mod selector;
pub mod utils;

pub use error::{Error, Result};
