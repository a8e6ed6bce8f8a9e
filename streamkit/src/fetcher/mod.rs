//! Downloads one stream from a catalog to local storage, reporting progress.
//!
//! A transfer is a single sequential stream. Callers decide whether several descriptors
//! are fetched one after another or concurrently, each call gets its own progress callback.
//! Failed transfers leave their partial file in place for inspection.

use crate::catalog::CatalogProvider;
use crate::error::Result;
use crate::model::StreamDescriptor;
use crate::utils::file_system;
use futures_util::StreamExt;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Capacity of the write buffer in front of the destination file.
const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// One stream being transferred to one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    /// The stream being fetched.
    pub descriptor: StreamDescriptor,
    /// Where the bytes are written.
    pub destination: PathBuf,
    /// The advertised size, for progress display only.
    pub expected_size_bytes: u64,
}

impl fmt::Display for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({} bytes expected)",
            self.descriptor,
            self.destination.display(),
            self.expected_size_bytes
        )
    }
}

/// The fetcher is responsible for moving stream bytes from a catalog to disk.
pub struct Fetcher<'a> {
    catalog: &'a dyn CatalogProvider,
}

impl fmt::Debug for Fetcher<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}

impl<'a> Fetcher<'a> {
    /// Creates a fetcher reading from the given catalog.
    pub fn new(catalog: &'a dyn CatalogProvider) -> Self {
        Self { catalog }
    }

    /// Downloads a stream to `destination`, overwriting any existing file.
    ///
    /// `on_progress` is called with the size of every received chunk, not a running total.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - The stream to fetch.
    /// * `destination` - The path where to write the stream.
    /// * `on_progress` - Receives each chunk's size in bytes.
    ///
    /// # Returns
    ///
    /// The number of bytes written.
    ///
    /// # Errors
    ///
    /// Network, catalog and IO errors are returned as-is, they are not retried.
    pub async fn download<F>(
        &self,
        descriptor: &StreamDescriptor,
        destination: impl AsRef<Path>,
        mut on_progress: F,
    ) -> Result<u64>
    where
        F: FnMut(u64) + Send,
    {
        let task = DownloadTask {
            descriptor: descriptor.clone(),
            destination: destination.as_ref().to_path_buf(),
            expected_size_bytes: descriptor.size_bytes,
        };
        log::debug!("Starting download {}", task);

        let mut stream = self.catalog.open_stream(&task.descriptor).await?;

        file_system::create_parent_dir(&task.destination).await?;
        let file = tokio::fs::File::create(&task.destination).await?;
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    // Keep what arrived so far on disk.
                    writer.flush().await?;
                    log::warn!(
                        "Download of {} interrupted after {} bytes, partial file kept at {}",
                        task.descriptor.id,
                        written,
                        task.destination.display()
                    );
                    return Err(e);
                }
            };

            writer.write_all(&chunk).await?;
            written += chunk.len() as u64;
            on_progress(chunk.len() as u64);
        }

        writer.flush().await?;
        writer.into_inner().sync_all().await?;

        if task.expected_size_bytes > 0 && written != task.expected_size_bytes {
            log::debug!(
                "Stream {} advertised {} bytes but delivered {}",
                task.descriptor.id,
                task.expected_size_bytes,
                written
            );
        }

        log::debug!("Finished download of {} ({} bytes)", task.descriptor.id, written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::error::Error;
    use tempfile::TempDir;

    fn descriptor(url: &str, size_bytes: u64) -> StreamDescriptor {
        StreamDescriptor {
            id: "18".to_string(),
            is_progressive: true,
            has_video: true,
            has_audio: true,
            extension: "mp4".to_string(),
            resolution: Some("720p".to_string()),
            bitrate: None,
            size_bytes,
            url: url.to_string(),
        }
    }

    #[tokio::test]
    async fn test_download_writes_all_chunks_and_reports_deltas() {
        let temp = TempDir::new().unwrap();
        let catalog = MemoryCatalog::new().with_body(
            "mem://18",
            vec![b"hello ".to_vec(), b"stream ".to_vec(), b"bytes".to_vec()],
        );
        let destination = temp.path().join("nested").join("clip.mp4");

        let mut deltas = Vec::new();
        let written = Fetcher::new(&catalog)
            .download(&descriptor("mem://18", 18), &destination, |delta| deltas.push(delta))
            .await
            .unwrap();

        assert_eq!(written, 18);
        assert_eq!(deltas, vec![6, 7, 5]);
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"hello stream bytes");
    }

    #[tokio::test]
    async fn test_download_overwrites_existing_file() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("clip.mp4");
        tokio::fs::write(&destination, b"a much longer stale content").await.unwrap();

        let catalog = MemoryCatalog::new().with_body("mem://18", vec![b"new".to_vec()]);
        Fetcher::new(&catalog)
            .download(&descriptor("mem://18", 3), &destination, |_| {})
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_interrupted_download_keeps_partial_file() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("clip.mp4");
        let catalog = MemoryCatalog::new().with_failing_body("mem://18", vec![b"part".to_vec()]);

        let err = Fetcher::new(&catalog)
            .download(&descriptor("mem://18", 100), &destination, |_| {})
            .await
            .unwrap_err();

        assert!(err.is_download());
        assert_eq!(tokio::fs::read(&destination).await.unwrap(), b"part");
    }

    #[tokio::test]
    async fn test_expired_url_creates_no_file() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("clip.mp4");
        let catalog = MemoryCatalog::new();

        let err = Fetcher::new(&catalog)
            .download(&descriptor("mem://gone", 10), &destination, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Catalog(_)));
        assert!(!destination.exists());
    }
}
