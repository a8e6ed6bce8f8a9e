//! The errors that can occur.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The possible errors that can occur.
#[derive(Debug, Error)]
pub enum Error {
    /// An error occurred while running the runtime.
    #[error("An error occurred while running the runtime: {0}")]
    Runtime(#[from] tokio::task::JoinError),
    /// An error occurred while interacting with the file system.
    #[error("An IO error occurred: {0}")]
    IO(#[from] std::io::Error),
    /// A transfer failed on the network (connection, timeout, body read).
    #[error("A network error occurred: {0}")]
    Network(#[from] reqwest::Error),
    /// The catalog provider returned output that could not be parsed.
    #[error("An error occurred while parsing JSON: {0}")]
    Serde(#[from] serde_json::Error),

    /// The catalog could not resolve an identifier, the video is unavailable,
    /// or a stream URL is malformed or expired.
    #[error("Catalog error: {0}")]
    Catalog(String),
    /// No viable stream combination exists for the request.
    #[error("No viable stream available: {0}")]
    Unavailable(String),
    /// The external tool could not be found.
    #[error("External tool not found: {0}")]
    ToolNotFound(PathBuf),
    /// The external tool exited with a failure status.
    #[error("{tool} failed with code {code:?}: {stderr}")]
    ExternalTool {
        /// The tool that failed.
        tool: String,
        /// The exit code, if the process exited normally.
        code: Option<i32>,
        /// The diagnostic text captured from stderr.
        stderr: String,
    },
    /// An error occurred due to a timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    /// An error occurred manipulating a path.
    #[error("An invalid path was provided: {0}")]
    Path(String),
    /// A configuration value is invalid.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl Error {
    /// Whether the error comes from the catalog (bad identifiers, provider failures).
    pub fn is_catalog(&self) -> bool {
        matches!(self, Error::Catalog(_) | Error::Serde(_))
    }

    /// Whether the error happened while transferring bytes.
    pub fn is_download(&self) -> bool {
        matches!(self, Error::Network(_) | Error::IO(_))
    }

    /// Whether the error comes from the external transcoder.
    pub fn is_external_tool(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound(_) | Error::ExternalTool { .. } | Error::Timeout(_)
        )
    }
}
