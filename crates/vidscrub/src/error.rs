use std::path::PathBuf;

/// Why a byte fetch of the media source did not produce a body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request was rejected before a response arrived.
    #[error("fetch rejected: {0}")]
    Rejected(String),
    /// A response arrived with a non-success status.
    #[error("fetch returned HTTP {0}")]
    Status(u16),
}

/// Failure of a scripted seek on the media element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SeekError {
    /// The element refuses scripted seeking in its current state.
    #[error("media element does not support seeking right now")]
    Unsupported,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
