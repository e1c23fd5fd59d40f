//! Error types for the extraction session.

use lidarplanes_segmentation::SegmentationError;

/// Result type alias
pub type Result<T> = std::result::Result<T, ExtractionError>;

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// Sampling, threshold or iteration-count failure from the search.
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),

    /// A round is already searching or finalizing.
    #[error("a search is already running for this session")]
    SearchAlreadyRunning,

    /// Fewer than 3 points remain; start a new session with a fresh cloud.
    #[error("session exhausted: fewer than 3 points remain")]
    Exhausted,

    /// The round handed back does not belong to this session's in-flight search.
    #[error("no matching round in flight")]
    NoRoundInFlight,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed TOML
    #[error("Configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
