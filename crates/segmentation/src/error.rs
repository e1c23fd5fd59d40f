//! Error types for plane segmentation.

/// Result type alias
pub type Result<T> = std::result::Result<T, SegmentationError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SegmentationError {
    /// Fewer points (or iterations) than the operation needs.
    #[error("insufficient points: need {required}, have {available}")]
    InsufficientPoints { required: usize, available: usize },

    /// The three sample points are collinear or coincident.
    #[error("degenerate plane sample: points are collinear")]
    DegenerateModel,

    /// Distance threshold is negative or not finite.
    #[error("invalid distance threshold: {0}")]
    InvalidThreshold(f32),
}
