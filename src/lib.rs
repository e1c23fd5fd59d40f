//! Interactive plane extraction for LiDAR point clouds.
//!
//! Re-exports the workspace crates:
//!
//! - [`cloud`]: the point cloud container and small vector helpers
//! - [`segmentation`]: RANSAC plane search, one attempt at a time
//! - [`hull`]: Graham-scan convex hull
//! - [`extraction`]: the round-by-round extraction session

#![forbid(unsafe_code)]

pub use lidarplanes_core as cloud;
pub use lidarplanes_extraction as extraction;
pub use lidarplanes_hull as hull;
pub use lidarplanes_segmentation as segmentation;

pub use lidarplanes_core::PointCloud;
pub use lidarplanes_extraction::{
    BoundaryPolygon, ExtractionConfig, ExtractionError, ExtractionSession, RoundResult,
    RoundSearch, SessionState,
};
pub use lidarplanes_segmentation::{CancelToken, Candidate, Plane, PlaneModel, SearchStep};
