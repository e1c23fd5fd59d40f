#![forbid(unsafe_code)]

pub mod error;
pub mod plane;
pub mod ransac_plane;
pub mod sampler;

pub use error::{Result, SegmentationError};
pub use plane::{fit_one_iteration, partition_by_plane, Candidate, Plane, PlaneModel};
pub use ransac_plane::{
    ransac_plane, ransac_plane_seeded, search, search_with, CancelToken, RansacSearch,
    SearchOutcome, SearchStep,
};
pub use sampler::{bounded_sample, sample_cloud, sample_indices};
