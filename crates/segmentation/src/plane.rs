use lidarplanes_core::geometry::{cross, dot, length, scale_inv, sub, Vec3};
use lidarplanes_core::PointCloud;
use rand::Rng;
use rayon::prelude::*;

use crate::error::{Result, SegmentationError};
use crate::sampler::sample_three;

/// Clouds at least this large are partitioned in parallel.
pub const PARALLEL_PARTITION_THRESHOLD: usize = 10_000;

/// A 3D plane model in the form `n . x + d = 0`, where `n` is a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneModel {
    pub normal: [f32; 3],
    pub d: f32,
}

impl PlaneModel {
    /// Plane through three points.
    ///
    /// The raw normal is `(p1 - p3) x (p2 - p3)`; it is normalized so that
    /// [`signed_distance`](Self::signed_distance) is a true perpendicular
    /// distance.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentationError::DegenerateModel`] when the points are
    /// collinear or coincident (the raw normal has zero or non-finite length).
    pub fn try_from_points(p1: &Vec3, p2: &Vec3, p3: &Vec3) -> Result<Self> {
        let v1 = sub(p1, p3);
        let v2 = sub(p2, p3);
        let raw = cross(&v1, &v2);
        let normal = scale_inv(&raw, length(&raw)).ok_or(SegmentationError::DegenerateModel)?;
        let d = -dot(&normal, p1);
        if !d.is_finite() {
            return Err(SegmentationError::DegenerateModel);
        }
        Ok(Self { normal, d })
    }

    #[inline]
    pub fn signed_distance(&self, point: &Vec3) -> f32 {
        dot(&self.normal, point) + self.d
    }

    /// Computes the absolute distance from a point to this plane.
    #[inline]
    pub fn distance_to_point(&self, point: &Vec3) -> f32 {
        self.signed_distance(point).abs()
    }
}

/// A plane hypothesis: the three sample points it was built from and, unless
/// they were collinear, the derived model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub points: [Vec3; 3],
    pub model: Option<PlaneModel>,
}

impl Plane {
    pub fn from_points(points: [Vec3; 3]) -> Self {
        let model = PlaneModel::try_from_points(&points[0], &points[1], &points[2]).ok();
        Self { points, model }
    }

    pub fn is_degenerate(&self) -> bool {
        self.model.is_none()
    }

    /// `true` iff the point lies within `epsilon` of the plane. Always `false`
    /// for a degenerate plane or a non-finite distance.
    #[inline]
    pub fn contains(&self, point: &Vec3, epsilon: f32) -> bool {
        match &self.model {
            Some(model) => model.distance_to_point(point) <= epsilon,
            None => false,
        }
    }
}

/// Outcome of one fit attempt against a specific cloud.
///
/// `inliers` and `outliers` are ascending indices into that cloud; together
/// they cover every index exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub plane: Plane,
    /// Indices of the three sample points.
    pub sample: [usize; 3],
    pub inliers: Vec<usize>,
    pub outliers: Vec<usize>,
}

impl Candidate {
    /// Number of inliers; the only ranking key.
    pub fn score(&self) -> usize {
        self.inliers.len()
    }

    pub fn inlier_cloud(&self, cloud: &PointCloud) -> PointCloud {
        cloud.select(&self.inliers)
    }

    pub fn outlier_cloud(&self, cloud: &PointCloud) -> PointCloud {
        cloud.select(&self.outliers)
    }
}

pub(crate) fn check_threshold(epsilon: f32) -> Result<()> {
    if epsilon.is_finite() && epsilon >= 0.0 {
        Ok(())
    } else {
        Err(SegmentationError::InvalidThreshold(epsilon))
    }
}

/// Splits `cloud` into `(inliers, outliers)` for a known plane.
///
/// Both lists are in ascending index order. A degenerate plane has no
/// inliers.
pub fn partition_by_plane(
    cloud: &PointCloud,
    plane: &Plane,
    epsilon: f32,
) -> (Vec<usize>, Vec<usize>) {
    let n = cloud.len();
    let mut inliers = Vec::new();
    let mut outliers = Vec::new();

    if plane.is_degenerate() {
        outliers.extend(0..n);
        return (inliers, outliers);
    }

    if n >= PARALLEL_PARTITION_THRESHOLD {
        let mask: Vec<bool> = (0..n)
            .into_par_iter()
            .map(|i| plane.contains(&cloud.point(i), epsilon))
            .collect();
        for (i, is_inlier) in mask.into_iter().enumerate() {
            if is_inlier {
                inliers.push(i);
            } else {
                outliers.push(i);
            }
        }
    } else {
        for (i, p) in cloud.iter_points().enumerate() {
            if plane.contains(&p, epsilon) {
                inliers.push(i);
            } else {
                outliers.push(i);
            }
        }
    }

    (inliers, outliers)
}

/// One RANSAC hypothesis: sample three distinct points, build the plane and
/// partition `cloud` against it.
///
/// A collinear sample yields a candidate with score 0 rather than an error.
///
/// # Errors
///
/// [`SegmentationError::InsufficientPoints`] for clouds with fewer than three
/// points, [`SegmentationError::InvalidThreshold`] for a negative or
/// non-finite `epsilon`.
pub fn fit_one_iteration<R: Rng + ?Sized>(
    cloud: &PointCloud,
    epsilon: f32,
    rng: &mut R,
) -> Result<Candidate> {
    check_threshold(epsilon)?;
    let sample = sample_three(cloud.len(), rng)?;
    Ok(fit_sample(cloud, sample, epsilon))
}

pub(crate) fn fit_sample(cloud: &PointCloud, sample: [usize; 3], epsilon: f32) -> Candidate {
    let plane = Plane::from_points([
        cloud.point(sample[0]),
        cloud.point(sample[1]),
        cloud.point(sample[2]),
    ]);
    let (inliers, outliers) = partition_by_plane(cloud, &plane, epsilon);
    Candidate {
        plane,
        sample,
        inliers,
        outliers,
    }
}
