use hashbrown::HashSet;
use lidarplanes_core::PointCloud;
use rand::Rng;

use crate::error::{Result, SegmentationError};

/// Draws `k` distinct indices from `[0, n)` uniformly without replacement.
///
/// Indices are drawn one at a time and rejected if already seen, so the
/// returned order is the draw order.
///
/// # Errors
///
/// Returns [`SegmentationError::InsufficientPoints`] if `k > n`.
pub fn sample_indices<R: Rng + ?Sized>(n: usize, k: usize, rng: &mut R) -> Result<Vec<usize>> {
    if k > n {
        return Err(SegmentationError::InsufficientPoints {
            required: k,
            available: n,
        });
    }

    Ok(draw_distinct(n, k, rng))
}

/// Draws three distinct indices for a plane hypothesis.
pub fn sample_three<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<[usize; 3]> {
    if n < 3 {
        return Err(SegmentationError::InsufficientPoints {
            required: 3,
            available: n,
        });
    }
    Ok(draw_three(n, rng))
}

// Caller guarantees `n >= 3`.
pub(crate) fn draw_three<R: Rng + ?Sized>(n: usize, rng: &mut R) -> [usize; 3] {
    let s = draw_distinct(n, 3, rng);
    [s[0], s[1], s[2]]
}

/// Indices of a size-capped working subset.
///
/// When `n <= cap` this is simply `0..n` and no random numbers are drawn.
pub fn bounded_sample<R: Rng + ?Sized>(n: usize, cap: usize, rng: &mut R) -> Vec<usize> {
    if n <= cap {
        return (0..n).collect();
    }
    draw_distinct(n, cap, rng)
}

/// Copies `k` randomly drawn points of `cloud` into a new cloud.
///
/// Returns the subset together with the source indices, in draw order.
pub fn sample_cloud<R: Rng + ?Sized>(
    cloud: &PointCloud,
    k: usize,
    rng: &mut R,
) -> Result<(PointCloud, Vec<usize>)> {
    let indices = sample_indices(cloud.len(), k, rng)?;
    Ok((cloud.select(&indices), indices))
}

// Rejection sampling; caller guarantees `k <= n`.
fn draw_distinct<R: Rng + ?Sized>(n: usize, k: usize, rng: &mut R) -> Vec<usize> {
    let mut seen: HashSet<usize> = HashSet::with_capacity(k);
    let mut sample = Vec::with_capacity(k);
    while sample.len() < k {
        let idx = rng.gen_range(0..n);
        if seen.insert(idx) {
            sample.push(idx);
        }
    }
    sample
}
