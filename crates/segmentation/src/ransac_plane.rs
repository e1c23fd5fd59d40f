use std::borrow::Borrow;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lidarplanes_core::PointCloud;
use log::debug;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::error::{Result, SegmentationError};
use crate::plane::{check_threshold, fit_sample, Candidate};
use crate::sampler::draw_three;

/// Shared cancellation flag for an in-flight search.
///
/// Cloning is cheap; every clone observes the same flag, so a host can keep
/// one clone and cancel from anywhere (another thread included).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Progress report for one fit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchStep {
    /// 1-based attempt number.
    pub iteration: usize,
    /// Indices of the three sampled points in the searched cloud.
    pub sample: [usize; 3],
    /// Score of this attempt's candidate (0 for a collinear sample).
    pub score: usize,
    /// Best score seen so far, this attempt included.
    pub best_score: usize,
    /// Whether this attempt replaced the best candidate.
    pub improved: bool,
}

/// Final result of a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub candidate: Candidate,
    /// Number of fit attempts actually performed.
    pub iterations: usize,
    /// `true` if the search stopped early because of cancellation.
    pub cancelled: bool,
}

/// A RANSAC plane search that runs one fit attempt per [`Iterator::next`]
/// call.
///
/// Between calls control belongs to the caller, which can redraw the current
/// [`best`](Self::best), do other work, or cancel. Iteration ends after
/// `max_iterations` attempts or at the first check after the token is
/// cancelled; the first attempt always runs so there is always a best
/// candidate to return.
///
/// The searched cloud may be borrowed (`&PointCloud`) or shared
/// (`Arc<PointCloud>`).
#[derive(Debug)]
pub struct RansacSearch<C: Borrow<PointCloud>, R: Rng = StdRng> {
    cloud: C,
    epsilon: f32,
    max_iterations: usize,
    completed: usize,
    best: Option<Candidate>,
    rng: R,
    cancel: CancelToken,
}

impl<C: Borrow<PointCloud>, R: Rng> RansacSearch<C, R> {
    /// # Errors
    ///
    /// [`SegmentationError::InsufficientPoints`] if `max_iterations` is zero or
    /// the cloud has fewer than 3 points, [`SegmentationError::InvalidThreshold`]
    /// for a negative or non-finite `epsilon`.
    pub fn new(cloud: C, epsilon: f32, max_iterations: usize, rng: R) -> Result<Self> {
        check_threshold(epsilon)?;
        let n = cloud.borrow().len();
        if n < 3 {
            return Err(SegmentationError::InsufficientPoints {
                required: 3,
                available: n,
            });
        }
        if max_iterations == 0 {
            return Err(SegmentationError::InsufficientPoints {
                required: 1,
                available: 0,
            });
        }
        Ok(Self {
            cloud,
            epsilon,
            max_iterations,
            completed: 0,
            best: None,
            rng,
            cancel: CancelToken::new(),
        })
    }

    /// Replaces the search's own token with one the caller already holds.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cloud(&self) -> &PointCloud {
        self.cloud.borrow()
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn iterations_completed(&self) -> usize {
        self.completed
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.best.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.max_iterations || self.stopped_by_cancel()
    }

    /// Consumes the search and returns the best candidate found so far.
    ///
    /// Finishing before all `max_iterations` attempts have run counts as a
    /// cancellation, whether or not the token was set.
    pub fn finish(mut self) -> SearchOutcome {
        let candidate = self.take_best();
        let cancelled = self.completed < self.max_iterations;
        SearchOutcome {
            candidate,
            iterations: self.completed,
            cancelled,
        }
    }

    fn stopped_by_cancel(&self) -> bool {
        self.completed > 0 && self.completed < self.max_iterations && self.cancel.is_cancelled()
    }

    fn take_best(&mut self) -> Candidate {
        loop {
            if let Some(best) = self.best.take() {
                return best;
            }
            self.attempt();
        }
    }

    fn attempt(&mut self) -> SearchStep {
        let n = self.cloud.borrow().len();
        debug_assert!(n >= 3, "RansacSearch::new admits only clouds of 3+ points");
        let sample = draw_three(n, &mut self.rng);
        let candidate = fit_sample(self.cloud.borrow(), sample, self.epsilon);
        let score = candidate.score();
        self.completed += 1;

        let improved = match &self.best {
            None => true,
            Some(best) => score > best.score(),
        };
        if improved {
            debug!(
                "iteration {}: updating current best score {} -> {}",
                self.completed,
                self.best.as_ref().map_or(0, Candidate::score),
                score
            );
            self.best = Some(candidate);
        }

        SearchStep {
            iteration: self.completed,
            sample,
            score,
            best_score: self.best.as_ref().map_or(0, Candidate::score),
            improved,
        }
    }
}

impl<C: Borrow<PointCloud>, R: Rng> Iterator for RansacSearch<C, R> {
    type Item = SearchStep;

    fn next(&mut self) -> Option<SearchStep> {
        if self.is_finished() {
            return None;
        }
        Some(self.attempt())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.max_iterations.saturating_sub(self.completed);
        (0, Some(left))
    }
}

/// Runs a full search of `max_iterations` attempts over `cloud`.
pub fn search<R: Rng>(
    cloud: &PointCloud,
    epsilon: f32,
    max_iterations: usize,
    rng: R,
) -> Result<SearchOutcome> {
    search_with(cloud, epsilon, max_iterations, rng, |_, _| {
        ControlFlow::Continue(())
    })
}

/// Like [`search`], but calls `observer` with each step and the current best
/// candidate. Returning [`ControlFlow::Break`] cancels the search; the best
/// candidate found so far is still returned.
pub fn search_with<R, F>(
    cloud: &PointCloud,
    epsilon: f32,
    max_iterations: usize,
    rng: R,
    mut observer: F,
) -> Result<SearchOutcome>
where
    R: Rng,
    F: FnMut(&SearchStep, &Candidate) -> ControlFlow<()>,
{
    let mut search = RansacSearch::new(cloud, epsilon, max_iterations, rng)?;
    let token = search.cancel_token();
    while let Some(step) = search.next() {
        if let Some(best) = search.best() {
            if observer(&step, best).is_break() {
                token.cancel();
            }
        }
    }
    Ok(search.finish())
}

/// Fits the dominant plane of `cloud` using a random (non-deterministic)
/// seed. For reproducible results, use [`ransac_plane_seeded`] instead.
pub fn ransac_plane(
    cloud: &PointCloud,
    distance_threshold: f32,
    iterations: usize,
) -> Result<SearchOutcome> {
    let seed = rand::thread_rng().next_u64();
    ransac_plane_seeded(cloud, distance_threshold, iterations, seed)
}

/// Fits the dominant plane of `cloud` with a deterministic seed.
pub fn ransac_plane_seeded(
    cloud: &PointCloud,
    distance_threshold: f32,
    iterations: usize,
    seed: u64,
) -> Result<SearchOutcome> {
    search(
        cloud,
        distance_threshold,
        iterations,
        StdRng::seed_from_u64(seed),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lidarplanes_core::PointCloud;
    use proptest::prelude::*;

    fn ground_with_noise() -> PointCloud {
        // 7x7 grid on z=0 plus 10 outliers at z=100
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for i in 0..7 {
            for j in 0..7 {
                x.push(i as f32);
                y.push(j as f32);
                z.push(0.0);
            }
        }
        for i in 0..10 {
            x.push(i as f32);
            y.push((i * i) as f32 * 0.3);
            z.push(100.0 + i as f32);
        }
        PointCloud::from_xyz(x, y, z)
    }

    #[test]
    fn fit_xy_plane() {
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for i in 0..20 {
            for j in 0..20 {
                x.push(i as f32 * 0.1);
                y.push(j as f32 * 0.1);
                z.push(0.0);
            }
        }
        let cloud = PointCloud::from_xyz(x, y, z);
        let outcome = ransac_plane_seeded(&cloud, 0.01, 100, 42).unwrap();
        let model = outcome.candidate.plane.model.unwrap();

        assert!(
            model.normal[2].abs() > 0.99,
            "Expected normal z-component near +/-1, got {:?}",
            model.normal
        );
        assert!(model.d.abs() < 0.01, "Expected d near 0, got {}", model.d);
        assert_eq!(outcome.candidate.score(), 400);
        assert_eq!(outcome.iterations, 100);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn fit_tilted_plane() {
        // Points on x + y + z = 1
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                let xv = i as f32 * 0.1;
                let yv = j as f32 * 0.1;
                x.push(xv);
                y.push(yv);
                z.push(1.0 - xv - yv);
            }
        }
        let cloud = PointCloud::from_xyz(x, y, z);
        let outcome = ransac_plane_seeded(&cloud, 0.01, 100, 42).unwrap();
        let model = outcome.candidate.plane.model.unwrap();

        let expected_n_mag = 1.0 / 3.0f32.sqrt();
        for axis in 0..3 {
            assert!(
                (model.normal[axis].abs() - expected_n_mag).abs() < 0.05,
                "normal[{}]={} expected ~{}",
                axis,
                model.normal[axis],
                expected_n_mag
            );
        }
        assert_eq!(outcome.candidate.score(), 100);
    }

    #[test]
    fn plane_with_outliers() {
        let cloud = ground_with_noise();
        let outcome = ransac_plane_seeded(&cloud, 0.1, 200, 42).unwrap();
        let candidate = outcome.candidate;

        assert_eq!(candidate.score(), 49);
        for &idx in &candidate.inliers {
            assert!(
                cloud.z[idx].abs() < 1.0,
                "Outlier point {} (z={}) was incorrectly classified as inlier",
                idx,
                cloud.z[idx]
            );
        }
        assert_eq!(candidate.outliers, (49..59).collect::<Vec<_>>());
    }

    #[test]
    fn fewer_than_3_points() {
        let cloud = PointCloud::from_xyz(vec![0.0, 1.0], vec![0.0, 0.0], vec![0.0, 0.0]);
        let err = ransac_plane_seeded(&cloud, 0.1, 100, 42).unwrap_err();
        assert_eq!(
            err,
            SegmentationError::InsufficientPoints {
                required: 3,
                available: 2
            }
        );

        let err = ransac_plane_seeded(&PointCloud::new(), 0.1, 100, 42).unwrap_err();
        assert!(matches!(err, SegmentationError::InsufficientPoints { .. }));
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let cloud = ground_with_noise();
        let err = ransac_plane_seeded(&cloud, 0.1, 0, 42).unwrap_err();
        assert!(matches!(err, SegmentationError::InsufficientPoints { .. }));
    }

    #[test]
    fn exactly_3_points() {
        let cloud = PointCloud::from_xyz(
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.0, 0.0, 0.0],
        );
        let outcome = ransac_plane_seeded(&cloud, 0.01, 10, 42).unwrap();
        assert!(outcome.candidate.plane.model.unwrap().normal[2].abs() > 0.99);
        assert_eq!(outcome.candidate.score(), 3);
    }

    #[test]
    fn collinear_cloud_never_yields_a_plane() {
        let cloud = PointCloud::from_xyz(
            (0..10).map(|i| i as f32).collect(),
            vec![0.0; 10],
            vec![0.0; 10],
        );
        let outcome = ransac_plane_seeded(&cloud, 0.5, 25, 3).unwrap();
        assert!(outcome.candidate.plane.is_degenerate());
        assert_eq!(outcome.candidate.score(), 0);
        assert_eq!(outcome.candidate.outliers.len(), 10);
        assert_eq!(outcome.iterations, 25);
    }

    #[test]
    fn performs_exactly_max_iterations() {
        let cloud = ground_with_noise();
        let search =
            RansacSearch::new(&cloud, 0.1, 37, StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(search.count(), 37);
    }

    #[test]
    fn best_is_monotonic() {
        let cloud = ground_with_noise();
        let mut search =
            RansacSearch::new(&cloud, 0.1, 80, StdRng::seed_from_u64(9)).unwrap();
        let mut prev_best = 0;
        let mut max_seen = 0;
        while let Some(step) = search.next() {
            assert!(step.best_score >= prev_best);
            assert!(step.best_score >= step.score);
            assert_eq!(search.best().map(Candidate::score), Some(step.best_score));
            prev_best = step.best_score;
            max_seen = max_seen.max(step.score);
        }
        let outcome = search.finish();
        assert_eq!(outcome.candidate.score(), max_seen);
    }

    #[test]
    fn ties_keep_the_earliest_candidate() {
        let cloud = ground_with_noise();
        let mut search =
            RansacSearch::new(&cloud, 0.1, 200, StdRng::seed_from_u64(4)).unwrap();
        let mut first_best_sample = None;
        let mut best_score = 0;
        for step in search.by_ref() {
            if step.improved {
                best_score = step.score;
                first_best_sample = Some(step.sample);
            } else {
                assert!(step.score <= best_score);
            }
        }
        assert_eq!(Some(search.finish().candidate.sample), first_best_sample);
    }

    #[test]
    fn cancellation_stops_within_one_iteration() {
        let cloud = ground_with_noise();
        let mut search =
            RansacSearch::new(&cloud, 0.1, 1000, StdRng::seed_from_u64(2)).unwrap();
        let token = search.cancel_token();
        for _ in 0..5 {
            search.next();
        }
        token.cancel();
        assert!(search.next().is_none());
        let outcome = search.finish();
        assert_eq!(outcome.iterations, 5);
        assert!(outcome.cancelled);
        assert!(outcome.candidate.score() > 0);
    }

    #[test]
    fn cancel_before_start_still_runs_first_attempt() {
        let cloud = ground_with_noise();
        let token = CancelToken::new();
        token.cancel();
        let mut search = RansacSearch::new(&cloud, 0.1, 10, StdRng::seed_from_u64(2))
            .unwrap()
            .with_cancel_token(token);
        assert!(search.next().is_some());
        assert!(search.next().is_none());
        assert_eq!(search.finish().iterations, 1);
    }

    #[test]
    fn finish_without_stepping_runs_one_attempt() {
        let cloud = ground_with_noise();
        let search = RansacSearch::new(&cloud, 0.1, 10, StdRng::seed_from_u64(2)).unwrap();
        let outcome = search.finish();
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.cancelled);

        let single = RansacSearch::new(&cloud, 0.1, 1, StdRng::seed_from_u64(2)).unwrap();
        assert!(!single.finish().cancelled);
    }

    #[test]
    fn early_finish_is_reported_as_cancelled() {
        let cloud = ground_with_noise();
        let mut search =
            RansacSearch::new(&cloud, 0.1, 1000, StdRng::seed_from_u64(6)).unwrap();
        for _ in 0..3 {
            search.next();
        }
        assert!(!search.cancel_token().is_cancelled());
        let outcome = search.finish();
        assert_eq!(outcome.iterations, 3);
        assert!(outcome.cancelled);
    }

    #[test]
    fn observer_break_cancels() {
        let cloud = ground_with_noise();
        let mut calls = 0;
        let outcome = search_with(&cloud, 0.1, 500, StdRng::seed_from_u64(8), |step, best| {
            calls += 1;
            assert_eq!(best.score(), step.best_score);
            if step.iteration == 12 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
        assert_eq!(calls, 12);
        assert_eq!(outcome.iterations, 12);
        assert!(outcome.cancelled);
    }

    #[test]
    fn seeded_runs_sample_identical_indices() {
        let cloud = ground_with_noise();
        let samples = |seed| {
            RansacSearch::new(&cloud, 0.1, 60, StdRng::seed_from_u64(seed))
                .unwrap()
                .map(|s| s.sample)
                .collect::<Vec<_>>()
        };
        assert_eq!(samples(123), samples(123));
        assert_ne!(samples(123), samples(124));
    }

    #[test]
    fn shared_cloud_search() {
        let cloud = Arc::new(ground_with_noise());
        let search =
            RansacSearch::new(Arc::clone(&cloud), 0.1, 50, StdRng::seed_from_u64(6)).unwrap();
        assert_eq!(search.cloud().len(), cloud.len());
        let outcome = search.finish();
        assert!(outcome.candidate.score() >= 3);
    }

    proptest! {
        #[test]
        fn inliers_are_within_threshold(
            plane_pts in prop::collection::vec(
                (-10.0f32..10.0, -10.0f32..10.0),
                10..50
            ),
            threshold in 0.01f32..1.0,
            seed in 0u64..10000,
        ) {
            let n = plane_pts.len();
            let cloud = PointCloud::from_xyz(
                plane_pts.iter().map(|p| p.0).collect(),
                plane_pts.iter().map(|p| p.1).collect(),
                vec![0.0; n],
            );

            let outcome = ransac_plane_seeded(&cloud, threshold, 100, seed).unwrap();
            let candidate = outcome.candidate;
            prop_assert_eq!(candidate.inliers.len() + candidate.outliers.len(), n);

            if let Some(model) = candidate.plane.model {
                for &idx in &candidate.inliers {
                    let dist = model.distance_to_point(&cloud.point(idx));
                    prop_assert!(
                        dist <= threshold,
                        "Inlier {} has distance {} > threshold {}",
                        idx, dist, threshold
                    );
                }
            }
        }
    }
}
