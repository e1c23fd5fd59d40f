//! Multi-plane extraction session.
//!
//! A session owns one loaded point cloud and peels planes off it round by
//! round. Each round searches a size-capped sample of what is left, applies
//! the winning plane to the full remainder, records the inliers and computes
//! their boundary.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lidarplanes_extraction::{ExtractionConfig, ExtractionSession};
//!
//! let mut session = ExtractionSession::new(cloud, ExtractionConfig::default())?;
//!
//! // Drive the search one attempt at a time, redrawing between attempts
//! let mut round = session.begin_round(15.0, 1000)?;
//! while let Some(step) = round.next() {
//!     if step.improved {
//!         redraw(round.best());
//!     }
//! }
//! let result = session.finish_round(round)?;
//! ```

use std::ops::ControlFlow;
use std::ptr;
use std::sync::Arc;

use lidarplanes_core::{PointCloud, Vec3};
use lidarplanes_hull::graham_scan_indices;
use lidarplanes_segmentation::sampler::bounded_sample;
use lidarplanes_segmentation::{
    partition_by_plane, CancelToken, Candidate, Plane, RansacSearch, SearchOutcome, SearchStep,
};
use log::{debug, info, warn};
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::config::ExtractionConfig;
use crate::error::{ExtractionError, Result};

/// Where a session is in its round cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No search in flight.
    Idle,
    /// A [`RoundSearch`] has been handed out and not yet finished.
    Searching,
    /// Applying the winning plane to the full remaining cloud.
    Finalizing,
    /// Fewer than 3 points remain; no more rounds can run.
    Exhausted,
}

/// Closed boundary of one round's inliers in counter-clockwise (x, y) order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundaryPolygon {
    pub vertices: Vec<Vec3>,
    /// Origin id of each vertex.
    pub ids: Vec<usize>,
}

impl BoundaryPolygon {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// `true` when there are too few vertices to enclose an area.
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }
}

/// Everything one round produced.
///
/// Point identity is carried by origin ids: the index each point had in the
/// cloud the session was created with.
#[derive(Debug, Clone)]
pub struct RoundResult {
    /// 1-based round number.
    pub round: usize,
    pub plane: Plane,
    pub inliers: PointCloud,
    pub outliers: PointCloud,
    pub inlier_ids: Vec<usize>,
    pub outlier_ids: Vec<usize>,
    pub boundary: BoundaryPolygon,
    /// Fit attempts the search actually ran.
    pub iterations: usize,
    pub cancelled: bool,
}

/// An in-flight round search, driven one attempt per [`Iterator::next`].
///
/// Hand it back to [`ExtractionSession::finish_round`] to finalize, or to
/// [`ExtractionSession::abort_round`] to throw it away.
#[derive(Debug)]
pub struct RoundSearch {
    search: RansacSearch<Arc<PointCloud>, StdRng>,
    round: usize,
}

impl RoundSearch {
    pub fn round(&self) -> usize {
        self.round
    }

    /// Best candidate so far; its indices refer to the sampled cloud.
    pub fn best(&self) -> Option<&Candidate> {
        self.search.best()
    }

    pub fn iterations_completed(&self) -> usize {
        self.search.iterations_completed()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.search.cancel_token()
    }
}

impl Iterator for RoundSearch {
    type Item = SearchStep;

    fn next(&mut self) -> Option<SearchStep> {
        self.search.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.search.size_hint()
    }
}

/// Stateful plane extraction over one loaded point cloud.
#[derive(Debug)]
pub struct ExtractionSession {
    config: ExtractionConfig,
    state: SessionState,
    rng: StdRng,
    remaining: PointCloud,
    remaining_ids: Vec<usize>,
    /// Working subset of `remaining` the search iterates over.
    sampled: Arc<PointCloud>,
    processed: PointCloud,
    processed_ids: Vec<usize>,
    previous_inliers: PointCloud,
    previous_ids: Vec<usize>,
    cancel: Option<CancelToken>,
    rounds_completed: usize,
}

impl ExtractionSession {
    /// Starts a session over `cloud`.
    ///
    /// A cloud with fewer than 3 points yields a session that is already
    /// [`SessionState::Exhausted`].
    pub fn new(cloud: PointCloud, config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        let seed = config
            .seed
            .unwrap_or_else(|| rand::thread_rng().next_u64());
        let n = cloud.len();
        info!("Loaded {} points", n);

        let mut session = Self {
            config,
            state: SessionState::Idle,
            rng: StdRng::seed_from_u64(seed),
            remaining: cloud,
            remaining_ids: (0..n).collect(),
            sampled: Arc::new(PointCloud::new()),
            processed: PointCloud::new(),
            processed_ids: Vec::new(),
            previous_inliers: PointCloud::new(),
            previous_ids: Vec::new(),
            cancel: None,
            rounds_completed: 0,
        };
        session.rebuild_sample();
        if n < 3 {
            session.state = SessionState::Exhausted;
        }
        Ok(session)
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Current state. A session whose [`RoundSearch`] was dropped without
    /// being finished or aborted reads as [`SessionState::Idle`].
    pub fn state(&self) -> SessionState {
        if self.state == SessionState::Searching && !self.round_outstanding() {
            SessionState::Idle
        } else {
            self.state
        }
    }

    pub fn rounds_completed(&self) -> usize {
        self.rounds_completed
    }

    pub fn remaining_cloud(&self) -> &PointCloud {
        &self.remaining
    }

    pub fn remaining_ids(&self) -> &[usize] {
        &self.remaining_ids
    }

    pub fn sampled_cloud(&self) -> &PointCloud {
        &self.sampled
    }

    /// Inliers of every round except the most recent one.
    pub fn processed_points(&self) -> &PointCloud {
        &self.processed
    }

    pub fn processed_ids(&self) -> &[usize] {
        &self.processed_ids
    }

    /// Inliers of the most recent round.
    pub fn previous_inliers(&self) -> &PointCloud {
        &self.previous_inliers
    }

    pub fn previous_inlier_ids(&self) -> &[usize] {
        &self.previous_ids
    }

    /// Starts a round: the returned search runs over the sampled cloud.
    ///
    /// # Errors
    ///
    /// [`ExtractionError::Exhausted`] once fewer than 3 points remain,
    /// [`ExtractionError::SearchAlreadyRunning`] while another round is in
    /// flight, and the search's own errors (zero iterations, bad threshold,
    /// too few sampled points). On error the session state is unchanged.
    pub fn begin_round(&mut self, epsilon: f32, max_iterations: usize) -> Result<RoundSearch> {
        self.reclaim_dropped_round();
        match self.state {
            SessionState::Exhausted => return Err(ExtractionError::Exhausted),
            SessionState::Searching | SessionState::Finalizing => {
                return Err(ExtractionError::SearchAlreadyRunning)
            }
            SessionState::Idle => {}
        }

        let rng = StdRng::seed_from_u64(self.rng.next_u64());
        let search = RansacSearch::new(Arc::clone(&self.sampled), epsilon, max_iterations, rng)?;
        self.cancel = Some(search.cancel_token());
        self.state = SessionState::Searching;

        let round = self.rounds_completed + 1;
        debug!(
            "round {}: searching {} sampled of {} remaining points (epsilon {}, {} iterations)",
            round,
            self.sampled.len(),
            self.remaining.len(),
            epsilon,
            max_iterations
        );
        Ok(RoundSearch { search, round })
    }

    /// Stops the in-flight search after its current attempt.
    ///
    /// The round still has to be handed to [`finish_round`](Self::finish_round),
    /// which finalizes it with the best candidate found so far. Returns `false`
    /// if no search was in flight.
    pub fn cancel_current_round(&self) -> bool {
        match (&self.cancel, self.state()) {
            (Some(token), SessionState::Searching) => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Finalizes a round: re-partitions the full remaining cloud with the
    /// winning plane, advances the history, rebuilds the sample and computes
    /// the boundary of the new inliers.
    ///
    /// Any attempts the search has not yet run are skipped, and the round is
    /// then reported as cancelled.
    ///
    /// # Errors
    ///
    /// [`ExtractionError::NoRoundInFlight`] if `round` is not this session's
    /// current search.
    pub fn finish_round(&mut self, round: RoundSearch) -> Result<RoundResult> {
        self.check_owned(&round)?;
        let epsilon = round.search.epsilon();
        let outcome = round.search.finish();
        self.state = SessionState::Finalizing;
        self.cancel = None;
        Ok(self.finalize(round.round, epsilon, outcome))
    }

    /// Drops an in-flight round without changing any point sets.
    pub fn abort_round(&mut self, round: RoundSearch) -> Result<()> {
        self.check_owned(&round)?;
        warn!(
            "round {}: aborted after {} iterations",
            round.round,
            round.iterations_completed()
        );
        self.state = SessionState::Idle;
        self.cancel = None;
        Ok(())
    }

    /// Runs a whole round: `max_iterations` attempts, then finalization.
    pub fn run_round(&mut self, epsilon: f32, max_iterations: usize) -> Result<RoundResult> {
        self.run_round_with(epsilon, max_iterations, |_, _| ControlFlow::Continue(()))
    }

    /// Runs a whole round, calling `observer` after every attempt with the
    /// step and the current best candidate. Returning
    /// [`ControlFlow::Break`] cancels the search; the round is still
    /// finalized with the best candidate so far.
    pub fn run_round_with<F>(
        &mut self,
        epsilon: f32,
        max_iterations: usize,
        mut observer: F,
    ) -> Result<RoundResult>
    where
        F: FnMut(&SearchStep, &Candidate) -> ControlFlow<()>,
    {
        let mut round = self.begin_round(epsilon, max_iterations)?;
        let token = round.cancel_token();
        while let Some(step) = round.next() {
            if let Some(best) = round.best() {
                if observer(&step, best).is_break() {
                    token.cancel();
                }
            }
        }
        self.finish_round(round)
    }

    /// The sampled cloud is shared only with the search of a handed-out round.
    fn round_outstanding(&self) -> bool {
        Arc::strong_count(&self.sampled) > 1
    }

    fn reclaim_dropped_round(&mut self) {
        if self.state == SessionState::Searching && !self.round_outstanding() {
            warn!(
                "round {}: search dropped without finishing",
                self.rounds_completed + 1
            );
            self.state = SessionState::Idle;
            self.cancel = None;
        }
    }

    fn check_owned(&self, round: &RoundSearch) -> Result<()> {
        let same_cloud = ptr::eq(round.search.cloud(), Arc::as_ptr(&self.sampled));
        if self.state == SessionState::Searching && same_cloud {
            Ok(())
        } else {
            Err(ExtractionError::NoRoundInFlight)
        }
    }

    fn finalize(&mut self, round: usize, epsilon: f32, outcome: SearchOutcome) -> RoundResult {
        let plane = outcome.candidate.plane;
        if plane.is_degenerate() {
            warn!("round {}: no non-degenerate plane found", round);
        }
        if outcome.cancelled {
            warn!(
                "round {}: search cancelled after {} iterations",
                round, outcome.iterations
            );
        }

        let (inlier_idx, outlier_idx) = partition_by_plane(&self.remaining, &plane, epsilon);
        let inliers = self.remaining.select(&inlier_idx);
        let outliers = self.remaining.select(&outlier_idx);
        let inlier_ids: Vec<usize> = inlier_idx.iter().map(|&i| self.remaining_ids[i]).collect();
        let outlier_ids: Vec<usize> = outlier_idx
            .iter()
            .map(|&i| self.remaining_ids[i])
            .collect();

        // History lags one round behind so the newest inliers stay separate.
        self.processed.append(&self.previous_inliers);
        self.processed_ids.extend_from_slice(&self.previous_ids);
        self.previous_inliers = inliers.clone();
        self.previous_ids = inlier_ids.clone();

        self.remaining = outliers.clone();
        self.remaining_ids = outlier_ids.clone();
        self.rebuild_sample();

        let boundary = self.boundary(&inliers, &inlier_ids);

        self.rounds_completed += 1;
        self.state = if self.remaining.len() < 3 {
            SessionState::Exhausted
        } else {
            SessionState::Idle
        };
        info!(
            "round {}: {} inliers, {} points remaining, boundary of {} vertices",
            round,
            inliers.len(),
            outliers.len(),
            boundary.len()
        );

        RoundResult {
            round,
            plane,
            inliers,
            outliers,
            inlier_ids,
            outlier_ids,
            boundary,
            iterations: outcome.iterations,
            cancelled: outcome.cancelled,
        }
    }

    fn rebuild_sample(&mut self) {
        let n = self.remaining.len();
        let cap = self.config.sample_cap;
        self.sampled = if cap == 0 || n <= cap {
            Arc::new(self.remaining.clone())
        } else {
            let idx = bounded_sample(n, cap, &mut self.rng);
            Arc::new(self.remaining.select(&idx))
        };
        debug!("sampled cloud rebuilt: {} of {} points", self.sampled.len(), n);
    }

    fn boundary(&mut self, inliers: &PointCloud, ids: &[usize]) -> BoundaryPolygon {
        let sample = bounded_sample(inliers.len(), self.config.hull_sample_cap, &mut self.rng);
        let xy = inliers.project_xy(&sample);
        let hull = graham_scan_indices(&xy);
        BoundaryPolygon {
            vertices: hull.iter().map(|&h| inliers.point(sample[h])).collect(),
            ids: hull.iter().map(|&h| ids[sample[h]]).collect(),
        }
    }
}
