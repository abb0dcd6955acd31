/**
 * AlsReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector, DVectorView};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scoped_pool::Pool;
use tracing::{debug, warn};

use crate::config::AlsConfig;
use crate::confidence::ConfidenceWeighting;
use crate::error::{AlsError, Result};
use crate::types::{FactorMatrix, InteractionMatrix, Side, SparseMatrix};

/// Number of row chunks handed to the pool per worker thread in each half-step.
const CHUNKS_PER_THREAD: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxIterations,
    Converged,
    TimeBudgetExhausted,
}

/// What happened during a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Loss after each completed iteration.
    pub losses: Vec<f64>,
    pub stop_reason: StopReason,
    /// Artists left at their initial factors because they have no interactions.
    pub skipped_artist_rows: usize,
    /// Venues left at their initial factors because they have no interactions.
    pub skipped_venue_rows: usize,
}

impl TrainingReport {

    pub fn iterations(&self) -> usize {
        self.losses.len()
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().cloned()
    }
}

/// The alternating least squares state: both factor matrices plus the iteration counter.
pub struct Factorization<'a> {
    interactions: &'a InteractionMatrix,
    weighting: ConfidenceWeighting,
    regularization: f64,
    num_chunks: usize,
    artist_factors: FactorMatrix,
    venue_factors: FactorMatrix,
    iteration: usize,
}

impl<'a> Factorization<'a> {

    /// Seeded random initialization of both sides.
    pub fn new(interactions: &'a InteractionMatrix, config: &AlsConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);

        let by_artist = interactions.view(Side::Artist);

        let artist_factors = FactorMatrix::random(by_artist.num_rows(), config.factors, &mut rng);
        let venue_factors = FactorMatrix::random(by_artist.num_cols(), config.factors, &mut rng);

        Factorization {
            interactions,
            weighting: ConfidenceWeighting::new(config.confidence_scale),
            regularization: config.regularization,
            num_chunks: config.num_threads.max(1) * CHUNKS_PER_THREAD,
            artist_factors,
            venue_factors,
            iteration: 0,
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn factors(&self, side: Side) -> &FactorMatrix {
        match side {
            Side::Artist => &self.artist_factors,
            Side::Venue => &self.venue_factors,
        }
    }

    pub fn into_factors(self) -> (FactorMatrix, FactorMatrix) {
        (self.artist_factors, self.venue_factors)
    }

    /// Runs the artist half-step followed by the venue half-step. Each half-step returns only
    /// once all of its rows are written, the venue half-step reads the complete artist factors.
    /// Returns the number of skipped artist and venue rows.
    pub fn step(&mut self, pool: &Pool) -> Result<(usize, usize)> {

        let skipped_artists = half_step(
            pool,
            Side::Artist,
            self.interactions.view(Side::Artist),
            &self.venue_factors,
            &mut self.artist_factors,
            self.weighting,
            self.regularization,
            self.num_chunks,
        )?;

        let skipped_venues = half_step(
            pool,
            Side::Venue,
            self.interactions.view(Side::Venue),
            &self.artist_factors,
            &mut self.venue_factors,
            self.weighting,
            self.regularization,
            self.num_chunks,
        )?;

        self.iteration += 1;

        Ok((skipped_artists, skipped_venues))
    }

    /// The implicit-feedback objective over all cells, where unobserved cells carry
    /// preference 0 and confidence 1, plus the L2 penalty. The unobserved part is covered by
    /// Σ_all (u·v)² = <UᵗU, VᵗV>, so only observed cells are visited explicitly.
    pub fn loss(&self) -> f64 {

        let by_artist = self.interactions.view(Side::Artist);
        let mut loss = 0.0;

        for artist in 0..by_artist.num_rows() {
            let (venues, counts) = by_artist.row(artist);
            let artist_row = self.artist_factors.row(artist);

            for (&venue, &count) in venues.iter().zip(counts.iter()) {
                let prediction = dot(artist_row, self.venue_factors.row(venue as usize));
                let confidence = self.weighting.confidence(count);
                let error = self.weighting.preference(count) - prediction;

                loss += confidence * error * error - prediction * prediction;
            }
        }

        loss += self.artist_factors.gramian().dot(&self.venue_factors.gramian());
        loss += self.regularization *
            (self.artist_factors.squared_norm() + self.venue_factors.squared_norm());

        loss
    }
}

/// Trains until `max_iterations`, convergence or the time budget, whichever comes first.
/// Returns the artist factors, the venue factors and a report of the run.
pub fn fit(
    interactions: &InteractionMatrix,
    config: &AlsConfig,
) -> Result<(FactorMatrix, FactorMatrix, TrainingReport)> {

    config.validate()?;

    if interactions.num_interactions() == 0 {
        return Err(AlsError::EmptyDataset);
    }

    let pool = Pool::new(config.num_threads);
    let result = run(&pool, interactions, config);
    pool.shutdown();

    result
}

fn run(
    pool: &Pool,
    interactions: &InteractionMatrix,
    config: &AlsConfig,
) -> Result<(FactorMatrix, FactorMatrix, TrainingReport)> {

    let start = Instant::now();
    let time_budget = config.time_budget_ms.map(Duration::from_millis);

    let mut factorization = Factorization::new(interactions, config);
    let mut losses: Vec<f64> = Vec::with_capacity(config.max_iterations);
    let mut stop_reason = StopReason::MaxIterations;
    let mut skipped = (0, 0);

    while factorization.iteration() < config.max_iterations {

        if let Some(budget) = time_budget {
            if factorization.iteration() > 0 && start.elapsed() >= budget {
                stop_reason = StopReason::TimeBudgetExhausted;
                break;
            }
        }

        let iteration_start = Instant::now();

        skipped = factorization.step(pool)?;
        let loss = factorization.loss();

        debug!(
            iteration = factorization.iteration(),
            loss,
            elapsed_ms = iteration_start.elapsed().as_millis() as u64,
            "Finished iteration"
        );

        let previous_loss = losses.last().cloned();
        losses.push(loss);

        if let Some(previous_loss) = previous_loss {
            if has_converged(previous_loss, loss, config.tolerance) {
                stop_reason = StopReason::Converged;
                break;
            }
        }
    }

    let (skipped_artist_rows, skipped_venue_rows) = skipped;

    if skipped_artist_rows > 0 || skipped_venue_rows > 0 {
        warn!(
            skipped_artist_rows,
            skipped_venue_rows,
            "Rows without interactions kept their initial factors"
        );
    }

    let (artist_factors, venue_factors) = factorization.into_factors();

    let report = TrainingReport { losses, stop_reason, skipped_artist_rows, skipped_venue_rows };

    Ok((artist_factors, venue_factors, report))
}

/// The loss decreased by less than `tolerance` in absolute terms. A zero tolerance never
/// converges.
fn has_converged(previous_loss: f64, loss: f64, tolerance: f64) -> bool {
    tolerance > 0.0 && previous_loss - loss < tolerance
}

/// Recomputes every row of `solved` with `fixed` held constant. Rows are processed in chunks on
/// the pool, each job owning a disjoint slice of `solved`. Returns the number of rows skipped
/// for lack of observations.
#[allow(clippy::too_many_arguments)]
fn half_step(
    pool: &Pool,
    side: Side,
    observations: &SparseMatrix,
    fixed: &FactorMatrix,
    solved: &mut FactorMatrix,
    weighting: ConfidenceWeighting,
    regularization: f64,
    num_chunks: usize,
) -> Result<usize> {

    let num_factors = fixed.num_factors();
    let num_rows = observations.num_rows();

    // G + λI, must be complete before any row is solved
    let mut gramian = fixed.gramian();
    for factor in 0..num_factors {
        gramian[(factor, factor)] += regularization;
    }

    let rows_per_chunk = ((num_rows + num_chunks - 1) / num_chunks).max(1);
    let mut outcomes: Vec<Option<Result<usize>>> =
        (0..(num_rows + rows_per_chunk - 1) / rows_per_chunk).map(|_| None).collect();

    pool.scoped(|scope| {
        let chunks = solved.as_mut_slice().chunks_mut(rows_per_chunk * num_factors);

        for ((chunk_index, rows), outcome) in chunks.enumerate().zip(outcomes.iter_mut()) {

            let reference_to_gramian = &gramian;

            scope.execute(move || {
                *outcome = Some(solve_rows(
                    side,
                    chunk_index * rows_per_chunk,
                    rows,
                    observations,
                    fixed,
                    reference_to_gramian,
                    weighting,
                ));
            });
        }
    });

    let mut skipped = 0;
    for outcome in outcomes.into_iter().flatten() {
        skipped += outcome?;
    }

    Ok(skipped)
}

fn solve_rows(
    side: Side,
    first_row: usize,
    rows: &mut [f64],
    observations: &SparseMatrix,
    fixed: &FactorMatrix,
    gramian: &DMatrix<f64>,
    weighting: ConfidenceWeighting,
) -> Result<usize> {

    let mut skipped = 0;

    for (offset, factors) in rows.chunks_mut(fixed.num_factors()).enumerate() {
        let row = first_row + offset;
        let (cols, counts) = observations.row(row);

        if cols.is_empty() {
            skipped += 1;
            continue;
        }

        let solution = solve_row(cols, counts, fixed, gramian, weighting)
            .ok_or(AlsError::NumericalInstability { side, row })?;

        factors.copy_from_slice(solution.as_slice());
    }

    Ok(skipped)
}

/// Solves (G + λI + Σ (c - 1) v vᵗ) x = Σ c p v for a single row via Cholesky. `None` if the
/// system is not positive definite or the solution is not finite.
fn solve_row(
    cols: &[u32],
    counts: &[u32],
    fixed: &FactorMatrix,
    gramian: &DMatrix<f64>,
    weighting: ConfidenceWeighting,
) -> Option<DVector<f64>> {

    let num_factors = fixed.num_factors();

    let mut lhs = gramian.clone();
    let mut rhs = DVector::zeros(num_factors);

    for (&col, &count) in cols.iter().zip(counts.iter()) {
        let other = DVectorView::from_slice(fixed.row(col as usize), num_factors);
        let confidence = weighting.confidence(count);

        lhs.ger(confidence - 1.0, &other, &other, 1.0);
        rhs.axpy(confidence * weighting.preference(count), &other, 1.0);
    }

    let solution = lhs.cholesky()?.solve(&rhs);

    if solution.iter().all(|value| value.is_finite()) {
        Some(solution)
    } else {
        None
    }
}

#[inline(always)]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
