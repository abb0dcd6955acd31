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

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt::Debug;
use std::hash::Hash;

use scoped_pool::Pool;
use serde_derive::Serialize;

use crate::error::{AlsError, Result};
use crate::model::Model;
use crate::stats::Identifier;
use crate::types::Side;

/// A recommended counterpart entity. Field names are used in JSON output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation<T> {
    pub id: T,
    pub score: f64,
}

/// Candidate for the top-k selection via a binary heap.
#[derive(PartialEq, Debug, Clone, Copy)]
struct ScoredItem {
    position: u32,
    score: f64,
}

/// Better candidates compare as smaller: higher score first, lower position on ties. This way
/// the top of the max-heap is always the weakest candidate kept so far. There is no total order
/// on floating point numbers, incomparable scores fall back to the position.
fn cmp_candidates(candidate_a: &ScoredItem, candidate_b: &ScoredItem) -> Ordering {
    match candidate_b.score.partial_cmp(&candidate_a.score) {
        Some(Ordering::Less) => Ordering::Less,
        Some(Ordering::Greater) => Ordering::Greater,
        Some(Ordering::Equal) | None => candidate_a.position.cmp(&candidate_b.position),
    }
}

impl Eq for ScoredItem {}

impl Ord for ScoredItem {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_candidates(self, other)
    }
}

impl PartialOrd for ScoredItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(cmp_candidates(self, other))
    }
}

/// The `k` best candidates, best first.
fn select_top_k<I: Iterator<Item=ScoredItem>>(candidates: I, k: usize) -> Vec<ScoredItem> {

    if k == 0 {
        return Vec::new();
    }

    let mut heap = BinaryHeap::with_capacity(k);

    for candidate in candidates {
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(mut top) = heap.peek_mut() {
            if candidate < *top {
                *top = candidate;
            }
        }
    }

    heap.into_sorted_vec()
}

impl<T: Identifier> Model<T> {

    /// Scores every counterpart of the entity at `position` by the dot product of their latent
    /// factors. With `exclude_observed`, counterparts the entity already interacted with are
    /// never returned. Returns at most `top_k` results ordered by descending score.
    pub fn recommend(
        &self,
        side: Side,
        position: usize,
        top_k: usize,
        exclude_observed: bool,
    ) -> Result<Vec<Recommendation<T>>> {

        self.check_position(side, position)?;

        Ok(self.recommend_unchecked(side, position, top_k, exclude_observed))
    }

    /// Same as `recommend`, addressing the entity by its external identifier.
    pub fn recommend_for<Q>(
        &self,
        side: Side,
        id: &Q,
        top_k: usize,
        exclude_observed: bool,
    ) -> Result<Vec<Recommendation<T>>>
        where T: Borrow<Q>, Q: Hash + Eq + Debug + ?Sized {

        let position = self.position_of(side, id)?;
        self.recommend(side, position, top_k, exclude_observed)
    }

    /// Recommendations for every entity of a side, computed on a pool of `pool_size` threads.
    /// The outer vector is indexed by entity position.
    pub fn recommend_all(
        &self,
        side: Side,
        top_k: usize,
        exclude_observed: bool,
        pool_size: usize,
    ) -> Result<Vec<Vec<Recommendation<T>>>>
        where T: Send + Sync {

        if pool_size == 0 {
            return Err(AlsError::Validation("pool_size must be greater than zero".to_string()));
        }

        let num_entities = self.vocabulary(side).len();
        let entities_per_job = ((num_entities + pool_size * 4 - 1) / (pool_size * 4)).max(1);

        let mut recommendations: Vec<Vec<Recommendation<T>>> = vec![Vec::new(); num_entities];

        let pool = Pool::new(pool_size);

        pool.scoped(|scope| {
            for (job, entities) in recommendations.chunks_mut(entities_per_job).enumerate() {
                scope.execute(move || {
                    for (offset, recommendations_for_entity) in entities.iter_mut().enumerate() {
                        *recommendations_for_entity = self.recommend_unchecked(
                            side,
                            job * entities_per_job + offset,
                            top_k,
                            exclude_observed,
                        );
                    }
                });
            }
        });

        pool.shutdown();

        Ok(recommendations)
    }

    /// Entities of the same side with the highest cosine similarity of their latent factors.
    /// The entity itself is never part of the result.
    pub fn similar(
        &self,
        side: Side,
        position: usize,
        top_k: usize,
    ) -> Result<Vec<Recommendation<T>>> {

        self.check_position(side, position)?;

        let factors = self.factors(side);
        let norms = factors.row_norms();
        let query_norm = norms[position];
        let dot_products = factors.scores(factors.row(position));

        let candidates = dot_products.iter()
            .zip(norms.iter())
            .enumerate()
            .filter(|&(other, _)| other != position)
            .map(|(other, (&dot_product, &norm))| {
                let denominator = norm * query_norm;
                let score = if denominator > 0.0 { dot_product / denominator } else { 0.0 };
                ScoredItem { position: other as u32, score }
            });

        Ok(self.identified(side, select_top_k(candidates, top_k)))
    }

    pub fn similar_for<Q>(&self, side: Side, id: &Q, top_k: usize) -> Result<Vec<Recommendation<T>>>
        where T: Borrow<Q>, Q: Hash + Eq + Debug + ?Sized {

        let position = self.position_of(side, id)?;
        self.similar(side, position, top_k)
    }

    /// The first `n` counterpart identifiers in vocabulary order, for callers that want to
    /// answer something for entities the model does not know.
    pub fn fallback(&self, side: Side, n: usize) -> Vec<T> {
        self.vocabulary(side.counterpart()).names().iter().take(n).cloned().collect()
    }

    fn recommend_unchecked(
        &self,
        side: Side,
        position: usize,
        top_k: usize,
        exclude_observed: bool,
    ) -> Vec<Recommendation<T>> {

        let counterpart = side.counterpart();
        let observed = self.interactions().view(side);
        let scores = self.factors(counterpart).scores(self.factors(side).row(position));

        let candidates = scores.iter()
            .enumerate()
            .map(|(other, &score)| ScoredItem { position: other as u32, score })
            .filter(|candidate| !(exclude_observed && observed.contains(position, candidate.position)));

        self.identified(counterpart, select_top_k(candidates, top_k))
    }

    fn identified(&self, side: Side, scored_items: Vec<ScoredItem>) -> Vec<Recommendation<T>> {
        let vocabulary = self.vocabulary(side);

        scored_items.into_iter()
            .filter_map(|scored_item| {
                vocabulary.name(scored_item.position)
                    .map(|id| Recommendation { id: id.clone(), score: scored_item.score })
            })
            .collect()
    }

    fn check_position(&self, side: Side, position: usize) -> Result<()> {
        if position >= self.vocabulary(side).len() {
            return Err(AlsError::NotFound(format!("{} at position {}", side, position)));
        }
        Ok(())
    }

    fn position_of<Q>(&self, side: Side, id: &Q) -> Result<usize>
        where T: Borrow<Q>, Q: Hash + Eq + Debug + ?Sized {

        self.vocabulary(side)
            .position(id)
            .map(|position| position as usize)
            .ok_or_else(|| AlsError::NotFound(format!("{} {:?}", side, id)))
    }
}
