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
use std::fmt::Debug;
use std::hash::Hash;

use fnv::FnvHashMap;

use crate::error::{AlsError, Result};
use crate::types::{Interaction, InteractionMatrix};

/// Anything usable as an external artist or venue identifier.
pub trait Identifier: Ord + Hash + Clone + Debug {}

impl<T: Ord + Hash + Clone + Debug> Identifier for T {}

/// Bijective mapping between external identifiers and dense positions `0..n`, ordered by
/// identifier so that the same set of identifiers always yields the same positions.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityIndex<T: Identifier> {
    names: Vec<T>,
    positions: FnvHashMap<T, u32>,
}

impl<T: Identifier> EntityIndex<T> {

    /// Sorts and deduplicates the identifiers.
    pub fn new<I: IntoIterator<Item=T>>(identifiers: I) -> Self {
        let mut names: Vec<T> = identifiers.into_iter().collect();
        names.sort_unstable();
        names.dedup();

        Self::from_names(names)
    }

    /// Restores an index from identifiers already in position order. They have to be strictly
    /// ascending, anything else would not be an index produced by `new`.
    pub fn from_ordered(names: Vec<T>) -> Result<Self> {
        if let Some(pair) = names.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(AlsError::Validation(format!(
                "vocabulary is not strictly ascending at {:?}", pair[1])));
        }
        Ok(Self::from_names(names))
    }

    fn from_names(names: Vec<T>) -> Self {
        let mut positions = FnvHashMap::with_capacity_and_hasher(names.len(), Default::default());

        for (position, name) in names.iter().enumerate() {
            positions.insert(name.clone(), position as u32);
        }

        EntityIndex { names, positions }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position<Q>(&self, name: &Q) -> Option<u32>
        where T: Borrow<Q>, Q: Hash + Eq + ?Sized {
        self.positions.get(name).cloned()
    }

    pub fn name(&self, position: u32) -> Option<&T> {
        self.names.get(position as usize)
    }

    pub fn names(&self) -> &[T] {
        &self.names
    }
}

/// Aggregated view of raw (artist, venue) events: both vocabularies plus one counted
/// interaction per distinct pair, sorted by (artist, venue).
#[derive(Debug, Clone)]
pub struct DataDictionary<T: Identifier> {
    artists: EntityIndex<T>,
    venues: EntityIndex<T>,
    interactions: Vec<Interaction>,
    num_events: u64,
}

impl<T: Identifier> DataDictionary<T> {

    /// Builds both vocabularies from the identifiers seen in the events.
    pub fn from_pairs<I: IntoIterator<Item=(T, T)>>(pairs: I) -> Result<Self> {

        let mut pair_counts: FnvHashMap<(T, T), u32> =
            FnvHashMap::with_capacity_and_hasher(100, Default::default());

        let mut num_events: u64 = 0;

        for pair in pairs {
            let count = pair_counts.entry(pair).or_insert(0);
            *count = count.saturating_add(1);
            num_events += 1;
        }

        if pair_counts.is_empty() {
            return Err(AlsError::EmptyDataset);
        }

        let artists = EntityIndex::new(pair_counts.keys().map(|(artist, _)| artist.clone()));
        let venues = EntityIndex::new(pair_counts.keys().map(|(_, venue)| venue.clone()));

        let mut interactions: Vec<Interaction> = pair_counts.iter()
            .filter_map(|((artist, venue), count)| {
                Some(Interaction {
                    artist: artists.position(artist)?,
                    venue: venues.position(venue)?,
                    count: *count,
                })
            })
            .collect();

        interactions.sort_unstable();

        Ok(DataDictionary { artists, venues, interactions, num_events })
    }

    /// Uses externally built vocabularies, which may contain entities without any events.
    /// Events referring to identifiers outside of the vocabularies are rejected.
    pub fn with_vocabularies<A, V, I>(artists: A, venues: V, pairs: I) -> Result<Self>
        where A: IntoIterator<Item=T>, V: IntoIterator<Item=T>, I: IntoIterator<Item=(T, T)> {

        let artists = EntityIndex::new(artists);
        let venues = EntityIndex::new(venues);

        let mut pair_counts: FnvHashMap<(u32, u32), u32> =
            FnvHashMap::with_capacity_and_hasher(100, Default::default());

        let mut num_events: u64 = 0;

        for (artist, venue) in pairs {
            let artist_position = artists.position(&artist)
                .ok_or_else(|| AlsError::NotFound(format!("artist {:?}", artist)))?;
            let venue_position = venues.position(&venue)
                .ok_or_else(|| AlsError::NotFound(format!("venue {:?}", venue)))?;

            let count = pair_counts.entry((artist_position, venue_position)).or_insert(0);
            *count = count.saturating_add(1);
            num_events += 1;
        }

        if pair_counts.is_empty() {
            return Err(AlsError::EmptyDataset);
        }

        let mut interactions: Vec<Interaction> = pair_counts.into_iter()
            .map(|((artist, venue), count)| Interaction { artist, venue, count })
            .collect();

        interactions.sort_unstable();

        Ok(DataDictionary { artists, venues, interactions, num_events })
    }

    pub fn num_artists(&self) -> usize {
        self.artists.len()
    }

    pub fn num_venues(&self) -> usize {
        self.venues.len()
    }

    /// Number of raw events read, before aggregation.
    pub fn num_events(&self) -> u64 {
        self.num_events
    }

    /// Number of distinct (artist, venue) pairs.
    pub fn num_interactions(&self) -> usize {
        self.interactions.len()
    }

    pub fn artists(&self) -> &EntityIndex<T> {
        &self.artists
    }

    pub fn venues(&self) -> &EntityIndex<T> {
        &self.venues
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn interaction_matrix(&self) -> Result<InteractionMatrix> {
        InteractionMatrix::from_interactions(
            self.num_artists(), self.num_venues(), &self.interactions)
    }

    pub fn into_vocabularies(self) -> (EntityIndex<T>, EntityIndex<T>) {
        (self.artists, self.venues)
    }
}
