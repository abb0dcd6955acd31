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

use crate::config::Hyperparameters;
use crate::error::{AlsError, Result};
use crate::stats::{EntityIndex, Identifier};
use crate::types::{FactorMatrix, InteractionMatrix, Side};

/// A trained factorization. Immutable: retraining produces a new `Model`.
#[derive(Debug, Clone, PartialEq)]
pub struct Model<T: Identifier> {
    hyperparameters: Hyperparameters,
    artists: EntityIndex<T>,
    venues: EntityIndex<T>,
    artist_factors: FactorMatrix,
    venue_factors: FactorMatrix,
    interactions: InteractionMatrix,
}

impl<T: Identifier> Model<T> {

    /// Assembles a model, checking the hyperparameters and that all parts agree on the number
    /// of entities and factors.
    pub fn new(
        hyperparameters: Hyperparameters,
        artists: EntityIndex<T>,
        venues: EntityIndex<T>,
        artist_factors: FactorMatrix,
        venue_factors: FactorMatrix,
        interactions: InteractionMatrix,
    ) -> Result<Self> {

        hyperparameters.validate()?;

        check_side(Side::Artist, &artists, &artist_factors, hyperparameters.factors)?;
        check_side(Side::Venue, &venues, &venue_factors, hyperparameters.factors)?;

        let by_artist = interactions.view(Side::Artist);
        if by_artist.num_rows() != artists.len() || by_artist.num_cols() != venues.len() {
            return Err(AlsError::Validation(format!(
                "interactions of shape {}x{} do not match {} artists and {} venues",
                by_artist.num_rows(), by_artist.num_cols(), artists.len(), venues.len())));
        }

        Ok(Model { hyperparameters, artists, venues, artist_factors, venue_factors, interactions })
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    pub fn num_factors(&self) -> usize {
        self.hyperparameters.factors
    }

    pub fn vocabulary(&self, side: Side) -> &EntityIndex<T> {
        match side {
            Side::Artist => &self.artists,
            Side::Venue => &self.venues,
        }
    }

    pub fn factors(&self, side: Side) -> &FactorMatrix {
        match side {
            Side::Artist => &self.artist_factors,
            Side::Venue => &self.venue_factors,
        }
    }

    /// The interactions the model was trained on.
    pub fn interactions(&self) -> &InteractionMatrix {
        &self.interactions
    }
}

fn check_side<T: Identifier>(
    side: Side,
    vocabulary: &EntityIndex<T>,
    factors: &FactorMatrix,
    num_factors: usize,
) -> Result<()> {

    if !factors.is_well_formed() {
        return Err(AlsError::Validation(format!("{} factors are malformed", side)));
    }

    if factors.num_rows() != vocabulary.len() || factors.num_factors() != num_factors {
        return Err(AlsError::Validation(format!(
            "{} factors of shape {}x{} do not match {} entities with {} factors",
            side, factors.num_rows(), factors.num_factors(), vocabulary.len(), num_factors)));
    }

    Ok(())
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::config::AlsConfig;
    use crate::types::Interaction;

    fn parts() -> (Hyperparameters, EntityIndex<&'static str>, EntityIndex<&'static str>,
                   InteractionMatrix) {
        let hyperparameters = AlsConfig::default().with_factors(2).hyperparameters();
        let artists = EntityIndex::new(vec!["a", "b"]);
        let venues = EntityIndex::new(vec!["x", "y", "z"]);
        let interactions = InteractionMatrix::from_interactions(
            2, 3, &[Interaction { artist: 1, venue: 2, count: 1 }]).unwrap();

        (hyperparameters, artists, venues, interactions)
    }

    #[test]
    fn consistent_parts_make_a_model() {
        let (hyperparameters, artists, venues, interactions) = parts();

        let model = Model::new(hyperparameters, artists, venues,
            FactorMatrix::zeros(2, 2), FactorMatrix::zeros(3, 2), interactions).unwrap();

        assert_eq!(model.num_factors(), 2);
        assert_eq!(model.vocabulary(Side::Venue).len(), 3);
        assert_eq!(model.factors(Side::Artist).num_rows(), 2);
    }

    #[test]
    fn mismatching_shapes_are_rejected() {
        let (hyperparameters, artists, venues, interactions) = parts();
        assert!(Model::new(hyperparameters, artists, venues,
            FactorMatrix::zeros(2, 2), FactorMatrix::zeros(2, 2), interactions).is_err());

        let (hyperparameters, artists, venues, interactions) = parts();
        assert!(Model::new(hyperparameters, artists, venues,
            FactorMatrix::zeros(2, 3), FactorMatrix::zeros(3, 3), interactions).is_err());
    }

    #[test]
    fn invalid_hyperparameters_are_rejected() {
        let (mut hyperparameters, artists, venues, interactions) = parts();
        hyperparameters.factors = 0;

        match Model::new(hyperparameters, artists, venues,
            FactorMatrix::zeros(2, 2), FactorMatrix::zeros(3, 2), interactions) {
            Err(AlsError::Validation(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }
}
