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

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, DMatrixView, DVector};
use rand::Rng;
use serde_derive::{Deserialize, Serialize};

use crate::error::{AlsError, Result};

/// The two kinds of entities connected by interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Artist,
    Venue,
}

impl Side {
    pub fn counterpart(self) -> Side {
        match self {
            Side::Artist => Side::Venue,
            Side::Venue => Side::Artist,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Artist => write!(f, "artist"),
            Side::Venue => write!(f, "venue"),
        }
    }
}

impl FromStr for Side {
    type Err = AlsError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "artist" | "artists" => Ok(Side::Artist),
            "venue" | "venues" => Ok(Side::Venue),
            other => Err(AlsError::Validation(format!("unknown side '{}'", other))),
        }
    }
}

/// An aggregated, counted edge between an artist and a venue. Counts are always >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interaction {
    pub artist: u32,
    pub venue: u32,
    pub count: u32,
}

/// Compressed sparse row storage of interaction counts, column indices ascending per row.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    num_cols: usize,
    row_pointers: Vec<usize>,
    col_indices: Vec<u32>,
    values: Vec<u32>,
}

impl SparseMatrix {

    /// Buckets the (row, col, count) triples per row and sorts the columns within each row.
    /// Rejects out-of-range coordinates, zero counts and duplicate cells.
    pub fn from_triples(num_rows: usize, num_cols: usize, triples: &[(u32, u32, u32)]) -> Result<Self> {

        let mut row_pointers = vec![0_usize; num_rows + 1];

        for &(row, col, count) in triples {
            if row as usize >= num_rows || col as usize >= num_cols {
                return Err(AlsError::Validation(format!(
                    "cell ({}, {}) outside of a {}x{} matrix", row, col, num_rows, num_cols)));
            }
            if count == 0 {
                return Err(AlsError::Validation(format!("zero count in cell ({}, {})", row, col)));
            }
            row_pointers[row as usize + 1] += 1;
        }

        for row in 0..num_rows {
            row_pointers[row + 1] += row_pointers[row];
        }

        let mut insert_at = row_pointers.clone();
        let mut entries = vec![(0_u32, 0_u32); triples.len()];

        for &(row, col, count) in triples {
            let slot = &mut insert_at[row as usize];
            entries[*slot] = (col, count);
            *slot += 1;
        }

        for row in 0..num_rows {
            let row_entries = &mut entries[row_pointers[row]..row_pointers[row + 1]];
            row_entries.sort_unstable_by_key(|&(col, _)| col);

            if let Some(pair) = row_entries.windows(2).find(|pair| pair[0].0 == pair[1].0) {
                return Err(AlsError::Validation(format!(
                    "duplicate cell ({}, {})", row, pair[0].0)));
            }
        }

        let (col_indices, values) = entries.into_iter().unzip();

        Ok(SparseMatrix { num_cols, row_pointers, col_indices, values })
    }

    pub fn num_rows(&self) -> usize {
        self.row_pointers.len() - 1
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices and counts of a row.
    pub fn row(&self, row: usize) -> (&[u32], &[u32]) {
        let range = self.row_pointers[row]..self.row_pointers[row + 1];
        (&self.col_indices[range.clone()], &self.values[range])
    }

    pub fn contains(&self, row: usize, col: u32) -> bool {
        self.row(row).0.binary_search(&col).is_ok()
    }

    pub fn triples(&self) -> impl Iterator<Item=(u32, u32, u32)> + '_ {
        (0..self.num_rows()).flat_map(move |row| {
            let (cols, counts) = self.row(row);
            cols.iter().zip(counts.iter()).map(move |(&col, &count)| (row as u32, col, count))
        })
    }

    pub fn transpose(&self) -> Result<SparseMatrix> {
        let flipped: Vec<(u32, u32, u32)> = self.triples()
            .map(|(row, col, count)| (col, row, count))
            .collect();

        SparseMatrix::from_triples(self.num_cols, self.num_rows(), &flipped)
    }
}

/// Artist-major and venue-major views of the same set of interactions.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionMatrix {
    by_artist: SparseMatrix,
    by_venue: SparseMatrix,
}

impl InteractionMatrix {

    pub fn from_interactions(
        num_artists: usize,
        num_venues: usize,
        interactions: &[Interaction],
    ) -> Result<Self> {

        let triples: Vec<(u32, u32, u32)> = interactions.iter()
            .map(|interaction| (interaction.artist, interaction.venue, interaction.count))
            .collect();

        let by_artist = SparseMatrix::from_triples(num_artists, num_venues, &triples)?;
        let by_venue = by_artist.transpose()?;

        Ok(InteractionMatrix { by_artist, by_venue })
    }

    /// The view whose rows are entities of the given side.
    pub fn view(&self, side: Side) -> &SparseMatrix {
        match side {
            Side::Artist => &self.by_artist,
            Side::Venue => &self.by_venue,
        }
    }

    pub fn num_interactions(&self) -> usize {
        self.by_artist.nnz()
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.by_artist.triples()
            .map(|(artist, venue, count)| Interaction { artist, venue, count })
            .collect()
    }
}

/// Dense latent factors, one row of `num_factors` values per entity, stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorMatrix {
    num_rows: usize,
    num_factors: usize,
    data: Vec<f64>,
}

impl FactorMatrix {

    pub fn zeros(num_rows: usize, num_factors: usize) -> Self {
        FactorMatrix { num_rows, num_factors, data: vec![0.0; num_rows * num_factors] }
    }

    /// Small uniform values in [0, 0.01).
    pub fn random<R: Rng>(num_rows: usize, num_factors: usize, rng: &mut R) -> Self {
        let data = (0..num_rows * num_factors)
            .map(|_| rng.gen::<f64>() * 0.01)
            .collect();

        FactorMatrix { num_rows, num_factors, data }
    }

    pub fn from_rows(num_factors: usize, data: Vec<f64>) -> Result<Self> {
        if num_factors == 0 || data.len() % num_factors != 0 {
            return Err(AlsError::Validation(format!(
                "{} values cannot be split into rows of {} factors", data.len(), num_factors)));
        }
        Ok(FactorMatrix { num_rows: data.len() / num_factors, num_factors, data })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_factors(&self) -> usize {
        self.num_factors
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.num_factors..(row + 1) * self.num_factors]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Checks that the stored values actually describe a `num_rows` x `num_factors` matrix.
    pub fn is_well_formed(&self) -> bool {
        self.num_rows.checked_mul(self.num_factors) == Some(self.data.len())
            && self.data.iter().all(|value| value.is_finite())
    }

    /// Row-major (n x k) storage seen as a column-major (k x n) matrix.
    fn transposed_view(&self) -> DMatrixView<'_, f64> {
        DMatrixView::from_slice(&self.data, self.num_factors, self.num_rows)
    }

    /// The k x k matrix XᵗX.
    pub fn gramian(&self) -> DMatrix<f64> {
        let view = self.transposed_view();
        &view * view.transpose()
    }

    pub fn squared_norm(&self) -> f64 {
        self.data.iter().map(|value| value * value).sum()
    }

    /// Dot products of `query` with every row.
    pub fn scores(&self, query: &[f64]) -> DVector<f64> {
        let query = DVector::from_column_slice(query);
        self.transposed_view().tr_mul(&query)
    }

    pub fn row_norms(&self) -> Vec<f64> {
        (0..self.num_rows)
            .map(|row| self.row(row).iter().map(|value| value * value).sum::<f64>().sqrt())
            .collect()
    }
}
