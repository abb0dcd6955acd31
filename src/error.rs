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

use std::io;

use thiserror::Error;

use crate::types::Side;

pub type Result<T> = std::result::Result<T, AlsError>;

/// Everything that can go wrong while aggregating, training, querying or persisting.
#[derive(Debug, Error)]
pub enum AlsError {
    #[error("no interactions to train on")]
    EmptyDataset,

    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("non-finite solution for {side} row {row}")]
    NumericalInstability { side: Side, row: usize },

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("malformed interaction record: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed model document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unsupported model format version {found}, expected {expected}")]
    UnsupportedFormatVersion { found: u32, expected: u32 },
}
