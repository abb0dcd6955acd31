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

/// Turns raw interaction counts into implicit-feedback preferences and confidences. Applied on
/// the fly while assembling the per-row normal equations, never materialized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeighting {
    alpha: f64,
}

impl ConfidenceWeighting {

    pub fn new(alpha: f64) -> Self {
        ConfidenceWeighting { alpha }
    }

    #[inline(always)]
    pub fn preference(&self, count: u32) -> f64 {
        if count > 0 { 1.0 } else { 0.0 }
    }

    #[inline(always)]
    pub fn confidence(&self, count: u32) -> f64 {
        1.0 + self.alpha * count as f64
    }
}
