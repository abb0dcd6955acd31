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

use serde_derive::{Deserialize, Serialize};

use crate::error::{AlsError, Result};

/// Options for a training run. Deserializable from JSON, missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlsConfig {
    /// Latent dimension k.
    pub factors: usize,
    /// λ, the weight of the L2 penalty on both factor matrices.
    pub regularization: f64,
    /// α in `confidence = 1 + α * count`.
    pub confidence_scale: f64,
    pub max_iterations: usize,
    /// Minimum absolute loss decrease between iterations, 0 disables early stopping.
    pub tolerance: f64,
    pub seed: u64,
    /// Size of the worker pool for the per-row solves. Does not influence the result.
    pub num_threads: usize,
    /// Wall-clock budget, checked between iterations only.
    pub time_budget_ms: Option<u64>,
}

impl Default for AlsConfig {
    fn default() -> Self {
        AlsConfig {
            factors: 100,
            regularization: 0.01,
            confidence_scale: 1.0,
            max_iterations: 15,
            tolerance: 0.0,
            seed: 42,
            num_threads: num_cpus::get(),
            time_budget_ms: None,
        }
    }
}

impl AlsConfig {

    pub fn with_factors(mut self, factors: usize) -> Self {
        self.factors = factors;
        self
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn with_confidence_scale(mut self, confidence_scale: f64) -> Self {
        self.confidence_scale = confidence_scale;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    pub fn with_time_budget_ms(mut self, time_budget_ms: u64) -> Self {
        self.time_budget_ms = Some(time_budget_ms);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.factors == 0 {
            return invalid("factors must be greater than zero");
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return invalid("regularization must be a finite, non-negative number");
        }
        if !self.confidence_scale.is_finite() || self.confidence_scale < 0.0 {
            return invalid("confidence_scale must be a finite, non-negative number");
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be greater than zero");
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return invalid("tolerance must be a finite, non-negative number");
        }
        if self.num_threads == 0 {
            return invalid("num_threads must be greater than zero");
        }
        Ok(())
    }

    pub fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            factors: self.factors,
            regularization: self.regularization,
            confidence_scale: self.confidence_scale,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            seed: self.seed,
        }
    }
}

fn invalid(message: &str) -> Result<()> {
    Err(AlsError::Validation(message.to_string()))
}

/// The settings a model was trained with, kept alongside its factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub factors: usize,
    pub regularization: f64,
    pub confidence_scale: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Hyperparameters {

    /// Same rules as `AlsConfig::validate`, for settings that did not come from a config.
    pub fn validate(&self) -> Result<()> {
        if self.factors == 0 {
            return invalid("factors must be greater than zero");
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return invalid("regularization must be a finite, non-negative number");
        }
        if !self.confidence_scale.is_finite() || self.confidence_scale < 0.0 {
            return invalid("confidence_scale must be a finite, non-negative number");
        }
        if self.max_iterations == 0 {
            return invalid("max_iterations must be greater than zero");
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return invalid("tolerance must be a finite, non-negative number");
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {

    use super::AlsConfig;
    use crate::error::AlsError;

    fn is_validation_error(config: AlsConfig) -> bool {
        match config.validate() {
            Err(AlsError::Validation(_)) => true,
            _ => false,
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(AlsConfig::default().validate().is_ok());
        assert!(AlsConfig::default().with_regularization(0.0).with_confidence_scale(0.0)
            .validate().is_ok());
    }

    #[test]
    fn malformed_options_are_rejected() {
        assert!(is_validation_error(AlsConfig::default().with_factors(0)));
        assert!(is_validation_error(AlsConfig::default().with_regularization(-0.1)));
        assert!(is_validation_error(AlsConfig::default().with_confidence_scale(-1.0)));
        assert!(is_validation_error(AlsConfig::default().with_max_iterations(0)));
        assert!(is_validation_error(AlsConfig::default().with_tolerance(std::f64::NAN)));
        assert!(is_validation_error(AlsConfig::default().with_num_threads(0)));
    }

    #[test]
    fn hyperparameters_follow_the_same_rules() {
        assert!(AlsConfig::default().hyperparameters().validate().is_ok());

        let mut hyperparameters = AlsConfig::default().hyperparameters();
        hyperparameters.regularization = -1.0;
        assert!(hyperparameters.validate().is_err());

        let mut hyperparameters = AlsConfig::default().hyperparameters();
        hyperparameters.confidence_scale = std::f64::INFINITY;
        assert!(hyperparameters.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AlsConfig =
            serde_json::from_str(r#"{"factors": 8, "regularization": 0.5}"#).unwrap();

        assert_eq!(config.factors, 8);
        assert_eq!(config.regularization, 0.5);
        assert_eq!(config.max_iterations, AlsConfig::default().max_iterations);
        assert_eq!(config.time_budget_ms, None);
    }
}
