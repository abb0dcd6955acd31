use std::time::Instant;

use tracing::info;

pub mod error;
pub mod stats;
pub mod types;
pub mod confidence;
pub mod config;
pub mod als;
pub mod model;
pub mod recommend;
pub mod io;
mod usage_tests;

pub use als::{StopReason, TrainingReport};
pub use config::{AlsConfig, Hyperparameters};
pub use error::{AlsError, Result};
pub use model::Model;
pub use recommend::Recommendation;
pub use stats::{DataDictionary, EntityIndex, Identifier};
pub use types::Side;

/// Factorizes the aggregated interactions into artist and venue factors. Either returns a
/// completely trained model or an error, never a partially trained one.
pub fn train<T: Identifier>(
    data_dict: DataDictionary<T>,
    config: &AlsConfig,
) -> Result<(Model<T>, TrainingReport)> {

    config.validate()?;

    let interactions = data_dict.interaction_matrix()?;

    info!(
        artists = data_dict.num_artists(),
        venues = data_dict.num_venues(),
        interactions = interactions.num_interactions(),
        factors = config.factors,
        "Training ALS model"
    );

    let training_start = Instant::now();

    let (artist_factors, venue_factors, report) = als::fit(&interactions, config)?;

    info!(
        iterations = report.iterations(),
        loss = report.final_loss().unwrap_or(std::f64::NAN),
        stop_reason = ?report.stop_reason,
        elapsed_ms = training_start.elapsed().as_millis() as u64,
        "Finished training"
    );

    let (artists, venues) = data_dict.into_vocabularies();

    let model = Model::new(
        config.hyperparameters(),
        artists,
        venues,
        artist_factors,
        venue_factors,
        interactions,
    )?;

    Ok((model, report))
}
