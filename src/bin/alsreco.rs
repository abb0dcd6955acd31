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

use std::env;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::str::FromStr;

use getopts::{Matches, Options};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use alsreco::io;
use alsreco::{AlsConfig, AlsError, DataDictionary, Model, Side};

fn main() {

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let program = args[0].clone();

    let opts = options();

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(failure) => {
            let hint = failure.to_string();
            return print_usage_and_exit(&program, opts, Some(&hint))
        },
    };

    if matches.opt_present("h") {
        return print_usage_and_exit(&program, opts, None);
    }

    if !matches.opt_present("i") && !matches.opt_present("m") {
        return print_usage_and_exit(
            &program,
            opts,
            Some("Please specify an inputfile via --inputfile or a model via --model."),
        );
    }

    if let Err(failure) = run(&matches) {
        eprintln!("\n{}\n", failure);
        std::process::exit(1);
    }
}

fn print_usage_and_exit(
    program: &str,
    opts: Options,
    hint: Option<&str>
) {

    if let Some(hint) = hint {
        eprintln!("\n{}\n", hint);
    }

    let brief = format!("Usage: {} [options]", program);
    eprint!("{}", opts.usage(&brief));
}

fn options() -> Options {
    let mut opts = Options::new();
    opts.optopt("i", "inputfile", "Input file name. The input consists of performances of \
        artists at venues, one artist and venue pair per line, separated by a tab. If given, a \
        model is trained from it.", "PATH");
    opts.optopt("m", "model", "Model file. Written after training from an inputfile, read \
        otherwise.", "PATH");
    opts.optopt("o", "outputfile", "Output file name (optional, output will be written to stdout \
        by default).", "PATH");
    opts.optopt("s", "side", "Side to recommend for, 'artist' or 'venue' (optional, defaults \
        to artist).", "SIDE");
    opts.optopt("q", "query", "Identifier to recommend for (optional, recommends for every \
        entity of the side by default).", "ID");
    opts.optopt("n", "num-recommendations", "Number of recommendations per entity (optional, \
        defaults to 10).", "NUMBER");
    opts.optflag("", "include-observed", "Also recommend counterparts already interacted with.");
    opts.optopt("c", "config", "JSON file with training options (optional).", "PATH");
    opts.optopt("k", "factors", "Latent dimension.", "NUMBER");
    opts.optopt("l", "regularization", "L2 penalty on the factors.", "NUMBER");
    opts.optopt("a", "alpha", "Confidence scale for interaction counts.", "NUMBER");
    opts.optopt("", "iterations", "Maximum number of iterations.", "NUMBER");
    opts.optopt("", "tolerance", "Minimum absolute loss decrease, 0 disables early stopping.",
        "NUMBER");
    opts.optopt("", "seed", "Seed for the initialization.", "NUMBER");
    opts.optflag("h", "help", "Print this help menu");
    opts
}

fn run(matches: &Matches) -> Result<(), Box<dyn Error>> {

    let model = match (matches.opt_str("i"), matches.opt_str("m")) {
        (Some(interactions_path), _) => train_model(&interactions_path, matches)?,
        (None, Some(model_path)) => {
            info!("Loading model from {}", model_path);
            io::load_model(&model_path)?
        },
        (None, None) => {
            return Err("Please specify an inputfile via --inputfile or a model via --model.".into())
        },
    };

    let side: Side = matches.opt_get_default("s", Side::Artist)?;
    let n: usize = matches.opt_get_default("n", 10)?;
    let exclude_observed = !matches.opt_present("include-observed");
    let output_path = matches.opt_str("o");

    match matches.opt_str("q") {
        Some(query) => {
            match model.recommend_for(side, query.as_str(), n, exclude_observed) {
                Ok(recommendations) => {
                    io::write_recommendations(
                        vec![(&query, recommendations.as_slice())],
                        output_path.as_deref(),
                    )?;
                },
                Err(AlsError::NotFound(_)) => {
                    warn!("Unknown {} {}, answering with fallback proposals", side, query);
                    io::write_fallback(&query, &model.fallback(side, n), output_path.as_deref())?;
                },
                Err(failure) => return Err(failure.into()),
            }
        },
        None => {
            info!("Computing {} recommendations for every {}", n, side);

            let recommendations =
                model.recommend_all(side, n, exclude_observed, num_cpus::get())?;

            let entities = model.vocabulary(side).names();

            io::write_recommendations(
                entities.iter().zip(recommendations.iter().map(|entry| entry.as_slice())),
                output_path.as_deref(),
            )?;
        },
    }

    Ok(())
}

fn train_model(interactions_path: &str, matches: &Matches) -> Result<Model<String>, Box<dyn Error>> {

    let config = training_config(matches)?;
    config.validate()?;

    info!("Reading {} to aggregate interactions", interactions_path);

    let mut reader = io::csv_reader(interactions_path)?;
    let performances = io::interactions_from_csv(&mut reader).collect::<Result<Vec<_>, _>>()?;

    let data_dict = DataDictionary::from_pairs(performances)?;

    info!(
        "Found {} interactions ({} events) between {} artists and {} venues.",
        data_dict.num_interactions(),
        data_dict.num_events(),
        data_dict.num_artists(),
        data_dict.num_venues(),
    );

    let (model, report) = alsreco::train(data_dict, &config)?;

    info!(
        "Trained for {} iterations ({:?}), final loss {:?}",
        report.iterations(),
        report.stop_reason,
        report.final_loss(),
    );

    if let Some(model_path) = matches.opt_str("m") {
        info!("Writing model to {}", model_path);
        io::save_model(&model, &model_path)?;
    }

    Ok(model)
}

/// Options from the config file if any, overridden by flags.
fn training_config(matches: &Matches) -> Result<AlsConfig, Box<dyn Error>> {

    let mut config = match matches.opt_str("c") {
        Some(config_path) => {
            let config: AlsConfig =
                serde_json::from_reader(BufReader::new(File::open(config_path)?))?;
            config
        },
        None => AlsConfig::default(),
    };

    config.factors = flag_or(matches, "k", config.factors)?;
    config.regularization = flag_or(matches, "l", config.regularization)?;
    config.confidence_scale = flag_or(matches, "a", config.confidence_scale)?;
    config.max_iterations = flag_or(matches, "iterations", config.max_iterations)?;
    config.tolerance = flag_or(matches, "tolerance", config.tolerance)?;
    config.seed = flag_or(matches, "seed", config.seed)?;

    Ok(config)
}

fn flag_or<T>(matches: &Matches, name: &str, current: T) -> Result<T, Box<dyn Error>>
    where T: FromStr, T::Err: Error + 'static {

    match matches.opt_get::<T>(name) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(current),
        Err(failure) => {
            Err(format!("Problem with option '{}': {}", name, failure).into())
        },
    }
}
