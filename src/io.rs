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

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};

use crate::config::Hyperparameters;
use crate::error::{AlsError, Result};
use crate::model::Model;
use crate::recommend::Recommendation;
use crate::stats::{EntityIndex, Identifier};
use crate::types::{FactorMatrix, Interaction, InteractionMatrix, Side};

/// Version tag of the persisted model layout.
pub const FORMAT_VERSION: u32 = 1;

/// Reads a CSV input file. We expect NO headers, and an artist-venue tuple per line
/// with tab separation.
pub fn csv_reader<P: AsRef<Path>>(path: P) -> Result<csv::Reader<File>> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_path(path)?;

    Ok(reader)
}

/// The (artist, venue) pairs of a reader, failing on the first malformed record.
pub fn interactions_from_csv<'a, R>(
    reader: &'a mut csv::Reader<R>
) -> impl Iterator<Item=Result<(String, String)>> + 'a
    where R: io::Read {

    reader.deserialize::<(String, String)>()
        .map(|record| record.map_err(AlsError::from))
}

/// Persisted layout of a model, written by `save_model`.
#[derive(Serialize)]
struct ModelDocumentRef<'a, T> {
    format_version: u32,
    hyperparameters: &'a Hyperparameters,
    artists: &'a [T],
    venues: &'a [T],
    artist_factors: &'a FactorMatrix,
    venue_factors: &'a FactorMatrix,
    interactions: Vec<Interaction>,
}

#[derive(Deserialize)]
struct ModelDocument<T> {
    format_version: u32,
    hyperparameters: Hyperparameters,
    artists: Vec<T>,
    venues: Vec<T>,
    artist_factors: FactorMatrix,
    venue_factors: FactorMatrix,
    interactions: Vec<Interaction>,
}

pub fn write_model<T, W>(model: &Model<T>, writer: W) -> Result<()>
    where T: Identifier + serde::Serialize, W: Write {

    let document = ModelDocumentRef {
        format_version: FORMAT_VERSION,
        hyperparameters: model.hyperparameters(),
        artists: model.vocabulary(Side::Artist).names(),
        venues: model.vocabulary(Side::Venue).names(),
        artist_factors: model.factors(Side::Artist),
        venue_factors: model.factors(Side::Venue),
        interactions: model.interactions().interactions(),
    };

    serde_json::to_writer(writer, &document)?;

    Ok(())
}

pub fn read_model<T, R>(reader: R) -> Result<Model<T>>
    where T: Identifier + DeserializeOwned, R: Read {

    let document: ModelDocument<T> = serde_json::from_reader(reader)?;

    if document.format_version != FORMAT_VERSION {
        return Err(AlsError::UnsupportedFormatVersion {
            found: document.format_version,
            expected: FORMAT_VERSION,
        });
    }

    document.hyperparameters.validate()?;

    let artists = EntityIndex::from_ordered(document.artists)?;
    let venues = EntityIndex::from_ordered(document.venues)?;
    let interactions = InteractionMatrix::from_interactions(
        artists.len(), venues.len(), &document.interactions)?;

    Model::new(
        document.hyperparameters,
        artists,
        venues,
        document.artist_factors,
        document.venue_factors,
        interactions,
    )
}

pub fn save_model<T, P>(model: &Model<T>, path: P) -> Result<()>
    where T: Identifier + serde::Serialize, P: AsRef<Path> {

    let mut writer = BufWriter::new(File::create(path)?);
    write_model(model, &mut writer)?;
    writer.flush()?;

    Ok(())
}

pub fn load_model<T, P>(path: P) -> Result<Model<T>>
    where T: Identifier + DeserializeOwned, P: AsRef<Path> {

    read_model(BufReader::new(File::open(path)?))
}

/// Struct used for JSON serialization of computed recommendations. Field names will be used
/// in JSON.
#[derive(Serialize)]
struct Recommendations<'a, T> {
    #[serde(rename = "for")]
    for_entity: &'a T,
    recommendations: &'a [Recommendation<T>],
}

/// Struct used for JSON serialization of fallback proposals for unknown entities.
#[derive(Serialize)]
struct Fallback<'a, T, Q: ?Sized> {
    #[serde(rename = "for")]
    for_entity: &'a Q,
    fallback: &'a [T],
}

fn output(output_path: Option<&str>) -> Result<Box<dyn Write>> {
    let out: Box<dyn Write> = match output_path {
        Some(path) => Box::new(BufWriter::new(File::create(Path::new(path))?)),
        _ => Box::new(BufWriter::new(io::stdout())),
    };
    Ok(out)
}

/// Output the computed recommendations as JSON lines, one line per entity, using the original
/// identifiers. If an `output_path` is supplied, we write to a file at the specified path,
/// otherwise, we output to stdout.
pub fn write_recommendations<'a, T, I>(recommendations: I, output_path: Option<&str>) -> Result<()>
    where T: serde::Serialize + 'a, I: IntoIterator<Item=(&'a T, &'a [Recommendation<T>])> {

    let mut out = output(output_path)?;

    for (for_entity, recommendations) in recommendations {
        serde_json::to_writer(&mut out, &Recommendations { for_entity, recommendations })?;
        writeln!(out)?;
    }

    out.flush()?;

    Ok(())
}

pub fn write_fallback<T, Q>(for_entity: &Q, fallback: &[T], output_path: Option<&str>) -> Result<()>
    where T: serde::Serialize, Q: serde::Serialize + ?Sized {

    let mut out = output(output_path)?;

    serde_json::to_writer(&mut out, &Fallback { for_entity, fallback })?;
    writeln!(out)?;
    out.flush()?;

    Ok(())
}


#[cfg(test)]
mod tests {

    use std::fs;
    use std::io::Cursor;

    use tempfile::TempDir;

    use super::*;
    use crate::config::AlsConfig;
    use crate::stats::DataDictionary;

    fn trained_model() -> Model<String> {
        let events = vec![
            ("a1", "v1"), ("a1", "v1"), ("a1", "v2"), ("a2", "v1"), ("a3", "v2"),
            ("a3", "v3"), ("a4", "v3"), ("a4", "v4"), ("a2", "v4"),
        ];

        let data_dict = DataDictionary::from_pairs(events.into_iter()
            .map(|(artist, venue)| (artist.to_string(), venue.to_string()))).unwrap();

        let config = AlsConfig::default()
            .with_factors(2)
            .with_regularization(0.1)
            .with_max_iterations(5)
            .with_num_threads(1);

        crate::train(data_dict, &config).unwrap().0
    }

    #[test]
    fn reads_tab_separated_pairs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("interactions.tsv");
        fs::write(&path, "a1\tv1\na1\tv2\na2\tv1\n").unwrap();

        let mut reader = csv_reader(&path).unwrap();
        let pairs: Vec<(String, String)> =
            interactions_from_csv(&mut reader).collect::<Result<_>>().unwrap();

        assert_eq!(pairs, vec![
            ("a1".to_string(), "v1".to_string()),
            ("a1".to_string(), "v2".to_string()),
            ("a2".to_string(), "v1".to_string()),
        ]);
    }

    #[test]
    fn malformed_records_are_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("interactions.tsv");
        fs::write(&path, "a1\tv1\na2\n").unwrap();

        let mut reader = csv_reader(&path).unwrap();
        let pairs: Result<Vec<(String, String)>> = interactions_from_csv(&mut reader).collect();

        match pairs {
            Err(AlsError::Csv(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn saved_models_answer_queries_identically() {
        let model = trained_model();

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.json");

        save_model(&model, &path).unwrap();
        let loaded: Model<String> = load_model(&path).unwrap();

        assert_eq!(loaded, model);

        for side in &[Side::Artist, Side::Venue] {
            for position in 0..model.vocabulary(*side).len() {
                assert_eq!(
                    loaded.recommend(*side, position, 3, true).unwrap(),
                    model.recommend(*side, position, 3, true).unwrap());
                assert_eq!(
                    loaded.recommend(*side, position, 3, false).unwrap(),
                    model.recommend(*side, position, 3, false).unwrap());
            }
        }
    }

    #[test]
    fn other_format_versions_are_rejected() {
        let mut buffer = Vec::new();
        write_model(&trained_model(), &mut buffer).unwrap();

        let mut document: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        document["format_version"] = serde_json::json!(FORMAT_VERSION + 1);

        match read_model::<String, _>(Cursor::new(document.to_string())) {
            Err(AlsError::UnsupportedFormatVersion { found, expected }) => {
                assert_eq!(found, FORMAT_VERSION + 1);
                assert_eq!(expected, FORMAT_VERSION);
            },
            other => panic!("unexpected result {:?}", other),
        }
    }

    fn assert_rejected_as_invalid(document: &serde_json::Value) {
        match read_model::<String, _>(Cursor::new(document.to_string())) {
            Err(AlsError::Validation(_)) => {},
            other => panic!("unexpected result {:?} for {}", other, document),
        }
    }

    #[test]
    fn inconsistent_documents_are_rejected() {
        let mut buffer = Vec::new();
        write_model(&trained_model(), &mut buffer).unwrap();

        let mut document: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        document["venues"] = serde_json::json!(["v1", "v2"]);

        assert_rejected_as_invalid(&document);

        let tampered: Vec<(&str, &str, serde_json::Value)> = vec![
            ("artist_factors", "num_rows", serde_json::json!(9223372036854775807_u64)),
            ("hyperparameters", "factors", serde_json::json!(0)),
            ("hyperparameters", "regularization", serde_json::json!(-0.1)),
            ("hyperparameters", "confidence_scale", serde_json::json!(-1.0)),
        ];

        for (section, field, value) in tampered {
            let mut document: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
            document[section][field] = value;
            assert_rejected_as_invalid(&document);
        }

        match load_model::<String, _>("/this/path/does/not/exist.json") {
            Err(AlsError::Io(_)) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn recommendations_are_written_as_json_lines() {
        let model = trained_model();
        let recommendations = model.recommend_all(Side::Artist, 2, false, 2).unwrap();

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("recommendations.jsonl");
        let path = path.to_str().unwrap();

        let artists = model.vocabulary(Side::Artist).names();
        write_recommendations(
            artists.iter().zip(recommendations.iter().map(|entry| entry.as_slice())),
            Some(path),
        ).unwrap();

        let written = fs::read_to_string(path).unwrap();
        let lines: Vec<serde_json::Value> = written.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), artists.len());
        assert_eq!(lines[0]["for"], "a1");
        assert_eq!(lines[0]["recommendations"].as_array().unwrap().len(), 2);
        assert!(lines[0]["recommendations"][0]["score"].is_number());
    }
}
