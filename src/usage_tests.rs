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

#[cfg(test)]
mod tests {

    use crate::{train, AlsConfig, DataDictionary, Side};

    #[test]
    fn programmatic_usage() {

        /* Our input data comprises of observed performances of artists at venues. The
           identifiers used can be strings of arbitrary length and structure. Repeated
           performances count as stronger signals. */
        let performances = vec![
            (String::from("alice"), String::from("bluenote")),
            (String::from("alice"), String::from("bluenote")),
            (String::from("alice"), String::from("roxy")),
            (String::from("bob"), String::from("bluenote")),
            (String::from("bob"), String::from("paradiso")),
            (String::from("charles"), String::from("paradiso")),
            (String::from("charles"), String::from("tivoli")),
            (String::from("dora"), String::from("roxy")),
        ];

        /* Internally, alsreco uses consecutive integer ids. The data dictionary aggregates the
           performances into counted interactions and maps string to integer identifiers. */
        let data_dict = DataDictionary::from_pairs(performances).unwrap();

        println!(
            "Found {} interactions between {} artists and {} venues.",
            data_dict.num_interactions(),
            data_dict.num_artists(),
            data_dict.num_venues(),
        );

        /* Now we factorize the interactions into latent factors for artists and venues. */
        let config = AlsConfig::default()
            .with_factors(4)            // The latent dimension
            .with_regularization(0.1)   // The L2 penalty on the factors
            .with_confidence_scale(2.0) // How much more we trust repeated performances
            .with_max_iterations(10)    // Upper bound on alternating iterations
            .with_num_threads(2);       // The number of CPUs to use for the computation

        let (model, report) = train(data_dict, &config).unwrap();

        assert_eq!(report.iterations(), 10);

        /* The model answers queries in both directions, using the original identifiers. */
        let venues_for_alice = model.recommend_for(Side::Artist, "alice", 2, true).unwrap();
        let artists_for_tivoli = model.recommend_for(Side::Venue, "tivoli", 2, true).unwrap();

        println!("Venues recommended for alice:");
        for recommendation in &venues_for_alice {
            println!("\t{} ({:.3})", recommendation.id, recommendation.score);
        }

        println!("Artists recommended for tivoli:");
        for recommendation in &artists_for_tivoli {
            println!("\t{} ({:.3})", recommendation.id, recommendation.score);
        }

        assert_eq!(venues_for_alice.len(), 2);
        assert!(venues_for_alice.iter().all(|r| r.id != "bluenote" && r.id != "roxy"));
        assert_eq!(artists_for_tivoli.len(), 2);
        assert!(artists_for_tivoli.iter().all(|r| r.id != "charles"));
    }

    #[test]
    fn every_venue_observed_means_nothing_to_recommend() {
        let events = vec![("A1", "V1"), ("A1", "V1"), ("A1", "V2"), ("A2", "V1"), ("A3", "V2")];

        let data_dict = DataDictionary::from_pairs(events).unwrap();

        let config = AlsConfig::default()
            .with_factors(2)
            .with_regularization(0.1)
            .with_confidence_scale(1.0)
            .with_max_iterations(20);

        let (model, _) = train(data_dict, &config).unwrap();

        assert_eq!(model.factors(Side::Artist).num_rows(), 3);
        assert_eq!(model.factors(Side::Artist).num_factors(), 2);
        assert_eq!(model.factors(Side::Venue).num_rows(), 2);
        assert_eq!(model.factors(Side::Venue).num_factors(), 2);

        assert!(model.recommend_for(Side::Artist, "A1", 2, true).unwrap().is_empty());

        let unfiltered = model.recommend_for(Side::Artist, "A1", 2, false).unwrap();
        assert_eq!(unfiltered.len(), 2);
        assert!(unfiltered[0].score >= unfiltered[1].score);

        let for_a2 = model.recommend_for(Side::Artist, "A2", 2, true).unwrap();
        assert_eq!(for_a2.len(), 1);
        assert_eq!(for_a2[0].id, "V2");
    }

    #[test]
    fn retraining_with_the_same_seed_is_reproducible() {
        let events = vec![("A1", "V1"), ("A1", "V2"), ("A2", "V2"), ("A3", "V3"), ("A3", "V1")];

        let config = AlsConfig::default().with_factors(3).with_max_iterations(5);

        let (model_a, report_a) =
            train(DataDictionary::from_pairs(events.clone()).unwrap(), &config).unwrap();
        let (model_b, report_b) =
            train(DataDictionary::from_pairs(events).unwrap(), &config).unwrap();

        assert_eq!(model_a, model_b);
        assert_eq!(report_a, report_b);
    }

    #[test]
    fn single_pair_with_cold_entities() {
        /* Vocabularies built elsewhere may hold entities without any interactions. */
        let data_dict = DataDictionary::with_vocabularies(
            vec!["A1", "A2"],
            vec!["V1", "V2"],
            vec![("A1", "V1")],
        ).unwrap();

        let config = AlsConfig::default()
            .with_factors(1)
            .with_regularization(0.1)
            .with_max_iterations(20);

        let (model, report) = train(data_dict, &config).unwrap();

        assert_eq!(report.skipped_artist_rows, 1);
        assert_eq!(report.skipped_venue_rows, 1);
        assert!(report.losses.iter().all(|loss| loss.is_finite()));

        let recommendations = model.recommend_for(Side::Artist, "A2", 5, true).unwrap();
        assert_eq!(recommendations.len(), 2);
    }
}
