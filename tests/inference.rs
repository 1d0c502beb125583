use std::fs;
use std::path::PathBuf;

use aegis_coach::config::CoachConfig;
use aegis_coach::features::{Game, VALORANT_FEATURE_NAMES, transform};
use aegis_coach::inference::{
    DEFAULT_PROBABILITY, Engine, InferenceError, Outcome, PredictError, PredictionQuality, Stage,
    predict,
};
use aegis_coach::model::{Classifier, LogisticModel, classifier_from_json, sigmoid};
use aegis_coach::roster::{MatchSnapshot, Recommendation, predict_roster};
use aegis_coach::scaler::{RobustScaler, Scaler};
use aegis_coach::stats::{FormatError, RawStatRecord};
use aegis_coach::xgboost::TreeEnsemble;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("fixture file should be readable")
}

fn fixture_engine() -> Engine {
    let scaler = RobustScaler::from_json(&read_fixture("valorant_scaler.json")).expect("scaler fixture");
    let model = TreeEnsemble::from_json(&read_fixture("valorant_model.json")).expect("model fixture");
    Engine::with_model(Game::Valorant, Box::new(scaler), Box::new(model))
}

fn scenario() -> RawStatRecord {
    RawStatRecord::new()
        .with("Kills", 25)
        .with("Deaths", 10)
        .with("Assists", 5)
        .with("Headshot %", "30%")
        .with("First Kills", 4)
        .with("First Deaths", 2)
        .with("Average Damage Per Round", 180)
}

fn valorant_names() -> Vec<String> {
    VALORANT_FEATURE_NAMES.iter().map(|n| n.to_string()).collect()
}

#[test]
fn fixture_model_scores_scenario() {
    let engine = fixture_engine();
    let p = engine.predict_raw(&scenario()).expect("scenario should score");
    // Survival_Rate scales below zero (-0.4); Deaths scales above zero (-0.2).
    assert!((p.probability - sigmoid(-0.6)).abs() < 1e-6);
    assert_eq!(p.label, Outcome::Loss);
    assert_eq!(p.confidence, 29);
    assert_eq!(p.quality, PredictionQuality::Model);
}

#[test]
fn missing_model_or_scaler_degrades() {
    let features = transform(Game::Valorant, &scenario()).unwrap();
    let scaler = RobustScaler::from_json(&read_fixture("valorant_scaler.json")).unwrap();
    let model = TreeEnsemble::from_json(&read_fixture("valorant_model.json")).unwrap();

    for p in [
        predict(&features, None, None).unwrap(),
        predict(&features, Some(&scaler), None).unwrap(),
        predict(&features, None, Some(&model)).unwrap(),
    ] {
        assert_eq!(p.probability, DEFAULT_PROBABILITY);
        assert_eq!(p.quality, PredictionQuality::Degraded);
        assert!(p.is_degraded());
    }

    let full = predict(&features, Some(&scaler), Some(&model)).unwrap();
    assert!(!full.is_degraded());
}

#[test]
fn wrong_length_is_rejected_not_truncated() {
    let engine = fixture_engine();
    let lol = transform(Game::LeagueOfLegends, &RawStatRecord::new()).unwrap();
    assert_eq!(
        engine.predict(&lol),
        Err(InferenceError::FeatureCount {
            stage: Stage::Scaler,
            expected: 11,
            actual: 6,
        })
    );
}

#[test]
fn wrong_order_is_rejected_not_reordered() {
    let features = transform(Game::Valorant, &scenario()).unwrap();
    let scaler = RobustScaler::from_json(&read_fixture("valorant_scaler.json")).unwrap();

    let mut names = valorant_names();
    names.swap(0, 1);
    let model = LogisticModel::new(names, vec![0.1; 11], 0.0).unwrap();

    match predict(&features, Some(&scaler), Some(&model)) {
        Err(InferenceError::FeatureOrder {
            stage,
            index,
            expected,
            actual,
        }) => {
            assert_eq!(stage, Stage::Classifier);
            assert_eq!(index, 0);
            assert_eq!(expected, "Headshot_Pct");
            assert_eq!(actual, "Deaths");
        }
        other => panic!("expected FeatureOrder, got {other:?}"),
    }
}

#[test]
fn unnamed_artifacts_only_check_length() {
    let features = transform(Game::Valorant, &scenario()).unwrap();
    let scaler = RobustScaler::new(Vec::new(), vec![0.0; 11], vec![1.0; 11]).unwrap();
    let model = classifier_from_json(r#"{"coeffs":[0,0,0,0,0,0,0,0,0,0,0],"intercept":1.5}"#).unwrap();
    assert_eq!(scaler.feature_names(), None);
    assert_eq!(model.feature_names(), None);

    let p = predict(&features, Some(&scaler), Some(model.as_ref())).unwrap();
    assert!((p.probability - sigmoid(1.5)).abs() < 1e-12);
}

struct Broken;

impl Classifier for Broken {
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    fn num_features(&self) -> usize {
        11
    }

    fn predict_probability(&self, _values: &[f64]) -> f64 {
        f64::NAN
    }

    fn kind(&self) -> &'static str {
        "broken"
    }
}

struct Overconfident;

impl Classifier for Overconfident {
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    fn num_features(&self) -> usize {
        11
    }

    fn predict_probability(&self, _values: &[f64]) -> f64 {
        1.3
    }

    fn kind(&self) -> &'static str {
        "overconfident"
    }
}

#[test]
fn classifier_output_is_checked_and_clamped() {
    let features = transform(Game::Valorant, &scenario()).unwrap();
    let scaler = RobustScaler::from_json(&read_fixture("valorant_scaler.json")).unwrap();

    assert_eq!(
        predict(&features, Some(&scaler), Some(&Broken)),
        Err(InferenceError::NonFiniteOutput)
    );
    let p = predict(&features, Some(&scaler), Some(&Overconfident)).unwrap();
    assert_eq!(p.probability, 1.0);
    assert_eq!(p.label, Outcome::Win);
    assert_eq!(p.confidence, 100);
}

#[test]
fn predictions_stay_in_unit_interval() {
    let engine = fixture_engine();
    for kills in (0..60).step_by(7) {
        for deaths in (0..40).step_by(5) {
            for fb in -3..=3 {
                let raw = RawStatRecord::new()
                    .with("Kills", kills)
                    .with("Deaths", deaths)
                    .with("First Kills", 3 + fb)
                    .with("First Deaths", 3)
                    .with("Headshot %", format!("{}%", kills % 50));
                let p = engine.predict_raw(&raw).unwrap();
                assert!((0.0..=1.0).contains(&p.probability));
            }
        }
    }
}

#[test]
fn format_errors_surface_through_engine() {
    let engine = fixture_engine();
    let raw = scenario().with("Headshot %", "0.3");
    assert!(matches!(
        engine.predict_raw(&raw),
        Err(PredictError::Format(FormatError::NotAPercentage { .. }))
    ));
}

#[test]
fn engine_load_selects_backend_once() {
    let config = CoachConfig {
        model_path: Some(fixture_path("valorant_model.json")),
        scaler_path: Some(fixture_path("valorant_scaler.json")),
        ..CoachConfig::default()
    };
    let engine = Engine::load(&config).expect("fixtures should load");
    assert!(!engine.is_degraded());
    assert_eq!(engine.game(), Game::Valorant);

    let config = CoachConfig {
        model_path: Some(fixture_path("no_such_model.json")),
        scaler_path: Some(fixture_path("valorant_scaler.json")),
        fallback_probability: 0.42,
        ..CoachConfig::default()
    };
    let engine = Engine::load(&config).expect("missing artifact should degrade");
    assert!(engine.is_degraded());
    let p = engine.predict_raw(&scenario()).unwrap();
    assert_eq!(p.probability, 0.42);
    assert_eq!(p.quality, PredictionQuality::Degraded);
}

#[test]
fn engine_load_rejects_corrupt_artifact() {
    let config = CoachConfig {
        // A scaler is not a model.
        model_path: Some(fixture_path("valorant_scaler.json")),
        scaler_path: Some(fixture_path("valorant_scaler.json")),
        ..CoachConfig::default()
    };
    assert!(Engine::load(&config).is_err());
}

#[test]
fn roster_scores_in_order_and_isolates_bad_lines() {
    let snapshot: MatchSnapshot =
        serde_json::from_str(&read_fixture("match_snapshot.json")).expect("snapshot should parse");
    let engine = fixture_engine();
    let reports = predict_roster(&engine, &snapshot, 0.6);

    let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Anchor", "Lurker", "Broken", "Unknown"]);

    assert_eq!(reports[0].recommendation(), Some(Recommendation::EntryFrags));

    let lurker = reports[1].prediction().unwrap();
    assert!((lurker.probability - sigmoid(0.8)).abs() < 1e-6);
    assert_eq!(reports[1].recommendation(), Some(Recommendation::SupportImpact));

    assert!(matches!(
        reports[2].outcome,
        Err(PredictError::Format(FormatError::NotAPercentage { .. }))
    ));

    // sigmoid(0.4) ~ 0.599 sits just under the support threshold.
    let unknown = reports[3].prediction().unwrap();
    assert!((unknown.probability - sigmoid(0.4)).abs() < 1e-6);
    assert_eq!(unknown.label, Outcome::Win);
    assert_eq!(reports[3].recommendation(), Some(Recommendation::EntryFrags));
    assert_eq!(reports[3].team, "Unknown");
}

#[test]
fn fitted_scaler_round_trips_through_disk() {
    let records: Vec<RawStatRecord> =
        serde_json::from_str(&read_fixture("scaler_records.json")).expect("records should parse");
    let rows: Vec<_> = records
        .iter()
        .map(|r| transform(Game::Valorant, r).unwrap())
        .collect();
    let fitted = RobustScaler::fit(Game::Valorant, &rows).unwrap();
    // Deaths: 3, 10, 14, 15, 17
    assert_eq!(fitted.center[0], 14.0);
    assert_eq!(fitted.scale[0], 5.0);

    let out = std::env::temp_dir().join(format!("aegis_scaler_{}.json", std::process::id()));
    fitted.save(&out).unwrap();
    let loaded = RobustScaler::load(&out).unwrap();
    let _ = fs::remove_file(&out);
    assert_eq!(loaded.feature_names, valorant_names());
    assert_eq!(loaded.samples, 5);
    assert_eq!(loaded.game, Some(Game::Valorant));
    for (a, b) in loaded.center.iter().zip(&fitted.center) {
        assert!((a - b).abs() < 1e-12);
    }
    for (a, b) in loaded.scale.iter().zip(&fitted.scale) {
        assert!((a - b).abs() < 1e-12);
    }
}
