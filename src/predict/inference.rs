//! Fixture scoring

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::dataset::{build_prediction, PredictionDataset};
use crate::data::store::TeamStatsStore;
use crate::features::{DroppedFixture, FeatureTable, JoinDiagnostics};
use crate::{ConfidenceLevel, Fixture, LolError, PipelineConfig, Prediction, Result};

/// Anything that maps one feature row to P(team A wins)
pub trait Classifier {
    /// `features` follows the order of `columns` (`diff_*` then `ratio_*`)
    fn predict_proba(&self, features: &[f64], columns: &[String]) -> Result<f64>;
}

/// Logistic regression over named feature columns, stored as JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogisticModel {
    pub bias: f64,
    /// Columns without a weight contribute nothing
    pub weights: HashMap<String, f64>,
}

impl LogisticModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

impl Classifier for LogisticModel {
    fn predict_proba(&self, features: &[f64], columns: &[String]) -> Result<f64> {
        if features.len() != columns.len() {
            return Err(LolError::Parse(format!(
                "{} feature values for {} columns",
                features.len(),
                columns.len()
            )));
        }
        let logit = columns
            .iter()
            .zip(features)
            .filter_map(|(column, x)| self.weights.get(column).map(|w| w * x))
            .sum::<f64>()
            + self.bias;
        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}

/// Scored fixtures from one batch, with what the join left out
#[derive(Debug, Clone)]
pub struct PredictionBatch {
    pub predictions: Vec<Prediction>,
    pub diagnostics: JoinDiagnostics,
    pub dropped: Vec<DroppedFixture>,
}

/// Predictor for upcoming fixtures
pub struct Predictor<'a, C> {
    store: &'a TeamStatsStore,
    classifier: C,
    config: PipelineConfig,
}

impl<'a, C: Classifier> Predictor<'a, C> {
    pub fn new(store: &'a TeamStatsStore, classifier: C, config: PipelineConfig) -> Self {
        Predictor {
            store,
            classifier,
            config,
        }
    }

    /// Predict a single fixture
    ///
    /// Unlike a batch, a fixture without usable history is an error here.
    pub fn predict(
        &self,
        team_a: &str,
        team_b: &str,
        league: &str,
        date: NaiveDate,
    ) -> Result<Prediction> {
        let fixture = Fixture::new(team_a, team_b, league, date);
        let mut batch = self.predict_many(std::slice::from_ref(&fixture))?;
        match batch.predictions.pop() {
            Some(prediction) => Ok(prediction),
            None => Err(insufficient_history(&fixture, batch.dropped.first())),
        }
    }

    /// Predict a batch of fixtures; ones without enough history are dropped and counted
    pub fn predict_many(&self, fixtures: &[Fixture]) -> Result<PredictionBatch> {
        let dataset = build_prediction(self.store, fixtures, &self.config, self.store.schema())?;
        let predictions = self.score(&dataset)?;
        Ok(PredictionBatch {
            predictions,
            diagnostics: dataset.diagnostics,
            dropped: dataset.dropped,
        })
    }

    /// Run the classifier over every row of a prediction dataset
    pub fn score(&self, dataset: &PredictionDataset) -> Result<Vec<Prediction>> {
        let columns = dataset.features.column_names();
        dataset
            .matrix()
            .iter()
            .zip(&dataset.features.rows)
            .zip(&dataset.joined.rows)
            .map(|((values, row), joined)| {
                Ok(Prediction {
                    team_a: row.team_a.clone(),
                    team_b: row.team_b.clone(),
                    league: row.league.clone(),
                    date: row.date,
                    team_a_win_prob: self.classifier.predict_proba(values, &columns)?,
                    confidence: compute_confidence(joined.blended_sides()),
                })
            })
            .collect()
    }
}

/// Filled feature row for one fixture, with its confidence
pub fn fixture_features(
    store: &TeamStatsStore,
    config: &PipelineConfig,
    fixture: &Fixture,
) -> Result<(FeatureTable, ConfidenceLevel)> {
    let dataset = build_prediction(store, std::slice::from_ref(fixture), config, store.schema())?;
    match dataset.joined.rows.first() {
        Some(row) => {
            let confidence = compute_confidence(row.blended_sides());
            Ok((dataset.features, confidence))
        }
        None => Err(insufficient_history(fixture, dataset.dropped.first())),
    }
}

fn insufficient_history(fixture: &Fixture, dropped: Option<&DroppedFixture>) -> LolError {
    LolError::InsufficientHistory {
        fixture: fixture.to_string(),
        reason: dropped.map_or_else(|| "not joined".to_string(), DroppedFixture::reason),
    }
}

fn compute_confidence(blended_sides: usize) -> ConfidenceLevel {
    match blended_sides {
        0 => ConfidenceLevel::High,
        1 => ConfidenceLevel::Medium,
        _ => ConfidenceLevel::Low,
    }
}

/// Format a prediction for display
pub fn format_prediction(pred: &Prediction) -> String {
    let win_prob = if pred.team_a_win_prob >= 0.5 {
        pred.team_a_win_prob
    } else {
        1.0 - pred.team_a_win_prob
    };

    format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} vs {}  ({}, {})
├─────────────────────────────────────────────────┤
│  Predicted winner: {} {:.1}%
│  Confidence:       {}
└─────────────────────────────────────────────────┘
"#,
        pred.team_a,
        pred.team_b,
        pred.league,
        pred.date,
        pred.predicted_winner(),
        win_prob * 100.0,
        pred.confidence
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::{MetricSchema, TeamStatsSnapshot};

    struct WinrateEdge;

    impl Classifier for WinrateEdge {
        fn predict_proba(&self, features: &[f64], columns: &[String]) -> Result<f64> {
            let idx = columns
                .iter()
                .position(|c| c == "diff_winrate%")
                .ok_or_else(|| LolError::Parse("no winrate column".to_string()))?;
            Ok((0.5 + features[idx]).clamp(0.0, 1.0))
        }
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn store() -> TeamStatsStore {
        let schema = MetricSchema::new(vec!["GP".to_string(), "winrate%".to_string()]).unwrap();
        let snap = |team: &str, date, gp, winrate| TeamStatsSnapshot {
            team: team.to_string(),
            league: "LCK".to_string(),
            date,
            values: vec![Some(gp), Some(winrate)],
        };
        TeamStatsStore::from_snapshots(
            schema,
            vec![
                snap("T1", day(1, 1), 8.0, 0.75),
                snap("T1", day(2, 1), 2.0, 0.5),
                snap("Gen.G", day(1, 20), 9.0, 0.5),
                snap("DRX", day(1, 20), 3.0, 0.3),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_predict_direct() {
        let store = store();
        let predictor = Predictor::new(&store, WinrateEdge, PipelineConfig::default());
        let pred = predictor.predict("Gen.G", "T1", "LCK", day(1, 25)).unwrap();

        assert!((pred.team_a_win_prob - 0.25).abs() < 1e-9);
        assert_eq!(pred.predicted_winner(), "T1");
        assert_eq!(pred.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn test_predict_blended_lowers_confidence() {
        let store = store();
        let predictor = Predictor::new(&store, WinrateEdge, PipelineConfig::default());
        let pred = predictor.predict("T1", "Gen.G", "LCK", day(2, 5)).unwrap();

        // T1: (0.5*2 + 0.75*5) / 7
        let t1 = (0.5 * 2.0 + 0.75 * 5.0) / 7.0;
        assert!((pred.team_a_win_prob - (0.5 + t1 - 0.5)).abs() < 1e-9);
        assert_eq!(pred.confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_insufficient_history() {
        let store = store();
        let predictor = Predictor::new(&store, WinrateEdge, PipelineConfig::default());

        match predictor.predict("DRX", "Gen.G", "LCK", day(2, 5)) {
            Err(LolError::InsufficientHistory { reason, .. }) => {
                assert!(reason.contains("DRX"));
                assert!(!reason.contains("Gen.G"));
            }
            other => panic!("expected insufficient history, got {:?}", other),
        }

        let unknown = Fixture::new("Gen.G", "KT", "LCK", day(2, 5));
        match fixture_features(&store, &PipelineConfig::default(), &unknown) {
            Err(LolError::InsufficientHistory { reason, .. }) => {
                assert_eq!(reason, "KT has no prior statistics");
            }
            other => panic!("expected insufficient history, got {:?}", other),
        }
    }

    #[test]
    fn test_predict_many_scores_joinable_fixtures_in_order() {
        let store = store();
        let predictor = Predictor::new(&store, WinrateEdge, PipelineConfig::default());

        let batch = predictor
            .predict_many(&[
                Fixture::new("Gen.G", "T1", "LCK", day(1, 25)),
                // Nothing before January 10 for Gen.G
                Fixture::new("T1", "Gen.G", "LCK", day(1, 10)),
                Fixture::new("T1", "Gen.G", "LCK", day(2, 5)),
            ])
            .unwrap();

        assert_eq!(batch.predictions.len(), 2);
        assert_eq!(batch.predictions[0].team_a, "Gen.G");
        assert_eq!(batch.predictions[0].confidence, ConfidenceLevel::High);
        assert_eq!(batch.predictions[1].date, day(2, 5));
        assert_eq!(batch.predictions[1].confidence, ConfidenceLevel::Medium);
        assert_eq!(batch.diagnostics.fixtures, 3);
        assert_eq!(batch.diagnostics.missing_b, 1);
        assert_eq!(batch.dropped.len(), 1);
        assert_eq!(batch.dropped[0].fixture.date, day(1, 10));
    }

    #[test]
    fn test_single_prediction_matches_batch() {
        let store = store();
        let predictor = Predictor::new(&store, WinrateEdge, PipelineConfig::default());
        let fixture = Fixture::new("T1", "Gen.G", "LCK", day(2, 5));

        let single = predictor.predict("T1", "Gen.G", "LCK", day(2, 5)).unwrap();
        let dataset = build_prediction(
            &store,
            std::slice::from_ref(&fixture),
            &PipelineConfig::default(),
            store.schema(),
        )
        .unwrap();
        let scored = predictor.score(&dataset).unwrap();

        assert_eq!(scored, vec![single]);
        let (features, confidence) =
            fixture_features(&store, &PipelineConfig::default(), &fixture).unwrap();
        assert_eq!(features, dataset.features);
        assert_eq!(confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_logistic_model() {
        let model = LogisticModel {
            bias: 0.0,
            weights: HashMap::from([("diff_winrate%".to_string(), 2.0)]),
        };
        let columns = vec!["diff_GP".to_string(), "diff_winrate%".to_string()];

        let even = model.predict_proba(&[5.0, 0.0], &columns).unwrap();
        assert!((even - 0.5).abs() < 1e-12);
        let ahead = model.predict_proba(&[0.0, 0.5], &columns).unwrap();
        assert!((ahead - 1.0 / (1.0 + (-1.0f64).exp())).abs() < 1e-12);
        assert!(model.predict_proba(&[1.0], &columns).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model.save(&path).unwrap();
        let loaded = LogisticModel::load(&path).unwrap();
        assert_eq!(loaded.weights.get("diff_winrate%"), Some(&2.0));
    }
}
