//! Training and prediction datasets
//!
//! Runs the feature pipeline end to end: schema check, point-in-time join,
//! temporal split, mirroring of the training partition, diff/ratio features
//! and the final missing-value fill.

use crate::data::export::{save_features, save_joined, FeatureLayout};
use crate::data::store::{MetricSchema, TeamStatsStore};
use crate::features::{
    mirror, BlendPolicy, DiffRatioTransformer, DroppedFixture, FeatureTable, JoinDiagnostics,
    JoinedTable, MatchJoiner, TemporalSplitter,
};
use crate::{Fixture, PipelineConfig, Result};
use chrono::NaiveDate;
use std::path::Path;

/// Labelled train and validation feature tables
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Mirrored training rows, filled
    pub train: FeatureTable,
    /// Validation rows, filled, never mirrored
    pub val: FeatureTable,
    /// Joined rows before the split
    pub joined: JoinedTable,
    pub validation_start: Option<NaiveDate>,
    pub diagnostics: JoinDiagnostics,
}

impl TrainingDataset {
    /// Write `data.csv`, `train.csv` and `val.csv` into `dir`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        save_joined(&self.joined, dir.join("data.csv"))?;
        save_features(&self.train, dir.join("train.csv"), FeatureLayout::TRAINING)?;
        save_features(&self.val, dir.join("val.csv"), FeatureLayout::TRAINING)?;
        Ok(())
    }
}

/// Unlabelled features for upcoming fixtures
#[derive(Debug, Clone)]
pub struct PredictionDataset {
    pub features: FeatureTable,
    /// Joined rows, aligned with `features.rows`
    pub joined: JoinedTable,
    pub diagnostics: JoinDiagnostics,
    /// Fixtures that could not be scored
    pub dropped: Vec<DroppedFixture>,
}

impl PredictionDataset {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Classifier input: feature columns only, no date or teams
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.features.matrix()
    }
}

fn joiner(config: &PipelineConfig) -> MatchJoiner {
    MatchJoiner::new(BlendPolicy::from(config)).parallel(config.parallel)
}

/// Build labelled train/val tables from played fixtures
///
/// Fails before any fixture is touched if the store lacks an expected metric.
pub fn build_training(
    store: &TeamStatsStore,
    fixtures: &[Fixture],
    config: &PipelineConfig,
    expected: &MetricSchema,
) -> Result<TrainingDataset> {
    let store = store.project(expected)?;

    let labelled: Vec<Fixture> = fixtures
        .iter()
        .filter(|f| f.team_a_win.is_some())
        .cloned()
        .collect();
    if labelled.len() < fixtures.len() {
        log::info!(
            "Skipping {} fixtures without a result",
            fixtures.len() - labelled.len()
        );
    }

    let (joined, diagnostics) = joiner(config).join(&labelled, &store);
    if joined.is_empty() {
        log::warn!("No fixtures could be joined with team statistics");
    }

    let split = TemporalSplitter::new(config.validation_window).split(&joined);
    let transformer = DiffRatioTransformer::new(config.ratio_epsilon);

    let train = transformer.transform(&mirror(&split.train));
    let val = transformer.transform(&split.val);
    log::debug!(
        "Filling {} missing training cells and {} missing validation cells",
        train.missing_count(),
        val.missing_count()
    );

    Ok(TrainingDataset {
        train: train.fill_missing(config.missing_sentinel),
        val: val.fill_missing(config.missing_sentinel),
        joined,
        validation_start: split.validation_start,
        diagnostics,
    })
}

/// Build features for fixtures to be scored; any results present are ignored
pub fn build_prediction(
    store: &TeamStatsStore,
    fixtures: &[Fixture],
    config: &PipelineConfig,
    expected: &MetricSchema,
) -> Result<PredictionDataset> {
    let store = store.project(expected)?;

    let unlabelled: Vec<Fixture> = fixtures
        .iter()
        .map(|f| Fixture {
            team_a_win: None,
            ..f.clone()
        })
        .collect();

    let (joined, diagnostics, dropped) = joiner(config).join_with_dropped(&unlabelled, &store);
    let features = DiffRatioTransformer::new(config.ratio_epsilon)
        .transform(&joined)
        .fill_missing(config.missing_sentinel);

    Ok(PredictionDataset {
        features,
        joined,
        diagnostics,
        dropped,
    })
}
