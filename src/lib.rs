//! League of Legends match prediction features
//!
//! Point-in-time feature pipeline: per-team daily statistics and a fixture
//! list go in, a leakage-free, order-invariant feature table comes out.

pub mod data;
pub mod features;
pub mod predict;
pub mod training;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::data::store::DEFAULT_METRICS;
use crate::features::split::ValidationWindow;

/// A scheduled or played match between two teams of the same league
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub team_a: String,
    pub team_b: String,
    pub league: String,
    pub date: NaiveDate,
    /// 1 if team A won, 0 if team B won, None for upcoming matches
    pub team_a_win: Option<u8>,
}

impl Fixture {
    /// Create an upcoming fixture with no result
    pub fn new(team_a: &str, team_b: &str, league: &str, date: NaiveDate) -> Self {
        Fixture {
            team_a: team_a.to_string(),
            team_b: team_b.to_string(),
            league: league.to_string(),
            date,
            team_a_win: None,
        }
    }

    /// Attach a result to the fixture
    pub fn with_result(mut self, team_a_won: bool) -> Self {
        self.team_a_win = Some(u8::from(team_a_won));
        self
    }

    /// Same fixture seen from the other side: teams swapped, label flipped
    pub fn mirrored(&self) -> Self {
        Fixture {
            team_a: self.team_b.clone(),
            team_b: self.team_a.clone(),
            league: self.league.clone(),
            date: self.date,
            team_a_win: self.team_a_win.map(|w| 1 - w),
        }
    }

    /// Returns the winning team name, if the result is known
    pub fn winner(&self) -> Option<&str> {
        match self.team_a_win {
            Some(1) => Some(&self.team_a),
            Some(_) => Some(&self.team_b),
            None => None,
        }
    }
}

impl fmt::Display for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vs {} ({}, {})",
            self.team_a, self.team_b, self.league, self.date
        )
    }
}

/// Classifier output for a single fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub team_a: String,
    pub team_b: String,
    pub league: String,
    pub date: NaiveDate,
    pub team_a_win_prob: f64,
    pub confidence: ConfidenceLevel,
}

impl Prediction {
    /// Get the predicted winner (team with >=50% win probability)
    pub fn predicted_winner(&self) -> &str {
        if self.team_a_win_prob >= 0.5 {
            &self.team_a
        } else {
            &self.team_b
        }
    }

    /// Class label for team A (1 = win, 0 = loss)
    pub fn label(&self) -> u8 {
        u8::from(self.team_a_win_prob >= 0.5)
    }
}

/// Confidence level based on how each side's statistics were resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,   // Both teams have a stable current sample
    Medium, // One team was blended with its last stable form
    Low,    // Both teams were blended
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::High => write!(f, "High"),
            ConfidenceLevel::Medium => write!(f, "Medium"),
            ConfidenceLevel::Low => write!(f, "Low"),
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum LolError {
    #[error("Team statistics are missing expected metrics: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Invalid team statistics row {line}: {message}")]
    InvalidSnapshot { line: usize, message: String },

    #[error("Duplicate statistics for {team} ({league}) on {date}")]
    DuplicateSnapshot {
        team: String,
        league: String,
        date: NaiveDate,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Insufficient history for {fixture}: {reason}")]
    InsufficientHistory { fixture: String, reason: String },

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, LolError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub schema: SchemaConfig,
    pub data: DataConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// A snapshot is trusted as-is when its GP exceeds this
    pub stable_gp_threshold: u32,
    /// Maximum games the last stable snapshot contributes to a blend
    pub stable_gp_cap: u32,
    /// Offset added to the denominator of every ratio feature
    pub ratio_epsilon: f64,
    /// Fill value for features that are still missing at the end
    pub missing_sentinel: f64,
    /// Trailing window held out for validation, e.g. "2m" or "45d"
    pub validation_window: ValidationWindow,
    /// Resolve fixtures on the rayon thread pool
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            stable_gp_threshold: 5,
            stable_gp_cap: 5,
            ratio_epsilon: 1e-6,
            missing_sentinel: -1.0,
            validation_window: ValidationWindow::Months(2),
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Metric columns every statistics row must carry (GP first)
    pub metrics: Vec<String>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        SchemaConfig {
            metrics: DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub output_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            database_path: "data/lol.db".to_string(),
            output_dir: "data/featured".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pipeline: PipelineConfig::default(),
            schema: SchemaConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LolError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| LolError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LolError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirrored_fixture() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let fixture = Fixture::new("T1", "Gen.G", "LCK", date).with_result(true);
        let mirrored = fixture.mirrored();

        assert_eq!(mirrored.team_a, "Gen.G");
        assert_eq!(mirrored.team_b, "T1");
        assert_eq!(mirrored.team_a_win, Some(0));
        assert_eq!(mirrored.winner(), Some("T1"));
        assert_eq!(mirrored.mirrored(), fixture);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();

        assert_eq!(parsed.pipeline.stable_gp_threshold, 5);
        assert_eq!(parsed.pipeline.stable_gp_cap, 5);
        assert_eq!(parsed.pipeline.validation_window, ValidationWindow::Months(2));
        assert_eq!(parsed.schema.metrics.len(), 27);
        assert_eq!(parsed.schema.metrics[0], "GP");
    }

    #[test]
    fn test_prediction_winner() {
        let prediction = Prediction {
            team_a: "G2 Esports".to_string(),
            team_b: "Fnatic".to_string(),
            league: "LEC".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            team_a_win_prob: 0.42,
            confidence: ConfidenceLevel::High,
        };
        assert_eq!(prediction.predicted_winner(), "Fnatic");
        assert_eq!(prediction.label(), 0);
    }
}
