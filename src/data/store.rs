//! Team statistics store
//!
//! Cumulative per-team, per-league, per-day statistics snapshots, indexed for
//! point-in-time lookups.

use crate::{LolError, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

/// Metric columns produced by the daily statistics aggregator
pub const DEFAULT_METRICS: [&str; 27] = [
    "GP", "W", "L", "K", "D", "AGT", "KD", "CKPM", "GSPD", "GD15", "FB%", "FT%", "F3T%", "PPG",
    "HLD%", "GRB%", "FD%", "DRG%", "ELD%", "FBN%", "BN%", "LNE%", "JNG%", "WPM", "CWPM", "WCPM",
    "winrate%",
];

/// Games played column, always the first metric of a schema
pub const GP: &str = "GP";

/// Ordered set of metric names shared by snapshots and derived tables
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSchema {
    names: Arc<[String]>,
}

impl MetricSchema {
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.first().map(String::as_str) != Some(GP) {
            return Err(LolError::Config(format!(
                "metric schema must start with {}",
                GP
            )));
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(LolError::Config(format!("duplicate metric {}", name)));
            }
        }
        Ok(MetricSchema {
            names: names.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Names from `expected` that this schema does not carry
    pub fn missing_from(&self, expected: &MetricSchema) -> Vec<String> {
        expected
            .names()
            .iter()
            .filter(|name| self.index_of(name).is_none())
            .cloned()
            .collect()
    }

    /// Fail with a schema error unless every expected metric is present
    pub fn ensure_covers(&self, expected: &MetricSchema) -> Result<()> {
        let missing = self.missing_from(expected);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LolError::Schema { missing })
        }
    }
}

impl Default for MetricSchema {
    fn default() -> Self {
        MetricSchema {
            names: DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Cumulative statistics for one team in one league as of one day
#[derive(Debug, Clone, PartialEq)]
pub struct TeamStatsSnapshot {
    pub team: String,
    pub league: String,
    pub date: NaiveDate,
    /// One value per schema metric; None where the metric is undefined
    pub values: Vec<Option<f64>>,
}

impl TeamStatsSnapshot {
    /// Games played so far (first schema metric)
    pub fn gp(&self) -> f64 {
        self.values.first().copied().flatten().unwrap_or(0.0)
    }
}

/// Read-only collection of snapshots indexed by league, then team
#[derive(Debug, Clone)]
pub struct TeamStatsStore {
    schema: MetricSchema,
    /// league -> team -> snapshots in ascending date order
    histories: HashMap<String, HashMap<String, Vec<TeamStatsSnapshot>>>,
    len: usize,
}

impl TeamStatsStore {
    /// Build the store, validating every snapshot against the schema
    pub fn from_snapshots(
        schema: MetricSchema,
        snapshots: Vec<TeamStatsSnapshot>,
    ) -> Result<Self> {
        let mut histories: HashMap<String, HashMap<String, Vec<TeamStatsSnapshot>>> =
            HashMap::new();
        let len = snapshots.len();

        for (idx, snapshot) in snapshots.into_iter().enumerate() {
            if snapshot.values.len() != schema.len() {
                return Err(LolError::InvalidSnapshot {
                    line: idx + 1,
                    message: format!(
                        "expected {} metrics, found {}",
                        schema.len(),
                        snapshot.values.len()
                    ),
                });
            }
            match snapshot.values[0] {
                Some(gp) if gp >= 0.0 => {}
                Some(gp) => {
                    return Err(LolError::InvalidSnapshot {
                        line: idx + 1,
                        message: format!("negative GP {} for {}", gp, snapshot.team),
                    })
                }
                None => {
                    return Err(LolError::InvalidSnapshot {
                        line: idx + 1,
                        message: format!("missing GP for {}", snapshot.team),
                    })
                }
            }

            histories
                .entry(snapshot.league.clone())
                .or_default()
                .entry(snapshot.team.clone())
                .or_default()
                .push(snapshot);
        }

        let mut non_monotonic = 0;
        for teams in histories.values_mut() {
            for history in teams.values_mut() {
                history.sort_by_key(|s| s.date);
                for pair in history.windows(2) {
                    if pair[0].date == pair[1].date {
                        return Err(LolError::DuplicateSnapshot {
                            team: pair[1].team.clone(),
                            league: pair[1].league.clone(),
                            date: pair[1].date,
                        });
                    }
                    if pair[1].gp() < pair[0].gp() {
                        non_monotonic += 1;
                    }
                }
            }
        }

        // GP resets between splits are expected when a store spans seasons
        if non_monotonic > 0 {
            log::debug!(
                "{} snapshot pairs with decreasing GP (split boundaries)",
                non_monotonic
            );
        }

        Ok(TeamStatsStore {
            schema,
            histories,
            len,
        })
    }

    pub fn schema(&self) -> &MetricSchema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct (team, league) histories
    pub fn team_count(&self) -> usize {
        self.histories.values().map(|teams| teams.len()).sum()
    }

    /// Earliest and latest snapshot dates
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let dates = self.snapshots().map(|s| s.date);
        dates.fold(None, |range, date| match range {
            None => Some((date, date)),
            Some((lo, hi)) => Some((lo.min(date), hi.max(date))),
        })
    }

    /// Full history for a team in a league, oldest first
    pub fn history(&self, team: &str, league: &str) -> &[TeamStatsSnapshot] {
        self.histories
            .get(league)
            .and_then(|teams| teams.get(team))
            .map(|h| h.as_slice())
            .unwrap_or(&[])
    }

    /// History strictly before `date`, oldest first
    pub fn history_before(
        &self,
        team: &str,
        league: &str,
        date: NaiveDate,
    ) -> &[TeamStatsSnapshot] {
        let history = self.history(team, league);
        let end = history.partition_point(|s| s.date < date);
        &history[..end]
    }

    /// Store restricted to the metrics of `schema`, in its order
    pub fn project(&self, schema: &MetricSchema) -> Result<TeamStatsStore> {
        if &self.schema == schema {
            return Ok(self.clone());
        }
        self.schema.ensure_covers(schema)?;
        let indices: Vec<usize> = schema
            .names()
            .iter()
            .filter_map(|name| self.schema.index_of(name))
            .collect();
        let snapshots = self
            .snapshots()
            .map(|s| TeamStatsSnapshot {
                values: indices.iter().map(|&i| s.values[i]).collect(),
                ..s.clone()
            })
            .collect();
        TeamStatsStore::from_snapshots(schema.clone(), snapshots)
    }

    /// Iterate over all snapshots (unordered across teams)
    pub fn snapshots(&self) -> impl Iterator<Item = &TeamStatsSnapshot> {
        self.histories
            .values()
            .flat_map(|teams| teams.values())
            .flatten()
    }
}
