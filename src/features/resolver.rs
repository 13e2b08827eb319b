//! Point-in-time statistics resolution
//!
//! Finds the statistics a team would have had available before a match date.
//! A sparse current sample (few games into a new split) is blended with the
//! team's last stable snapshot rather than trusted at face value.

use crate::data::store::{TeamStatsSnapshot, TeamStatsStore};
use crate::PipelineConfig;
use chrono::NaiveDate;
use std::fmt;

/// Thresholds controlling when a snapshot is trusted and how blends are weighted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendPolicy {
    /// Snapshots with GP above this are returned unchanged
    pub stable_gp_threshold: u32,
    /// Cap on the weight of the last stable snapshot in a blend
    pub stable_gp_cap: u32,
}

impl Default for BlendPolicy {
    fn default() -> Self {
        BlendPolicy {
            stable_gp_threshold: 5,
            stable_gp_cap: 5,
        }
    }
}

impl From<&PipelineConfig> for BlendPolicy {
    fn from(config: &PipelineConfig) -> Self {
        BlendPolicy {
            stable_gp_threshold: config.stable_gp_threshold,
            stable_gp_cap: config.stable_gp_cap,
        }
    }
}

impl BlendPolicy {
    fn is_stable(&self, snapshot: &TeamStatsSnapshot) -> bool {
        snapshot.gp() > self.stable_gp_threshold as f64
    }
}

/// How a resolved series was produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Latest snapshot returned as-is
    Direct { as_of: NaiveDate },
    /// Latest sparse snapshot blended with the last stable one
    Blended {
        latest: NaiveDate,
        stable: NaiveDate,
        gp_curr: f64,
        gp_stable: f64,
    },
}

impl Resolution {
    /// Dates of the snapshots the series was built from
    pub fn source_dates(&self) -> Vec<NaiveDate> {
        match *self {
            Resolution::Direct { as_of } => vec![as_of],
            Resolution::Blended { latest, stable, .. } => vec![latest, stable],
        }
    }

    pub fn is_blended(&self) -> bool {
        matches!(self, Resolution::Blended { .. })
    }
}

/// Statistics series for one team, identity columns stripped
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStats {
    /// One value per schema metric; GP first
    pub values: Vec<Option<f64>>,
    pub resolution: Resolution,
}

impl ResolvedStats {
    pub fn gp(&self) -> f64 {
        self.values.first().copied().flatten().unwrap_or(0.0)
    }
}

/// Why no statistics could be produced for a team
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingHistory {
    /// No snapshot before the date at all
    NoHistory,
    /// Only sparse snapshots, nothing stable to blend with
    NoStableBaseline,
}

impl fmt::Display for MissingHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingHistory::NoHistory => write!(f, "no prior statistics"),
            MissingHistory::NoStableBaseline => write!(f, "no stable baseline to blend with"),
        }
    }
}

/// Outcome of a lookup. Missing history is an expected result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(ResolvedStats),
    Missing(MissingHistory),
}

impl Lookup {
    pub fn stats(self) -> Option<ResolvedStats> {
        match self {
            Lookup::Found(stats) => Some(stats),
            Lookup::Missing(_) => None,
        }
    }
}

/// Resolves team statistics as of a date against a read-only store
#[derive(Debug, Clone, Copy)]
pub struct PointInTimeResolver<'a> {
    store: &'a TeamStatsStore,
    policy: BlendPolicy,
}

impl<'a> PointInTimeResolver<'a> {
    pub fn new(store: &'a TeamStatsStore, policy: BlendPolicy) -> Self {
        PointInTimeResolver { store, policy }
    }

    pub fn policy(&self) -> BlendPolicy {
        self.policy
    }

    /// Best available statistics for `team` strictly before `date`
    pub fn resolve(&self, team: &str, league: &str, date: NaiveDate) -> Lookup {
        let history = self.store.history_before(team, league, date);

        let Some(latest) = history.last() else {
            return Lookup::Missing(MissingHistory::NoHistory);
        };

        if self.policy.is_stable(latest) {
            return Lookup::Found(ResolvedStats {
                values: latest.values.clone(),
                resolution: Resolution::Direct { as_of: latest.date },
            });
        }

        let Some(stable) = history.iter().rev().find(|s| self.policy.is_stable(s)) else {
            return Lookup::Missing(MissingHistory::NoStableBaseline);
        };

        Lookup::Found(self.blend(latest, stable))
    }

    fn blend(&self, latest: &TeamStatsSnapshot, stable: &TeamStatsSnapshot) -> ResolvedStats {
        let gp_curr = latest.gp();
        let gp_stable = stable.gp().min(self.policy.stable_gp_cap as f64);
        let gp_total = gp_curr + gp_stable;

        let values = latest
            .values
            .iter()
            .zip(&stable.values)
            .enumerate()
            .map(|(idx, (curr, past))| {
                if idx == 0 {
                    return Some(gp_total);
                }
                match (curr, past) {
                    (Some(c), Some(p)) if gp_total > 0.0 => {
                        Some((c * gp_curr + p * gp_stable) / gp_total)
                    }
                    _ => None,
                }
            })
            .collect();

        ResolvedStats {
            values,
            resolution: Resolution::Blended {
                latest: latest.date,
                stable: stable.date,
                gp_curr,
                gp_stable,
            },
        }
    }
}
