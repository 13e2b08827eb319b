//! Fixture to statistics join
//!
//! Resolves both teams of every fixture and assembles wide `_A`/`_B` rows.
//! Fixtures where either side has insufficient history are dropped and
//! counted rather than imputed.

use crate::data::store::{MetricSchema, TeamStatsStore};
use crate::features::resolver::{
    BlendPolicy, Lookup, MissingHistory, PointInTimeResolver, ResolvedStats,
};
use crate::Fixture;
use rayon::prelude::*;
use std::fmt;

/// A fixture with both teams' pre-match statistics attached
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub fixture: Fixture,
    pub stats_a: ResolvedStats,
    pub stats_b: ResolvedStats,
}

impl JoinedRow {
    /// Swap sides: team names, statistics and label
    pub fn mirrored(&self) -> Self {
        JoinedRow {
            fixture: self.fixture.mirrored(),
            stats_a: self.stats_b.clone(),
            stats_b: self.stats_a.clone(),
        }
    }

    /// Number of sides (0 to 2) answered by a blend
    pub fn blended_sides(&self) -> usize {
        [&self.stats_a, &self.stats_b]
            .iter()
            .filter(|s| s.resolution.is_blended())
            .count()
    }
}

/// A fixture left out of the join, with the cause on each unresolved side
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedFixture {
    pub fixture: Fixture,
    pub team_a: Option<MissingHistory>,
    pub team_b: Option<MissingHistory>,
}

impl DroppedFixture {
    /// e.g. "DRX has no stable baseline to blend with"
    pub fn reason(&self) -> String {
        [
            (&self.fixture.team_a, self.team_a),
            (&self.fixture.team_b, self.team_b),
        ]
        .iter()
        .filter_map(|(team, missing)| missing.map(|m| format!("{} has {}", team, m)))
        .collect::<Vec<_>>()
        .join(", ")
    }
}

impl fmt::Display for DroppedFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.fixture, self.reason())
    }
}

/// Joined rows sharing one metric schema
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedTable {
    pub schema: MetricSchema,
    pub rows: Vec<JoinedRow>,
}

impl JoinedTable {
    pub fn new(schema: MetricSchema, rows: Vec<JoinedRow>) -> Self {
        JoinedTable { schema, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column headers: `<metric>_A`..., `<metric>_B`..., then metadata
    pub fn column_names(&self) -> Vec<String> {
        let names = self.schema.names();
        names
            .iter()
            .map(|m| format!("{}_A", m))
            .chain(names.iter().map(|m| format!("{}_B", m)))
            .chain(
                ["teamA", "teamB", "date", "league", "teamA_win"]
                    .iter()
                    .map(|c| c.to_string()),
            )
            .collect()
    }

    /// Value of a metric on one side of a row
    pub fn value(&self, row: usize, metric: &str, side: Side) -> Option<f64> {
        let idx = self.schema.index_of(metric)?;
        let row = self.rows.get(row)?;
        match side {
            Side::A => row.stats_a.values[idx],
            Side::B => row.stats_b.values[idx],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

/// Counters describing which fixtures were dropped and why
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinDiagnostics {
    pub fixtures: usize,
    pub joined: usize,
    /// Fixtures where team A could not be resolved
    pub missing_a: usize,
    /// Fixtures where team B could not be resolved
    pub missing_b: usize,
    /// Team lookups with no prior statistics
    pub no_history: usize,
    /// Team lookups with only sparse statistics
    pub no_stable_baseline: usize,
    /// Team lookups answered by a blend
    pub blended: usize,
}

impl JoinDiagnostics {
    pub fn dropped(&self) -> usize {
        self.fixtures - self.joined
    }

    fn record_missing(&mut self, reason: MissingHistory) {
        match reason {
            MissingHistory::NoHistory => self.no_history += 1,
            MissingHistory::NoStableBaseline => self.no_stable_baseline += 1,
        }
    }

    fn record_found(&mut self, stats: &ResolvedStats) {
        if stats.resolution.is_blended() {
            self.blended += 1;
        }
    }

    /// Combine counters from two joins
    pub fn merge(&mut self, other: &JoinDiagnostics) {
        self.fixtures += other.fixtures;
        self.joined += other.joined;
        self.missing_a += other.missing_a;
        self.missing_b += other.missing_b;
        self.no_history += other.no_history;
        self.no_stable_baseline += other.no_stable_baseline;
        self.blended += other.blended;
    }
}

impl fmt::Display for JoinDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "joined {}/{} fixtures | missing stats: team A {}, team B {} | no history {}, no stable baseline {} | blended {}",
            self.joined,
            self.fixtures,
            self.missing_a,
            self.missing_b,
            self.no_history,
            self.no_stable_baseline,
            self.blended
        )
    }
}

/// Per-fixture join result
enum JoinOutcome {
    Joined(JoinedRow),
    Dropped(DroppedFixture),
}

/// Joins fixtures with point-in-time team statistics
#[derive(Debug, Clone, Copy)]
pub struct MatchJoiner {
    policy: BlendPolicy,
    parallel: bool,
}

impl MatchJoiner {
    pub fn new(policy: BlendPolicy) -> Self {
        MatchJoiner {
            policy,
            parallel: false,
        }
    }

    /// Resolve fixtures on the rayon pool
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Join fixtures with the store. Output rows keep fixture order.
    pub fn join(
        &self,
        fixtures: &[Fixture],
        store: &TeamStatsStore,
    ) -> (JoinedTable, JoinDiagnostics) {
        let (table, diagnostics, _) = self.join_with_dropped(fixtures, store);
        (table, diagnostics)
    }

    /// Like [`MatchJoiner::join`], also returning the fixtures that were left out
    pub fn join_with_dropped(
        &self,
        fixtures: &[Fixture],
        store: &TeamStatsStore,
    ) -> (JoinedTable, JoinDiagnostics, Vec<DroppedFixture>) {
        let resolver = PointInTimeResolver::new(store, self.policy);

        let outcomes: Vec<JoinOutcome> = if self.parallel {
            fixtures
                .par_iter()
                .map(|f| Self::join_one(&resolver, f))
                .collect()
        } else {
            fixtures.iter().map(|f| Self::join_one(&resolver, f)).collect()
        };

        let mut diagnostics = JoinDiagnostics {
            fixtures: fixtures.len(),
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(outcomes.len());
        let mut dropped = Vec::new();

        for outcome in outcomes {
            match outcome {
                JoinOutcome::Joined(row) => {
                    diagnostics.record_found(&row.stats_a);
                    diagnostics.record_found(&row.stats_b);
                    diagnostics.joined += 1;
                    rows.push(row);
                }
                JoinOutcome::Dropped(drop) => {
                    if let Some(reason) = drop.team_a {
                        diagnostics.missing_a += 1;
                        diagnostics.record_missing(reason);
                    }
                    if let Some(reason) = drop.team_b {
                        diagnostics.missing_b += 1;
                        diagnostics.record_missing(reason);
                    }
                    dropped.push(drop);
                }
            }
        }

        log::info!(
            "Merge complete. Missing stats: Team A: {}, Team B: {} ({} of {} fixtures joined)",
            diagnostics.missing_a,
            diagnostics.missing_b,
            diagnostics.joined,
            diagnostics.fixtures
        );

        (JoinedTable::new(store.schema().clone(), rows), diagnostics, dropped)
    }

    fn join_one(resolver: &PointInTimeResolver<'_>, fixture: &Fixture) -> JoinOutcome {
        let a = resolver.resolve(&fixture.team_a, &fixture.league, fixture.date);
        let b = resolver.resolve(&fixture.team_b, &fixture.league, fixture.date);

        match (a, b) {
            (Lookup::Found(stats_a), Lookup::Found(stats_b)) => JoinOutcome::Joined(JoinedRow {
                fixture: fixture.clone(),
                stats_a,
                stats_b,
            }),
            (a, b) => {
                let reason = |lookup: Lookup| match lookup {
                    Lookup::Missing(reason) => Some(reason),
                    Lookup::Found(_) => None,
                };
                let drop = DroppedFixture {
                    fixture: fixture.clone(),
                    team_a: reason(a),
                    team_b: reason(b),
                };
                log::debug!("Dropping {}", drop);
                JoinOutcome::Dropped(drop)
            }
        }
    }
}
