//! CSV ingest for team statistics, fixtures and scored predictions

use crate::data::store::{MetricSchema, TeamStatsSnapshot, TeamStatsStore};
use crate::{Fixture, LolError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Identity columns of a statistics row
const TEAM_COL: &str = "Team";
const LEAGUE_COL: &str = "league";
const DATE_COL: &str = "date";

/// Parse `YYYY-MM-DD`, also accepting a trailing time of day
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Parse a metric cell; blank and NaN cells are missing values
fn parse_metric(s: &str) -> std::result::Result<Option<f64>, String> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value: f64 = s.parse().map_err(|_| format!("invalid number '{}'", s))?;
    Ok(value.is_finite().then_some(value))
}

/// Load a team statistics CSV into a store
pub fn load_team_stats<P: AsRef<Path>>(path: P, schema: &MetricSchema) -> Result<TeamStatsStore> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        LolError::Config(format!("Failed to open {}: {}", path.display(), e))
    })?;
    read_team_stats(file, schema)
}

/// Read team statistics from any CSV source.
///
/// The header is validated against the schema before any row is read; a
/// missing metric column fails the whole load.
pub fn read_team_stats<R: Read>(rdr: R, schema: &MetricSchema) -> Result<TeamStatsStore> {
    let mut reader = csv::Reader::from_reader(rdr);
    let headers = reader.headers()?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim() == name);

    let identity = [TEAM_COL, LEAGUE_COL, DATE_COL].map(|c| column(c));
    let metric_cols: Vec<Option<usize>> = schema.names().iter().map(|m| column(m)).collect();

    let missing: Vec<String> = [TEAM_COL, LEAGUE_COL, DATE_COL]
        .iter()
        .map(|c| c.to_string())
        .zip(&identity)
        .chain(schema.names().iter().cloned().zip(&metric_cols))
        .filter(|(_, idx)| idx.is_none())
        .map(|(name, _)| name)
        .collect();
    let ([Some(team_col), Some(league_col), Some(date_col)], true) = (identity, missing.is_empty())
    else {
        return Err(LolError::Schema { missing });
    };
    let metric_cols: Vec<usize> = metric_cols.into_iter().flatten().collect();

    let extra = headers.len().saturating_sub(metric_cols.len() + 3);
    if extra > 0 {
        log::debug!("Ignoring {} extra statistics columns", extra);
    }

    let mut snapshots = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let date = parse_date(field(date_col)).ok_or_else(|| LolError::InvalidSnapshot {
            line,
            message: format!("invalid date '{}'", field(date_col)),
        })?;
        let values = metric_cols
            .iter()
            .map(|&idx| parse_metric(field(idx)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|message| LolError::InvalidSnapshot { line, message })?;

        snapshots.push(TeamStatsSnapshot {
            team: field(team_col).to_string(),
            league: field(league_col).to_string(),
            date,
            values,
        });
    }

    log::info!("Loaded {} team statistics rows", snapshots.len());
    TeamStatsStore::from_snapshots(schema.clone(), snapshots)
}

/// A fixture row that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub line: usize,
    pub reason: String,
}

/// Fixtures that loaded plus the rows that were rejected
#[derive(Debug, Clone, Default)]
pub struct FixtureLoad {
    pub fixtures: Vec<Fixture>,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Deserialize)]
struct RawFixture {
    #[serde(rename = "teamA")]
    team_a: String,
    #[serde(rename = "teamB")]
    team_b: String,
    league: String,
    date: String,
    #[serde(rename = "teamA_win", default)]
    team_a_win: Option<String>,
    #[serde(rename = "scoreA", default)]
    score_a: Option<String>,
    #[serde(rename = "scoreB", default)]
    score_b: Option<String>,
}

impl RawFixture {
    fn into_fixture(self) -> std::result::Result<Fixture, String> {
        let (team_a, team_b, league) = (self.team_a.trim(), self.team_b.trim(), self.league.trim());
        if team_a.is_empty() || team_b.is_empty() {
            return Err("missing team name".to_string());
        }
        if league.is_empty() {
            return Err("missing league".to_string());
        }
        let date = parse_date(&self.date).ok_or_else(|| format!("invalid date '{}'", self.date))?;

        let label = match (non_empty(&self.team_a_win), non_empty(&self.score_a), non_empty(&self.score_b)) {
            (Some(win), _, _) => match win.parse::<f64>() {
                Ok(v) if v == 0.0 => Some(false),
                Ok(v) if v == 1.0 => Some(true),
                _ => return Err(format!("invalid teamA_win '{}'", win)),
            },
            (None, Some(a), Some(b)) => {
                let parse = |s: &str| s.parse::<f64>().map_err(|_| format!("invalid score '{}'", s));
                let (a, b) = (parse(a)?, parse(b)?);
                if a == b {
                    return Err(format!("drawn score {}-{}", a, b));
                }
                Some(a > b)
            }
            _ => None,
        };

        let fixture = Fixture::new(team_a, team_b, league, date);
        Ok(match label {
            Some(won) => fixture.with_result(won),
            None => fixture,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Load fixtures from a CSV file
pub fn load_fixtures<P: AsRef<Path>>(path: P) -> Result<FixtureLoad> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        LolError::Config(format!("Failed to open {}: {}", path.display(), e))
    })?;
    read_fixtures(file)
}

/// Read fixtures, rejecting malformed rows individually
pub fn read_fixtures<R: Read>(rdr: R) -> Result<FixtureLoad> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(rdr);
    let headers = reader.headers()?.clone();
    let missing: Vec<&str> = ["teamA", "teamB", "league", "date"]
        .into_iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .collect();
    if !missing.is_empty() {
        return Err(LolError::Parse(format!(
            "fixture file is missing columns: {}",
            missing.join(", ")
        )));
    }

    let mut load = FixtureLoad::default();
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line() as usize).unwrap_or(0);
                load.rejected.push(RejectedRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

        let parsed = record
            .deserialize::<RawFixture>(Some(&headers))
            .map_err(|e| e.to_string())
            .and_then(RawFixture::into_fixture);
        match parsed {
            Ok(fixture) => load.fixtures.push(fixture),
            Err(reason) => {
                log::warn!("Rejected fixture on line {}: {}", line, reason);
                load.rejected.push(RejectedRow { line, reason });
            }
        }
    }

    log::info!(
        "Loaded {} fixtures ({} rejected)",
        load.fixtures.len(),
        load.rejected.len()
    );
    Ok(load)
}

/// A labelled probability produced by an external classifier
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScoredPrediction {
    #[serde(rename = "teamA_win")]
    pub label: u8,
    #[serde(alias = "proba", alias = "prob")]
    pub probability: f64,
}

/// Load `teamA_win,probability` rows for evaluation
pub fn load_scored_predictions<P: AsRef<Path>>(path: P) -> Result<Vec<ScoredPrediction>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<ScoredPrediction>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_schema() -> MetricSchema {
        MetricSchema::new(vec!["GP".to_string(), "KD".to_string(), "winrate%".to_string()])
            .unwrap()
    }

    #[test]
    fn test_read_team_stats() {
        let csv = "\
league,date,Team,GP,KD,winrate%,split
LEC,2025-01-18,G2 Esports,3,1.4,0.66,Winter
LEC,2025-01-19 00:00:00,G2 Esports,5,,0.8,Winter
LEC,2025-01-19,Fnatic,5,NaN,0.4,Winter
";
        let store = read_team_stats(csv.as_bytes(), &small_schema()).unwrap();

        assert_eq!(store.len(), 3);
        let g2 = store.history("G2 Esports", "LEC");
        assert_eq!(g2.len(), 2);
        assert_eq!(g2[1].date, NaiveDate::from_ymd_opt(2025, 1, 19).unwrap());
        assert_eq!(g2[1].values, vec![Some(5.0), None, Some(0.8)]);
        assert_eq!(store.history("Fnatic", "LEC")[0].values[1], None);
    }

    #[test]
    fn test_read_team_stats_schema_mismatch() {
        let csv = "league,date,Team,GP,KD\nLEC,2025-01-18,G2 Esports,3,1.4\n";
        match read_team_stats(csv.as_bytes(), &small_schema()) {
            Err(LolError::Schema { missing }) => assert_eq!(missing, vec!["winrate%".to_string()]),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_read_team_stats_bad_value_is_fatal() {
        let csv = "league,date,Team,GP,KD,winrate%\nLEC,2025-01-18,G2 Esports,3,abc,0.5\n";
        let result = read_team_stats(csv.as_bytes(), &small_schema());
        assert!(matches!(result, Err(LolError::InvalidSnapshot { line: 2, .. })));
    }

    #[test]
    fn test_read_fixtures_with_labels_and_scores() {
        let csv = "\
teamA,teamB,league,date,scoreA,scoreB
T1,Gen.G,LCK,2025-04-02,2,1
KT Rolster,DRX,LCK,2025-04-03,0,2
";
        let load = read_fixtures(csv.as_bytes()).unwrap();
        assert!(load.rejected.is_empty());
        assert_eq!(load.fixtures[0].team_a_win, Some(1));
        assert_eq!(load.fixtures[1].team_a_win, Some(0));

        let upcoming = "teamA,teamB,league,date\nT1,Gen.G,LCK,2025-04-10\n";
        let load = read_fixtures(upcoming.as_bytes()).unwrap();
        assert_eq!(load.fixtures[0].team_a_win, None);
    }

    #[test]
    fn test_read_fixtures_rejects_malformed_rows() {
        let csv = "\
teamA,teamB,league,date,teamA_win
T1,Gen.G,LCK,2025-04-02,1
T1,HLE,LCK,04/05/2025,0
DK,,LCK,2025-04-06,1
BRO,NS,LCK,2025-04-07,2
KT,DRX,LCK,2025-04-08,0
";
        let load = read_fixtures(csv.as_bytes()).unwrap();
        assert_eq!(load.fixtures.len(), 2);
        assert_eq!(load.rejected.len(), 3);
        assert_eq!(load.rejected[0].line, 3);
        assert!(load.rejected[0].reason.contains("invalid date"));
    }

    #[test]
    fn test_read_fixtures_rejects_draws() {
        let csv = "teamA,teamB,league,date,scoreA,scoreB\nT1,Gen.G,LCK,2025-04-02,1,1\n";
        let load = read_fixtures(csv.as_bytes()).unwrap();
        assert!(load.fixtures.is_empty());
        assert!(load.rejected[0].reason.contains("draw"));
    }

    #[test]
    fn test_read_fixtures_with_padded_headers() {
        let csv = "teamA, teamB, league, date, teamA_win\nT1,Gen.G,LCK,2025-04-02,1\n";
        let load = read_fixtures(csv.as_bytes()).unwrap();

        assert!(load.rejected.is_empty());
        assert_eq!(load.fixtures.len(), 1);
        assert_eq!(load.fixtures[0].team_b, "Gen.G");
        assert_eq!(load.fixtures[0].team_a_win, Some(1));
    }

    #[test]
    fn test_read_team_stats_bad_date_is_fatal() {
        let csv = "league,date,Team,GP,KD,winrate%\nLEC,yesterday,G2 Esports,3,1.4,0.66\n";
        assert!(matches!(
            read_team_stats(csv.as_bytes(), &small_schema()),
            Err(LolError::InvalidSnapshot { line: 2, .. })
        ));
    }

    #[test]
    fn test_fixture_file_missing_columns() {
        let csv = "teamA,teamB,date\nT1,Gen.G,2025-04-02\n";
        assert!(matches!(read_fixtures(csv.as_bytes()), Err(LolError::Parse(_))));
    }
}
