//! SQLite persistence for team statistics and fixtures

use crate::data::store::{MetricSchema, TeamStatsSnapshot, TeamStatsStore};
use crate::{Fixture, LolError, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS team_stats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                team TEXT NOT NULL,
                league TEXT NOT NULL,
                date TEXT NOT NULL,
                metrics TEXT NOT NULL,
                UNIQUE(team, league, date)
            );

            CREATE TABLE IF NOT EXISTS fixtures (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                team_a TEXT NOT NULL,
                team_b TEXT NOT NULL,
                league TEXT NOT NULL,
                date TEXT NOT NULL,
                team_a_win INTEGER,
                UNIQUE(team_a, team_b, league, date)
            );

            CREATE INDEX IF NOT EXISTS idx_team_stats_lookup ON team_stats(league, team, date);
            CREATE INDEX IF NOT EXISTS idx_fixtures_date ON fixtures(date);
            "#,
        )?;
        Ok(())
    }

    // ==================== Team Statistics ====================

    /// Insert or replace snapshots keyed by (team, league, date)
    pub fn upsert_snapshots<'a, I>(&self, schema: &MetricSchema, snapshots: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a TeamStatsSnapshot>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO team_stats (team, league, date, metrics)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(team, league, date) DO UPDATE SET
                    metrics = excluded.metrics
                "#,
            )?;
            for snapshot in snapshots {
                let metrics: serde_json::Map<String, serde_json::Value> = schema
                    .names()
                    .iter()
                    .zip(&snapshot.values)
                    .map(|(name, value)| {
                        let value = value.map_or(serde_json::Value::Null, serde_json::Value::from);
                        (name.clone(), value)
                    })
                    .collect();
                stmt.execute(params![
                    snapshot.team,
                    snapshot.league,
                    snapshot.date.format("%Y-%m-%d").to_string(),
                    serde_json::to_string(&metrics)?,
                ])?;
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    /// Load every stored snapshot into a store laid out by `schema`
    ///
    /// A metric absent from every row is a schema error; a metric absent
    /// from only some rows is treated as undefined for those rows.
    pub fn load_store(&self, schema: &MetricSchema) -> Result<TeamStatsStore> {
        let mut stmt = self
            .conn
            .prepare("SELECT team, league, date, metrics FROM team_stats ORDER BY date")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut snapshots = Vec::with_capacity(rows.len());
        for (idx, (team, league, date, metrics)) in rows.into_iter().enumerate() {
            let date = parse_stored_date(&date).ok_or_else(|| LolError::InvalidSnapshot {
                line: idx + 1,
                message: format!("bad stored date '{}'", date),
            })?;
            let metrics: HashMap<String, Option<f64>> = serde_json::from_str(&metrics)?;
            let values = schema
                .names()
                .iter()
                .map(|name| metrics.get(name).copied().flatten())
                .collect();
            seen.extend(metrics.into_keys());
            snapshots.push(TeamStatsSnapshot {
                team,
                league,
                date,
                values,
            });
        }

        if !snapshots.is_empty() {
            let missing: Vec<String> = schema
                .names()
                .iter()
                .filter(|name| !seen.contains(*name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(LolError::Schema { missing });
            }
        }

        TeamStatsStore::from_snapshots(schema.clone(), snapshots)
    }

    // ==================== Fixtures ====================

    /// Insert fixtures, updating the result of ones already stored
    pub fn upsert_fixtures(&self, fixtures: &[Fixture]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO fixtures (team_a, team_b, league, date, team_a_win)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(team_a, team_b, league, date) DO UPDATE SET
                    team_a_win = COALESCE(excluded.team_a_win, team_a_win)
                "#,
            )?;
            for fixture in fixtures {
                stmt.execute(params![
                    fixture.team_a,
                    fixture.team_b,
                    fixture.league,
                    fixture.date.format("%Y-%m-%d").to_string(),
                    fixture.team_a_win,
                ])?;
            }
        }
        tx.commit()?;
        Ok(fixtures.len())
    }

    /// All fixtures in date order
    pub fn get_fixtures(&self) -> Result<Vec<Fixture>> {
        self.fixtures_query("WHERE 1 = 1", params![])
    }

    /// Fixtures with a known result
    pub fn get_played_fixtures(&self) -> Result<Vec<Fixture>> {
        self.fixtures_query("WHERE team_a_win IS NOT NULL", params![])
    }

    /// Fixtures on or after `date` that have no result yet
    pub fn get_upcoming_fixtures(&self, date: NaiveDate) -> Result<Vec<Fixture>> {
        self.fixtures_query(
            "WHERE team_a_win IS NULL AND date >= ?1",
            params![date.format("%Y-%m-%d").to_string()],
        )
    }

    fn fixtures_query(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<Fixture>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT team_a, team_b, league, date, team_a_win FROM fixtures {} ORDER BY date, id",
            filter
        ))?;

        let rows = stmt
            .query_map(args, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<u8>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(team_a, team_b, league, date, team_a_win)| {
                let date = parse_stored_date(&date)
                    .ok_or_else(|| LolError::Parse(format!("bad stored fixture date '{}'", date)))?;
                Ok(Fixture {
                    team_a,
                    team_b,
                    league,
                    date,
                    team_a_win,
                })
            })
            .collect()
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let snapshot_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM team_stats", [], |row| row.get(0))?;

        let team_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT team, league FROM team_stats)",
            [],
            |row| row.get(0),
        )?;

        let fixture_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fixtures", [], |row| row.get(0))?;

        let played_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fixtures WHERE team_a_win IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        let (min_date, max_date): (Option<String>, Option<String>) = self
            .conn
            .query_row("SELECT MIN(date), MAX(date) FROM team_stats", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?
            .unwrap_or((None, None));

        Ok(DatabaseStats {
            snapshot_count: snapshot_count as usize,
            team_count: team_count as usize,
            fixture_count: fixture_count as usize,
            played_count: played_count as usize,
            earliest_snapshot: min_date.as_deref().and_then(parse_stored_date),
            latest_snapshot: max_date.as_deref().and_then(parse_stored_date),
        })
    }
}

fn parse_stored_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub snapshot_count: usize,
    /// Distinct (team, league) histories
    pub team_count: usize,
    pub fixture_count: usize,
    pub played_count: usize,
    pub earliest_snapshot: Option<NaiveDate>,
    pub latest_snapshot: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> MetricSchema {
        MetricSchema::new(vec!["GP".to_string(), "winrate%".to_string()]).unwrap()
    }

    fn snapshot(team: &str, day: u32, gp: f64, winrate: Option<f64>) -> TeamStatsSnapshot {
        TeamStatsSnapshot {
            team: team.to_string(),
            league: "LCK".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, day).unwrap(),
            values: vec![Some(gp), winrate],
        }
    }

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.snapshot_count, 0);
        assert_eq!(stats.fixture_count, 0);
        assert_eq!(stats.earliest_snapshot, None);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let db = Database::in_memory().unwrap();
        let snapshots = vec![
            snapshot("T1", 10, 2.0, Some(0.5)),
            snapshot("T1", 12, 4.0, None),
            snapshot("Gen.G", 11, 3.0, Some(1.0)),
        ];
        assert_eq!(db.upsert_snapshots(&schema(), &snapshots).unwrap(), 3);

        let store = db.load_store(&schema()).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.team_count(), 2);
        let history = store.history("T1", "LCK");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].values, vec![Some(4.0), None]);

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.team_count, 2);
        assert_eq!(stats.earliest_snapshot, NaiveDate::from_ymd_opt(2025, 1, 10));
        assert_eq!(stats.latest_snapshot, NaiveDate::from_ymd_opt(2025, 1, 12));
    }

    #[test]
    fn test_snapshot_upsert_replaces() {
        let db = Database::in_memory().unwrap();
        db.upsert_snapshots(&schema(), &[snapshot("T1", 10, 2.0, Some(0.5))])
            .unwrap();
        db.upsert_snapshots(&schema(), &[snapshot("T1", 10, 2.0, Some(1.0))])
            .unwrap();

        let store = db.load_store(&schema()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.history("T1", "LCK")[0].values[1], Some(1.0));
    }

    #[test]
    fn test_load_store_rejects_unknown_metric() {
        let db = Database::in_memory().unwrap();
        db.upsert_snapshots(&schema(), &[snapshot("T1", 10, 2.0, Some(0.5))])
            .unwrap();

        let wider =
            MetricSchema::new(vec!["GP".to_string(), "winrate%".to_string(), "GD15".to_string()])
                .unwrap();
        match db.load_store(&wider) {
            Err(LolError::Schema { missing }) => assert_eq!(missing, vec!["GD15".to_string()]),
            other => panic!("expected schema error, got {:?}", other.map(|s| s.len())),
        }
    }

    #[test]
    fn test_fixtures() {
        let db = Database::in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let upcoming = Fixture::new("T1", "Gen.G", "LCK", date);
        let played = Fixture::new("HLE", "KT", "LCK", date.pred_opt().unwrap()).with_result(false);
        db.upsert_fixtures(&[upcoming.clone(), played.clone()]).unwrap();

        assert_eq!(db.get_fixtures().unwrap(), vec![played.clone(), upcoming.clone()]);
        assert_eq!(db.get_played_fixtures().unwrap(), vec![played]);
        assert_eq!(db.get_upcoming_fixtures(date).unwrap(), vec![upcoming.clone()]);

        // Recording the result later updates the stored fixture
        db.upsert_fixtures(&[upcoming.clone().with_result(true)]).unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.fixture_count, 2);
        assert_eq!(stats.played_count, 2);
    }
}
