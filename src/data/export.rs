//! CSV export of joined and feature tables

use crate::features::{FeatureTable, JoinedTable};
use crate::Result;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Which metadata columns accompany the feature columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureLayout {
    pub teams: bool,
    pub date: bool,
    pub label: bool,
}

impl FeatureLayout {
    /// `date`, `teamA_win`, features
    pub const TRAINING: FeatureLayout = FeatureLayout {
        teams: false,
        date: true,
        label: true,
    };

    /// Features only, as handed to a classifier
    pub const CLASSIFIER: FeatureLayout = FeatureLayout {
        teams: false,
        date: false,
        label: false,
    };

    /// Team names, league and date for tracing rows back to fixtures
    pub const TRACED: FeatureLayout = FeatureLayout {
        teams: true,
        date: true,
        label: false,
    };
}

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => v.to_string(),
        _ => String::new(),
    }
}

pub fn write_features<W: Write>(table: &FeatureTable, out: W, layout: FeatureLayout) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header: Vec<String> = Vec::new();
    if layout.teams {
        header.extend(["teamA", "teamB", "league"].map(String::from));
    }
    if layout.date {
        header.push("date".to_string());
    }
    if layout.label {
        header.push("teamA_win".to_string());
    }
    header.extend(table.column_names());
    writer.write_record(&header)?;

    for row in &table.rows {
        let mut record: Vec<String> = Vec::with_capacity(header.len());
        if layout.teams {
            record.extend([row.team_a.clone(), row.team_b.clone(), row.league.clone()]);
        }
        if layout.date {
            record.push(row.date.format("%Y-%m-%d").to_string());
        }
        if layout.label {
            record.push(row.team_a_win.map(|w| w.to_string()).unwrap_or_default());
        }
        record.extend(row.values.iter().map(|v| cell(Some(*v))));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_features<P: AsRef<Path>>(table: &FeatureTable, path: P, layout: FeatureLayout) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_features(table, File::create(path)?, layout)?;
    log::info!("Wrote {} feature rows to {}", table.len(), path.display());
    Ok(())
}

/// Write the wide `_A`/`_B` table; missing metrics are blank cells
pub fn write_joined<W: Write>(table: &JoinedTable, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(table.column_names())?;

    for row in &table.rows {
        let fixture = &row.fixture;
        let record: Vec<String> = row
            .stats_a
            .values
            .iter()
            .chain(&row.stats_b.values)
            .map(|v| cell(*v))
            .chain([
                fixture.team_a.clone(),
                fixture.team_b.clone(),
                fixture.date.format("%Y-%m-%d").to_string(),
                fixture.league.clone(),
                fixture.team_a_win.map(|w| w.to_string()).unwrap_or_default(),
            ])
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_joined<P: AsRef<Path>>(table: &JoinedTable, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_joined(table, File::create(path)?)?;
    log::info!("Wrote {} joined rows to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::MetricSchema;
    use crate::features::resolver::{Resolution, ResolvedStats};
    use crate::features::{DiffRatioTransformer, JoinedRow};
    use crate::Fixture;
    use chrono::NaiveDate;

    fn joined() -> JoinedTable {
        let schema = MetricSchema::new(vec!["GP".to_string(), "KD".to_string()]).unwrap();
        let as_of = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let stats = |gp: f64, kd: Option<f64>| ResolvedStats {
            values: vec![Some(gp), kd],
            resolution: Resolution::Direct { as_of },
        };
        JoinedTable::new(
            schema,
            vec![JoinedRow {
                fixture: Fixture::new("Team Liquid", "FlyQuest", "LTA N", as_of.succ_opt().unwrap())
                    .with_result(false),
                stats_a: stats(8.0, Some(1.25)),
                stats_b: stats(10.0, None),
            }],
        )
    }

    #[test]
    fn test_write_joined() {
        let mut out = Vec::new();
        write_joined(&joined(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "GP_A,KD_A,GP_B,KD_B,teamA,teamB,date,league,teamA_win");
        assert_eq!(lines[1], "8,1.25,10,,Team Liquid,FlyQuest,2025-05-02,LTA N,0");
    }

    #[test]
    fn test_write_features_layouts() {
        let features = DiffRatioTransformer::default().transform(&joined()).fill_missing(-1.0);

        let mut out = Vec::new();
        write_features(&features, &mut out, FeatureLayout::TRAINING).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("date,teamA_win,diff_GP,diff_KD,ratio_GP,ratio_KD")
        );
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row[0], "2025-05-02");
        assert_eq!(row[1], "0");
        assert_eq!(row[2], "-2");
        assert_eq!(row[3], "-1");

        let mut out = Vec::new();
        write_features(&features, &mut out, FeatureLayout::CLASSIFIER).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("diff_GP,"));

        let mut out = Vec::new();
        write_features(&features, &mut out, FeatureLayout::TRACED).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("teamA,teamB,league,date,diff_GP,diff_KD,ratio_GP,ratio_KD")
        );
        assert!(lines
            .next()
            .unwrap()
            .starts_with("Team Liquid,FlyQuest,LTA N,2025-05-02,"));
    }
}
