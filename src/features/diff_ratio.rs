//! Difference and ratio features
//!
//! Collapses each `_A`/`_B` metric pair of a joined table into
//! `diff_<metric>` (A - B) and `ratio_<metric>` (A / (B + epsilon)). Missing
//! inputs propagate as NaN until [`FeatureTable::fill_missing`].

use crate::data::store::MetricSchema;
use crate::features::joiner::JoinedTable;
use chrono::NaiveDate;

/// One fixture's comparative features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub team_a: String,
    pub team_b: String,
    pub league: String,
    pub date: NaiveDate,
    /// `diff_` values for every metric, then `ratio_` values
    pub values: Vec<f64>,
    pub team_a_win: Option<u8>,
}

/// Feature rows sharing one column layout
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    pub schema: MetricSchema,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `diff_<metric>` for every metric, then `ratio_<metric>`
    pub fn column_names(&self) -> Vec<String> {
        let names = self.schema.names();
        names
            .iter()
            .map(|m| format!("diff_{}", m))
            .chain(names.iter().map(|m| format!("ratio_{}", m)))
            .collect()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        if let Some(metric) = column.strip_prefix("diff_") {
            self.schema.index_of(metric)
        } else if let Some(metric) = column.strip_prefix("ratio_") {
            self.schema.index_of(metric).map(|i| i + self.schema.len())
        } else {
            None
        }
    }

    /// Value of a named feature column in one row
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r.values[idx])
    }

    /// Replace every remaining NaN with `sentinel`
    pub fn fill_missing(&self, sentinel: f64) -> FeatureTable {
        let rows = self
            .rows
            .iter()
            .map(|r| FeatureRow {
                values: r
                    .values
                    .iter()
                    .map(|v| if v.is_nan() { sentinel } else { *v })
                    .collect(),
                ..r.clone()
            })
            .collect();
        FeatureTable {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Number of NaN cells
    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.values.iter().filter(|v| v.is_nan()).count())
            .sum()
    }

    /// Feature matrix for a classifier (no metadata columns)
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.values.clone()).collect()
    }

    pub fn labels(&self) -> Vec<Option<u8>> {
        self.rows.iter().map(|r| r.team_a_win).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }
}

/// Builds diff/ratio features from joined rows
#[derive(Debug, Clone, Copy)]
pub struct DiffRatioTransformer {
    epsilon: f64,
}

impl Default for DiffRatioTransformer {
    fn default() -> Self {
        DiffRatioTransformer { epsilon: 1e-6 }
    }
}

impl DiffRatioTransformer {
    pub fn new(epsilon: f64) -> Self {
        DiffRatioTransformer { epsilon }
    }

    pub fn transform(&self, joined: &JoinedTable) -> FeatureTable {
        let rows = joined
            .rows
            .iter()
            .map(|row| {
                let pairs = || row.stats_a.values.iter().zip(&row.stats_b.values);
                let diffs = pairs().map(|(a, b)| match (a, b) {
                    (Some(a), Some(b)) => a - b,
                    _ => f64::NAN,
                });
                let ratios = pairs().map(|(a, b)| match (a, b) {
                    (Some(a), Some(b)) => a / (b + self.epsilon),
                    _ => f64::NAN,
                });

                FeatureRow {
                    team_a: row.fixture.team_a.clone(),
                    team_b: row.fixture.team_b.clone(),
                    league: row.fixture.league.clone(),
                    date: row.fixture.date,
                    values: diffs.chain(ratios).collect(),
                    team_a_win: row.fixture.team_a_win,
                }
            })
            .collect();

        FeatureTable {
            schema: joined.schema.clone(),
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::joiner::JoinedRow;
    use crate::features::mirror::mirror;
    use crate::features::resolver::{Resolution, ResolvedStats};
    use crate::Fixture;

    fn stats(values: Vec<Option<f64>>) -> ResolvedStats {
        ResolvedStats {
            values,
            resolution: Resolution::Direct {
                as_of: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            },
        }
    }

    fn joined() -> JoinedTable {
        let schema = MetricSchema::new(vec![
            "GP".to_string(),
            "winrate%".to_string(),
            "GD15".to_string(),
        ])
        .unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        JoinedTable::new(
            schema,
            vec![
                JoinedRow {
                    fixture: Fixture::new("HLE", "KT", "LCK", date).with_result(true),
                    stats_a: stats(vec![Some(12.0), Some(0.75), Some(850.0)]),
                    stats_b: stats(vec![Some(10.0), Some(0.5), None]),
                },
                JoinedRow {
                    fixture: Fixture::new("DK", "NS", "LCK", date).with_result(false),
                    stats_a: stats(vec![Some(8.0), Some(0.0), Some(-300.0)]),
                    stats_b: stats(vec![Some(10.0), Some(0.0), Some(120.0)]),
                },
            ],
        )
    }

    #[test]
    fn test_diff_and_ratio() {
        let features = DiffRatioTransformer::default().transform(&joined());

        assert_eq!(features.len(), 2);
        assert_eq!(features.column_names().len(), 6);
        assert_eq!(features.value(0, "diff_GP"), Some(2.0));
        assert!((features.value(0, "diff_winrate%").unwrap() - 0.25).abs() < 1e-12);
        assert!((features.value(0, "ratio_winrate%").unwrap() - 1.5).abs() < 1e-5);
        // Zero denominator is absorbed by epsilon
        assert_eq!(features.value(1, "ratio_winrate%"), Some(0.0));
        assert_eq!(features.rows[1].team_a_win, Some(0));
    }

    #[test]
    fn test_missing_input_propagates_nan() {
        let features = DiffRatioTransformer::default().transform(&joined());
        assert!(features.value(0, "diff_GD15").unwrap().is_nan());
        assert!(features.value(0, "ratio_GD15").unwrap().is_nan());
        assert_eq!(features.missing_count(), 2);
    }

    #[test]
    fn test_fill_marks_exactly_the_missing_cells() {
        let raw = DiffRatioTransformer::default().transform(&mirror(&joined()));
        let filled = raw.fill_missing(-1.0);

        assert_eq!(filled.missing_count(), 0);
        for (raw_row, filled_row) in raw.rows.iter().zip(&filled.rows) {
            for (r, f) in raw_row.values.iter().zip(&filled_row.values) {
                assert_eq!(r.is_nan(), *f == -1.0);
                if !r.is_nan() {
                    assert_eq!(r, f);
                }
            }
        }
    }

    #[test]
    fn test_mirrored_features_are_antisymmetric() {
        let features = DiffRatioTransformer::default().transform(&mirror(&joined()));
        let n = features.len() / 2;
        let columns = features.column_names();
        let metrics = features.schema.len();

        for i in 0..n {
            let (orig, copy) = (&features.rows[i], &features.rows[i + n]);
            assert_eq!(copy.team_a_win, orig.team_a_win.map(|w| 1 - w));

            for m in 0..metrics {
                let (d, dm) = (orig.values[m], copy.values[m]);
                if d.is_nan() {
                    assert!(dm.is_nan(), "{}", columns[m]);
                    continue;
                }
                assert_eq!(dm, -d, "{}", columns[m]);

                let (r, rm) = (orig.values[m + metrics], copy.values[m + metrics]);
                if r > 0.0 {
                    assert!((rm - 1.0 / r).abs() < 1e-4, "{}", columns[m + metrics]);
                }
            }
        }
    }
}
