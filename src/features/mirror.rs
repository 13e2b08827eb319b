//! Team-order symmetry augmentation
//!
//! Doubles a training table by appending every fixture seen from the other
//! side. Only ever applied to training data.

use crate::features::joiner::JoinedTable;

/// Original rows followed by their mirrored copies
pub fn mirror(table: &JoinedTable) -> JoinedTable {
    let rows = table
        .rows
        .iter()
        .cloned()
        .chain(table.rows.iter().map(|r| r.mirrored()))
        .collect();
    JoinedTable::new(table.schema.clone(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::store::MetricSchema;
    use crate::features::joiner::{JoinedRow, Side};
    use crate::features::resolver::{Resolution, ResolvedStats};
    use crate::Fixture;
    use chrono::NaiveDate;

    fn stats(gp: f64, winrate: Option<f64>) -> ResolvedStats {
        ResolvedStats {
            values: vec![Some(gp), winrate],
            resolution: Resolution::Direct {
                as_of: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            },
        }
    }

    fn table() -> JoinedTable {
        let schema = MetricSchema::new(vec!["GP".to_string(), "winrate%".to_string()]).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        JoinedTable::new(
            schema,
            vec![
                JoinedRow {
                    fixture: Fixture::new("BLG", "JDG", "LPL", date).with_result(true),
                    stats_a: stats(10.0, Some(0.8)),
                    stats_b: stats(12.0, None),
                },
                JoinedRow {
                    fixture: Fixture::new("TES", "WBG", "LPL", date).with_result(false),
                    stats_a: stats(7.0, Some(0.4)),
                    stats_b: stats(9.0, Some(0.6)),
                },
            ],
        )
    }

    #[test]
    fn test_mirror_doubles_rows() {
        let original = table();
        let mirrored = mirror(&original);
        assert_eq!(mirrored.len(), 2 * original.len());
        // Input is untouched
        assert_eq!(original, table());
        assert_eq!(&mirrored.rows[..2], &original.rows[..]);
    }

    #[test]
    fn test_mirror_swaps_sides_and_flips_label() {
        let mirrored = mirror(&table());

        let copy = &mirrored.rows[2];
        assert_eq!(copy.fixture.team_a, "JDG");
        assert_eq!(copy.fixture.team_b, "BLG");
        assert_eq!(copy.fixture.team_a_win, Some(0));
        assert_eq!(mirrored.value(2, "GP", Side::A), Some(12.0));
        assert_eq!(mirrored.value(2, "winrate%", Side::A), None);
        assert_eq!(mirrored.value(2, "winrate%", Side::B), Some(0.8));

        assert_eq!(mirrored.rows[3].fixture.team_a_win, Some(1));
    }

    #[test]
    fn test_mirror_of_mirror_restores_rows() {
        let mirrored = mirror(&table());
        for (orig, copy) in mirrored.rows[..2].iter().zip(&mirrored.rows[2..]) {
            assert_eq!(&copy.mirrored(), orig);
        }
    }
}
