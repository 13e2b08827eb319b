//! Time-based train/validation split
//!
//! The trailing window of the joined table (by fixture date) is held out for
//! validation; everything earlier is training data.

use crate::features::joiner::JoinedTable;
use crate::LolError;
use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of the trailing validation window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValidationWindow {
    Months(u32),
    Days(u64),
}

impl ValidationWindow {
    /// First date of the validation window ending at `max_date`
    pub fn start_from(&self, max_date: NaiveDate) -> NaiveDate {
        let start = match *self {
            ValidationWindow::Months(n) => max_date.checked_sub_months(Months::new(n)),
            ValidationWindow::Days(n) => max_date.checked_sub_days(Days::new(n)),
        };
        start.unwrap_or(NaiveDate::MIN)
    }
}

impl FromStr for ValidationWindow {
    type Err = LolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let parse_err = || {
            LolError::Parse(format!(
                "Invalid validation window '{}'. Use e.g. 2m (months) or 45d (days).",
                s
            ))
        };
        if let Some(n) = s.strip_suffix('m') {
            n.trim()
                .parse()
                .map(ValidationWindow::Months)
                .map_err(|_| parse_err())
        } else if let Some(n) = s.strip_suffix('d') {
            n.trim()
                .parse()
                .map(ValidationWindow::Days)
                .map_err(|_| parse_err())
        } else {
            Err(parse_err())
        }
    }
}

impl TryFrom<String> for ValidationWindow {
    type Error = LolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ValidationWindow> for String {
    fn from(window: ValidationWindow) -> Self {
        window.to_string()
    }
}

impl fmt::Display for ValidationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWindow::Months(n) => write!(f, "{}m", n),
            ValidationWindow::Days(n) => write!(f, "{}d", n),
        }
    }
}

/// Training and validation partitions of a joined table
#[derive(Debug, Clone)]
pub struct TemporalSplit {
    pub train: JoinedTable,
    pub val: JoinedTable,
    /// First date included in validation (None for an empty input)
    pub validation_start: Option<NaiveDate>,
}

/// Splits joined tables by fixture date
#[derive(Debug, Clone, Copy)]
pub struct TemporalSplitter {
    window: ValidationWindow,
}

impl TemporalSplitter {
    pub fn new(window: ValidationWindow) -> Self {
        TemporalSplitter { window }
    }

    pub fn split(&self, joined: &JoinedTable) -> TemporalSplit {
        let Some(max_date) = joined.rows.iter().map(|r| r.fixture.date).max() else {
            return TemporalSplit {
                train: JoinedTable::new(joined.schema.clone(), Vec::new()),
                val: JoinedTable::new(joined.schema.clone(), Vec::new()),
                validation_start: None,
            };
        };
        let start = self.window.start_from(max_date);

        let (val, train): (Vec<_>, Vec<_>) = joined
            .rows
            .iter()
            .cloned()
            .partition(|r| r.fixture.date >= start);

        log::info!(
            "Split at {} (window {}): {} training rows, {} validation rows",
            start,
            self.window,
            train.len(),
            val.len()
        );

        TemporalSplit {
            train: JoinedTable::new(joined.schema.clone(), train),
            val: JoinedTable::new(joined.schema.clone(), val),
            validation_start: Some(start),
        }
    }
}
