//! Recency sample weights

use chrono::NaiveDate;

/// Linear weight per row: 0 for the oldest date, 1 for the newest
///
/// Every row gets 1.0 when all dates are equal.
pub fn recency_weights(dates: &[NaiveDate]) -> Vec<f64> {
    let (Some(min), Some(max)) = (dates.iter().min(), dates.iter().max()) else {
        return Vec::new();
    };
    let span = (*max - *min).num_days();
    if span == 0 {
        return vec![1.0; dates.len()];
    }
    dates
        .iter()
        .map(|d| (*d - *min).num_days() as f64 / span as f64)
        .collect()
}
