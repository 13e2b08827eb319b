//! Evaluation support for classifiers trained on the feature tables
//!
//! Classification metrics and recency sample weights.

pub mod metrics;
pub mod weights;

pub use metrics::{ClassificationReport, ConfusionMatrix};
pub use weights::recency_weights;
