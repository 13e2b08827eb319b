//! Data ingestion, storage and datasets
//!
//! CSV ingest, SQLite persistence, the in-memory statistics store and the
//! training/prediction dataset builders.

pub mod database;
pub mod dataset;
pub mod export;
pub mod ingest;
pub mod store;

pub use database::{Database, DatabaseStats};
pub use dataset::{build_prediction, build_training, PredictionDataset, TrainingDataset};
pub use store::{MetricSchema, TeamStatsSnapshot, TeamStatsStore};
