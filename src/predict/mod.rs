//! Prediction and inference
//!
//! Build point-in-time features for a fixture and score them with a classifier.

pub mod inference;

pub use inference::{
    fixture_features, format_prediction, Classifier, LogisticModel, PredictionBatch, Predictor,
};
