//! Classification metrics for win-probability predictions

use crate::{LolError, Result};
use std::fmt;

/// Confusion matrix counts for the positive class (team A wins)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn accuracy(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            (self.tp + self.tn) as f64 / self.total() as f64
        }
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// F1 of the positive class; 0 when there are no true positives
    pub fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Evaluation of predicted probabilities against known outcomes
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    pub threshold: f64,
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub f1: f64,
    /// None when only one class is present
    pub roc_auc: Option<f64>,
    /// Threshold maximising TPR - FPR, with its J value
    pub youden: Option<(f64, f64)>,
}

impl ClassificationReport {
    /// A probability at or above `threshold` predicts a team A win
    pub fn from_predictions(labels: &[u8], probs: &[f64], threshold: f64) -> Result<Self> {
        if labels.len() != probs.len() {
            return Err(LolError::Parse(format!(
                "{} labels but {} probabilities",
                labels.len(),
                probs.len()
            )));
        }
        if labels.is_empty() {
            return Err(LolError::EmptyDataset("no predictions to evaluate".to_string()));
        }
        if let Some(bad) = labels.iter().find(|l| **l > 1) {
            return Err(LolError::Parse(format!("label {} is not 0 or 1", bad)));
        }

        let mut confusion = ConfusionMatrix::default();
        for (&label, &p) in labels.iter().zip(probs) {
            match (label == 1, p >= threshold) {
                (true, true) => confusion.tp += 1,
                (true, false) => confusion.fn_ += 1,
                (false, true) => confusion.fp += 1,
                (false, false) => confusion.tn += 1,
            }
        }

        let curve = roc_curve(labels, probs);
        Ok(ClassificationReport {
            threshold,
            accuracy: confusion.accuracy(),
            f1: confusion.f1(),
            confusion,
            roc_auc: curve.as_ref().map(|c| c.auc()),
            youden: curve.as_ref().and_then(|c| c.youden()),
        })
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.confusion;
        writeln!(f, "Accuracy:  {:.4}  (threshold {:.3})", self.accuracy, self.threshold)?;
        writeln!(f, "Confusion matrix:")?;
        writeln!(f, "  [[{:>5} {:>5}]", c.tn, c.fp)?;
        writeln!(f, "   [{:>5} {:>5}]]", c.fn_, c.tp)?;
        writeln!(f, "F1 score:  {:.4}", self.f1)?;
        match self.roc_auc {
            Some(auc) => writeln!(f, "ROC AUC:   {:.4}", auc)?,
            None => writeln!(f, "ROC AUC:   undefined (single class)")?,
        }
        match self.youden {
            Some((t, j)) => write!(f, "Best threshold (Youden's J): {:.4} (J = {:.4})", t, j),
            None => write!(f, "Best threshold (Youden's J): undefined"),
        }
    }
}

/// ROC points at each distinct probability, highest threshold first
struct RocCurve {
    /// (threshold, fpr, tpr)
    points: Vec<(f64, f64, f64)>,
}

fn roc_curve(labels: &[u8], probs: &[f64]) -> Option<RocCurve> {
    let positives = labels.iter().filter(|l| **l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut scored: Vec<(f64, u8)> = probs.iter().copied().zip(labels.iter().copied()).collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut points = Vec::new();
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < scored.len() {
        let threshold = scored[i].0;
        while i < scored.len() && scored[i].0 == threshold {
            if scored[i].1 == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push((
            threshold,
            fp as f64 / negatives as f64,
            tp as f64 / positives as f64,
        ));
    }
    Some(RocCurve { points })
}

impl RocCurve {
    /// Trapezoidal area under the curve, starting from (0, 0)
    fn auc(&self) -> f64 {
        let mut area = 0.0;
        let (mut prev_fpr, mut prev_tpr) = (0.0, 0.0);
        for &(_, fpr, tpr) in &self.points {
            area += (fpr - prev_fpr) * (tpr + prev_tpr) / 2.0;
            prev_fpr = fpr;
            prev_tpr = tpr;
        }
        area
    }

    /// First threshold with the highest J
    fn youden(&self) -> Option<(f64, f64)> {
        self.points
            .iter()
            .map(|&(t, fpr, tpr)| (t, tpr - fpr))
            .fold(None, |best, (t, j)| match best {
                Some((_, best_j)) if best_j >= j => best,
                _ => Some((t, j)),
            })
    }
}
