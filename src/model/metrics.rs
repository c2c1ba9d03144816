//! Binary classification metrics over the test partition.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(actual: &[i32], predicted: &[i32]) -> Self {
        let mut cm = Self::default();
        for (&t, &p) in actual.iter().zip(predicted) {
            match (t == 1, p == 1) {
                (true, true) => cm.tp += 1,
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// `[[tn, fp], [fn, tp]]`, rows actual, columns predicted.
    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }
}

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `None` when the evaluated rows contain a single class.
    pub roc_auc: Option<f64>,
    pub confusion_matrix: [[usize; 2]; 2],
}

impl ClassificationMetrics {
    pub fn calculate(actual: &[i32], predicted: &[i32], probability: &[f64]) -> Self {
        let cm = ConfusionMatrix::from_predictions(actual, predicted);
        let precision = ratio(cm.tp, cm.tp + cm.fp);
        let recall = ratio(cm.tp, cm.tp + cm.fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            accuracy: ratio(cm.tp + cm.tn, cm.total()),
            precision,
            recall,
            f1,
            roc_auc: roc_auc(actual, probability),
            confusion_matrix: cm.as_rows(),
        }
    }
}

pub fn accuracy(actual: &[i32], predicted: &[i32]) -> f64 {
    let correct = actual.iter().zip(predicted).filter(|(a, p)| a == p).count();
    ratio(correct, actual.len())
}

/// Area under the ROC curve via the Mann-Whitney U statistic. Tied scores
/// share their average rank.
pub fn roc_auc(actual: &[i32], score: &[f64]) -> Option<f64> {
    let mut pairs: Vec<(f64, bool)> = score
        .iter()
        .zip(actual)
        .map(|(&s, &t)| (s, t == 1))
        .collect();
    let n_pos = pairs.iter().filter(|(_, t)| *t).count();
    let n_neg = pairs.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        while j + 1 < pairs.len() && pairs[j + 1].0 == pairs[i].0 {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        let positives = pairs[i..=j].iter().filter(|(_, t)| *t).count();
        rank_sum_pos += avg_rank * positives as f64;
        i = j + 1;
    }

    let u = rank_sum_pos - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}
