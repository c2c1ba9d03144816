use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use super::classifiers::Classifier;
use super::metrics::accuracy;
use crate::error::ModelError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

fn ranked(names: &[String], scores: Vec<f64>) -> Vec<FeatureImportance> {
    let mut out: Vec<FeatureImportance> = names
        .iter()
        .cloned()
        .zip(scores)
        .map(|(feature, importance)| FeatureImportance {
            feature,
            importance,
        })
        .collect();
    out.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    out
}

/// Absolute logistic-regression weights, largest first.
pub fn coefficient_importance(names: &[String], coefficients: &[f64]) -> Vec<FeatureImportance> {
    ranked(names, coefficients.iter().map(|c| c.abs()).collect())
}

/// Accuracy lost when one feature column is shuffled, largest first.
pub fn permutation_importance(
    model: &dyn Classifier,
    rows: &[Vec<f64>],
    labels: &[i32],
    names: &[String],
    seed: u64,
) -> Result<Vec<FeatureImportance>, ModelError> {
    let baseline = accuracy(labels, &model.predict(rows)?);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut scores = Vec::with_capacity(names.len());

    for j in 0..names.len() {
        let mut column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
        column.shuffle(&mut rng);
        let permuted: Vec<Vec<f64>> = rows
            .iter()
            .zip(&column)
            .map(|(r, v)| {
                let mut r = r.clone();
                r[j] = *v;
                r
            })
            .collect();
        scores.push(baseline - accuracy(labels, &model.predict(&permuted)?));
    }
    Ok(ranked(names, scores))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Predicts 1 when the first feature is positive; ignores the rest.
    struct FirstFeature;

    impl Classifier for FirstFeature {
        fn name(&self) -> &'static str {
            "first_feature"
        }

        fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<i32>, ModelError> {
            Ok(rows.iter().map(|r| (r[0] > 0.0) as i32).collect())
        }

        fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
            Ok(self.predict(rows)?.into_iter().map(f64::from).collect())
        }
    }

    #[test]
    fn test_coefficients_ranked_by_magnitude() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranked = coefficient_importance(&names, &[0.5, -2.0, 1.0]);
        let order: Vec<&str> = ranked.iter().map(|f| f.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(ranked[0].importance, 2.0);
    }

    #[test]
    fn test_unused_feature_has_zero_importance() -> Result<(), ModelError> {
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![if i % 2 == 0 { 1.0 } else { -1.0 }, i as f64])
            .collect();
        let labels: Vec<i32> = (0..40).map(|i| (i % 2 == 0) as i32).collect();
        let names = vec!["signal".to_string(), "noise".to_string()];

        let ranked = permutation_importance(&FirstFeature, &rows, &labels, &names, 42)?;
        assert_eq!(ranked[0].feature, "signal");
        assert!(ranked[0].importance > 0.0);
        assert_eq!(ranked[1].importance, 0.0);
        Ok(())
    }
}
