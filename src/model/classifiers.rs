//! Thin wrappers around the smartcore estimators.

use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use smartcore::{
    linalg::basic::{arrays::Array, matrix::DenseMatrix},
    linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters},
    tree::decision_tree_classifier::{DecisionTreeClassifier, DecisionTreeClassifierParameters},
};
use tracing::{debug, info};

use super::dataset::StandardScaler;
use crate::config::ModelingConfig;
use crate::error::ModelError;

fn matrix(rows: &[Vec<f64>]) -> Result<DenseMatrix<f64>, ModelError> {
    DenseMatrix::from_2d_vec(&rows.to_vec())
        .map_err(|e| ModelError::Training(format!("building feature matrix: {:?}", e)))
}

/// Row indices that give both classes the weight of the larger one: every
/// row once, then minority rows repeated in order until the counts match.
pub fn balanced_indices(labels: &[i32]) -> Vec<usize> {
    let (pos, neg) = class_indices(labels);
    let target = pos.len().max(neg.len());
    let mut out = Vec::with_capacity(target * 2);
    for class in [&neg, &pos] {
        out.extend(class.iter().copied().cycle().take(target));
    }
    out
}

fn class_indices(labels: &[i32]) -> (Vec<usize>, Vec<usize>) {
    (0..labels.len()).partition(|&i| labels[i] == 1)
}

fn select(rows: &[Vec<f64>], labels: &[i32], idx: &[usize]) -> (Vec<Vec<f64>>, Vec<i32>) {
    (
        idx.iter().map(|&i| rows[i].clone()).collect(),
        idx.iter().map(|&i| labels[i]).collect(),
    )
}

/// A fitted binary classifier over encoded (unscaled) feature rows.
pub trait Classifier {
    fn name(&self) -> &'static str;

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<i32>, ModelError>;

    /// Probability of the positive class.
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;
}

/// Logistic regression on standardized inputs. The scaler is fit on the
/// training rows and applied to every row the model sees.
pub struct LogisticModel {
    scaler: StandardScaler,
    model: LogisticRegression<f64, i32, DenseMatrix<f64>, Vec<i32>>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticModel {
    pub fn fit(rows: &[Vec<f64>], labels: &[i32], cfg: &ModelingConfig) -> Result<Self, ModelError> {
        let scaler = StandardScaler::fit(rows);
        let (x, y) = if cfg.balance_classes {
            let (r, l) = select(rows, labels, &balanced_indices(labels));
            (matrix(&scaler.transform(&r))?, l)
        } else {
            (matrix(&scaler.transform(rows))?, labels.to_vec())
        };
        let params = LogisticRegressionParameters::default().with_alpha(cfg.logistic_alpha);
        let model = LogisticRegression::fit(&x, &y, params)
            .map_err(|e| ModelError::Training(format!("logistic regression: {:?}", e)))?;

        let width = rows.first().map_or(0, Vec::len);
        let coef = model.coefficients();
        // binary models hold a single row of weights; accept a column too
        let single_row = coef.shape().0 == 1;
        let coefficients: Vec<f64> = (0..width)
            .map(|j| if single_row { *coef.get((0, j)) } else { *coef.get((j, 0)) })
            .collect();
        let intercept = *model.intercept().get((0, 0));

        info!(features = width, intercept, "logistic regression fitted");
        Ok(Self {
            scaler,
            model,
            coefficients,
            intercept,
        })
    }

    /// Weights on the standardized features, in input column order.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }
}

impl Classifier for LogisticModel {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<i32>, ModelError> {
        let x = matrix(&self.scaler.transform(rows))?;
        self.model
            .predict(&x)
            .map_err(|e| ModelError::Prediction(format!("{:?}", e)))
    }

    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        Ok(self
            .scaler
            .transform(rows)
            .iter()
            .map(|r| {
                let z: f64 = r
                    .iter()
                    .zip(&self.coefficients)
                    .map(|(x, w)| x * w)
                    .sum::<f64>()
                    + self.intercept;
                1.0 / (1.0 + (-z).exp())
            })
            .collect())
    }
}

type Tree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// Bagged decision trees. Each tree sees a bootstrap sample drawn from a
/// seeded generator; every sample holds both classes so each tree's
/// probability matrix has one column per class.
pub struct ForestModel {
    trees: Vec<Tree>,
}

fn bootstrap(pos: &[usize], neg: &[usize], balanced: bool, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let n = pos.len() + neg.len();
    if balanced {
        let half = (n / 2).max(1);
        let mut out: Vec<usize> = (0..half).filter_map(|_| neg.choose(rng).copied()).collect();
        out.extend((0..half).filter_map(|_| pos.choose(rng).copied()));
        return out;
    }
    let mut drawn_pos = 0;
    let mut out: Vec<usize> = (0..n)
        .map(|_| {
            let k = rng.gen_range(0..n);
            if k < pos.len() {
                drawn_pos += 1;
                pos[k]
            } else {
                neg[k - pos.len()]
            }
        })
        .collect();
    // a one-class sample cannot be fit; swap one row for the missing class
    let missing = if drawn_pos == 0 {
        pos.choose(rng)
    } else if drawn_pos == n {
        neg.choose(rng)
    } else {
        None
    };
    if let Some(&i) = missing {
        out[0] = i;
    }
    out
}

impl ForestModel {
    pub fn fit(
        rows: &[Vec<f64>],
        labels: &[i32],
        cfg: &ModelingConfig,
        seed: u64,
    ) -> Result<Self, ModelError> {
        let (pos, neg) = class_indices(labels);
        if pos.is_empty() || neg.is_empty() {
            return Err(ModelError::Training(
                "random forest needs both classes in the training rows".to_string(),
            ));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let params = DecisionTreeClassifierParameters::default()
            .with_max_depth(cfg.forest_max_depth)
            .with_min_samples_split(cfg.forest_min_samples_split);

        let mut trees = Vec::with_capacity(cfg.forest_trees as usize);
        for t in 0..cfg.forest_trees.max(1) {
            let idx = bootstrap(&pos, &neg, cfg.balance_classes, &mut rng);
            let (r, y) = select(rows, labels, &idx);
            let tree = DecisionTreeClassifier::fit(&matrix(&r)?, &y, params.clone())
                .map_err(|e| ModelError::Training(format!("random forest tree {}: {:?}", t, e)))?;
            debug!(tree = t, depth = tree.depth(), "tree fitted");
            trees.push(tree);
        }
        info!(
            trees = trees.len(),
            max_depth = cfg.forest_max_depth,
            balanced = cfg.balance_classes,
            "random forest fitted"
        );
        Ok(Self { trees })
    }
}

impl Classifier for ForestModel {
    fn name(&self) -> &'static str {
        "random_forest"
    }

    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<i32>, ModelError> {
        Ok(self
            .predict_proba(rows)?
            .into_iter()
            .map(|p| (p >= 0.5) as i32)
            .collect())
    }

    /// Mean over trees of each tree's positive-class probability.
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let x = matrix(rows)?;
        let mut sum = vec![0.0; rows.len()];
        for tree in &self.trees {
            let proba = tree
                .predict_proba(&x)
                .map_err(|e| ModelError::Prediction(format!("{:?}", e)))?;
            let (n, classes) = proba.shape();
            if classes != 2 || n != sum.len() {
                return Err(ModelError::Prediction(format!(
                    "tree returned a {}x{} probability matrix",
                    n, classes
                )));
            }
            // classes are sorted, so column 1 is label 1
            for (i, acc) in sum.iter_mut().enumerate() {
                *acc += *proba.get((i, 1));
            }
        }
        let trees = self.trees.len() as f64;
        Ok(sum.into_iter().map(|s| s / trees).collect())
    }
}
