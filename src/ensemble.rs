//! Native scorer for regressors exported to JSON.
//!
//! Trees use the flat parallel-array layout of the training library:
//! node `i` is a leaf when `children_left[i] == -1`, otherwise the row
//! goes left when `x[feature[i]] <= threshold[i]`.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::model::TrainedModel;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    fn predict(&self, x: &[f64]) -> f64 {
        self.intercept + self.coef.iter().zip(x).map(|(c, v)| c * v).sum::<f64>()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<f64>,
}

impl DecisionTree {
    fn validate(&self, width: usize) -> Result<(), String> {
        let n = self.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".into());
        }
        if [
            self.children_right.len(),
            self.feature.len(),
            self.threshold.len(),
            self.value.len(),
        ]
        .iter()
        .any(|&l| l != n)
        {
            return Err("tree arrays differ in length".into());
        }
        for i in 0..n {
            let (l, r) = (self.children_left[i], self.children_right[i]);
            if l == -1 {
                continue;
            }
            // children always sit after their parent, so descent terminates
            for child in [l, r] {
                if child <= i as i64 || child >= n as i64 {
                    return Err(format!("node {} has invalid child {}", i, child));
                }
            }
            let f = self.feature[i];
            if f < 0 || f as usize >= width {
                return Err(format!("node {} splits on feature {} of {}", i, f, width));
            }
        }
        Ok(())
    }

    fn predict(&self, x: &[f64]) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] != -1 {
            let f = self.feature[node] as usize;
            node = if x[f] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stacking {
    pub estimators: Vec<Estimator>,
    pub final_estimator: Estimator,
    #[serde(default)]
    pub passthrough: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    Linear(LinearModel),
    DecisionTree(DecisionTree),
    RandomForest {
        trees: Vec<DecisionTree>,
    },
    GradientBoosting {
        init: f64,
        learning_rate: f64,
        trees: Vec<DecisionTree>,
    },
    Stacking(Box<Stacking>),
}

impl Estimator {
    /// Checks structure against an input of `width` columns.
    pub fn validate(&self, width: usize) -> Result<(), String> {
        match self {
            Estimator::Linear(m) => {
                if m.coef.len() != width {
                    return Err(format!("linear model has {} coefficients, input has {}", m.coef.len(), width));
                }
                Ok(())
            }
            Estimator::DecisionTree(t) => t.validate(width),
            Estimator::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err("random forest has no trees".into());
                }
                trees.iter().try_for_each(|t| t.validate(width))
            }
            Estimator::GradientBoosting { trees, .. } => {
                trees.iter().try_for_each(|t| t.validate(width))
            }
            Estimator::Stacking(s) => {
                if s.estimators.is_empty() {
                    return Err("stacking model has no base estimators".into());
                }
                s.estimators.iter().try_for_each(|e| e.validate(width))?;
                let meta_width = s.estimators.len() + if s.passthrough { width } else { 0 };
                s.final_estimator.validate(meta_width)
            }
        }
    }

    pub fn predict(&self, x: &[f64]) -> f64 {
        match self {
            Estimator::Linear(m) => m.predict(x),
            Estimator::DecisionTree(t) => t.predict(x),
            Estimator::RandomForest { trees } => {
                trees.iter().map(|t| t.predict(x)).sum::<f64>() / trees.len() as f64
            }
            Estimator::GradientBoosting {
                init,
                learning_rate,
                trees,
            } => init + learning_rate * trees.iter().map(|t| t.predict(x)).sum::<f64>(),
            Estimator::Stacking(s) => {
                let mut meta: Vec<f64> = s.estimators.iter().map(|e| e.predict(x)).collect();
                if s.passthrough {
                    meta.extend_from_slice(x);
                }
                s.final_estimator.predict(&meta)
            }
        }
    }
}

/// Top-level JSON model document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeRegressor {
    pub n_features_in: usize,
    pub model: Estimator,
}

impl NativeRegressor {
    pub fn from_json(bytes: &[u8]) -> Result<Self, String> {
        let r: NativeRegressor = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        r.model.validate(r.n_features_in)?;
        Ok(r)
    }
}

impl TrainedModel for NativeRegressor {
    fn n_features(&self) -> usize {
        self.n_features_in
    }

    fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
        if x.len() != self.n_features_in {
            return Err(ModelError::Shape {
                got: x.len(),
                expected: self.n_features_in,
            });
        }
        let y = self.model.predict(x);
        if !y.is_finite() {
            return Err(ModelError::NonFinite);
        }
        Ok(y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // x[0] <= 1.0 -> 10, else 20
    fn stump(feature: i64) -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![feature, -2, -2],
            threshold: vec![1.0, -2.0, -2.0],
            value: vec![15.0, 10.0, 20.0],
        }
    }

    #[test]
    fn tree_follows_threshold() {
        let t = stump(0);
        assert!(t.validate(2).is_ok());
        assert_eq!(t.predict(&[1.0, 0.0]), 10.0);
        assert_eq!(t.predict(&[1.5, 0.0]), 20.0);
    }

    #[test]
    fn tree_rejects_backward_children() {
        let mut t = stump(0);
        t.children_left[0] = 0;
        assert!(t.validate(2).is_err());
        assert!(stump(5).validate(2).is_err());
    }

    #[test]
    fn boosting_and_forest_combine_trees() {
        let forest = Estimator::RandomForest { trees: vec![stump(0), stump(1)] };
        assert_eq!(forest.predict(&[0.0, 2.0]), 15.0);

        let gb = Estimator::GradientBoosting {
            init: 1.0,
            learning_rate: 0.1,
            trees: vec![stump(0), stump(0)],
        };
        assert!((gb.predict(&[2.0, 0.0]) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn stacking_feeds_base_predictions_to_final() {
        let model = Estimator::Stacking(Box::new(Stacking {
            estimators: vec![
                Estimator::Linear(LinearModel { coef: vec![1.0, 1.0], intercept: 0.0 }),
                Estimator::DecisionTree(stump(0)),
            ],
            final_estimator: Estimator::Linear(LinearModel {
                coef: vec![0.5, 0.5, 0.0, 2.0],
                intercept: 1.0,
            }),
            passthrough: true,
        }));
        assert!(model.validate(2).is_ok());
        // base: [3, 20]; meta: [3, 20, 2, 1]
        assert_eq!(model.predict(&[2.0, 1.0]), 1.0 + 1.5 + 10.0 + 2.0);
        assert!(model.validate(3).is_err());
    }

    #[test]
    fn regressor_checks_width_and_finiteness() {
        let json = r#"{
            "n_features_in": 2,
            "model": {"kind": "linear", "coef": [1.0, 2.0], "intercept": 0.5}
        }"#;
        let r = NativeRegressor::from_json(json.as_bytes()).unwrap();
        assert_eq!(r.predict(&[1.0, 1.0]), Ok(3.5));
        assert_eq!(
            r.predict(&[1.0]),
            Err(ModelError::Shape { got: 1, expected: 2 })
        );
        assert_eq!(r.predict(&[f64::MAX, f64::MAX]), Err(ModelError::NonFinite));
    }

    #[test]
    fn regressor_rejects_mismatched_coefficients() {
        let json = r#"{"n_features_in": 3, "model": {"kind": "linear", "coef": [1.0], "intercept": 0.0}}"#;
        assert!(NativeRegressor::from_json(json.as_bytes()).is_err());
    }
}
