//! Request-time path from a form submission to a kW figure.
//!
//! encode -> align -> scale -> score -> format. Every step is pure; the
//! bundle is shared read-only between requests.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::artifacts::ArtifactBundle;
use crate::error::PredictError;
use crate::schema::indicator_name;
use crate::types::{FeatureRow, Prediction};

/// Column name -> value for one row, before alignment.
pub type EncodedRow = HashMap<String, f64>;

/// What to do with a weather description the model never saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategoryPolicy {
    /// Fail the request with `PredictError::UnknownCategory`.
    #[default]
    Reject,
    /// Drop the indicator during alignment; every description column is 0.
    ZeroFill,
}

impl FromStr for UnknownCategoryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reject" => Ok(Self::Reject),
            "zero_fill" => Ok(Self::ZeroFill),
            other => Err(format!("unknown policy `{}`", other)),
        }
    }
}

/// Model input before and after scaling, with column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedInput {
    pub columns: Vec<String>,
    pub pre_scale: Vec<f64>,
    pub scaled: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct InferencePipeline {
    bundle: Arc<ArtifactBundle>,
    policy: UnknownCategoryPolicy,
}

impl InferencePipeline {
    pub fn new(bundle: Arc<ArtifactBundle>, policy: UnknownCategoryPolicy) -> Self {
        Self { bundle, policy }
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    /// One-hot the description and name every numeric field. Other
    /// indicator columns are left absent; alignment zero-fills them.
    pub fn encode(&self, row: &FeatureRow) -> EncodedRow {
        let mut encoded: EncodedRow = row
            .numeric_values()
            .iter()
            .map(|(name, v)| (name.to_string(), *v))
            .collect();
        encoded.insert(indicator_name(&row.description), 1.0);
        encoded
    }

    /// Project onto the canonical columns in canonical order. Absent
    /// columns become 0; columns outside the schema are dropped.
    pub fn align(&self, encoded: &EncodedRow) -> Vec<f64> {
        self.bundle
            .schema
            .columns()
            .iter()
            .map(|c| encoded.get(c).copied().unwrap_or(0.0))
            .collect()
    }

    /// Standardize the numerical columns in place. One-hot columns are
    /// never in the plan. `aligned` is always schema-wide here.
    pub(crate) fn scale(&self, aligned: &mut [f64]) {
        for step in self.bundle.scale_plan() {
            let v = &mut aligned[step.column];
            *v = (*v - step.mean) / step.std;
        }
    }

    pub fn prepare(&self, row: &FeatureRow) -> Result<PreparedInput, PredictError> {
        if self.policy == UnknownCategoryPolicy::Reject
            && !self.bundle.categories.contains(&row.description)
        {
            return Err(PredictError::UnknownCategory(row.description.clone()));
        }

        let encoded = self.encode(row);
        let pre_scale = self.align(&encoded);
        let mut scaled = pre_scale.clone();
        self.scale(&mut scaled);

        Ok(PreparedInput {
            columns: self.bundle.schema.columns().to_vec(),
            pre_scale,
            scaled,
        })
    }

    /// Score an already prepared input.
    pub fn score(&self, prepared: &PreparedInput) -> Result<Prediction, PredictError> {
        let expected = self.bundle.model.n_features();
        if prepared.scaled.len() != expected {
            return Err(PredictError::InternalAlignment(format!(
                "aligned vector has {} columns, model expects {}",
                prepared.scaled.len(),
                expected
            )));
        }
        let raw = self.bundle.model.predict(&prepared.scaled)?;
        Ok(Prediction::from_raw(raw))
    }

    pub fn predict(&self, row: &FeatureRow) -> Result<Prediction, PredictError> {
        let prepared = self.prepare(row)?;
        let prediction = self.score(&prepared)?;
        tracing::debug!(
            description = %row.description,
            kw = prediction.raw_kw,
            "prediction"
        );
        Ok(prediction)
    }
}

/// One-line statistics of a model input, for `LOG_PRED` diagnostics.
pub fn summarize(columns: &[String], v: &[f64]) -> String {
    let nz = v.iter().filter(|x| **x != 0.0).count();
    let mean = if v.is_empty() { 0.0 } else { v.iter().sum::<f64>() / v.len() as f64 };
    let std = if v.len() < 2 {
        0.0
    } else {
        (v.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / v.len() as f64).sqrt()
    };
    let sample: Vec<String> = columns
        .iter()
        .zip(v)
        .take(6)
        .map(|(name, x)| format!("{}={:.3}", name, x))
        .collect();
    format!(
        "in_dim={} nonzero={} mean={:.3} std={:.3} sample=[{}]",
        v.len(),
        nz,
        mean,
        std,
        sample.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{Estimator, LinearModel, NativeRegressor};
    use crate::error::ModelError;
    use crate::model::TrainedModel;
    use crate::scaler::FittedScaler;
    use crate::schema::{CanonicalColumnSchema, KnownCategories, NumericalFeatureSet};

    const NUMERIC: [&str; 7] = ["current", "voltage", "temp", "pressure", "humidity", "speed", "deg"];

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn bundle_with(model: Box<dyn TrainedModel>) -> Arc<ArtifactBundle> {
        let mut columns = strings(&NUMERIC);
        columns.extend(strings(&["description_clear sky", "description_rain"]));
        let mut mean = vec![0.0; 7];
        let mut scale = vec![1.0; 7];
        mean[0] = 2.0;
        scale[0] = 0.5;
        Arc::new(
            ArtifactBundle::new(
                model,
                FittedScaler { feature_names_in: strings(&NUMERIC), mean, scale },
                CanonicalColumnSchema::new(columns).unwrap(),
                KnownCategories(strings(&["clear sky", "rain"])),
                NumericalFeatureSet(strings(&NUMERIC)),
            )
            .unwrap(),
        )
    }

    fn sum_model() -> Box<dyn TrainedModel> {
        Box::new(NativeRegressor {
            n_features_in: 9,
            model: Estimator::Linear(LinearModel { coef: vec![1.0; 9], intercept: 0.0 }),
        })
    }

    fn example_row() -> FeatureRow {
        FeatureRow {
            current: 2.53,
            voltage: 122.20,
            temp: 24.19,
            pressure: 1013.00,
            humidity: 39.00,
            speed: 0.0,
            deg: 0.0,
            description: "clear sky".into(),
        }
    }

    #[test]
    fn example_scenario_aligns_and_scales() {
        let p = InferencePipeline::new(bundle_with(sum_model()), UnknownCategoryPolicy::Reject);
        let prepared = p.prepare(&example_row()).unwrap();
        assert_eq!(
            prepared.pre_scale,
            vec![2.53, 122.20, 24.19, 1013.00, 39.00, 0.0, 0.0, 1.0, 0.0]
        );
        assert!((prepared.scaled[0] - 1.06).abs() < 1e-9);
        assert_eq!(&prepared.scaled[1..], &prepared.pre_scale[1..]);
    }

    #[test]
    fn encode_leaves_other_indicators_absent() {
        let p = InferencePipeline::new(bundle_with(sum_model()), UnknownCategoryPolicy::Reject);
        let enc = p.encode(&example_row());
        assert_eq!(enc.len(), 8);
        assert_eq!(enc.get("description_clear sky"), Some(&1.0));
        assert!(!enc.contains_key("description_rain"));
    }

    #[test]
    fn unknown_category_follows_policy() {
        let row = FeatureRow { description: "volcanic ash".into(), ..example_row() };

        let strict = InferencePipeline::new(bundle_with(sum_model()), UnknownCategoryPolicy::Reject);
        assert_eq!(
            strict.predict(&row),
            Err(PredictError::UnknownCategory("volcanic ash".into()))
        );

        let lenient = InferencePipeline::new(bundle_with(sum_model()), UnknownCategoryPolicy::ZeroFill);
        let prepared = lenient.prepare(&row).unwrap();
        assert_eq!(&prepared.pre_scale[7..], &[0.0, 0.0]);
        assert!(lenient.predict(&row).is_ok());
    }

    #[test]
    fn predict_formats_scored_value() {
        let p = InferencePipeline::new(bundle_with(sum_model()), UnknownCategoryPolicy::Reject);
        let out = p.predict(&example_row()).unwrap();
        let expected: f64 = 1.06 + 122.20 + 24.19 + 1013.00 + 39.00 + 1.0;
        assert!((out.raw_kw - expected).abs() < 1e-9);
        assert_eq!(out.display, format!("{:.2} kW", out.raw_kw));
    }

    struct Failing;

    impl TrainedModel for Failing {
        fn n_features(&self) -> usize {
            9
        }
        fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
            Err(ModelError::Shape { got: x.len(), expected: 10 })
        }
    }

    #[test]
    fn model_failure_is_internal_alignment() {
        let p = InferencePipeline::new(bundle_with(Box::new(Failing)), UnknownCategoryPolicy::Reject);
        let err = p.predict(&example_row()).unwrap_err();
        assert_eq!(err.kind(), "internal_alignment");
    }

    #[test]
    fn score_rejects_wrong_width() {
        let p = InferencePipeline::new(bundle_with(sum_model()), UnknownCategoryPolicy::Reject);
        let mut prepared = p.prepare(&example_row()).unwrap();
        prepared.scaled.pop();
        assert!(matches!(p.score(&prepared), Err(PredictError::InternalAlignment(_))));
    }

    #[test]
    fn summarize_reports_shape() {
        let s = summarize(&strings(&["a", "b"]), &[0.0, 2.0]);
        assert!(s.starts_with("in_dim=2 nonzero=1 mean=1.000 std=1.000"));
        assert!(s.contains("b=2.000"));
    }

    #[test]
    fn policy_parses_from_env_strings() {
        assert_eq!("zero_fill".parse(), Ok(UnknownCategoryPolicy::ZeroFill));
        assert!("maybe".parse::<UnknownCategoryPolicy>().is_err());
    }
}
