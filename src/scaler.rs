use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;
use crate::schema::NumericalFeatureSet;

/// Per-feature standardization parameters, `(v - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    pub feature_names_in: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FittedScaler {
    /// Fails unless the scaler was fit on exactly `features`, in order.
    /// Scaling in any other order yields silently wrong values.
    pub fn check_against(&self, features: &NumericalFeatureSet) -> Result<(), ArtifactError> {
        let n = self.feature_names_in.len();
        if self.mean.len() != n || self.scale.len() != n {
            return Err(ArtifactError::Inconsistent(format!(
                "scaler has {} names, {} means, {} scales",
                n,
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.feature_names_in != features.names() {
            return Err(ArtifactError::Inconsistent(format!(
                "scaler was fit on {:?} but numerical features are {:?}",
                self.feature_names_in,
                features.names()
            )));
        }
        if let Some(i) = self
            .mean
            .iter()
            .chain(&self.scale)
            .position(|v| !v.is_finite())
        {
            return Err(ArtifactError::Inconsistent(format!(
                "scaler parameter #{} is not finite",
                i
            )));
        }
        Ok(())
    }

    /// `(mean, stddev)` for the i-th fitted feature. A zero scale marks a
    /// constant training feature and is replayed as 1.
    pub fn params(&self, i: usize) -> (f64, f64) {
        let std = self.scale[i];
        (self.mean[i], if std == 0.0 { 1.0 } else { std })
    }
}
