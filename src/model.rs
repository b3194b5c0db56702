use std::path::Path;

use crate::ensemble::NativeRegressor;
use crate::error::{ArtifactError, ModelError};

/// Opaque scorer: one aligned, scaled row in, active power (kW) out.
pub trait TrainedModel: Send + Sync {
    /// Input width the model was trained on.
    fn n_features(&self) -> usize;

    fn predict(&self, x: &[f64]) -> Result<f64, ModelError>;
}

/// Load a model artifact, choosing the backend from the file extension.
pub fn load_model(name: &str, path: &Path) -> Result<Box<dyn TrainedModel>, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::NotFound {
            name: name.to_string(),
            path: path.to_path_buf(),
        });
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("pt") => load_torchscript(name, path),
        _ => {
            let bytes = std::fs::read(path).map_err(|e| ArtifactError::malformed(name, e))?;
            let model = NativeRegressor::from_json(&bytes).map_err(|e| ArtifactError::malformed(name, e))?;
            Ok(Box::new(model))
        }
    }
}

#[cfg(feature = "torchscript")]
fn load_torchscript(name: &str, path: &Path) -> Result<Box<dyn TrainedModel>, ArtifactError> {
    let model = torchscript::TorchModel::load(path).map_err(|e| ArtifactError::malformed(name, e))?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "torchscript"))]
fn load_torchscript(name: &str, _path: &Path) -> Result<Box<dyn TrainedModel>, ArtifactError> {
    Err(ArtifactError::malformed(
        name,
        "TorchScript models need the `torchscript` feature",
    ))
}

#[cfg(feature = "torchscript")]
mod torchscript {
    use anyhow::{bail, Context, Result};
    use std::path::Path;
    use tch::{kind::Kind, CModule, Device, Tensor};

    use super::TrainedModel;
    use crate::error::ModelError;

    pub struct TorchModel {
        model: CModule,
        device: Device,
        in_dim: usize,
    }

    impl TorchModel {
        /// The input width is not stored in a TorchScript file, so it is read
        /// from the first linear layer's weight `[out, in]`.
        pub fn load(path: &Path) -> Result<Self> {
            let device = Device::Cpu;
            let model = CModule::load_on_device(path, device)
                .with_context(|| format!("failed to load TorchScript {}", path.display()))?;

            let in_dim = model
                .named_parameters()?
                .into_iter()
                .find(|(n, t)| n.ends_with("weight") && t.dim() == 2)
                .map(|(_, t)| t.size()[1] as usize)
                .context("no 2-D weight to infer input width from")?;

            // Check output shape with a dummy forward; expect [1, 1] or [1]
            let dummy = Tensor::zeros([1, in_dim as i64], (Kind::Float, device));
            let t = model.forward_ts(&[dummy])?;
            if t.numel() != 1 {
                bail!("unexpected model output size: {:?}", t.size());
            }

            Ok(Self { model, device, in_dim })
        }
    }

    impl TrainedModel for TorchModel {
        fn n_features(&self) -> usize {
            self.in_dim
        }

        fn predict(&self, x: &[f64]) -> Result<f64, ModelError> {
            if x.len() != self.in_dim {
                return Err(ModelError::Shape {
                    got: x.len(),
                    expected: self.in_dim,
                });
            }
            let input = Tensor::from_slice(x)
                .to_kind(Kind::Float)
                .reshape([1, self.in_dim as i64])
                .to_device(self.device);
            let t = self
                .model
                .forward_ts(&[input])
                .map_err(|e| ModelError::Backend(e.to_string()))?;
            let y = t
                .reshape([-1])
                .double_value(&[0]);
            if !y.is_finite() {
                return Err(ModelError::NonFinite);
            }
            Ok(y)
        }
    }
}
