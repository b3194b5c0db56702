//! Loading of the training-time artifacts and their one-time sharing.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ArtifactError;
use crate::model::{load_model, TrainedModel};
use crate::scaler::FittedScaler;
use crate::schema::{
    indicator_name, is_indicator, CanonicalColumnSchema, KnownCategories, NumericalFeatureSet,
};

pub const MODEL_FILE: &str = "stacking_regressor_model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const COLUMNS_FILE: &str = "original_X_columns.json";
pub const CATEGORIES_FILE: &str = "all_descriptions.json";
pub const NUMERICAL_FILE: &str = "numerical_features.json";

/// Source of the trained artifacts.
pub trait ArtifactStore {
    fn model(&self) -> Result<Box<dyn TrainedModel>, ArtifactError>;
    fn scaler(&self) -> Result<FittedScaler, ArtifactError>;
    fn canonical_columns(&self) -> Result<CanonicalColumnSchema, ArtifactError>;
    fn known_categories(&self) -> Result<KnownCategories, ArtifactError>;
    fn numerical_features(&self) -> Result<NumericalFeatureSet, ArtifactError>;
}

/// Artifacts stored as files in one directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
    model_file: String,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            model_file: MODEL_FILE.to_string(),
        }
    }

    pub fn with_model_file(mut self, name: impl Into<String>) -> Self {
        self.model_file = name.into();
        self
    }

    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T, ArtifactError> {
        let path = self.dir.join(file);
        let data = match std::fs::read(&path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound {
                    name: file.to_string(),
                    path,
                })
            }
            Err(e) => return Err(ArtifactError::malformed(file, e)),
        };
        serde_json::from_slice(&data).map_err(|e| ArtifactError::malformed(file, e))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn model(&self) -> Result<Box<dyn TrainedModel>, ArtifactError> {
        load_model(&self.model_file, &self.dir.join(&self.model_file))
    }

    fn scaler(&self) -> Result<FittedScaler, ArtifactError> {
        self.read_json(SCALER_FILE)
    }

    fn canonical_columns(&self) -> Result<CanonicalColumnSchema, ArtifactError> {
        self.read_json(COLUMNS_FILE)
    }

    fn known_categories(&self) -> Result<KnownCategories, ArtifactError> {
        self.read_json(CATEGORIES_FILE)
    }

    fn numerical_features(&self) -> Result<NumericalFeatureSet, ArtifactError> {
        self.read_json(NUMERICAL_FILE)
    }
}

/// One numeric column's replay of the fitted scaler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleStep {
    pub column: usize,
    pub mean: f64,
    pub std: f64,
}

/// Every artifact a prediction needs, cross-checked and immutable.
pub struct ArtifactBundle {
    pub model: Box<dyn TrainedModel>,
    pub schema: CanonicalColumnSchema,
    pub categories: KnownCategories,
    scale_plan: Vec<ScaleStep>,
}

impl std::fmt::Debug for ArtifactBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBundle")
            .field("n_features", &self.model.n_features())
            .field("schema", &self.schema.columns())
            .field("categories", &self.categories)
            .field("scale_plan", &self.scale_plan)
            .finish()
    }
}

impl ArtifactBundle {
    pub fn load(store: &dyn ArtifactStore) -> Result<Self, ArtifactError> {
        let schema = store.canonical_columns()?;
        let numerical = store.numerical_features()?;
        let scaler = store.scaler()?;
        let categories = store.known_categories()?;
        let model = store.model()?;
        Self::new(model, scaler, schema, categories, numerical)
    }

    pub fn new(
        model: Box<dyn TrainedModel>,
        scaler: FittedScaler,
        schema: CanonicalColumnSchema,
        categories: KnownCategories,
        numerical: NumericalFeatureSet,
    ) -> Result<Self, ArtifactError> {
        scaler.check_against(&numerical)?;

        let mut scale_plan = Vec::with_capacity(numerical.names().len());
        for (i, name) in numerical.names().iter().enumerate() {
            if is_indicator(name) {
                return Err(ArtifactError::Inconsistent(format!(
                    "one-hot column `{}` is listed as numerical",
                    name
                )));
            }
            let column = schema.position(name).ok_or_else(|| {
                ArtifactError::Inconsistent(format!(
                    "numerical feature `{}` is not a canonical column",
                    name
                ))
            })?;
            let (mean, std) = scaler.params(i);
            scale_plan.push(ScaleStep { column, mean, std });
        }

        if model.n_features() != schema.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "model expects {} features but the canonical schema has {} columns",
                model.n_features(),
                schema.len()
            )));
        }

        // A known label must always be able to set its indicator
        if let Some(label) = categories
            .labels()
            .iter()
            .find(|label| schema.position(&indicator_name(label)).is_none())
        {
            return Err(ArtifactError::Inconsistent(format!(
                "known description `{}` has no `{}` column",
                label,
                indicator_name(label)
            )));
        }

        Ok(Self {
            model,
            schema,
            categories,
            scale_plan,
        })
    }

    /// Scaling steps in numerical-feature order.
    pub fn scale_plan(&self) -> &[ScaleStep] {
        &self.scale_plan
    }
}

/// Load-once holder for the process-wide bundle.
///
/// Callers racing on a cold cell serialize on the lock; only the first
/// runs the loader and the rest receive its `Arc`. Failures are not cached.
#[derive(Default)]
pub struct BundleCell {
    inner: Mutex<Option<Arc<ArtifactBundle>>>,
}

impl BundleCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load<F>(&self, load: F) -> Result<Arc<ArtifactBundle>, ArtifactError>
    where
        F: FnOnce() -> Result<ArtifactBundle, ArtifactError>,
    {
        let mut slot = self.inner.lock();
        if let Some(b) = slot.as_ref() {
            return Ok(Arc::clone(b));
        }
        let bundle = Arc::new(load()?);
        *slot = Some(Arc::clone(&bundle));
        Ok(bundle)
    }
}
