//! Active power prediction from electrical and weather readings.
//!
//! Loads the artifacts of an offline-trained regressor once, then turns
//! single form submissions into model-ready vectors and kW predictions.

pub mod artifacts;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod remote;
pub mod scaler;
pub mod schema;
pub mod server;
pub mod types;

pub use artifacts::{ArtifactBundle, ArtifactStore, BundleCell, FsArtifactStore};
pub use error::{ArtifactError, ModelError, PredictError};
pub use pipeline::{InferencePipeline, UnknownCategoryPolicy};
pub use types::{FeatureRequest, FeatureRow, Prediction};
