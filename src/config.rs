use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::pipeline::UnknownCategoryPolicy;
use crate::remote::RemoteArtifact;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServeConfig {
    pub artifact_dir: PathBuf,
    pub model_file: String,
    pub port: u16,
    pub unknown_category: UnknownCategoryPolicy,
    /// Fetched into `artifact_dir` as `model_file` before loading.
    pub remote_model: Option<RemoteArtifact>,
    pub fetch_timeout_secs: u64,
    pub fetch_attempts: u32,
    /// Log per-request input statistics.
    pub log_pred: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            artifact_dir: PathBuf::from("artifacts"),
            model_file: crate::artifacts::MODEL_FILE.to_string(),
            port: 8080,
            unknown_category: UnknownCategoryPolicy::Reject,
            remote_model: None,
            fetch_timeout_secs: 60,
            fetch_attempts: 3,
            log_pred: false,
        }
    }
}

impl ServeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    /// `CONFIG_PATH` file (if set), then individual env overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var("CONFIG_PATH") {
            Ok(p) => Self::load(Path::new(&p))?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|k| std::env::var(k).ok())
    }

    /// Apply env overrides on top of `self`, then [`validate`](Self::validate).
    pub fn with_overrides<F>(mut self, var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(v) = var("ARTIFACT_DIR") {
            self.artifact_dir = PathBuf::from(v);
        }
        if let Some(v) = var("MODEL_FILE") {
            self.model_file = v;
        }
        if let Some(v) = var("PORT") {
            self.port = parse("PORT", v)?;
        }
        if let Some(v) = var("UNKNOWN_CATEGORY") {
            self.unknown_category = parse("UNKNOWN_CATEGORY", v)?;
        }
        if let Some(v) = var("FETCH_TIMEOUT_SECS") {
            self.fetch_timeout_secs = parse("FETCH_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = var("FETCH_ATTEMPTS") {
            self.fetch_attempts = parse("FETCH_ATTEMPTS", v)?;
        }
        if let Some(v) = var("LOG_PRED") {
            self.log_pred = v == "1";
        }
        match (var("MODEL_URL"), var("MODEL_SHA256")) {
            (Some(url), Some(sha256)) => {
                self.remote_model = Some(RemoteArtifact {
                    url,
                    sha256,
                    file_name: self.model_file.clone(),
                });
            }
            (Some(_), None) => {
                return Err(ConfigError::Env {
                    var: "MODEL_SHA256",
                    value: "<unset>; required with MODEL_URL".into(),
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Env {
                    var: "MODEL_URL",
                    value: "<unset>; required with MODEL_SHA256".into(),
                })
            }
            (None, None) => {}
        }
        self.validate()?;
        Ok(self)
    }

    /// The downloaded model must land where the store will read it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(remote) = &self.remote_model {
            if remote.file_name != self.model_file {
                return Err(ConfigError::Invalid(format!(
                    "remote_model.file_name `{}` differs from model_file `{}`",
                    remote.file_name, self.model_file
                )));
            }
            if remote.sha256.is_empty() {
                return Err(ConfigError::Invalid("remote_model.sha256 is empty".into()));
            }
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env { var, value })
}
