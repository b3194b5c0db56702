//! Column metadata captured at training time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ArtifactError;
use crate::types::DEFAULT_DESCRIPTION;

/// Prefix the training-time one-hot encoder put in front of each
/// weather description.
pub const DESCRIPTION_PREFIX: &str = "description_";

pub fn indicator_name(label: &str) -> String {
    format!("{}{}", DESCRIPTION_PREFIX, label)
}

pub fn is_indicator(column: &str) -> bool {
    column.starts_with(DESCRIPTION_PREFIX)
}

/// Authoritative model input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CanonicalColumnSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl CanonicalColumnSchema {
    pub fn new(columns: Vec<String>) -> Result<Self, ArtifactError> {
        if columns.is_empty() {
            return Err(ArtifactError::Inconsistent("canonical column list is empty".into()));
        }
        let mut index = HashMap::with_capacity(columns.len());
        for (i, c) in columns.iter().enumerate() {
            if index.insert(c.clone(), i).is_some() {
                return Err(ArtifactError::Inconsistent(format!(
                    "duplicate canonical column `{}`",
                    c
                )));
            }
        }
        Ok(Self { columns, index })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }
}

impl TryFrom<Vec<String>> for CanonicalColumnSchema {
    type Error = ArtifactError;

    fn try_from(columns: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<CanonicalColumnSchema> for Vec<String> {
    fn from(s: CanonicalColumnSchema) -> Self {
        s.columns
    }
}

/// Columns the fitted scaler applies to, in the order it was fit on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumericalFeatureSet(pub Vec<String>);

impl NumericalFeatureSet {
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

/// Weather descriptions seen during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownCategories(pub Vec<String>);

impl KnownCategories {
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.iter().any(|l| l == label)
    }

    /// `"clear sky"` when known, otherwise the first label.
    pub fn default_label(&self) -> Option<&str> {
        if self.contains(DEFAULT_DESCRIPTION) {
            Some(DEFAULT_DESCRIPTION)
        } else {
            self.0.first().map(String::as_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn schema_rejects_duplicates_and_empty() {
        assert!(CanonicalColumnSchema::new(vec![]).is_err());
        assert!(CanonicalColumnSchema::new(cols(&["current", "current"])).is_err());
    }

    #[test]
    fn schema_positions_follow_input_order() {
        let s = CanonicalColumnSchema::new(cols(&[
            "current",
            "voltage",
            "description_clear sky",
            "description_rain",
        ]))
        .unwrap();
        assert_eq!(s.position("voltage"), Some(1));
        assert_eq!(s.position("description_snow"), None);
        assert_eq!(s.position("description_rain"), Some(3));
    }

    #[test]
    fn schema_deserializes_through_validation() {
        let ok: CanonicalColumnSchema = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(ok.len(), 2);
        assert!(serde_json::from_str::<CanonicalColumnSchema>(r#"["a","a"]"#).is_err());
    }

    #[test]
    fn default_label_prefers_clear_sky() {
        let k = KnownCategories(cols(&["broken clouds", "clear sky"]));
        assert_eq!(k.default_label(), Some("clear sky"));
        let k = KnownCategories(cols(&["mist", "rain"]));
        assert_eq!(k.default_label(), Some("mist"));
        assert_eq!(KnownCategories(vec![]).default_label(), None);
    }

    #[test]
    fn indicator_names_use_prefix() {
        assert_eq!(indicator_name("clear sky"), "description_clear sky");
        assert!(is_indicator("description_rain"));
        assert!(!is_indicator("deg"));
    }
}
