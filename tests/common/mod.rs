#![allow(dead_code)]

use serde_json::json;
use std::path::Path;

pub const NUMERIC: [&str; 7] = ["current", "voltage", "temp", "pressure", "humidity", "speed", "deg"];
pub const DESCRIPTIONS: [&str; 4] = ["broken clouds", "clear sky", "few clouds", "light rain"];

pub fn canonical_columns() -> Vec<String> {
    NUMERIC
        .iter()
        .map(|s| s.to_string())
        .chain(DESCRIPTIONS.iter().map(|d| format!("description_{}", d)))
        .collect()
}

/// Write a full artifact set: a stacking model over an active-power
/// linear term (current * voltage dominates) and a temperature stump.
pub fn write_artifacts(dir: &Path) {
    let width = canonical_columns().len();

    let mut coef = vec![0.0; width];
    coef[0] = 0.3; // current
    coef[1] = 0.05; // voltage
    coef[7 + 3] = -0.1; // light rain

    let model = json!({
        "n_features_in": width,
        "model": {
            "kind": "stacking",
            "estimators": [
                {"kind": "linear", "coef": coef, "intercept": 0.31},
                {
                    "kind": "decision_tree",
                    "children_left": [1, -1, -1],
                    "children_right": [2, -1, -1],
                    "feature": [2, -2, -2],
                    "threshold": [0.0, -2.0, -2.0],
                    "value": [0.3, 0.25, 0.35]
                }
            ],
            "final_estimator": {"kind": "linear", "coef": [0.9, 0.1], "intercept": 0.0},
            "passthrough": false
        }
    });
    let scaler = json!({
        "feature_names_in": NUMERIC,
        "mean": [2.0, 120.0, 20.0, 1013.0, 50.0, 2.0, 180.0],
        "scale": [0.5, 2.0, 5.0, 5.0, 20.0, 1.5, 100.0]
    });

    write(dir, "stacking_regressor_model.json", &model);
    write(dir, "scaler.json", &scaler);
    write(dir, "original_X_columns.json", &json!(canonical_columns()));
    write(dir, "all_descriptions.json", &json!(DESCRIPTIONS));
    write(dir, "numerical_features.json", &json!(NUMERIC));
}

pub fn write(dir: &Path, file: &str, value: &serde_json::Value) {
    std::fs::write(dir.join(file), serde_json::to_vec_pretty(value).unwrap()).unwrap();
}
