use serde::{Deserialize, Serialize};

use crate::error::PredictError;

/// Unit attached to every prediction.
pub const UNIT: &str = "kW";

/// Preferred default for the weather description selector.
pub const DEFAULT_DESCRIPTION: &str = "clear sky";

/// Bounds and default of one numeric input field.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub min: f64,
    pub max: Option<f64>,
    pub default: f64,
}

impl FieldSpec {
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && self.max.map_or(true, |max| v <= max)
    }

    fn range(&self) -> String {
        match self.max {
            Some(max) => format!("[{}, {}]", self.min, max),
            None => format!("[{}, inf)", self.min),
        }
    }
}

/// The seven numeric inputs, in the order the training data lists them.
pub static FIELD_SPECS: [FieldSpec; 7] = [
    FieldSpec { name: "current", label: "Current (A)", min: 0.0, max: None, default: 2.53 },
    FieldSpec { name: "voltage", label: "Voltage (V)", min: 0.0, max: None, default: 122.20 },
    FieldSpec { name: "temp", label: "Temperature (°C)", min: -50.0, max: None, default: 24.19 },
    FieldSpec { name: "pressure", label: "Pressure (hPa)", min: 0.0, max: None, default: 1013.00 },
    FieldSpec { name: "humidity", label: "Humidity (%)", min: 0.0, max: Some(100.0), default: 39.00 },
    FieldSpec { name: "speed", label: "Wind speed (m/s)", min: 0.0, max: None, default: 0.00 },
    FieldSpec { name: "deg", label: "Wind direction (°)", min: 0.0, max: Some(360.0), default: 0.00 },
];

/// One form submission, complete. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub current: f64,
    pub voltage: f64,
    pub temp: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub speed: f64,
    pub deg: f64,
    pub description: String,
}

impl Default for FeatureRow {
    fn default() -> Self {
        FeatureRequest::default().into_row(Some(DEFAULT_DESCRIPTION))
    }
}

/// JSON request body. Absent numeric keys take the form defaults; an
/// absent description takes the model's default label.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeatureRequest {
    pub current: f64,
    pub voltage: f64,
    pub temp: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub speed: f64,
    pub deg: f64,
    pub description: Option<String>,
}

impl Default for FeatureRequest {
    fn default() -> Self {
        Self {
            current: FIELD_SPECS[0].default,
            voltage: FIELD_SPECS[1].default,
            temp: FIELD_SPECS[2].default,
            pressure: FIELD_SPECS[3].default,
            humidity: FIELD_SPECS[4].default,
            speed: FIELD_SPECS[5].default,
            deg: FIELD_SPECS[6].default,
            description: None,
        }
    }
}

impl FeatureRequest {
    /// `default_label` comes from `KnownCategories::default_label`.
    pub fn into_row(self, default_label: Option<&str>) -> FeatureRow {
        let description = self
            .description
            .or_else(|| default_label.map(str::to_string))
            .unwrap_or_default();
        FeatureRow {
            current: self.current,
            voltage: self.voltage,
            temp: self.temp,
            pressure: self.pressure,
            humidity: self.humidity,
            speed: self.speed,
            deg: self.deg,
            description,
        }
    }
}

impl FeatureRow {
    /// Numeric values paired with their column names, in `FIELD_SPECS` order.
    pub fn numeric_values(&self) -> [(&'static str, f64); 7] {
        [
            ("current", self.current),
            ("voltage", self.voltage),
            ("temp", self.temp),
            ("pressure", self.pressure),
            ("humidity", self.humidity),
            ("speed", self.speed),
            ("deg", self.deg),
        ]
    }

    /// Input-boundary range check. The pipeline never calls this itself.
    pub fn validate(&self) -> Result<(), PredictError> {
        for (spec, (_, value)) in FIELD_SPECS.iter().zip(self.numeric_values()) {
            if !value.is_finite() || !spec.contains(value) {
                return Err(PredictError::OutOfRange {
                    field: spec.name,
                    value,
                    range: spec.range(),
                });
            }
        }
        Ok(())
    }
}

/// A scored row, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Rounded to two decimals.
    pub value_kw: f64,
    pub raw_kw: f64,
    pub unit: &'static str,
    pub display: String,
}

impl Prediction {
    /// `value_kw` is read back from the two-decimal text so both fields
    /// always show the same number.
    pub fn from_raw(raw_kw: f64) -> Self {
        let text = format!("{:.2}", raw_kw);
        Self {
            value_kw: text.parse().unwrap_or(raw_kw),
            raw_kw,
            unit: UNIT,
            display: format!("{} {}", text, UNIT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_form() {
        let row = FeatureRow::default();
        assert_eq!(row.current, 2.53);
        assert_eq!(row.pressure, 1013.0);
        assert_eq!(row.description, "clear sky");
        assert!(row.validate().is_ok());
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let req: FeatureRequest = serde_json::from_str(r#"{"temp": 30.5}"#).unwrap();
        assert_eq!(req.description, None);
        let row = req.into_row(Some("broken clouds"));
        assert_eq!(row.temp, 30.5);
        assert_eq!(row.voltage, 122.20);
        assert_eq!(row.description, "broken clouds");
    }

    #[test]
    fn explicit_description_wins_over_default() {
        let req: FeatureRequest = serde_json::from_str(r#"{"description": "mist"}"#).unwrap();
        assert_eq!(req.into_row(Some("clear sky")).description, "mist");
    }

    #[test]
    fn validate_rejects_out_of_range() {
        let row = FeatureRow { humidity: 101.0, ..FeatureRow::default() };
        match row.validate() {
            Err(PredictError::OutOfRange { field, .. }) => assert_eq!(field, "humidity"),
            other => panic!("unexpected {:?}", other),
        }

        let row = FeatureRow { temp: -50.0, deg: 360.0, ..FeatureRow::default() };
        assert!(row.validate().is_ok());

        let row = FeatureRow { current: f64::NAN, ..FeatureRow::default() };
        assert!(row.validate().is_err());
    }

    #[test]
    fn prediction_formats_two_decimals() {
        let p = Prediction::from_raw(12.3456);
        assert_eq!(p.value_kw, 12.35);
        assert_eq!(p.display, "12.35 kW");
        assert_eq!(p.unit, "kW");
    }

    #[test]
    fn value_and_display_agree_on_ties() {
        for (raw, shown) in [(0.125, "0.12"), (2.675, "2.67"), (1.625, "1.62")] {
            let p = Prediction::from_raw(raw);
            assert_eq!(p.display, format!("{} kW", shown));
            assert_eq!(format!("{:.2}", p.value_kw), shown);
            assert_eq!(p.value_kw, shown.parse::<f64>().unwrap());
        }
    }
}
