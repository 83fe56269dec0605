//! Image controls: per-key schema and typed values
//!
//! Control patches arrive as loosely typed JSON. Each known control name has
//! a fixed kind in `CONTROL_SCHEMA`; values are coerced to that kind on the
//! way in. Names outside the schema are not controls and are skipped.

use crate::driver::ControlRange;
use crate::CaptureError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How a control value is coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Stored as an integer (enums, microseconds)
    Int,
    /// Stored as a float
    Float,
    /// Stored as received (booleans, rectangles)
    Passthrough,
}

/// Control name to kind
pub const CONTROL_SCHEMA: &[(&str, ControlKind)] = &[
    ("AfMode", ControlKind::Int),
    ("AeConstraintMode", ControlKind::Int),
    ("AeExposureMode", ControlKind::Int),
    ("AeFlickerMode", ControlKind::Int),
    ("AeFlickerPeriod", ControlKind::Int),
    ("AeMeteringMode", ControlKind::Int),
    ("AfRange", ControlKind::Int),
    ("AfSpeed", ControlKind::Int),
    ("AwbMode", ControlKind::Int),
    ("ExposureTime", ControlKind::Int),
    ("Brightness", ControlKind::Float),
    ("Contrast", ControlKind::Float),
    ("Saturation", ControlKind::Float),
    ("Sharpness", ControlKind::Float),
    ("ExposureValue", ControlKind::Float),
    ("LensPosition", ControlKind::Float),
    ("AnalogueGain", ControlKind::Float),
    ("AeEnable", ControlKind::Passthrough),
    ("AwbEnable", ControlKind::Passthrough),
    ("ScalerCrop", ControlKind::Passthrough),
];

/// Look up the kind of a control name
pub fn control_kind(key: &str) -> Option<ControlKind> {
    CONTROL_SCHEMA
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
}

/// A single control value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Raw(Value),
}

impl ControlValue {
    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ControlValue::Int(v) => Some(*v as f64),
            ControlValue::Float(v) => Some(*v),
            ControlValue::Bool(_) | ControlValue::Raw(_) => None,
        }
    }

    /// Integer view of the value, if it has one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ControlValue::Int(v) => Some(*v),
            ControlValue::Float(v) => Some(v.trunc() as i64),
            ControlValue::Bool(_) | ControlValue::Raw(_) => None,
        }
    }

    /// Truthiness as the UI sends it (`true`, `1`)
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ControlValue::Bool(v) => Some(*v),
            ControlValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

fn invalid(key: &str, expected: &str, raw: &Value) -> CaptureError {
    CaptureError::InvalidControl {
        key: key.to_string(),
        reason: format!("expected {}, got {}", expected, raw),
    }
}

/// Coerce a raw JSON value according to the schema
///
/// Returns `Ok(None)` for names that are not controls.
pub fn coerce(key: &str, raw: &Value) -> Result<Option<ControlValue>, CaptureError> {
    let Some(kind) = control_kind(key) else {
        return Ok(None);
    };

    let value = match kind {
        ControlKind::Int => {
            let parsed = match raw {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                Value::Bool(b) => Some(i64::from(*b)),
                _ => None,
            };
            ControlValue::Int(parsed.ok_or_else(|| invalid(key, "integer", raw))?)
        }
        ControlKind::Float => {
            let parsed = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                _ => None,
            };
            ControlValue::Float(parsed.ok_or_else(|| invalid(key, "number", raw))?)
        }
        ControlKind::Passthrough => match raw {
            Value::Bool(b) => ControlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ControlValue::Int(i),
                None => ControlValue::Float(n.as_f64().unwrap_or_default()),
            },
            other => ControlValue::Raw(other.clone()),
        },
    };

    Ok(Some(value))
}

/// Flags taking the control value as a float
const FLOAT_FLAGS: &[(&str, &str)] = &[
    ("Brightness", "--brightness"),
    ("Contrast", "--contrast"),
    ("Saturation", "--saturation"),
    ("Sharpness", "--sharpness"),
    ("ExposureValue", "--ev"),
];

/// Flags taking a named mode selected by an integer control
const ENUM_FLAGS: &[(&str, &str, &[&str])] = &[
    ("AeMeteringMode", "--metering", &["centre", "spot", "average", "custom"]),
    ("AeExposureMode", "--exposure", &["normal", "short", "long", "custom"]),
    (
        "AwbMode",
        "--awb",
        &[
            "auto",
            "incandescent",
            "tungsten",
            "fluorescent",
            "indoor",
            "daylight",
            "cloudy",
            "custom",
        ],
    ),
    ("AfMode", "--autofocus-mode", &["manual", "auto", "continuous"]),
];

/// Ordered map of control name to value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlSet(BTreeMap<String, ControlValue>);

impl ControlSet {
    /// Empty set
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Controls applied to a freshly detected camera
    pub fn defaults() -> Self {
        let mut set = Self::new();
        set.insert("AeMeteringMode", ControlValue::Int(0));
        set.insert("Contrast", ControlValue::Float(1.0));
        set.insert("AnalogueGain", ControlValue::Float(1.0));
        set.insert("AeEnable", ControlValue::Bool(false));
        set.insert("SyncFrames", ControlValue::Int(100));
        set.insert("ExposureValue", ControlValue::Float(0.0));
        set.insert("AeFlickerMode", ControlValue::Int(0));
        set.insert("ExposureTime", ControlValue::Int(20000));
        set.insert("AeExposureMode", ControlValue::Int(0));
        set.insert("SyncMode", ControlValue::Int(0));
        set.insert("AeConstraintMode", ControlValue::Int(0));
        set.insert("AwbEnable", ControlValue::Bool(false));
        set.insert("AwbMode", ControlValue::Int(0));
        set.insert("ColourTemperature", ControlValue::Int(100));
        set.insert("Saturation", ControlValue::Float(1.0));
        set.insert("CnnEnableInputTensor", ControlValue::Bool(false));
        set.insert("Brightness", ControlValue::Float(0.0));
        set.insert("Sharpness", ControlValue::Float(1.0));
        set
    }

    pub fn get(&self, key: &str) -> Option<&ControlValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ControlValue) {
        self.0.insert(key.into(), value);
    }

    /// Coerce and store a raw value; returns false for non-control names
    pub fn set_raw(&mut self, key: &str, raw: &Value) -> Result<bool, CaptureError> {
        match coerce(key, raw)? {
            Some(value) => {
                self.0.insert(key.to_string(), value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ControlValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object view
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(ControlValue::as_bool).unwrap_or(false)
    }

    /// Check numeric values against the device's limits
    pub fn validate(&self, limits: &BTreeMap<String, ControlRange>) -> Result<(), CaptureError> {
        for (key, value) in &self.0 {
            let (Some(range), Some(v)) = (limits.get(key), value.as_f64()) else {
                continue;
            };
            if !range.contains(v) {
                return Err(CaptureError::InvalidControl {
                    key: key.clone(),
                    reason: format!("{} outside [{}, {}]", v, range.min, range.max),
                });
            }
        }
        Ok(())
    }

    /// Render the controls as capture-tool flags, in a fixed order
    pub fn tool_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        for (key, flag) in FLOAT_FLAGS {
            if let Some(v) = self.get(key).and_then(ControlValue::as_f64) {
                args.push(flag.to_string());
                args.push(v.to_string());
            }
        }

        // Manual exposure only applies with auto-exposure off
        if !self.flag("AeEnable") {
            if let Some(us) = self.get("ExposureTime").and_then(ControlValue::as_i64) {
                if us > 0 {
                    args.push("--shutter".to_string());
                    args.push(us.to_string());
                }
            }
            if let Some(gain) = self.get("AnalogueGain").and_then(ControlValue::as_f64) {
                if gain > 0.0 {
                    args.push("--gain".to_string());
                    args.push(gain.to_string());
                }
            }
        }

        for (key, flag, names) in ENUM_FLAGS {
            let Some(index) = self.get(key).and_then(ControlValue::as_i64) else {
                continue;
            };
            if let Some(name) = usize::try_from(index).ok().and_then(|i| names.get(i)) {
                args.push(flag.to_string());
                args.push(name.to_string());
            }
        }

        if let Some(pos) = self.get("LensPosition").and_then(ControlValue::as_f64) {
            args.push("--lens-position".to_string());
            args.push(pos.to_string());
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_kinds() {
        assert_eq!(control_kind("ExposureTime"), Some(ControlKind::Int));
        assert_eq!(control_kind("Brightness"), Some(ControlKind::Float));
        assert_eq!(control_kind("ScalerCrop"), Some(ControlKind::Passthrough));
        assert_eq!(control_kind("Resolution"), None);
    }

    #[test]
    fn test_coerce_int_from_string_and_float() {
        assert_eq!(coerce("AwbMode", &json!("3")).unwrap(), Some(ControlValue::Int(3)));
        assert_eq!(coerce("ExposureTime", &json!(1500.7)).unwrap(), Some(ControlValue::Int(1500)));
    }

    #[test]
    fn test_coerce_float_from_int() {
        assert_eq!(coerce("Brightness", &json!(1)).unwrap(), Some(ControlValue::Float(1.0)));
        assert_eq!(coerce("Contrast", &json!("2.5")).unwrap(), Some(ControlValue::Float(2.5)));
    }

    #[test]
    fn test_coerce_rejects_garbage() {
        assert!(coerce("Brightness", &json!("bright")).is_err());
        assert!(coerce("AfMode", &json!([1, 2])).is_err());
    }

    #[test]
    fn test_passthrough_keeps_shape() {
        assert_eq!(coerce("AeEnable", &json!(true)).unwrap(), Some(ControlValue::Bool(true)));
        let crop = json!([0, 0, 4056, 3040]);
        assert_eq!(coerce("ScalerCrop", &crop).unwrap(), Some(ControlValue::Raw(crop.clone())));
    }

    #[test]
    fn test_unknown_name_ignored() {
        let mut set = ControlSet::new();
        assert!(!set.set_raw("NotAControl", &json!(5)).unwrap());
        assert!(set.is_empty());
    }

    #[test]
    fn test_defaults_serialize_as_json_object() {
        let json = ControlSet::defaults().to_json();
        assert_eq!(json["ExposureTime"], json!(20000));
        assert_eq!(json["Contrast"], json!(1.0));
        assert_eq!(json["AeEnable"], json!(false));
    }

    #[test]
    fn test_roundtrip_keeps_types() {
        let set = ControlSet::defaults();
        let text = serde_json::to_string(&set).unwrap();
        let back: ControlSet = serde_json::from_str(&text).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_validate_range() {
        let mut limits = BTreeMap::new();
        limits.insert(
            "Brightness".to_string(),
            ControlRange { min: -1.0, max: 1.0, default: 0.0 },
        );

        let mut set = ControlSet::new();
        set.insert("Brightness", ControlValue::Float(0.5));
        assert!(set.validate(&limits).is_ok());

        set.insert("Brightness", ControlValue::Float(3.0));
        assert!(matches!(
            set.validate(&limits),
            Err(CaptureError::InvalidControl { .. })
        ));
    }

    #[test]
    fn test_tool_args_manual_exposure() {
        let args = ControlSet::defaults().tool_args();
        let joined = args.join(" ");
        assert!(joined.contains("--brightness 0"));
        assert!(joined.contains("--shutter 20000"));
        assert!(joined.contains("--gain 1"));
        assert!(joined.contains("--awb auto"));
        assert!(joined.contains("--metering centre"));
    }

    #[test]
    fn test_tool_args_auto_exposure_skips_shutter() {
        let mut set = ControlSet::defaults();
        set.insert("AeEnable", ControlValue::Bool(true));
        let args = set.tool_args();
        assert!(!args.contains(&"--shutter".to_string()));
        assert!(!args.contains(&"--gain".to_string()));
    }
}
