//! Configuration patches
//!
//! A patch is a flat JSON object as the web UI posts it, e.g.
//! `{"Brightness": 0.3}` or `{"Resolution": 2, "hflip": 1}`. Each key is
//! classified into a namespace and coerced per the control schema. Keys that
//! belong to no namespace are ignored.

use crate::config::{value_to_bool, value_to_u64, LiveConfiguration};
use crate::SessionError;
use camera_capture::Codec;
use serde_json::{Map, Value};
use tracing::debug;

/// Section of the live configuration a key belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Namespace {
    Controls,
    Capture,
    Gpio,
    SensorMode,
    Rotation,
}

impl Namespace {
    /// Top-level key of this section in the serialized configuration
    pub fn key(&self) -> &'static str {
        match self {
            Namespace::Controls => "controls",
            Namespace::Capture => "capture-settings",
            Namespace::Gpio => "GPIO",
            Namespace::SensorMode => "sensor-mode",
            Namespace::Rotation => "rotation",
        }
    }
}

/// Result of applying a patch to a configuration
#[derive(Debug, Clone)]
pub struct AppliedPatch {
    pub config: LiveConfiguration,
    /// Namespaces that received at least one key, in namespace order
    pub touched: Vec<Namespace>,
    /// The stream must be stopped and relaunched
    pub restart: bool,
}

impl AppliedPatch {
    fn touch(&mut self, namespace: Namespace, restart: bool) {
        if !self.touched.contains(&namespace) {
            self.touched.push(namespace);
            self.touched.sort();
        }
        self.restart |= restart;
    }

    /// Resulting settings for the touched namespaces
    ///
    /// A single namespace yields its sub-map directly; several yield an
    /// object keyed by namespace.
    pub fn settings_view(&self) -> Value {
        match self.touched.as_slice() {
            [only] => self.config.section(only.key()),
            many => Value::Object(
                many.iter()
                    .map(|ns| (ns.key().to_string(), self.config.section(ns.key())))
                    .collect(),
            ),
        }
    }
}

fn invalid(key: &str, value: &Value, expected: &str) -> SessionError {
    SessionError::InvalidInput(format!("{}: expected {}, got {}", key, expected, value))
}

fn flag(key: &str, value: &Value) -> Result<bool, SessionError> {
    value_to_bool(value).ok_or_else(|| invalid(key, value, "a flag"))
}

fn index(key: &str, value: &Value, available: usize) -> Result<usize, SessionError> {
    let idx = value_to_u64(value)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| invalid(key, value, "an index"))?;
    if idx >= available {
        return Err(SessionError::InvalidInput(format!(
            "{} index {} out of range ({} available)",
            key, idx, available
        )));
    }
    Ok(idx)
}

fn whole(key: &str, value: &Value) -> Result<u32, SessionError> {
    value_to_u64(value)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| invalid(key, value, "a whole number"))
}

/// Apply `patch` to a copy of `current`
///
/// `resolutions` and `sensor_modes` are the sizes of the camera's tables;
/// indices outside them are rejected rather than clamped. A patch without
/// any recognized key fails with `NothingToUpdate`.
pub fn apply_patch(
    current: &LiveConfiguration,
    patch: &Map<String, Value>,
    resolutions: usize,
    sensor_modes: usize,
) -> Result<AppliedPatch, SessionError> {
    let mut applied = AppliedPatch {
        config: current.clone(),
        touched: Vec::new(),
        restart: false,
    };

    for (key, value) in patch {
        let config = &mut applied.config;
        match key.as_str() {
            "Resolution" => {
                config.capture.resolution = index(key, value, resolutions)?;
                applied.touch(Namespace::Capture, true);
            }
            "Encoder" => {
                let name = value.as_str().ok_or_else(|| invalid(key, value, "an encoder name"))?;
                if Codec::from_encoder(name).is_none() {
                    return Err(SessionError::InvalidInput(format!("unknown encoder {}", name)));
                }
                config.capture.encoder = name.to_string();
                applied.touch(Namespace::Capture, true);
            }
            "FrameRate" => {
                let fps = whole(key, value)?;
                if fps == 0 {
                    return Err(SessionError::InvalidInput("FrameRate must be positive".into()));
                }
                config.capture.frame_rate = fps;
                applied.touch(Namespace::Capture, true);
            }
            "makeRaw" => {
                config.capture.make_raw = flag(key, value)?;
                applied.touch(Namespace::Capture, false);
            }
            "Resize" => {
                config.capture.resize = flag(key, value)?;
                applied.touch(Namespace::Capture, false);
            }
            "enableGPIO" => {
                config.gpio.enable = flag(key, value)?;
                applied.touch(Namespace::Gpio, false);
            }
            "button" => {
                config.gpio.button = whole(key, value)?;
                applied.touch(Namespace::Gpio, false);
            }
            "led" => {
                config.gpio.led = whole(key, value)?;
                applied.touch(Namespace::Gpio, false);
            }
            "sensor-mode" => {
                config.sensor_mode = index(key, value, sensor_modes)?;
                applied.touch(Namespace::SensorMode, true);
            }
            "hflip" => {
                config.rotation.hflip = flag(key, value)?;
                applied.touch(Namespace::Rotation, true);
            }
            "vflip" => {
                config.rotation.vflip = flag(key, value)?;
                applied.touch(Namespace::Rotation, true);
            }
            _ => {
                if config.controls.set_raw(key, value)? {
                    applied.touch(Namespace::Controls, false);
                } else {
                    debug!("Ignoring unknown setting {}", key);
                }
            }
        }
    }

    if applied.touched.is_empty() {
        return Err(SessionError::NothingToUpdate);
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camera_capture::ControlValue;
    use serde_json::json;

    fn patch(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("patch must be an object"),
        }
    }

    #[test]
    fn test_control_does_not_restart() {
        let base = LiveConfiguration::default();
        let applied = apply_patch(&base, &patch(json!({ "Brightness": "0.5" })), 4, 4).unwrap();
        assert!(!applied.restart);
        assert_eq!(applied.touched, vec![Namespace::Controls]);
        assert_eq!(
            applied.config.controls.get("Brightness"),
            Some(&ControlValue::Float(0.5))
        );
        assert_eq!(applied.settings_view()["Brightness"], 0.5);
    }

    #[test]
    fn test_int_control_truncated() {
        let base = LiveConfiguration::default();
        let applied = apply_patch(&base, &patch(json!({ "ExposureTime": 1234.9 })), 4, 4).unwrap();
        assert_eq!(
            applied.config.controls.get("ExposureTime"),
            Some(&ControlValue::Int(1234))
        );
    }

    #[test]
    fn test_resolution_restarts() {
        let base = LiveConfiguration::default();
        let applied = apply_patch(&base, &patch(json!({ "Resolution": "2" })), 4, 4).unwrap();
        assert!(applied.restart);
        assert_eq!(applied.config.capture.resolution, 2);
        assert_eq!(applied.settings_view()["Resolution"], 2);
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let base = LiveConfiguration::default();
        let err = apply_patch(&base, &patch(json!({ "Resolution": 4 })), 4, 4).unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        let err = apply_patch(&base, &patch(json!({ "sensor-mode": 9 })), 4, 4).unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let base = LiveConfiguration::default();
        let applied =
            apply_patch(&base, &patch(json!({ "Bogus": 1, "Contrast": 2 })), 4, 4).unwrap();
        assert_eq!(applied.touched, vec![Namespace::Controls]);

        let err = apply_patch(&base, &patch(json!({ "Bogus": 1 })), 4, 4).unwrap_err();
        assert!(matches!(err, SessionError::NothingToUpdate));
    }

    #[test]
    fn test_unknown_encoder_rejected() {
        let base = LiveConfiguration::default();
        let err = apply_patch(&base, &patch(json!({ "Encoder": "VP9" })), 4, 4).unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));

        let applied =
            apply_patch(&base, &patch(json!({ "Encoder": "H264Encoder" })), 4, 4).unwrap();
        assert!(applied.restart);
        assert_eq!(applied.config.capture.codec(), Codec::H264);
    }

    #[test]
    fn test_several_namespaces() {
        let base = LiveConfiguration::default();
        let applied = apply_patch(
            &base,
            &patch(json!({ "hflip": true, "makeRaw": 1, "led": "7" })),
            4,
            4,
        )
        .unwrap();
        assert!(applied.restart);
        assert_eq!(
            applied.touched,
            vec![Namespace::Capture, Namespace::Gpio, Namespace::Rotation]
        );
        let view = applied.settings_view();
        assert_eq!(view["rotation"]["hflip"], 1);
        assert_eq!(view["capture-settings"]["makeRaw"], true);
        assert_eq!(view["GPIO"]["led"], 7);
    }

    #[test]
    fn test_failed_patch_leaves_current_untouched() {
        let base = LiveConfiguration::default();
        let result = apply_patch(&base, &patch(json!({ "Brightness": 0.4, "Resolution": 99 })), 4, 4);
        assert!(result.is_err());
        assert_eq!(base, LiveConfiguration::default());
    }
}
