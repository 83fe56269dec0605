//! Live camera configuration
//!
//! Serialized with the key names the web UI and saved configuration files
//! use (`capture-settings`, `sensor-mode`, `GPIO`, ...). Files written by
//! older releases store flags as 0/1 and indices as strings, so reading is
//! lenient about both.

use camera_capture::{Codec, ControlSet, FALLBACK_RESOLUTION};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

/// Default encoder name
pub const DEFAULT_ENCODER: &str = "MJPEGEncoder";

/// Default target frame rate
pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Flip flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rotation {
    #[serde(default, deserialize_with = "lenient_bool", serialize_with = "bool_as_int")]
    pub hflip: bool,
    #[serde(default, deserialize_with = "lenient_bool", serialize_with = "bool_as_int")]
    pub vflip: bool,
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Index into the camera's resolution table
    #[serde(rename = "Resolution", default, deserialize_with = "lenient_index")]
    pub resolution: usize,
    /// Encoder name, e.g. `MJPEGEncoder` or `H264Encoder`
    #[serde(rename = "Encoder", default = "default_encoder")]
    pub encoder: String,
    #[serde(
        rename = "FrameRate",
        default = "default_frame_rate",
        deserialize_with = "lenient_u32"
    )]
    pub frame_rate: u32,
    /// Keep a raw DNG alongside stills
    #[serde(rename = "makeRaw", default, deserialize_with = "lenient_bool")]
    pub make_raw: bool,
    #[serde(rename = "Resize", default, deserialize_with = "lenient_bool")]
    pub resize: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            resolution: 0,
            encoder: default_encoder(),
            frame_rate: DEFAULT_FRAME_RATE,
            make_raw: false,
            resize: false,
        }
    }
}

impl CaptureSettings {
    /// Codec for recordings; unknown encoder names fall back to MJPEG
    pub fn codec(&self) -> Codec {
        Codec::from_encoder(&self.encoder).unwrap_or(Codec::Mjpeg)
    }
}

/// Button/LED pin binding (board numbering)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioSettings {
    #[serde(rename = "enableGPIO", default, deserialize_with = "lenient_bool")]
    pub enable: bool,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub button: u32,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub led: u32,
}

/// Everything the session applies to its camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveConfiguration {
    #[serde(default = "ControlSet::defaults")]
    pub controls: ControlSet,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(rename = "sensor-mode", default, deserialize_with = "lenient_index")]
    pub sensor_mode: usize,
    #[serde(rename = "capture-settings", default)]
    pub capture: CaptureSettings,
    #[serde(rename = "GPIO", default)]
    pub gpio: GpioSettings,
    /// Sensor model, stamped when the configuration is saved
    #[serde(rename = "Model", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for LiveConfiguration {
    fn default() -> Self {
        Self {
            controls: ControlSet::defaults(),
            rotation: Rotation::default(),
            sensor_mode: 0,
            capture: CaptureSettings::default(),
            gpio: GpioSettings::default(),
            model: None,
        }
    }
}

impl LiveConfiguration {
    /// Output size for this configuration
    ///
    /// An index missing from `resolutions` falls back to 1456x1088.
    pub fn resolve_resolution(&self, resolutions: &[(u32, u32)]) -> (u32, u32) {
        match resolutions.get(self.capture.resolution) {
            Some(size) => *size,
            None => {
                warn!(
                    "Resolution index {} not available, using {}x{}",
                    self.capture.resolution, FALLBACK_RESOLUTION.0, FALLBACK_RESOLUTION.1
                );
                FALLBACK_RESOLUTION
            }
        }
    }

    /// JSON view of one top-level section
    pub fn section(&self, key: &str) -> Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut(key).map(Value::take))
            .unwrap_or(Value::Null)
    }
}

fn default_encoder() -> String {
    DEFAULT_ENCODER.to_string()
}

fn default_frame_rate() -> u32 {
    DEFAULT_FRAME_RATE
}

/// `true`/`false`, `0`/`1` or their string forms
pub(crate) fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" => Some(true),
            "false" | "0" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Non-negative integer from a number or a numeric string
pub(crate) fn value_to_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.trunc() as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_bool(&value).ok_or_else(|| D::Error::custom(format!("expected a flag, got {}", value)))
}

fn lenient_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_u64(&value)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| D::Error::custom(format!("expected an index, got {}", value)))
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_to_u64(&value)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| D::Error::custom(format!("expected a whole number, got {}", value)))
}

fn bool_as_int<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*flag))
}
