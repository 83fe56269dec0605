//! Capture-tool argument builder

use crate::controls::ControlSet;
use crate::driver::SensorMode;
use crate::FALLBACK_RESOLUTION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Codec the capture tool writes natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Mjpeg,
    H264,
}

impl Codec {
    /// Value for `--codec`
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Mjpeg => "mjpeg",
            Codec::H264 => "h264",
        }
    }

    /// File extension for raw recordings
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// Map an encoder name from a saved configuration
    ///
    /// Accepts both encoder class names (`MJPEGEncoder`, `H264Encoder`,
    /// `JpegEncoder`) and plain codec names.
    pub fn from_encoder(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "mjpegencoder" | "jpegencoder" | "mjpeg" | "jpeg" => Some(Codec::Mjpeg),
            "h264encoder" | "h264" => Some(Codec::H264),
            _ => None,
        }
    }
}

/// Deterministic argument vector for one capture-tool launch
#[derive(Debug, Clone)]
pub struct CaptureCommand {
    program: PathBuf,
    camera: u32,
    width: u32,
    height: u32,
    framerate: u32,
    codec: Codec,
    quality: u8,
    hflip: bool,
    vflip: bool,
    mode: Option<String>,
    controls: Vec<String>,
    extra_args: Vec<String>,
}

impl CaptureCommand {
    /// MJPEG at the fallback resolution, 60 fps, quality 90
    pub fn new(program: impl Into<PathBuf>, camera: u32) -> Self {
        Self {
            program: program.into(),
            camera,
            width: FALLBACK_RESOLUTION.0,
            height: FALLBACK_RESOLUTION.1,
            framerate: 60,
            codec: Codec::Mjpeg,
            quality: 90,
            hflip: false,
            vflip: false,
            mode: None,
            controls: Vec::new(),
            extra_args: Vec::new(),
        }
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn framerate(mut self, fps: u32) -> Self {
        self.framerate = fps;
        self
    }

    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// JPEG quality, only used for MJPEG
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn flips(mut self, hflip: bool, vflip: bool) -> Self {
        self.hflip = hflip;
        self.vflip = vflip;
        self
    }

    /// Read the sensor in this mode
    pub fn sensor_mode(mut self, mode: Option<&SensorMode>) -> Self {
        self.mode = mode.map(SensorMode::mode_arg);
        self
    }

    pub fn controls(mut self, controls: &ControlSet) -> Self {
        self.controls = controls.tool_args();
        self
    }

    /// Appended verbatim after every generated flag
    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn camera(&self) -> u32 {
        self.camera
    }

    pub fn codec_kind(&self) -> Codec {
        self.codec
    }

    /// Build the arguments for writing to `output` (stdout when `None`)
    ///
    /// Returns the arguments and the effective output path, which gains a
    /// `_%04d` placeholder when segmented file output needs one.
    pub fn build(&self, output: Option<&Path>) -> (Vec<String>, Option<PathBuf>) {
        let mut args: Vec<String> = vec![
            "--camera".into(),
            self.camera.to_string(),
            "--width".into(),
            self.width.to_string(),
            "--height".into(),
            self.height.to_string(),
            "--framerate".into(),
            self.framerate.to_string(),
            "--codec".into(),
            self.codec.as_str().into(),
        ];

        if self.codec == Codec::Mjpeg {
            args.push("--quality".into());
            args.push(self.quality.to_string());
            // Inline headers and per-frame segments only make sense for a live consumer
            if output.is_none() {
                args.push("--inline".into());
                args.push("--segment".into());
                args.push("1".into());
            }
        }

        args.push("--timeout".into());
        args.push("0".into());
        args.push("--nopreview".into());
        if self.hflip {
            args.push("--hflip".into());
        }
        if self.vflip {
            args.push("--vflip".into());
        }
        args.extend(["--buffer-count", "2", "--flush", "1"].map(String::from));

        if let Some(mode) = &self.mode {
            args.push("--mode".into());
            args.push(mode.clone());
        }
        args.extend(self.controls.iter().cloned());

        let output = output.map(|path| {
            if self.segmented() && !path.to_string_lossy().contains('%') {
                with_segment_placeholder(path)
            } else {
                path.to_path_buf()
            }
        });

        args.push("--output".into());
        args.push(
            output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".into()),
        );
        args.extend(self.extra_args.iter().cloned());

        (args, output)
    }

    /// True when extra arguments ask for segmented output
    fn segmented(&self) -> bool {
        self.extra_args
            .windows(2)
            .any(|w| w[0] == "--segment" && w[1] != "0")
    }
}

fn with_segment_placeholder(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_%04d.{}", stem, ext.to_string_lossy()),
        None => format!("{}_%04d", stem),
    };
    path.with_file_name(name)
}
