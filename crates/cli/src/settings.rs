use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use facewatch_core::camera::infrastructure::ffmpeg_camera_device::FfmpegCameraDevice;
use facewatch_core::detection::infrastructure::detector_factory::DetectorBackend;
use facewatch_core::shared::constants::{
    APP_DIR_NAME, DEFAULT_CONFIDENCE, DEFAULT_TICK_INTERVAL_MS,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    #[default]
    Yolo,
    Blazeface,
}

impl From<ModelChoice> for DetectorBackend {
    fn from(choice: ModelChoice) -> Self {
        match choice {
            ModelChoice::Yolo => DetectorBackend::Yolo,
            ModelChoice::Blazeface => DetectorBackend::Blazeface,
        }
    }
}

/// Persisted defaults for `facewatch`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input_format: String,
    pub device: String,
    /// Demuxer options passed to the capture device, e.g. `framerate`.
    pub device_options: BTreeMap<String, String>,
    pub interval_ms: u64,
    pub confidence: f64,
    pub model: ModelChoice,
    pub model_path: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_format: FfmpegCameraDevice::default_input_format().to_string(),
            device: FfmpegCameraDevice::default_device().to_string(),
            device_options: BTreeMap::new(),
            interval_ms: DEFAULT_TICK_INTERVAL_MS,
            confidence: DEFAULT_CONFIDENCE,
            model: ModelChoice::default(),
            model_path: None,
            snapshot: None,
        }
    }
}

impl Settings {
    pub fn camera_device(&self) -> FfmpegCameraDevice {
        self.device_options.iter().fold(
            FfmpegCameraDevice::new(&self.input_format, &self.device),
            |device, (key, value)| device.with_option(key, value),
        )
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Reads settings from `path`; a missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        let Ok(json) = fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            log::warn!("Ignoring invalid settings file {}: {e}", path.display());
            Self::default()
        })
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, json)
    }
}
