use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::domain::document_tracker::TrackerConfig;
use crate::shared::constants::{
    APP_DIR_NAME, DEFAULT_MODEL_DIR, DOCUMENT_MODEL_NAMES, FACE_MODEL_NAME,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Process-wide settings, loaded once at start and constant afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub detection: DetectionConfig,
    pub tracking: TrackerConfig,
    pub blur: BlurConfig,
    pub output: OutputConfig,
    pub models: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub face_confidence: f32,
    pub document_confidence: f32,
    /// Fallback square model input when the model does not declare one.
    pub process_size: u32,
    /// Linear scale applied to the frame before document detection.
    pub document_upscale: f64,
    pub min_document_width: i32,
    pub min_document_height: i32,
    /// Number of class-score columns in the document model output.
    pub document_classes: usize,
    /// Run face and document detection on separate threads.
    pub parallel: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            face_confidence: 0.45,
            document_confidence: 0.50,
            process_size: 320,
            document_upscale: 2.0,
            min_document_width: 30,
            min_document_height: 20,
            document_classes: 1,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    pub face_kernel: usize,
    /// Gaussian sigma in pixels; 0 derives it from the kernel size.
    pub face_sigma: f64,
    pub document_kernel: usize,
    pub document_sigma: f64,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            face_kernel: 15,
            face_sigma: 15.0,
            document_kernel: 31,
            document_sigma: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub jpeg_quality: u8,
    pub font_path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 60,
            font_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub face_model: String,
    pub document_models: Vec<String>,
    pub face_model_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            face_model: FACE_MODEL_NAME.to_string(),
            document_models: DOCUMENT_MODEL_NAMES.iter().map(|s| s.to_string()).collect(),
            face_model_url: None,
        }
    }
}

impl RedactionConfig {
    /// `<config_dir>/FrameSafe/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Explicit path if given, else the default location if it exists,
    /// else built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(default) if default.exists() => {
                log::info!("Loading config from {}", default.display());
                Self::load(&default)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.detection;
        for (name, value) in [
            ("face_confidence", d.face_confidence),
            ("document_confidence", d.document_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must be between 0.0 and 1.0, got {value}")));
            }
        }
        if !(d.document_upscale.is_finite() && d.document_upscale > 0.0) {
            return Err(invalid(format!(
                "document_upscale must be positive, got {}",
                d.document_upscale
            )));
        }
        if d.process_size == 0 {
            return Err(invalid("process_size must be positive".to_string()));
        }
        if d.min_document_width < 0 || d.min_document_height < 0 {
            return Err(invalid("minimum document size must not be negative".to_string()));
        }
        if d.document_classes == 0 {
            return Err(invalid("document_classes must be at least 1".to_string()));
        }

        self.tracking.validate().map_err(invalid)?;

        for (name, kernel) in [
            ("face_kernel", self.blur.face_kernel),
            ("document_kernel", self.blur.document_kernel),
        ] {
            if kernel == 0 || kernel % 2 == 0 {
                return Err(invalid(format!(
                    "{name} must be a positive odd integer, got {kernel}"
                )));
            }
        }
        for (name, sigma) in [
            ("face_sigma", self.blur.face_sigma),
            ("document_sigma", self.blur.document_sigma),
        ] {
            if !(sigma.is_finite() && sigma >= 0.0) {
                return Err(invalid(format!(
                    "{name} must be zero or a positive number, got {sigma}"
                )));
            }
        }

        if !(1..=100).contains(&self.output.jpeg_quality) {
            return Err(invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.output.jpeg_quality
            )));
        }
        if self.models.document_models.is_empty() {
            return Err(invalid("at least one document model is required".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}
