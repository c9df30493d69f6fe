// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Maximum upload size (10MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown OCR backend '{0}' (expected onnx, bridge or noop)")]
    UnknownBackend(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which OCR engine implementation serves requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process PaddleOCR ONNX models
    #[default]
    Onnx,
    /// External PaddleOCR process speaking JSON on stdout
    Bridge,
    /// Always returns an empty result
    Noop,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Onnx => "onnx",
            Backend::Bridge => "bridge",
            Backend::Noop => "noop",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Backend::Onnx),
            "bridge" => Ok(Backend::Bridge),
            "noop" => Ok(Backend::Noop),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// OCR engine configuration
///
/// Angle classification and English are the service defaults; the engine is
/// built once at startup from these values and never reconfigured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: Backend,
    pub language: String,
    pub use_angle_cls: bool,
    /// Try the CUDA execution provider before falling back to CPU
    pub use_gpu: bool,
    pub gpu_device_id: i32,
    /// Directory holding det_model.onnx, cls_model.onnx, rec_model.onnx and the dictionary
    pub model_dir: PathBuf,
    pub intra_threads: usize,
    pub bridge_command: String,
    pub bridge_args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            language: "en".to_string(),
            use_angle_cls: true,
            use_gpu: true,
            gpu_device_id: 0,
            model_dir: PathBuf::from("./models/paddleocr-onnx"),
            intra_threads: 4,
            bridge_command: "paddleocr-bridge".to_string(),
            bridge_args: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn detection_model_path(&self) -> PathBuf {
        self.model_dir.join("det_model.onnx")
    }

    pub fn classifier_model_path(&self) -> PathBuf {
        self.model_dir.join("cls_model.onnx")
    }

    pub fn recognition_model_path(&self) -> PathBuf {
        self.model_dir.join("rec_model.onnx")
    }

    /// Character dictionary matching the recognition model's language
    pub fn dictionary_path(&self) -> PathBuf {
        let file = match self.language.as_str() {
            "en" => "en_dict.txt".to_string(),
            "ch" | "zh" => "ppocr_keys_v1.txt".to_string(),
            other => format!("{}_dict.txt", other),
        };
        self.model_dir.join(file)
    }
}

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen_addr: String,
    /// Directory receiving the per-request temporary image files
    pub temp_dir: PathBuf,
    pub max_upload_bytes: usize,
    /// Upper bound for a single engine call; unset means wait forever
    pub ocr_timeout_secs: Option<u64>,
    pub engine: EngineConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            temp_dir: PathBuf::from("."),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            ocr_timeout_secs: None,
            engine: EngineConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    ///
    /// Keys missing from the file keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_upload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.ocr_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "ocr_timeout_secs must be greater than zero when set".to_string(),
            ));
        }
        if self.engine.intra_threads == 0 {
            return Err(ConfigError::Invalid(
                "engine.intra_threads must be greater than zero".to_string(),
            ));
        }
        if self.engine.backend == Backend::Bridge && self.engine.bridge_command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "engine.bridge_command is required for the bridge backend".to_string(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr.parse().map_err(|e| {
            ConfigError::Invalid(format!("listen_addr '{}': {}", self.listen_addr, e))
        })
    }

    pub fn ocr_timeout(&self) -> Option<Duration> {
        self.ocr_timeout_secs.map(Duration::from_secs)
    }
}
