use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::detect::AreaThresholds;

const DEFAULT_SOURCE_URL: &str = "stub://telescope";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_MIN_AREA: u32 = 50;
const DEFAULT_MAX_AREA: u32 = 1000;
const DEFAULT_DATA_PATH: &str = "debris_positions.csv";
const DEFAULT_KEY_PATH: &str = "secret.key";

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    source: Option<SourceConfigFile>,
    detection: Option<DetectionConfigFile>,
    visualization: Option<VisualizationConfigFile>,
    storage: Option<StorageConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    min_area: Option<u32>,
    max_area: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct VisualizationConfigFile {
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct StorageConfigFile {
    data_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub source: SourceSettings,
    pub detection: DetectionSettings,
    pub visualization_enabled: bool,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub min_area: u32,
    pub max_area: u32,
}

impl DetectionSettings {
    pub fn thresholds(&self) -> Result<AreaThresholds> {
        AreaThresholds::new(self.min_area, self.max_area)
    }
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub data_path: PathBuf,
    pub key_path: PathBuf,
}

impl TrackerConfig {
    /// Read configuration once at construction: optional JSON file named by
    /// `DEBRIS_CONFIG`, then field-wise `DEBRIS_*` env overrides, then
    /// validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DEBRIS_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TrackerConfigFile) -> Self {
        let source = SourceSettings {
            url: file
                .source
                .as_ref()
                .and_then(|source| source.url.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            target_fps: file
                .source
                .as_ref()
                .and_then(|source| source.target_fps)
                .unwrap_or(DEFAULT_TARGET_FPS),
            width: file
                .source
                .as_ref()
                .and_then(|source| source.width)
                .unwrap_or(DEFAULT_WIDTH),
            height: file
                .source
                .as_ref()
                .and_then(|source| source.height)
                .unwrap_or(DEFAULT_HEIGHT),
        };
        let detection = DetectionSettings {
            min_area: file
                .detection
                .as_ref()
                .and_then(|detection| detection.min_area)
                .unwrap_or(DEFAULT_MIN_AREA),
            max_area: file
                .detection
                .as_ref()
                .and_then(|detection| detection.max_area)
                .unwrap_or(DEFAULT_MAX_AREA),
        };
        let visualization_enabled = file
            .visualization
            .and_then(|visualization| visualization.enabled)
            .unwrap_or(true);
        let storage = StorageSettings {
            data_path: file
                .storage
                .as_ref()
                .and_then(|storage| storage.data_path.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH)),
            key_path: file
                .storage
                .and_then(|storage| storage.key_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KEY_PATH)),
        };
        Self {
            source,
            detection,
            visualization_enabled,
            storage,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("DEBRIS_SOURCE") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(fps) = std::env::var("DEBRIS_TARGET_FPS") {
            self.source.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("DEBRIS_TARGET_FPS must be an integer"))?;
        }
        if let Ok(min_area) = std::env::var("DEBRIS_MIN_AREA") {
            self.detection.min_area = min_area
                .parse()
                .map_err(|_| anyhow!("DEBRIS_MIN_AREA must be an integer"))?;
        }
        if let Ok(max_area) = std::env::var("DEBRIS_MAX_AREA") {
            self.detection.max_area = max_area
                .parse()
                .map_err(|_| anyhow!("DEBRIS_MAX_AREA must be an integer"))?;
        }
        if let Ok(enabled) = std::env::var("DEBRIS_VISUALIZATION") {
            self.visualization_enabled = match enabled.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => {
                    return Err(anyhow!(
                        "DEBRIS_VISUALIZATION must be a boolean, got {:?}",
                        other
                    ))
                }
            };
        }
        if let Ok(path) = std::env::var("DEBRIS_DATA_PATH") {
            if !path.trim().is_empty() {
                self.storage.data_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("DEBRIS_KEY_PATH") {
            if !path.trim().is_empty() {
                self.storage.key_path = PathBuf::from(path);
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        // Threshold invariants live in AreaThresholds; constructing one here
        // rejects a bad file or env override before the tracker exists.
        self.detection.thresholds()?;
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be greater than zero"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source dimensions must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TrackerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
