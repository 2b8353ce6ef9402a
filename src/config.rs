use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ErrorContext, LedgerError, LedgerResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub backend: BackendConfig,
    pub paths: PathsConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the extraction service (`/extract`, `/correct`)
    pub base_url: String,

    /// Request timeout for extraction and correction calls
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding `<stem>.json` token files written by the extractor
    pub token_dir: PathBuf,

    /// Root that relative page image references resolve against
    pub asset_root: PathBuf,

    /// Where `<stem>_corrected.json` artifacts are written
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub zoom_step: f32,

    /// Corner radius of token highlights, in logical pixels
    pub corner_radius: f32,

    /// Device pixel density used by the headless renderer
    pub device_pixel_ratio: f32,

    /// Logical size of the drawing surface
    pub surface_width: f32,
    pub surface_height: f32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                base_url: "http://localhost:5001".to_string(),
                timeout_seconds: 120,
            },
            paths: PathsConfig {
                token_dir: PathBuf::from("data"),
                asset_root: PathBuf::from("."),
                output_dir: PathBuf::from("."),
            },
            view: ViewConfig::default(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 3.0,
            zoom_step: 0.2,
            corner_radius: 10.0,
            device_pixel_ratio: 1.0,
            surface_width: 800.0,
            surface_height: 1131.0,
        }
    }
}

impl LedgerConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_path(path.as_ref())?;

        let config: LedgerConfig = toml::from_str(&content)
            .map_err(|e| LedgerError::configuration(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Default location: `<config dir>/ledgerlens/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ledgerlens").join("config.toml"))
    }

    /// Load the explicit file, else the default location, else defaults.
    /// Environment overrides are applied last.
    pub fn load_or_default(explicit: Option<&Path>) -> LedgerResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::load_from_file(path)?,
                None => Self::default(),
            },
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("LEDGERLENS_BACKEND_URL") {
            self.backend.base_url = url;
        }

        if let Ok(dir) = std::env::var("LEDGERLENS_TOKEN_DIR") {
            self.paths.token_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("LEDGERLENS_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }

        if let Ok(ratio) = std::env::var("LEDGERLENS_DEVICE_PIXEL_RATIO") {
            match ratio.parse::<f32>() {
                Ok(value) if positive(value) => self.view.device_pixel_ratio = value,
                _ => tracing::warn!("Ignoring LEDGERLENS_DEVICE_PIXEL_RATIO={}", ratio),
            }
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        let view = &self.view;
        if !positive(view.min_zoom) || !view.max_zoom.is_finite() || view.min_zoom > view.max_zoom {
            return Err(LedgerError::configuration(format!(
                "zoom bounds must satisfy 0 < min_zoom <= max_zoom (got {} and {})",
                view.min_zoom, view.max_zoom
            )));
        }
        if !positive(view.zoom_step) {
            return Err(LedgerError::configuration("zoom_step must be positive"));
        }
        if !positive(view.device_pixel_ratio) {
            return Err(LedgerError::configuration("device_pixel_ratio must be positive"));
        }
        if !positive(view.surface_width) || !positive(view.surface_height) {
            return Err(LedgerError::configuration("surface size must be positive"));
        }
        if !view.corner_radius.is_finite() || view.corner_radius < 0.0 {
            return Err(LedgerError::configuration("corner_radius must be a finite non-negative number"));
        }
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> LedgerResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LedgerError::configuration(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_path(parent)?;
            }
        }
        std::fs::write(path.as_ref(), content).with_path(path.as_ref())?;

        Ok(())
    }
}

/// Finite and strictly greater than zero; NaN fails
fn positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}
