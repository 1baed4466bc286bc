//! # Mouse configuration file
//!
//! User-facing settings for the mouse motion emulation, stored as TOML under
//! the platform config directory. A missing file is not an error: every field
//! has a default, so the emulation keeps working with no configuration at all.

use crate::mouse::motion::MotionGains;
use crate::mouse::settings::SettingsError;
use crate::mouse::slot::DEFAULT_SENSITIVITY;
use crate::mouse::types::{MouseButton, BUTTON_COUNT};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = "mousemotion";
const CONFIG_FILE: &str = "config.toml";

/// Surface the pointer is normalised against for touch readings
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TouchArea {
    pub width: u32,
    pub height: u32,
}

impl Default for TouchArea {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Per-button sensitivity overrides; `None` falls back to the default
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ButtonSensitivity {
    pub left: Option<f32>,
    pub wheel: Option<f32>,
    pub right: Option<f32>,
    pub forward: Option<f32>,
    pub backward: Option<f32>,
}

impl ButtonSensitivity {
    pub fn get(&self, button: MouseButton) -> Option<f32> {
        match button {
            MouseButton::Left => self.left,
            MouseButton::Wheel => self.wheel,
            MouseButton::Right => self.right,
            MouseButton::Forward => self.forward,
            MouseButton::Backward => self.backward,
            MouseButton::Undefined => None,
        }
    }

    pub fn set(&mut self, button: MouseButton, value: Option<f32>) {
        match button {
            MouseButton::Left => self.left = value,
            MouseButton::Wheel => self.wheel = value,
            MouseButton::Right => self.right = value,
            MouseButton::Forward => self.forward = value,
            MouseButton::Backward => self.backward = value,
            MouseButton::Undefined => {}
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct MouseConfig {
    /// Background updater period in milliseconds
    pub update_interval_ms: u64,
    pub default_sensitivity: f32,
    pub sensitivity: ButtonSensitivity,
    pub touch_area: TouchArea,
    pub motion_gains: MotionGains,
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 10,
            default_sensitivity: DEFAULT_SENSITIVITY,
            sensitivity: ButtonSensitivity::default(),
            touch_area: TouchArea::default(),
            motion_gains: MotionGains::default(),
        }
    }
}

impl MouseConfig {
    pub fn sensitivity_for(&self, button: MouseButton) -> f32 {
        self.sensitivity
            .get(button)
            .unwrap_or(self.default_sensitivity)
    }

    /// Effective sensitivity of every slot, in slot order
    pub fn sensitivities(&self) -> [f32; BUTTON_COUNT] {
        MouseButton::ALL.map(|button| self.sensitivity_for(button))
    }

    pub fn validate(&self) -> std::result::Result<(), SettingsError> {
        if self.update_interval_ms == 0 {
            return Err(SettingsError::InvalidInterval);
        }
        let usable = |value: f32| value.is_finite() && value > 0.0;
        if !usable(self.default_sensitivity) {
            return Err(SettingsError::InvalidDefaultSensitivity(
                self.default_sensitivity,
            ));
        }
        for button in MouseButton::ALL {
            if let Some(value) = self.sensitivity.get(button) {
                if !usable(value) {
                    return Err(SettingsError::InvalidSensitivity { button, value });
                }
            }
        }
        Ok(())
    }

    /// `<config dir>/mousemotion/config.toml`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Loads the config at `path`, falling back to defaults when it is missing.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            warn!(
                "Config file {} does not exist, using default",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file: {}", e))?;
        let config = Self::from_toml(&content)?;

        info!("Loaded mouse config from {}", path.display());
        debug!("Mouse config: {:?}", config);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
        config
            .validate()
            .map_err(|e| eyre!("Invalid mouse config: {}", e))?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize mouse config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;

        info!("Mouse config saved to {}", path.display());
        Ok(())
    }

    /// Writes a default config to `path` unless one already exists.
    pub async fn ensure_default_config(path: &Path) -> Result<()> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            debug!("Config file {} already present", path.display());
            return Ok(());
        }
        Self::default().save(path).await
    }
}
