//! # Settings refresh for the background updater
//!
//! The updater asks a [`SettingsSource`] once per tick for the current slot
//! sensitivities. The source is best-effort: any error is logged by the
//! updater and the tick continues with the sensitivities it already has.
//!
//! [`SettingsPortal`] is the shared in-process source. Frontends write into it
//! (for example from a settings dialog) and the updater reads it. Both sides
//! go through a bounded try-lock retry so neither can stall the other for
//! longer than a few milliseconds.

use crate::config::MouseConfig;
use crate::mouse::types::{MouseButton, BUTTON_COUNT};
use color_eyre::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Bounded retry around `try_read`/`try_write`.
///
/// Gives up with `SettingsError::LockTimeout` after `MAX_ATTEMPTS` tries,
/// sleeping 1ms between attempts.
macro_rules! retry_lock {
    (@write, $lock:expr, $operation:expr) => {{
        let mut attempts = 0;
        const MAX_ATTEMPTS: usize = 3;

        loop {
            match $lock.try_write() {
                Ok(mut guard) => break Ok($operation(&mut *guard)),
                Err(e) => {
                    attempts += 1;
                    tracing::debug!(
                        "Settings write lock blocked: {} (attempt {}/{})",
                        e,
                        attempts,
                        MAX_ATTEMPTS
                    );
                    if attempts >= MAX_ATTEMPTS {
                        break Err(SettingsError::LockTimeout);
                    }
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
            }
        }
    }};

    (@read, $lock:expr, $operation:expr) => {{
        let mut attempts = 0;
        const MAX_ATTEMPTS: usize = 3;

        loop {
            match $lock.try_read() {
                Ok(guard) => break Ok($operation(&*guard)),
                Err(e) => {
                    attempts += 1;
                    tracing::debug!(
                        "Settings read lock blocked: {} (attempt {}/{})",
                        e,
                        attempts,
                        MAX_ATTEMPTS
                    );
                    if attempts >= MAX_ATTEMPTS {
                        break Err(SettingsError::LockTimeout);
                    }
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
            }
        }
    }};
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("Could not acquire settings lock after maximum retry attempts")]
    LockTimeout,

    #[error("Settings source unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid sensitivity {value} for {button:?}")]
    InvalidSensitivity { button: MouseButton, value: f32 },

    #[error("Invalid default sensitivity {0}")]
    InvalidDefaultSensitivity(f32),

    #[error("Update interval must be at least 1ms")]
    InvalidInterval,
}

/// Where the updater pulls externally changed settings from
pub trait SettingsSource: Send + Sync + 'static {
    /// Current sensitivity of every slot, in slot order
    fn sensitivities(&self) -> std::result::Result<[f32; BUTTON_COUNT], SettingsError>;
}

/// Shared, externally writable mouse settings
#[derive(Debug, Default, Clone)]
pub struct SettingsPortal {
    config: Arc<RwLock<MouseConfig>>,
}

impl SettingsPortal {
    pub fn new(config: MouseConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Creates a portal seeded from the TOML file at `path`
    pub async fn from_file(path: &Path) -> Result<Self> {
        let config = MouseConfig::load(path).await?;
        Ok(Self::new(config))
    }

    /// Re-reads the TOML file at `path` and replaces the shared config
    pub async fn reload(&self, path: &Path) -> Result<()> {
        let config = MouseConfig::load(path).await?;
        *self.config.write().await = config;
        info!("Mouse settings reloaded from {}", path.display());
        Ok(())
    }

    pub fn snapshot(&self) -> std::result::Result<MouseConfig, SettingsError> {
        retry_lock!(@read, self.config, |guard: &MouseConfig| guard.clone())
    }

    pub fn replace(&self, config: MouseConfig) -> std::result::Result<(), SettingsError> {
        config.validate()?;
        retry_lock!(@write, self.config, |guard: &mut MouseConfig| {
            *guard = config;
        })
    }

    /// Overrides the sensitivity of a single button; `None` restores the default
    pub fn write_sensitivity(
        &self,
        button: MouseButton,
        value: Option<f32>,
    ) -> std::result::Result<(), SettingsError> {
        if button == MouseButton::Undefined {
            return Err(SettingsError::Unavailable(
                "undefined button has no sensitivity".to_string(),
            ));
        }
        if let Some(value) = value {
            if !value.is_finite() || value <= 0.0 {
                return Err(SettingsError::InvalidSensitivity { button, value });
            }
        }

        retry_lock!(@write, self.config, |guard: &mut MouseConfig| {
            guard.sensitivity.set(button, value);
        })?;
        debug!("Sensitivity override for {:?} set to {:?}", button, value);
        Ok(())
    }
}

impl SettingsSource for SettingsPortal {
    fn sensitivities(&self) -> std::result::Result<[f32; BUTTON_COUNT], SettingsError> {
        retry_lock!(@read, self.config, |guard: &MouseConfig| guard.sensitivities())
    }
}
