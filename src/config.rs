//! Runtime configuration loaded from YAML.
//!
//! ```yaml
//! channel_name: rally-time-card
//! card_path: card.json
//! log_filter: info
//! scheduler:
//!   lead_times_ms: [300000, 60000]
//!   notification_tag: rally-countdown
//! presenter:
//!   tick_interval_ms: 1000
//!   hide_after_late_ms: 300000
//! ```
//!
//! Every key is optional. A missing file yields the defaults, a malformed one
//! is a [`RallyError::Config`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::DEFAULT_CHANNEL_NAME;
use crate::types::{Millis, MS_PER_MINUTE};
use crate::{RallyError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RallyConfig {
    pub channel_name: String,
    pub card_path: PathBuf,
    pub log_filter: String,
    pub scheduler: SchedulerSettings,
    pub presenter: PresenterSettings,
}

impl Default for RallyConfig {
    fn default() -> Self {
        Self {
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            card_path: PathBuf::from("card.json"),
            log_filter: "info".to_string(),
            scheduler: SchedulerSettings::default(),
            presenter: PresenterSettings::default(),
        }
    }
}

impl RallyConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(err) => return Err(RallyError::config(path, err.to_string())),
        };
        let config = Self::parse(&text).map_err(|details| RallyError::config(path, details))?;
        config.validate().map_err(|details| RallyError::config(path, details))?;
        Ok(config)
    }

    fn parse(text: &str) -> std::result::Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(text).map_err(|err| err.to_string())
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.channel_name.trim().is_empty() {
            return Err("channel_name must not be empty".to_string());
        }
        if self.scheduler.lead_times_ms.iter().any(|lead| *lead <= 0) {
            return Err("scheduler.lead_times_ms must all be positive".to_string());
        }
        if self.presenter.tick_interval_ms == 0 {
            return Err("presenter.tick_interval_ms must be greater than zero".to_string());
        }
        if self.presenter.hide_after_late_ms < 0 {
            return Err("presenter.hide_after_late_ms must not be negative".to_string());
        }
        Ok(())
    }
}

/// Lead-time notifications scheduled by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Offsets before the deadline at which a warning fires.
    pub lead_times_ms: Vec<Millis>,
    /// Tag shared by every countdown notification so they replace each other.
    pub notification_tag: String,
    pub test_title: String,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            lead_times_ms: vec![5 * MS_PER_MINUTE, MS_PER_MINUTE],
            notification_tag: "rally-countdown".to_string(),
            test_title: "Test notification".to_string(),
        }
    }
}

impl SchedulerSettings {
    /// Title of the warning fired `lead` before the deadline.
    pub fn lead_title(lead: Millis) -> String {
        let minutes = lead / MS_PER_MINUTE;
        match (minutes, lead % MS_PER_MINUTE) {
            (1, 0) => "1 minute left".to_string(),
            (m, 0) => format!("{m} minutes left"),
            _ => format!("{} seconds left", lead / 1_000),
        }
    }
}

/// Page-side countdown display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenterSettings {
    pub tick_interval_ms: u64,
    /// How long a passed deadline stays visible.
    pub hide_after_late_ms: Millis,
}

impl Default for PresenterSettings {
    fn default() -> Self {
        Self { tick_interval_ms: 1_000, hide_after_late_ms: 5 * MS_PER_MINUTE }
    }
}

impl PresenterSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
