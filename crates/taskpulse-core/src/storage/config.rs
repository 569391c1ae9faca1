//! TOML-based application configuration.
//!
//! Stores notification preferences (category toggles, quiet hours, rate
//! limits, priority tiers) and scheduler timing. Configuration is stored
//! at `~/.config/taskpulse/config.toml`.
//!
//! Values are validated on every update: out-of-range hours or a zero
//! rate limit are rejected instead of silently misbehaving.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::notify::{NotificationCategory, NotificationPriority};

/// Per-tier delivery toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityToggles {
    #[serde(default = "default_true")]
    pub enable_high: bool,
    #[serde(default = "default_true")]
    pub enable_medium: bool,
    #[serde(default = "default_true")]
    pub enable_low: bool,
}

/// Notification delivery configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "default_true")]
    pub enable_productivity_reminders: bool,
    #[serde(default = "default_true")]
    pub enable_task_health_alerts: bool,
    #[serde(default = "default_true")]
    pub enable_deadline_warnings: bool,
    #[serde(default = "default_true")]
    pub enable_achievement_celebrations: bool,
    /// Start of the quiet window, hour of day 0-23. The window may wrap
    /// midnight (start 22, end 8 silences 22:00-07:59).
    #[serde(default = "default_quiet_start")]
    pub quiet_hours_start: u8,
    /// End of the quiet window, exclusive, hour of day 0-23.
    #[serde(default = "default_quiet_end")]
    pub quiet_hours_end: u8,
    #[serde(default = "default_max_per_hour")]
    pub max_notifications_per_hour: u32,
    #[serde(default)]
    pub priorities: PriorityToggles,
}

/// Scheduler timing knobs, all in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerTimingConfig {
    /// Delay before the first tick after arming.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
    /// Recurring tick interval.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Grace delay after resume before re-arming.
    #[serde(default = "default_resume_grace")]
    pub resume_grace_secs: u64,
    /// Trailing dedup window.
    #[serde(default = "default_dedup_window")]
    pub dedup_window_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/taskpulse/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub scheduler: SchedulerTimingConfig,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_quiet_start() -> u8 {
    22
}
fn default_quiet_end() -> u8 {
    8
}
fn default_max_per_hour() -> u32 {
    5
}
fn default_initial_delay() -> u64 {
    10
}
fn default_interval() -> u64 {
    5 * 60
}
fn default_resume_grace() -> u64 {
    5
}
fn default_dedup_window() -> u64 {
    5 * 60
}

impl Default for PriorityToggles {
    fn default() -> Self {
        Self {
            enable_high: true,
            enable_medium: true,
            enable_low: true,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enable_productivity_reminders: true,
            enable_task_health_alerts: true,
            enable_deadline_warnings: true,
            enable_achievement_celebrations: true,
            quiet_hours_start: default_quiet_start(),
            quiet_hours_end: default_quiet_end(),
            max_notifications_per_hour: default_max_per_hour(),
            priorities: PriorityToggles::default(),
        }
    }
}

impl Default for SchedulerTimingConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay(),
            interval_secs: default_interval(),
            resume_grace_secs: default_resume_grace(),
            dedup_window_secs: default_dedup_window(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notifier: NotifierConfig::default(),
            scheduler: SchedulerTimingConfig::default(),
        }
    }
}

impl NotifierConfig {
    /// Whether a notification category is enabled at all.
    pub fn category_enabled(&self, category: NotificationCategory) -> bool {
        match category {
            NotificationCategory::Productivity => self.enable_productivity_reminders,
            NotificationCategory::TaskHealth => self.enable_task_health_alerts,
            NotificationCategory::Deadline => self.enable_deadline_warnings,
            NotificationCategory::Achievement => self.enable_achievement_celebrations,
        }
    }

    /// Whether a priority tier is enabled.
    pub fn priority_enabled(&self, priority: NotificationPriority) -> bool {
        match priority {
            NotificationPriority::High => self.priorities.enable_high,
            NotificationPriority::Medium => self.priorities.enable_medium,
            NotificationPriority::Low => self.priorities.enable_low,
        }
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quiet_hours_start > 23 {
            return Err(ConfigError::InvalidValue {
                key: "notifier.quiet_hours_start".to_string(),
                message: format!("hour must be 0-23, got {}", self.quiet_hours_start),
            });
        }
        if self.quiet_hours_end > 23 {
            return Err(ConfigError::InvalidValue {
                key: "notifier.quiet_hours_end".to_string(),
                message: format!("hour must be 0-23, got {}", self.quiet_hours_end),
            });
        }
        if self.max_notifications_per_hour == 0 {
            return Err(ConfigError::InvalidValue {
                key: "notifier.max_notifications_per_hour".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl SchedulerTimingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.interval_secs".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Partial update for [`NotifierConfig`]: only set fields are applied,
/// and the merged result is validated before taking effect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfigUpdate {
    pub enable_productivity_reminders: Option<bool>,
    pub enable_task_health_alerts: Option<bool>,
    pub enable_deadline_warnings: Option<bool>,
    pub enable_achievement_celebrations: Option<bool>,
    pub quiet_hours_start: Option<u8>,
    pub quiet_hours_end: Option<u8>,
    pub max_notifications_per_hour: Option<u32>,
    pub enable_high: Option<bool>,
    pub enable_medium: Option<bool>,
    pub enable_low: Option<bool>,
}

impl NotifierConfigUpdate {
    /// Merge into `base`, returning the validated result.
    pub fn apply(&self, base: &NotifierConfig) -> Result<NotifierConfig, ConfigError> {
        let mut next = base.clone();
        if let Some(v) = self.enable_productivity_reminders {
            next.enable_productivity_reminders = v;
        }
        if let Some(v) = self.enable_task_health_alerts {
            next.enable_task_health_alerts = v;
        }
        if let Some(v) = self.enable_deadline_warnings {
            next.enable_deadline_warnings = v;
        }
        if let Some(v) = self.enable_achievement_celebrations {
            next.enable_achievement_celebrations = v;
        }
        if let Some(v) = self.quiet_hours_start {
            next.quiet_hours_start = v;
        }
        if let Some(v) = self.quiet_hours_end {
            next.quiet_hours_end = v;
        }
        if let Some(v) = self.max_notifications_per_hour {
            next.max_notifications_per_hour = v;
        }
        if let Some(v) = self.enable_high {
            next.priorities.enable_high = v;
        }
        if let Some(v) = self.enable_medium {
            next.priorities.enable_medium = v;
        }
        if let Some(v) = self.enable_low {
            next.priorities.enable_low = v;
        }
        next.validate()?;
        Ok(next)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(ConfigError::UnknownKey(String::new()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
                            key: key.to_string(),
                            message: format!("cannot parse '{value}' as bool"),
                        })?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(ConfigError::InvalidValue {
                                key: key.to_string(),
                                message: format!("cannot parse '{value}' as number"),
                            });
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| ConfigError::InvalidValue {
                            key: key.to_string(),
                            message: e.to_string(),
                        })?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::new(),
                message: e.to_string(),
            })?
            .join("config.toml"))
    }

    /// Load from disk or write and return the default.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    /// Load from an explicit path or write and return the default.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.notifier.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key and persist. The merged config is
    /// validated first; invalid values leave the file untouched.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let next: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        next.validate()?;
        *self = next;
        self.save()?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
