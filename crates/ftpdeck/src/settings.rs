//! Configuration and settings management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::models::Priority;
use crate::browser::{SortField, ViewMode};
use crate::tasks::submit::{DEFAULT_LOCAL_PATH, DEFAULT_MONITOR_INTERVAL};

pub const APP_DIR: &str = "ftpdeck";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub polling: PollingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Login name used when the CLI is given none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            username: None,
        }
    }
}

impl ServerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserSettings {
    #[serde(default = "default_sort_field")]
    pub sort_field: SortField,
    #[serde(default)]
    pub view_mode: ViewMode,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            sort_field: default_sort_field(),
            view_mode: ViewMode::default(),
            local_path: default_local_path(),
            priority: Priority::default(),
            auto_start: true,
            monitor_interval_secs: default_monitor_interval(),
        }
    }
}

fn default_sort_field() -> SortField {
    SortField::Name
}

fn default_local_path() -> String {
    DEFAULT_LOCAL_PATH.to_string()
}

fn default_true() -> bool {
    true
}

fn default_monitor_interval() -> u64 {
    DEFAULT_MONITOR_INTERVAL
}

/// Poll intervals in seconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollingSettings {
    #[serde(default = "default_stats_secs")]
    pub stats_secs: u64,
    #[serde(default = "default_system_secs")]
    pub system_status_secs: u64,
    #[serde(default = "default_tasks_secs")]
    pub tasks_secs: u64,
    #[serde(default = "default_active_tests_secs")]
    pub active_tests_secs: u64,
    #[serde(default = "default_sites_secs")]
    pub sites_secs: u64,
    /// Also subscribe to the server's push channel
    #[serde(default = "default_push")]
    pub push: bool,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            stats_secs: default_stats_secs(),
            system_status_secs: default_system_secs(),
            tasks_secs: default_tasks_secs(),
            active_tests_secs: default_active_tests_secs(),
            sites_secs: default_sites_secs(),
            push: default_push(),
        }
    }
}

fn default_stats_secs() -> u64 {
    30
}

fn default_system_secs() -> u64 {
    10
}

fn default_tasks_secs() -> u64 {
    5
}

fn default_active_tests_secs() -> u64 {
    5
}

fn default_sites_secs() -> u64 {
    30
}

fn default_push() -> bool {
    true
}

impl Settings {
    /// Read the config file; a missing file means all defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Write the config file, creating its directory first
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create config directory {}", dir.display()))?;
        }

        let raw = toml::to_string_pretty(self).context("Cannot encode config")?;
        std::fs::write(path, raw).with_context(|| format!("Cannot write config {}", path.display()))
    }

    pub fn default_path() -> PathBuf {
        app_dir().join("settings.toml")
    }

    /// Where the TUI writes its log file
    pub fn log_path() -> PathBuf {
        app_dir().join("ftpdeck.log")
    }
}

/// Expand a leading `~` in a user-supplied path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// `$XDG_CONFIG_HOME` or `~/.config` on unix, `%APPDATA%` on windows
fn config_root() -> Option<PathBuf> {
    let var = |name: &str| std::env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);
    if cfg!(windows) {
        var("APPDATA")
    } else {
        var("XDG_CONFIG_HOME").or_else(|| var("HOME").map(|home| home.join(".config")))
    }
}

fn app_dir() -> PathBuf {
    config_root()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
