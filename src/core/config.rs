use crate::errors::{AutomationError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub automation: AutomationConfig,
    pub diagnostics: DiagnosticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub user_data_dir: Option<PathBuf>,
    /// Websocket debugger URL of an already running Chrome to attach to.
    pub connect_url: Option<String>,
    pub args: Vec<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub locator_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub stability_threshold: u32,
    pub default_max_wait_ms: u64,
    /// Pause between the send click and the first completion poll.
    pub initial_delay_ms: u64,
    pub click_settle_ms: u64,
    pub send_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,
    pub capacity: usize,
    pub capture_screenshot_on_failure: bool,
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| {
            AutomationError::ConfigurationError(format!("{}: {}", path.display(), e))
        })
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            viewport: Viewport::default(),
            user_agent: None,
            user_data_dir: None,
            connect_url: None,
            args: vec![],
            timeout_ms: 30000,
        }
    }
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            locator_timeout_ms: 10000,
            poll_interval_ms: 1000,
            stability_threshold: 3,
            default_max_wait_ms: 120000,
            initial_delay_ms: 2000,
            click_settle_ms: 150,
            send_delay_ms: 500,
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: 500,
            capture_screenshot_on_failure: true,
            snapshot_path: None,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}
