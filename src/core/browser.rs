use crate::core::config::BrowserConfig;
use crate::errors::Result;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait BrowserTrait: Send + Sync {
    type TabHandle: Send + Sync;

    /// Launch a new browser instance, or attach to a running one
    async fn launch(&mut self, config: &BrowserConfig) -> Result<()>;

    /// Reuse a tab already showing `host`, otherwise open one on `url`
    async fn open_tab(&self, host: Option<&str>, url: &str) -> Result<Self::TabHandle>;

    /// Navigate to a URL
    async fn navigate(&self, tab: &Self::TabHandle, url: &str) -> Result<()>;

    /// Execute JavaScript in the page and return its value
    async fn execute_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value>;

    /// Execute JavaScript that evaluates to a promise and return the settled value
    async fn execute_async_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value>;

    /// Take a PNG screenshot
    async fn take_screenshot(&self, tab: &Self::TabHandle) -> Result<Vec<u8>>;

    /// Get current URL
    async fn get_url(&self, tab: &Self::TabHandle) -> Result<String>;

    /// Check if browser is still running
    fn is_running(&self) -> bool;

    /// Close the browser
    async fn close(&mut self) -> Result<()>;
}
