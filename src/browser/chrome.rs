use crate::core::config::BrowserConfig;
use crate::core::BrowserTrait;
use crate::errors::{AutomationError, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Chrome browser implementation
pub struct ChromeBrowser {
    browser: Option<Browser>,
    default_timeout: Duration,
}

impl ChromeBrowser {
    pub fn new() -> Self {
        Self {
            browser: None,
            default_timeout: Duration::from_secs(30),
        }
    }

    fn browser(&self) -> Result<&Browser> {
        self.browser
            .as_ref()
            .ok_or_else(|| AutomationError::LaunchFailed("browser not launched".to_string()))
    }

    fn find_tab_on_host(&self, host: &str) -> Result<Option<Arc<Tab>>> {
        let tabs = self
            .browser()?
            .get_tabs()
            .lock()
            .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;

        Ok(tabs
            .iter()
            .find(|tab| {
                url::Url::parse(&tab.get_url())
                    .ok()
                    .and_then(|u| u.host_str().map(|h| h == host || h.ends_with(&format!(".{}", host))))
                    .unwrap_or(false)
            })
            .cloned())
    }
}

impl Default for ChromeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserTrait for ChromeBrowser {
    type TabHandle = Arc<Tab>;

    async fn launch(&mut self, config: &BrowserConfig) -> Result<()> {
        self.default_timeout = Duration::from_millis(config.timeout_ms);

        if let Some(ws_url) = &config.connect_url {
            info!(url = %ws_url, "attaching to running browser");
            let browser = Browser::connect(ws_url.clone())
                .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;
            self.browser = Some(browser);
            return Ok(());
        }

        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );

        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let user_data_arg = config
            .user_data_dir
            .as_ref()
            .map(|dir| format!("--user-data-dir={}", dir.display()));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        if let Some(ref dir_arg) = user_data_arg {
            args.push(OsStr::new(dir_arg));
        }

        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .args(args)
            .build()
            .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;

        info!(headless = config.headless, "browser launched");
        self.browser = Some(browser);
        Ok(())
    }

    async fn open_tab(&self, host: Option<&str>, url: &str) -> Result<Self::TabHandle> {
        if let Some(host) = host {
            if let Some(tab) = self.find_tab_on_host(host)? {
                debug!(host, "reusing open tab");
                tab.set_default_timeout(self.default_timeout);
                return Ok(tab);
            }
        }

        let tab = self
            .browser()?
            .new_tab()
            .map_err(|e| AutomationError::LaunchFailed(e.to_string()))?;
        tab.set_default_timeout(self.default_timeout);

        self.navigate(&tab, url).await?;
        Ok(tab)
    }

    async fn navigate(&self, tab: &Self::TabHandle, url: &str) -> Result<()> {
        tab.navigate_to(url)
            .map_err(|e| AutomationError::NavigationFailed(e.to_string()))?;

        tab.wait_until_navigated()
            .map_err(|e| AutomationError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    async fn execute_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value> {
        let result = tab
            .evaluate(script, false)
            .map_err(|e| AutomationError::JavaScriptFailed(e.to_string()))?;

        Ok(result.value.unwrap_or(Value::Null))
    }

    async fn execute_async_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value> {
        // Awaiting a promise blocks the CDP call until it settles.
        let tab = Arc::clone(tab);
        let script = script.to_string();
        let result = tokio::task::spawn_blocking(move || tab.evaluate(&script, true))
            .await
            .map_err(AutomationError::from_any_error)?
            .map_err(|e| AutomationError::JavaScriptFailed(e.to_string()))?;

        Ok(result.value.unwrap_or(Value::Null))
    }

    async fn take_screenshot(&self, tab: &Self::TabHandle) -> Result<Vec<u8>> {
        tab.capture_screenshot(
            headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption::Png,
            None,
            None,
            true,
        )
        .map_err(|e| AutomationError::JavaScriptFailed(e.to_string()))
    }

    async fn get_url(&self, tab: &Self::TabHandle) -> Result<String> {
        Ok(tab.get_url())
    }

    fn is_running(&self) -> bool {
        self.browser.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        self.browser = None;
        Ok(())
    }
}
