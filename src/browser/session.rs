use crate::adapters::SiteAdapter;
use crate::core::{BrowserTrait, Config};
use crate::detect::{CompletionPoller, DetectorSettings};
use crate::diag;
use crate::diagnostics::DiagnosticsLog;
use crate::dom::{ElementLocator, InputInjector, RegionObserver};
use crate::errors::{AutomationError, Result};
use crate::extract::{ExtractionPipeline, Strategy};
use crate::prompt;
use crate::store::{SaveOutcome, ScriptStore};
use crate::types::{FlowOutput, GenerationRequest};
use crate::validate::{ScriptSchema, Validator};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Drives one chat page through fill, send, wait, extract and validate.
///
/// Calls take `&self` but a page can only serve one request at a time;
/// [`AutomationAgent`](crate::messages::AutomationAgent) serializes them.
pub struct ChatSession<B: BrowserTrait> {
    browser: B,
    tab: B::TabHandle,
    config: Config,
    adapter: SiteAdapter,
    schema: ScriptSchema,
    injector: InputInjector,
    log: Arc<dyn DiagnosticsLog>,
    store: Option<Arc<dyn ScriptStore>>,
}

impl<B: BrowserTrait> ChatSession<B> {
    /// Launch (or attach to) the browser and open the adapter's page,
    /// reusing a tab already on one of its hosts.
    pub async fn open(
        mut browser: B,
        config: Config,
        adapter: SiteAdapter,
        log: Arc<dyn DiagnosticsLog>,
    ) -> Result<Self> {
        if !browser.is_running() {
            browser.launch(&config.browser).await?;
        }
        let tab = browser
            .open_tab(adapter.primary_host(), &adapter.home_url)
            .await?;
        info!(adapter = %adapter.name, url = %adapter.home_url, "chat session opened");

        Ok(Self::with_tab(browser, tab, config, adapter, log))
    }

    pub fn with_tab(
        browser: B,
        tab: B::TabHandle,
        config: Config,
        adapter: SiteAdapter,
        log: Arc<dyn DiagnosticsLog>,
    ) -> Self {
        let injector = InputInjector::new(config.automation.click_settle_ms);
        Self {
            browser,
            tab,
            config,
            adapter,
            schema: ScriptSchema::default(),
            injector,
            log,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ScriptStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_schema(mut self, schema: ScriptSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn tab(&self) -> &B::TabHandle {
        &self.tab
    }

    pub fn adapter(&self) -> &SiteAdapter {
        &self.adapter
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn log(&self) -> &Arc<dyn DiagnosticsLog> {
        &self.log
    }

    /// Put `prompt` into the input surface and, with `auto_send`, click send.
    pub async fn fill_prompt(&self, prompt: &str, auto_send: bool) -> Result<()> {
        let automation = &self.config.automation;
        let input = ElementLocator::locate(
            &self.browser,
            &self.tab,
            &self.adapter.input_selectors,
            automation.locator_timeout_ms,
            self.log.as_ref(),
        )
        .await?;
        self.injector
            .inject(&self.browser, &self.tab, &input, prompt, self.log.as_ref())
            .await?;

        if !auto_send {
            return Ok(());
        }

        // Send buttons are often disabled until the page has seen the input.
        tokio::time::sleep(Duration::from_millis(automation.send_delay_ms)).await;
        let send = ElementLocator::locate(
            &self.browser,
            &self.tab,
            &self.adapter.send_selectors,
            automation.locator_timeout_ms,
            self.log.as_ref(),
        )
        .await?;
        self.injector
            .simulate_click(&self.browser, &self.tab, &send, self.log.as_ref())
            .await?;

        info!(adapter = %self.adapter.name, length = prompt.chars().count(), "prompt sent");
        Ok(())
    }

    /// Run the whole pipeline for `request`. The first failure stops the run;
    /// with diagnostics on, failure artefacts are captured before returning.
    pub async fn automate_full_flow(&self, request: &GenerationRequest) -> Result<FlowOutput> {
        if self.log.is_enabled() {
            if let Ok(value) = serde_json::to_value(request) {
                self.log.record_state("request", value);
            }
        }

        match self.run_flow(request).await {
            Ok(output) => Ok(output),
            Err(e) => {
                error!(kind = e.kind(), error = %e, "full flow failed");
                diag!(self.log, Error, "full flow failed", {
                    "kind": e.kind(),
                    "error": e.to_string(),
                });
                self.capture_failure().await;
                Err(e)
            }
        }
    }

    async fn run_flow(&self, request: &GenerationRequest) -> Result<FlowOutput> {
        let automation = &self.config.automation;
        let framed = prompt::frame(&request.prompt, request.language, &self.schema);
        self.fill_prompt(&framed, true).await?;

        // An earlier answer may still be on the page; give the new one time to start.
        tokio::time::sleep(Duration::from_millis(automation.initial_delay_ms)).await;

        let poller = CompletionPoller::new(
            automation.poll_interval_ms,
            DetectorSettings {
                stability_threshold: automation.stability_threshold,
                max_wait_ms: request.max_wait_time_ms,
            },
        );
        let region = poller
            .wait(
                &self.browser,
                &self.tab,
                &self.adapter.generating_selectors,
                &self.adapter.response_selectors,
                &self.adapter.heuristic,
                self.log.as_ref(),
            )
            .await?;

        let snapshot = RegionObserver::read(&self.browser, &self.tab, &region).await?;
        let extraction = ExtractionPipeline::new(self.adapter.heuristic.clone()).extract(&snapshot);
        info!(
            strategy = ?extraction.strategy_used,
            raw_length = extraction.raw_text.len(),
            candidate_length = extraction.candidate_json_text.len(),
            "response extracted"
        );
        diag!(self.log, Info, "response extracted", {
            "strategy": extraction.strategy_used,
            "raw_length": extraction.raw_text.chars().count(),
            "candidate_length": extraction.candidate_json_text.chars().count(),
            "success": extraction.success,
        });
        if self.log.is_enabled() {
            if let Ok(value) = serde_json::to_value(&extraction) {
                self.log.record_state("extraction", value);
            }
        }

        let validation = Validator::new(self.schema.clone()).validate(&extraction.candidate_json_text);
        if self.log.is_enabled() {
            if let Ok(value) = serde_json::to_value(&validation) {
                self.log.record_state("validation", value);
            }
        }

        if !validation.valid {
            let violations = validation.violations();
            diag!(self.log, Warn, "validation failed", { "violations": violations });
            if extraction.is_empty() || extraction.strategy_used == Strategy::None {
                return Err(AutomationError::ExtractionEmpty);
            }
            return Err(AutomationError::ValidationFailed { violations });
        }

        let script_id = match &self.store {
            Some(store) => match store.save(&extraction.candidate_json_text).await {
                SaveOutcome::Saved { id } => {
                    info!(script_id = %id, "script saved");
                    diag!(self.log, Info, "script saved", { "id": id });
                    Some(id)
                }
                SaveOutcome::Failed { error } => {
                    diag!(self.log, Error, "script save failed", { "error": error });
                    return Err(AutomationError::SaveFailed(error));
                }
            },
            None => None,
        };

        Ok(FlowOutput {
            script_json: extraction.candidate_json_text.clone(),
            script_id,
            extraction,
            validation,
        })
    }

    /// Best effort: problems here are logged, never returned.
    async fn capture_failure(&self) {
        let diagnostics = &self.config.diagnostics;
        if !self.log.is_enabled() {
            return;
        }

        if diagnostics.capture_screenshot_on_failure {
            match self.browser.take_screenshot(&self.tab).await {
                Ok(png) => self.log.attach_screenshot(&png),
                Err(e) => warn!(error = %e, "failure screenshot not captured"),
            }
        }

        if let Some(path) = &diagnostics.snapshot_path {
            if let Some(snapshot) = self.log.snapshot() {
                match snapshot.export_to(path) {
                    Ok(()) => info!(path = %path.display(), "diagnostics snapshot exported"),
                    Err(e) => warn!(path = %path.display(), error = %e, "snapshot export failed"),
                }
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await
    }
}
