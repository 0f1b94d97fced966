//! Message-bus requests and responses.
//!
//! Requests arrive as `{"type": "FILL_PROMPT", ...}` objects. Every failure
//! is folded into the response's `error` field as `"<Kind>: <message>"`;
//! nothing here is fatal to the caller.

use crate::browser::session::ChatSession;
use crate::core::BrowserTrait;
use crate::errors::AutomationError;
use crate::prompt::Language;
use crate::types::GenerationRequest;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentRequest {
    #[serde(rename = "FILL_PROMPT")]
    FillPrompt {
        prompt: String,
        #[serde(rename = "autoSend", default)]
        auto_send: bool,
    },
    #[serde(rename = "AUTOMATE_FULL_FLOW")]
    AutomateFullFlow {
        prompt: String,
        #[serde(default)]
        language: Language,
        /// Falls back to the configured default (120 000 ms) when absent.
        #[serde(rename = "maxWaitTimeMs", default, skip_serializing_if = "Option::is_none")]
        max_wait_time_ms: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillPromptResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomateFlowResponse {
    pub success: bool,
    #[serde(rename = "scriptJSON", default, skip_serializing_if = "Option::is_none")]
    pub script_json: Option<String>,
    #[serde(rename = "scriptId", default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentResponse {
    Flow(AutomateFlowResponse),
    Fill(FillPromptResponse),
}

impl AgentResponse {
    pub fn failure(err: &AutomationError) -> Self {
        AgentResponse::Fill(FillPromptResponse {
            success: false,
            error: Some(err.to_bus_message()),
        })
    }

    pub fn is_success(&self) -> bool {
        match self {
            AgentResponse::Flow(r) => r.success,
            AgentResponse::Fill(r) => r.success,
        }
    }
}

/// Single entry point for bus requests against one page.
pub struct AutomationAgent<B: BrowserTrait> {
    session: ChatSession<B>,
}

impl<B: BrowserTrait> AutomationAgent<B> {
    pub fn new(session: ChatSession<B>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &ChatSession<B> {
        &self.session
    }

    pub fn into_session(self) -> ChatSession<B> {
        self.session
    }

    /// `&mut self` keeps requests on one page strictly one at a time.
    pub async fn handle(&mut self, request: AgentRequest) -> AgentResponse {
        match request {
            AgentRequest::FillPrompt { prompt, auto_send } => {
                info!(auto_send, "FILL_PROMPT");
                let response = match self.session.fill_prompt(&prompt, auto_send).await {
                    Ok(()) => FillPromptResponse {
                        success: true,
                        error: None,
                    },
                    Err(e) => {
                        warn!(error = %e, "FILL_PROMPT failed");
                        FillPromptResponse {
                            success: false,
                            error: Some(e.to_bus_message()),
                        }
                    }
                };
                AgentResponse::Fill(response)
            }
            AgentRequest::AutomateFullFlow {
                prompt,
                language,
                max_wait_time_ms,
            } => {
                let max_wait = max_wait_time_ms
                    .unwrap_or(self.session.config().automation.default_max_wait_ms);
                info!(%language, max_wait_ms = max_wait, "AUTOMATE_FULL_FLOW");
                let request = GenerationRequest::full_flow(prompt, language, max_wait);

                let response = match self.session.automate_full_flow(&request).await {
                    Ok(output) => AutomateFlowResponse {
                        success: true,
                        script_json: Some(output.script_json),
                        script_id: output.script_id,
                        error: None,
                    },
                    Err(e) => AutomateFlowResponse {
                        success: false,
                        script_json: None,
                        script_id: None,
                        error: Some(e.to_bus_message()),
                    },
                };
                AgentResponse::Flow(response)
            }
        }
    }

    /// Decode one raw bus line and handle it. Undecodable input is answered
    /// with an error response instead of failing the stream.
    pub async fn handle_json(&mut self, line: &str) -> AgentResponse {
        match serde_json::from_str::<AgentRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!(error = %e, "undecodable request");
                AgentResponse::failure(&AutomationError::SerializationError(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterRegistry;
    use crate::core::Config;
    use crate::diagnostics::NoopLog;
    use crate::testing::{MemoryScriptStore, ScriptedBrowser};
    use crate::utils::ScriptTag;
    use serde_json::json;
    use std::sync::Arc;

    const SCRIPT: &str =
        r#"{"title":"T","logline":"L","acts":[{"a":1}],"characters":[{"c":1}]}"#;

    fn agent(browser: ScriptedBrowser) -> AutomationAgent<ScriptedBrowser> {
        let mut config = Config::default();
        config.automation.locator_timeout_ms = 50;
        config.automation.poll_interval_ms = 5;
        config.automation.initial_delay_ms = 0;
        config.automation.click_settle_ms = 0;
        config.automation.send_delay_ms = 0;
        let adapter = AdapterRegistry::with_builtins().get("chatgpt").unwrap().clone();
        let tab = browser.tab();
        let session = ChatSession::with_tab(browser, tab, config, adapter, Arc::new(NoopLog))
            .with_store(Arc::new(MemoryScriptStore::new()));
        AutomationAgent::new(session)
    }

    #[test]
    fn requests_decode_from_bus_shapes() {
        let fill: AgentRequest =
            serde_json::from_str(r#"{"type":"FILL_PROMPT","prompt":"hi","autoSend":true}"#).unwrap();
        assert_eq!(
            fill,
            AgentRequest::FillPrompt {
                prompt: "hi".into(),
                auto_send: true
            }
        );

        let flow: AgentRequest = serde_json::from_str(
            r#"{"type":"AUTOMATE_FULL_FLOW","prompt":"p","language":"vi-VN"}"#,
        )
        .unwrap();
        assert_eq!(
            flow,
            AgentRequest::AutomateFullFlow {
                prompt: "p".into(),
                language: Language::ViVn,
                max_wait_time_ms: None
            }
        );

        assert!(serde_json::from_str::<AgentRequest>(r#"{"type":"UNKNOWN"}"#).is_err());
    }

    #[test]
    fn flow_response_uses_bus_field_names() {
        let response = AutomateFlowResponse {
            success: true,
            script_json: Some("{}".into()),
            script_id: Some("id-1".into()),
            error: None,
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "success": true, "scriptJSON": "{}", "scriptId": "id-1" })
        );
    }

    #[tokio::test]
    async fn fill_failure_becomes_error_field() {
        let browser = ScriptedBrowser::new();
        browser.respond(ScriptTag::Locate, json!({ "found": null, "waited_ms": 50 }));
        let mut agent = agent(browser);

        let response = agent
            .handle(AgentRequest::FillPrompt {
                prompt: "hi".into(),
                auto_send: false,
            })
            .await;

        match response {
            AgentResponse::Fill(FillPromptResponse { success, error }) => {
                assert!(!success);
                assert!(error.unwrap().starts_with("ElementNotFound: "));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_flow_returns_script_and_id() {
        let browser = ScriptedBrowser::new();
        browser.respond_always(
            ScriptTag::Locate,
            json!({ "found": { "selector": "textarea", "index": 0, "tag_name": "textarea", "surface": "multiline_input" }, "waited_ms": 0 }),
        );
        browser.respond_always(ScriptTag::Inject, json!({ "ok": true }));
        browser.respond_always(ScriptTag::ClickPrepare, json!({ "ok": true }));
        browser.respond_always(ScriptTag::ClickDispatch, json!({ "ok": true }));
        browser.respond_always(
            ScriptTag::Observe,
            json!({ "generating": false, "candidate": { "selector": ".markdown", "index": 0, "text_length": 1200 } }),
        );
        browser.respond_always(
            ScriptTag::ReadRegion,
            json!({ "html": format!("<pre><code>{SCRIPT}</code></pre>"), "text": SCRIPT }),
        );
        let mut agent = agent(browser);

        let response = agent
            .handle_json(r#"{"type":"AUTOMATE_FULL_FLOW","prompt":"p","language":"en-US","maxWaitTimeMs":2000}"#)
            .await;

        assert!(response.is_success());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "success": true, "scriptJSON": SCRIPT, "scriptId": "script-1" })
        );
    }

    #[tokio::test]
    async fn timeout_is_reported_with_kind_prefix() {
        let browser = ScriptedBrowser::new();
        browser.respond_always(
            ScriptTag::Locate,
            json!({ "found": { "selector": "textarea", "index": 0, "tag_name": "textarea", "surface": "multiline_input" }, "waited_ms": 0 }),
        );
        browser.respond_always(ScriptTag::Inject, json!({ "ok": true }));
        browser.respond_always(ScriptTag::ClickPrepare, json!({ "ok": true }));
        browser.respond_always(ScriptTag::ClickDispatch, json!({ "ok": true }));
        browser.respond_always(ScriptTag::Observe, json!({ "generating": true, "candidate": null }));
        let mut agent = agent(browser);

        let response = agent
            .handle(AgentRequest::AutomateFullFlow {
                prompt: "p".into(),
                language: Language::EnUs,
                max_wait_time_ms: Some(30),
            })
            .await;

        match response {
            AgentResponse::Flow(flow) => {
                assert!(!flow.success);
                assert!(flow.script_json.is_none());
                assert!(flow.error.unwrap().starts_with("ResponseTimeout: "));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_line_is_answered_not_fatal() {
        let mut agent = agent(ScriptedBrowser::new());
        let response = agent.handle_json("not json").await;
        assert!(!response.is_success());
        assert!(serde_json::to_string(&response).unwrap().contains("SerializationError"));
    }
}
