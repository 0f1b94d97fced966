//! In-memory stand-ins for the browser and the script store.
//!
//! [`ScriptedBrowser`] answers page scripts by their [`ScriptTag`]: queued
//! answers are consumed first, then the sticky answer for the tag. Every
//! script it receives is recorded so tests can inspect what was sent.

use crate::core::config::BrowserConfig;
use crate::core::BrowserTrait;
use crate::errors::{AutomationError, Result};
use crate::store::{SaveOutcome, ScriptStore};
use crate::utils::ScriptTag;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// PNG signature only; nothing decodes it.
const FAKE_PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedTab {
    pub id: u32,
}

type Answer = std::result::Result<Value, String>;

#[derive(Default)]
struct ScriptedState {
    queued: HashMap<ScriptTag, VecDeque<Answer>>,
    sticky: HashMap<ScriptTag, Value>,
    calls: Vec<(Option<ScriptTag>, String)>,
    url: String,
    running: bool,
    screenshots: usize,
}

pub struct ScriptedBrowser {
    state: Mutex<ScriptedState>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                running: true,
                url: "about:blank".to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn tab(&self) -> ScriptedTab {
        ScriptedTab { id: 1 }
    }

    /// Queue a one-shot answer. Pages return `JSON.stringify` output, so the
    /// value is delivered as a JSON string.
    pub fn respond(&self, tag: ScriptTag, value: Value) {
        self.with_state(|state| {
            state
                .queued
                .entry(tag)
                .or_default()
                .push_back(Ok(Value::String(value.to_string())))
        });
    }

    /// Answer used once the queue for `tag` is drained.
    pub fn respond_always(&self, tag: ScriptTag, value: Value) {
        self.with_state(|state| {
            state
                .sticky
                .insert(tag, Value::String(value.to_string()));
        });
    }

    /// Queue a one-shot script failure.
    pub fn fail_next(&self, tag: ScriptTag, message: &str) {
        self.with_state(|state| {
            state
                .queued
                .entry(tag)
                .or_default()
                .push_back(Err(message.to_string()))
        });
    }

    pub fn calls(&self) -> Vec<(Option<ScriptTag>, String)> {
        self.with_state(|state| state.calls.clone())
    }

    pub fn scripts_for(&self, tag: ScriptTag) -> Vec<String> {
        self.with_state(|state| {
            state
                .calls
                .iter()
                .filter(|(t, _)| *t == Some(tag))
                .map(|(_, script)| script.clone())
                .collect()
        })
    }

    pub fn screenshots_taken(&self) -> usize {
        self.with_state(|state| state.screenshots)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ScriptedState) -> T) -> T {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn answer(&self, script: &str) -> Result<Value> {
        let tag = ScriptTag::of_script(script);
        self.with_state(|state| -> Result<Value> {
            state.calls.push((tag, script.to_string()));
            let tag = tag.ok_or_else(|| {
                AutomationError::JavaScriptFailed("untagged script".to_string())
            })?;

            if let Some(answer) = state.queued.get_mut(&tag).and_then(VecDeque::pop_front) {
                return answer.map_err(AutomationError::JavaScriptFailed);
            }
            state.sticky.get(&tag).cloned().ok_or_else(|| {
                AutomationError::JavaScriptFailed(format!("no answer scripted for {}", tag.as_str()))
            })
        })
    }
}

impl Default for ScriptedBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserTrait for ScriptedBrowser {
    type TabHandle = ScriptedTab;

    async fn launch(&mut self, _config: &BrowserConfig) -> Result<()> {
        self.with_state(|state| state.running = true);
        Ok(())
    }

    async fn open_tab(&self, _host: Option<&str>, url: &str) -> Result<ScriptedTab> {
        self.with_state(|state| state.url = url.to_string());
        Ok(self.tab())
    }

    async fn navigate(&self, _tab: &ScriptedTab, url: &str) -> Result<()> {
        self.with_state(|state| state.url = url.to_string());
        Ok(())
    }

    async fn execute_script(&self, _tab: &ScriptedTab, script: &str) -> Result<Value> {
        self.answer(script)
    }

    async fn execute_async_script(&self, _tab: &ScriptedTab, script: &str) -> Result<Value> {
        self.answer(script)
    }

    async fn take_screenshot(&self, _tab: &ScriptedTab) -> Result<Vec<u8>> {
        self.with_state(|state| state.screenshots += 1);
        Ok(FAKE_PNG.to_vec())
    }

    async fn get_url(&self, _tab: &ScriptedTab) -> Result<String> {
        Ok(self.with_state(|state| state.url.clone()))
    }

    fn is_running(&self) -> bool {
        self.with_state(|state| state.running)
    }

    async fn close(&mut self) -> Result<()> {
        self.with_state(|state| state.running = false);
        Ok(())
    }
}

/// Keeps saved scripts in memory, or fails every save when built with
/// [`failing`](Self::failing).
#[derive(Default)]
pub struct MemoryScriptStore {
    saved: Mutex<Vec<(String, String)>>,
    failure: Option<String>,
}

impl MemoryScriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: &str) -> Self {
        Self {
            saved: Mutex::new(Vec::new()),
            failure: Some(error.to_string()),
        }
    }

    pub fn saved(&self) -> Vec<(String, String)> {
        match self.saved.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl ScriptStore for MemoryScriptStore {
    async fn save(&self, script_json: &str) -> SaveOutcome {
        if let Some(error) = &self.failure {
            return SaveOutcome::Failed {
                error: error.clone(),
            };
        }

        let mut saved = match self.saved.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let id = format!("script-{}", saved.len() + 1);
        saved.push((id.clone(), script_json.to_string()));
        SaveOutcome::Saved { id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn queued_answers_come_before_the_sticky_one() {
        let browser = ScriptedBrowser::new();
        browser.respond(ScriptTag::Observe, json!({ "n": 1 }));
        browser.respond_always(ScriptTag::Observe, json!({ "n": 2 }));
        let script = ScriptTag::Observe.wrap("1");
        let tab = browser.tab();

        let first = tokio_test::block_on(browser.execute_script(&tab, &script)).unwrap();
        let second = tokio_test::block_on(browser.execute_script(&tab, &script)).unwrap();
        let third = tokio_test::block_on(browser.execute_script(&tab, &script)).unwrap();

        assert_eq!(first, Value::String(r#"{"n":1}"#.into()));
        assert_eq!(second, Value::String(r#"{"n":2}"#.into()));
        assert_eq!(second, third);
        assert_eq!(browser.scripts_for(ScriptTag::Observe).len(), 3);
    }

    #[tokio::test]
    async fn unscripted_and_failed_calls_are_errors() {
        let browser = ScriptedBrowser::new();
        browser.fail_next(ScriptTag::Locate, "detached");
        let tab = browser.tab();

        let err = browser
            .execute_script(&tab, &ScriptTag::Locate.wrap("1"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("detached"));
        assert!(browser.execute_script(&tab, &ScriptTag::Locate.wrap("1")).await.is_err());
        assert!(browser.execute_script(&tab, "document.title").await.is_err());
        assert_eq!(browser.calls()[2].0, None);
    }

    #[tokio::test]
    async fn memory_store_hands_out_sequential_ids() {
        let store = MemoryScriptStore::new();
        assert_eq!(store.save("{}").await, SaveOutcome::Saved { id: "script-1".into() });
        assert_eq!(store.save("[]").await, SaveOutcome::Saved { id: "script-2".into() });
        assert_eq!(store.saved()[1].1, "[]");

        let failing = MemoryScriptStore::failing("disk full");
        assert_eq!(
            failing.save("{}").await,
            SaveOutcome::Failed { error: "disk full".into() }
        );
    }
}
