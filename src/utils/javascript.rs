use crate::core::BrowserTrait;
use crate::errors::{AutomationError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Identifies which in-page routine a script runs. The tag is written as a
/// leading comment so a recorded script can be attributed after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptTag {
    Locate,
    Inject,
    ClickPrepare,
    ClickDispatch,
    Observe,
    ReadRegion,
}

impl ScriptTag {
    pub const ALL: [ScriptTag; 6] = [
        ScriptTag::Locate,
        ScriptTag::Inject,
        ScriptTag::ClickPrepare,
        ScriptTag::ClickDispatch,
        ScriptTag::Observe,
        ScriptTag::ReadRegion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptTag::Locate => "locate",
            ScriptTag::Inject => "inject",
            ScriptTag::ClickPrepare => "click-prepare",
            ScriptTag::ClickDispatch => "click-dispatch",
            ScriptTag::Observe => "observe",
            ScriptTag::ReadRegion => "read-region",
        }
    }

    fn marker(&self) -> String {
        format!("/* ragent:{} */", self.as_str())
    }

    /// Prefix `body` with this tag's marker comment.
    pub fn wrap(&self, body: &str) -> String {
        format!("{}\n{}", self.marker(), body)
    }

    pub fn of_script(script: &str) -> Option<ScriptTag> {
        let first_line = script.lines().next()?;
        Self::ALL
            .into_iter()
            .find(|tag| first_line.trim() == tag.marker())
    }
}

pub struct JavaScriptRunner;

impl JavaScriptRunner {
    /// Render a value as a JavaScript literal. JSON is valid JS for every
    /// value serde produces, and it escapes quotes, backslashes and newlines.
    pub fn literal<T: Serialize + ?Sized>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    /// Run a script whose result is a `JSON.stringify`'d string and decode it.
    pub async fn evaluate_json<B: BrowserTrait, T: DeserializeOwned>(
        browser: &B,
        tab: &B::TabHandle,
        script: &str,
    ) -> Result<T> {
        let value = browser.execute_script(tab, script).await?;
        Self::decode(value)
    }

    /// Same as [`evaluate_json`](Self::evaluate_json) for scripts that return a promise.
    pub async fn evaluate_json_async<B: BrowserTrait, T: DeserializeOwned>(
        browser: &B,
        tab: &B::TabHandle,
        script: &str,
    ) -> Result<T> {
        let value = browser.execute_async_script(tab, script).await?;
        Self::decode(value)
    }

    fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
        match value {
            Value::String(raw) => Ok(serde_json::from_str(&raw)?),
            Value::Null => Err(AutomationError::JavaScriptFailed(
                "script returned no value".to_string(),
            )),
            other => Ok(serde_json::from_value(other)?),
        }
    }
}
