//! Per-site selector lists. Everything else in the pipeline is shared; a new
//! chat site is supported by registering one more [`SiteAdapter`].

pub mod chatgpt;
pub mod gemini;

use crate::dom::PayloadHeuristic;
use crate::errors::{AutomationError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteAdapter {
    pub name: String,
    /// Hosts this adapter drives; subdomains match too.
    pub hosts: Vec<String>,
    pub home_url: String,
    /// Each list is in priority order: specific attributes before generic tags.
    pub input_selectors: Vec<String>,
    pub send_selectors: Vec<String>,
    pub generating_selectors: Vec<String>,
    pub response_selectors: Vec<String>,
    #[serde(default)]
    pub heuristic: PayloadHeuristic,
}

impl SiteAdapter {
    pub fn matches_host(&self, host: &str) -> bool {
        self.hosts
            .iter()
            .any(|h| host == h || host.ends_with(&format!(".{}", h)))
    }

    pub fn primary_host(&self) -> Option<&str> {
        self.hosts.first().map(String::as_str)
    }
}

fn selectors(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Registry of site adapters
pub struct AdapterRegistry {
    adapters: BTreeMap<String, SiteAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            adapters: BTreeMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(chatgpt::adapter());
        registry.register(gemini::adapter());
        registry
    }

    /// Register an adapter, replacing any previous one with the same name
    pub fn register(&mut self, adapter: SiteAdapter) {
        self.adapters.insert(adapter.name.clone(), adapter);
    }

    /// Load adapters from a JSON file holding one adapter or an array of them
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let adapters: Vec<SiteAdapter> = if value.is_array() {
            serde_json::from_value(value)?
        } else {
            vec![serde_json::from_value(value)?]
        };

        let count = adapters.len();
        for adapter in adapters {
            if adapter.input_selectors.is_empty() || adapter.response_selectors.is_empty() {
                return Err(AutomationError::ConfigurationError(format!(
                    "adapter '{}' needs input and response selectors",
                    adapter.name
                )));
            }
            self.register(adapter);
        }
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Result<&SiteAdapter> {
        self.adapters
            .get(name)
            .ok_or_else(|| AutomationError::UnknownAdapter(name.to_string()))
    }

    /// Find the adapter whose hosts cover `url`
    pub fn for_url(&self, url: &str) -> Option<&SiteAdapter> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        self.adapters.values().find(|a| a.matches_host(host))
    }

    pub fn names(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteAdapter> {
        self.adapters.values()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
