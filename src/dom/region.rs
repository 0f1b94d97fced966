use crate::core::BrowserTrait;
use crate::errors::Result;
use crate::utils::{JavaScriptRunner, ScriptTag};
use scraper::Html;
use serde::{Deserialize, Serialize};

/// "Looks like the payload" test: every marker must appear and the text
/// must reach `min_length` characters. A heuristic tuned to one payload
/// shape, not a parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHeuristic {
    pub markers: Vec<String>,
    pub min_length: usize,
}

impl PayloadHeuristic {
    pub fn has_markers(&self, text: &str) -> bool {
        self.markers.iter().all(|m| text.contains(m.as_str()))
    }

    pub fn accepts(&self, text: &str) -> bool {
        text.chars().count() >= self.min_length && self.has_markers(text)
    }
}

impl Default for PayloadHeuristic {
    fn default() -> Self {
        Self {
            markers: vec!["\"title\"".to_string(), "\"acts\"".to_string()],
            min_length: 1000,
        }
    }
}

/// A response region that passed the heuristic on one poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRegion {
    pub selector: String,
    pub index: usize,
    pub text_length: usize,
}

/// What one poll saw on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub generating: bool,
    pub candidate: Option<CandidateRegion>,
}

impl Observation {
    pub fn generating() -> Self {
        Self {
            generating: true,
            candidate: None,
        }
    }

    pub fn settled(candidate: CandidateRegion) -> Self {
        Self {
            generating: false,
            candidate: Some(candidate),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Markup and rendered text of a settled region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub html: String,
    pub text: String,
}

impl RegionSnapshot {
    pub fn from_html(html: &str) -> Self {
        let fragment = Html::parse_fragment(html);
        let text = fragment.root_element().text().collect::<String>();
        Self {
            html: html.to_string(),
            text,
        }
    }

    pub fn from_text(text: &str) -> Self {
        Self {
            html: String::new(),
            text: text.to_string(),
        }
    }
}

pub struct RegionObserver;

impl RegionObserver {
    /// Probe the page once: is a stop control showing, and which response
    /// region (if any) currently passes the heuristic. Selectors are tried in
    /// priority order; within a selector the newest match is tried first.
    pub async fn observe<B: BrowserTrait>(
        browser: &B,
        tab: &B::TabHandle,
        generating_selectors: &[String],
        response_selectors: &[String],
        heuristic: &PayloadHeuristic,
    ) -> Result<Observation> {
        let script = ScriptTag::Observe.wrap(&format!(
            r#"
            (function() {{
                const stopSelectors = {stop};
                const regionSelectors = {regions};
                const markers = {markers};
                const minLength = {min_length};

                const isActive = (el) => {{
                    const rect = el.getBoundingClientRect();
                    if (rect.width === 0 && rect.height === 0) return false;
                    const style = window.getComputedStyle(el);
                    if (style.visibility === 'hidden' || style.display === 'none') return false;
                    return !el.disabled && el.getAttribute('aria-disabled') !== 'true';
                }};

                let generating = false;
                for (const sel of stopSelectors) {{
                    try {{
                        if (Array.from(document.querySelectorAll(sel)).some(isActive)) {{
                            generating = true;
                            break;
                        }}
                    }} catch (e) {{}}
                }}
                if (generating) {{
                    return JSON.stringify({{ generating: true, candidate: null }});
                }}

                for (const sel of regionSelectors) {{
                    let nodes;
                    try {{ nodes = document.querySelectorAll(sel); }} catch (e) {{ continue; }}
                    for (let i = nodes.length - 1; i >= 0; i--) {{
                        const text = nodes[i].innerText || nodes[i].textContent || '';
                        const length = Array.from(text).length;
                        if (length < minLength) continue;
                        if (!markers.every((m) => text.includes(m))) continue;
                        return JSON.stringify({{
                            generating: false,
                            candidate: {{ selector: sel, index: i, text_length: length }}
                        }});
                    }}
                }}
                return JSON.stringify({{ generating: false, candidate: null }});
            }})()
            "#,
            stop = JavaScriptRunner::literal(generating_selectors)?,
            regions = JavaScriptRunner::literal(response_selectors)?,
            markers = JavaScriptRunner::literal(&heuristic.markers)?,
            min_length = heuristic.min_length,
        ));

        JavaScriptRunner::evaluate_json(browser, tab, &script).await
    }

    pub async fn read<B: BrowserTrait>(
        browser: &B,
        tab: &B::TabHandle,
        region: &CandidateRegion,
    ) -> Result<RegionSnapshot> {
        let script = ScriptTag::ReadRegion.wrap(&format!(
            r#"
            (function() {{
                const el = document.querySelectorAll({selector})[{index}];
                if (!el) return JSON.stringify({{ html: '', text: '' }});
                return JSON.stringify({{
                    html: el.innerHTML,
                    text: el.innerText || el.textContent || ''
                }});
            }})()
            "#,
            selector = JavaScriptRunner::literal(&region.selector)?,
            index = region.index,
        ));

        JavaScriptRunner::evaluate_json(browser, tab, &script).await
    }
}
