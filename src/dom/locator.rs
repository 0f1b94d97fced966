use crate::core::BrowserTrait;
use crate::diag;
use crate::diagnostics::DiagnosticsLog;
use crate::errors::{AutomationError, Result};
use crate::utils::{JavaScriptRunner, ScriptTag};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What kind of editable surface a located element is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    PlainInput,
    MultilineInput,
    RichEditable,
    Other,
}

impl SurfaceKind {
    pub fn is_value_bearing(&self) -> bool {
        matches!(self, SurfaceKind::PlainInput | SurfaceKind::MultilineInput)
    }
}

/// A resolved element, addressed as `document.querySelectorAll(selector)[index]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedElement {
    pub selector: String,
    pub index: usize,
    pub tag_name: String,
    pub surface: SurfaceKind,
}

impl LocatedElement {
    /// JavaScript expression resolving this element.
    pub fn js_handle(&self) -> Result<String> {
        Ok(format!(
            "document.querySelectorAll({})[{}]",
            JavaScriptRunner::literal(&self.selector)?,
            self.index
        ))
    }
}

#[derive(Debug, Deserialize)]
struct LocateReply {
    found: Option<LocatedElement>,
    waited_ms: u64,
}

pub struct ElementLocator;

impl ElementLocator {
    /// Resolve the first selector, in priority order, that matches an element.
    ///
    /// Already-rendered targets resolve immediately. Otherwise the page
    /// re-tests every selector on each mutation batch under `document.body`
    /// until one matches or `timeout_ms` passes. The observer is disconnected
    /// on both paths.
    pub async fn locate<B: BrowserTrait>(
        browser: &B,
        tab: &B::TabHandle,
        candidates: &[String],
        timeout_ms: u64,
        log: &dyn DiagnosticsLog,
    ) -> Result<LocatedElement> {
        let not_found = || AutomationError::ElementNotFound {
            selectors: candidates.to_vec(),
            timeout_ms,
        };

        if candidates.is_empty() {
            return Err(not_found());
        }

        let script = ScriptTag::Locate.wrap(&format!(
            r#"
            new Promise((resolve) => {{
                const selectors = {selectors};
                const started = Date.now();

                const describe = (el, sel) => {{
                    const tag = el.tagName.toLowerCase();
                    const type = (el.getAttribute('type') || 'text').toLowerCase();
                    let surface = 'other';
                    if (tag === 'textarea') surface = 'multiline_input';
                    else if (tag === 'input' && !['button', 'submit', 'checkbox', 'radio'].includes(type)) surface = 'plain_input';
                    else if (el.isContentEditable) surface = 'rich_editable';
                    const index = Array.prototype.indexOf.call(document.querySelectorAll(sel), el);
                    return {{ selector: sel, index: Math.max(index, 0), tag_name: tag, surface }};
                }};

                const probe = () => {{
                    for (const sel of selectors) {{
                        let el = null;
                        try {{ el = document.querySelector(sel); }} catch (e) {{ continue; }}
                        if (el) return describe(el, sel);
                    }}
                    return null;
                }};

                const finish = (found) => resolve(JSON.stringify({{ found, waited_ms: Date.now() - started }}));

                const immediate = probe();
                if (immediate) {{ finish(immediate); return; }}

                let timer = null;
                const observer = new MutationObserver(() => {{
                    const found = probe();
                    if (found) {{
                        observer.disconnect();
                        clearTimeout(timer);
                        finish(found);
                    }}
                }});
                observer.observe(document.body, {{ childList: true, subtree: true, attributes: true }});
                timer = setTimeout(() => {{
                    observer.disconnect();
                    finish(null);
                }}, {timeout_ms});
            }})
            "#,
            selectors = JavaScriptRunner::literal(candidates)?,
            timeout_ms = timeout_ms,
        ));

        let reply: LocateReply = JavaScriptRunner::evaluate_json_async(browser, tab, &script).await?;

        match reply.found {
            Some(element) => {
                debug!(
                    selector = %element.selector,
                    surface = ?element.surface,
                    waited_ms = reply.waited_ms,
                    "element located"
                );
                diag!(log, Debug, "element located", {
                    "selector": element.selector,
                    "surface": element.surface,
                    "waited_ms": reply.waited_ms,
                });
                Ok(element)
            }
            None => {
                warn!(?candidates, timeout_ms, "no selector matched");
                diag!(log, Warn, "element not found", {
                    "selectors": candidates,
                    "timeout_ms": timeout_ms,
                    "waited_ms": reply.waited_ms,
                });
                Err(not_found())
            }
        }
    }
}
