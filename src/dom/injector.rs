use crate::core::BrowserTrait;
use crate::diag;
use crate::diagnostics::DiagnosticsLog;
use crate::dom::locator::LocatedElement;
use crate::errors::{AutomationError, Result};
use crate::utils::{JavaScriptRunner, ScriptTag};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ScriptReply {
    ok: bool,
    #[serde(default)]
    reason: Option<String>,
}

pub struct InputInjector {
    settle: Duration,
}

impl InputInjector {
    pub fn new(settle_ms: u64) -> Self {
        Self {
            settle: Duration::from_millis(settle_ms),
        }
    }

    /// Replace the surface's content with `text` and raise the change
    /// notifications host frameworks listen for.
    pub async fn inject<B: BrowserTrait>(
        &self,
        browser: &B,
        tab: &B::TabHandle,
        element: &LocatedElement,
        text: &str,
        log: &dyn DiagnosticsLog,
    ) -> Result<()> {
        let handle = element.js_handle()?;
        let text_literal = JavaScriptRunner::literal(text)?;

        let body = if element.surface.is_value_bearing() {
            format!(
                r#"
                (function() {{
                    const el = {handle};
                    if (!el) return JSON.stringify({{ ok: false, reason: 'detached' }});
                    const proto = el.tagName.toLowerCase() === 'textarea'
                        ? HTMLTextAreaElement.prototype
                        : HTMLInputElement.prototype;
                    const setter = Object.getOwnPropertyDescriptor(proto, 'value').set;
                    setter.call(el, {text});
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return JSON.stringify({{ ok: true }});
                }})()
                "#,
                handle = handle,
                text = text_literal,
            )
        } else {
            format!(
                r#"
                (function() {{
                    const el = {handle};
                    if (!el) return JSON.stringify({{ ok: false, reason: 'detached' }});
                    const text = {text};
                    el.focus();
                    document.execCommand('selectAll', false, null);
                    const inserted = document.execCommand('insertText', false, text);
                    if (!inserted) {{
                        el.textContent = text;
                    }}
                    el.dispatchEvent(new InputEvent('input', {{ bubbles: true, inputType: 'insertText', data: text }}));
                    return JSON.stringify({{ ok: true }});
                }})()
                "#,
                handle = handle,
                text = text_literal,
            )
        };

        let reply: ScriptReply =
            JavaScriptRunner::evaluate_json(browser, tab, &ScriptTag::Inject.wrap(&body)).await?;
        if !reply.ok {
            return Err(AutomationError::JavaScriptFailed(format!(
                "could not fill '{}': {}",
                element.selector,
                reply.reason.unwrap_or_default()
            )));
        }

        debug!(selector = %element.selector, surface = ?element.surface, length = text.len(), "text injected");
        diag!(log, Info, "text injected", {
            "selector": element.selector,
            "surface": element.surface,
            "text_length": text.chars().count(),
        });
        Ok(())
    }

    /// Replay a plausible hover, press, focus and click sequence on the element.
    ///
    /// Fails with `ElementNotVisible` when the element has no layout box.
    pub async fn simulate_click<B: BrowserTrait>(
        &self,
        browser: &B,
        tab: &B::TabHandle,
        element: &LocatedElement,
        log: &dyn DiagnosticsLog,
    ) -> Result<()> {
        let handle = element.js_handle()?;

        let prepare = ScriptTag::ClickPrepare.wrap(&format!(
            r#"
            (function() {{
                const el = {handle};
                if (!el) return JSON.stringify({{ ok: false, reason: 'detached' }});
                const rect = el.getBoundingClientRect();
                if (rect.width === 0 && rect.height === 0) {{
                    return JSON.stringify({{ ok: false, reason: 'no layout box' }});
                }}
                el.scrollIntoView({{ block: 'center', inline: 'center' }});
                return JSON.stringify({{ ok: true }});
            }})()
            "#,
            handle = handle,
        ));

        let reply: ScriptReply = JavaScriptRunner::evaluate_json(browser, tab, &prepare).await?;
        if !reply.ok {
            diag!(log, Warn, "click target not visible", {
                "selector": element.selector,
                "reason": reply.reason,
            });
            return Err(AutomationError::ElementNotVisible(element.selector.clone()));
        }

        tokio::time::sleep(self.settle).await;

        let dispatch = ScriptTag::ClickDispatch.wrap(&format!(
            r#"
            (function() {{
                const el = {handle};
                if (!el) return JSON.stringify({{ ok: false, reason: 'detached' }});
                const rect = el.getBoundingClientRect();
                const base = {{
                    bubbles: true,
                    cancelable: true,
                    view: window,
                    clientX: rect.left + rect.width / 2,
                    clientY: rect.top + rect.height / 2,
                    button: 0
                }};
                const pointer = (type) => el.dispatchEvent(new PointerEvent(type, {{ ...base, pointerType: 'mouse', isPrimary: true }}));
                const mouse = (type) => el.dispatchEvent(new MouseEvent(type, base));
                pointer('pointerenter'); mouse('mouseenter');
                pointer('pointerover'); mouse('mouseover');
                pointer('pointerdown'); mouse('mousedown');
                el.focus();
                pointer('pointerup'); mouse('mouseup');
                el.click();
                return JSON.stringify({{ ok: true }});
            }})()
            "#,
            handle = handle,
        ));

        let reply: ScriptReply = JavaScriptRunner::evaluate_json(browser, tab, &dispatch).await?;
        if !reply.ok {
            return Err(AutomationError::ElementNotVisible(element.selector.clone()));
        }

        debug!(selector = %element.selector, "click dispatched");
        diag!(log, Info, "click dispatched", { "selector": element.selector });
        Ok(())
    }
}

impl Default for InputInjector {
    fn default() -> Self {
        Self::new(150)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoopLog;
    use crate::dom::locator::SurfaceKind;
    use crate::testing::ScriptedBrowser;
    use serde_json::json;

    fn element(surface: SurfaceKind) -> LocatedElement {
        LocatedElement {
            selector: "#prompt-textarea".into(),
            index: 0,
            tag_name: "textarea".into(),
            surface,
        }
    }

    #[tokio::test]
    async fn value_surfaces_use_native_setter_and_both_events() {
        let browser = ScriptedBrowser::new();
        browser.respond(ScriptTag::Inject, json!({ "ok": true }));

        InputInjector::new(0)
            .inject(&browser, &browser.tab(), &element(SurfaceKind::MultilineInput), "Hello \"world\"", &NoopLog)
            .await
            .unwrap();

        let script = browser.scripts_for(ScriptTag::Inject).pop().unwrap();
        assert!(script.contains("getOwnPropertyDescriptor(proto, 'value')"));
        assert!(script.contains("new Event('input'"));
        assert!(script.contains("new Event('change'"));
        assert!(script.contains(r#""Hello \"world\"""#));
        assert!(!script.contains("insertText"));
    }

    #[tokio::test]
    async fn rich_surfaces_select_all_then_insert() {
        let browser = ScriptedBrowser::new();
        browser.respond(ScriptTag::Inject, json!({ "ok": true }));

        InputInjector::new(0)
            .inject(&browser, &browser.tab(), &element(SurfaceKind::RichEditable), "line one\nline two", &NoopLog)
            .await
            .unwrap();

        let script = browser.scripts_for(ScriptTag::Inject).pop().unwrap();
        let focus = script.find("el.focus()").unwrap();
        let select = script.find("'selectAll'").unwrap();
        let insert = script.find("'insertText'").unwrap();
        assert!(focus < select && select < insert);
        assert!(script.contains(r#""line one\nline two""#));
    }

    #[tokio::test]
    async fn detached_surface_is_an_error() {
        let browser = ScriptedBrowser::new();
        browser.respond(ScriptTag::Inject, json!({ "ok": false, "reason": "detached" }));

        let err = InputInjector::new(0)
            .inject(&browser, &browser.tab(), &element(SurfaceKind::PlainInput), "x", &NoopLog)
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::JavaScriptFailed(_)));
    }

    #[tokio::test]
    async fn click_dispatches_hover_press_focus_click_in_order() {
        let browser = ScriptedBrowser::new();
        browser.respond(ScriptTag::ClickPrepare, json!({ "ok": true }));
        browser.respond(ScriptTag::ClickDispatch, json!({ "ok": true }));

        InputInjector::new(0)
            .simulate_click(&browser, &browser.tab(), &element(SurfaceKind::Other), &NoopLog)
            .await
            .unwrap();

        let prepare = browser.scripts_for(ScriptTag::ClickPrepare).pop().unwrap();
        assert!(prepare.contains("scrollIntoView"));

        let script = browser.scripts_for(ScriptTag::ClickDispatch).pop().unwrap();
        let order = [
            "pointer('pointerenter')",
            "pointer('pointerover')",
            "pointer('pointerdown')",
            "el.focus()",
            "pointer('pointerup')",
            "el.click()",
        ];
        let positions: Vec<usize> = order.iter().map(|needle| script.find(needle).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let tags: Vec<_> = browser.calls().into_iter().map(|(tag, _)| tag).collect();
        assert_eq!(tags, vec![Some(ScriptTag::ClickPrepare), Some(ScriptTag::ClickDispatch)]);
    }

    #[tokio::test]
    async fn click_on_element_without_layout_box_fails_before_dispatch() {
        let browser = ScriptedBrowser::new();
        browser.respond(ScriptTag::ClickPrepare, json!({ "ok": false, "reason": "no layout box" }));

        let err = InputInjector::new(0)
            .simulate_click(&browser, &browser.tab(), &element(SurfaceKind::Other), &NoopLog)
            .await
            .unwrap_err();

        assert!(matches!(err, AutomationError::ElementNotVisible(ref s) if s == "#prompt-textarea"));
        assert!(browser.scripts_for(ScriptTag::ClickDispatch).is_empty());
    }
}
