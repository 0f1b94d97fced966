use super::{selectors, SiteAdapter};
use crate::dom::PayloadHeuristic;

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        name: "gemini".to_string(),
        hosts: vec!["gemini.google.com".to_string()],
        home_url: "https://gemini.google.com/app".to_string(),
        input_selectors: selectors(&[
            "rich-textarea .ql-editor[contenteditable=\"true\"]",
            "div.ql-editor[contenteditable=\"true\"]",
            "div[contenteditable=\"true\"][role=\"textbox\"]",
            "textarea",
        ]),
        send_selectors: selectors(&[
            "button.send-button[aria-label=\"Send message\"]",
            "button[aria-label=\"Send message\"]",
            "button.send-button",
            "button[aria-label*=\"Send\"]",
        ]),
        generating_selectors: selectors(&[
            "button[aria-label=\"Stop response\"]",
            "button.send-button.stop",
            "button[aria-label*=\"Stop\"]",
        ]),
        response_selectors: selectors(&[
            "model-response message-content .markdown",
            "message-content .markdown",
            ".model-response-text",
            "model-response",
        ]),
        heuristic: PayloadHeuristic::default(),
    }
}
