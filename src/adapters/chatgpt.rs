use super::{selectors, SiteAdapter};
use crate::dom::PayloadHeuristic;

pub fn adapter() -> SiteAdapter {
    SiteAdapter {
        name: "chatgpt".to_string(),
        hosts: vec!["chatgpt.com".to_string(), "chat.openai.com".to_string()],
        home_url: "https://chatgpt.com/".to_string(),
        input_selectors: selectors(&[
            "#prompt-textarea[contenteditable=\"true\"]",
            "textarea#prompt-textarea",
            "form div[contenteditable=\"true\"]",
            "textarea",
        ]),
        send_selectors: selectors(&[
            "button[data-testid=\"send-button\"]",
            "#composer-submit-button",
            "button[aria-label=\"Send prompt\"]",
            "form button[type=\"submit\"]",
        ]),
        generating_selectors: selectors(&[
            "button[data-testid=\"stop-button\"]",
            "button[aria-label=\"Stop streaming\"]",
            "button[aria-label*=\"Stop\"]",
        ]),
        response_selectors: selectors(&[
            "[data-message-author-role=\"assistant\"] .markdown",
            "[data-message-author-role=\"assistant\"]",
            "article .markdown",
            ".markdown",
        ]),
        heuristic: PayloadHeuristic::default(),
    }
}
