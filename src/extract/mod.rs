//! Turns a settled response region into a single JSON document.
//!
//! Strategies run in order and the first that applies wins:
//! code blocks in the region markup, fence stripping, a balanced-brace scan
//! and finally a greedy first-`{`-to-last-`}` match. Only the last two go
//! through [`repair`]. Extraction never fails; a bad candidate is left for
//! the validator to reject.

pub mod repair;

pub use repair::repair;

use crate::dom::{PayloadHeuristic, RegionSnapshot};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    CodeBlock,
    FenceStripped,
    BalancedBraces,
    RegexFallback,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub raw_text: String,
    pub candidate_json_text: String,
    pub strategy_used: Strategy,
    /// Candidate is non-empty and parses as JSON.
    pub success: bool,
}

impl ExtractionResult {
    fn new(raw_text: &str, candidate: String, strategy_used: Strategy) -> Self {
        let success = !candidate.trim().is_empty()
            && serde_json::from_str::<serde_json::Value>(&candidate).is_ok();
        Self {
            raw_text: raw_text.to_string(),
            candidate_json_text: candidate,
            strategy_used,
            success,
        }
    }

    /// Nothing resembling an object was found at all.
    pub fn is_empty(&self) -> bool {
        self.candidate_json_text.trim().is_empty()
    }
}

pub struct ExtractionPipeline {
    heuristic: PayloadHeuristic,
}

impl ExtractionPipeline {
    pub fn new(heuristic: PayloadHeuristic) -> Self {
        Self { heuristic }
    }

    pub fn extract(&self, region: &RegionSnapshot) -> ExtractionResult {
        let raw = region.text.as_str();

        if let Some(block) = self.code_block(&region.html) {
            return ExtractionResult::new(raw, block, Strategy::CodeBlock);
        }

        let stripped = strip_fences(raw);
        let trimmed = stripped.trim();
        if trimmed.starts_with('{')
            && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
        {
            return ExtractionResult::new(raw, trimmed.to_string(), Strategy::FenceStripped);
        }

        if let Some(span) = balanced_object(&stripped) {
            return ExtractionResult::new(raw, repair(span), Strategy::BalancedBraces);
        }

        if let Some(span) = greedy_object(&stripped) {
            return ExtractionResult::new(raw, repair(span), Strategy::RegexFallback);
        }

        ExtractionResult::new(raw, trimmed.to_string(), Strategy::None)
    }

    /// First `code` (then `pre`) element whose text carries every marker.
    fn code_block(&self, html: &str) -> Option<String> {
        if html.trim().is_empty() {
            return None;
        }

        let fragment = Html::parse_fragment(html);
        ["code", "pre"].iter().find_map(|css| {
            let selector = Selector::parse(css).ok()?;
            fragment
                .select(&selector)
                .map(|node| node.text().collect::<String>())
                .find(|text| self.heuristic.has_markers(text))
                .map(|text| text.trim().to_string())
        })
    }
}

impl Default for ExtractionPipeline {
    fn default() -> Self {
        Self::new(PayloadHeuristic::default())
    }
}

/// Remove ``` fence markers along with any language tag.
pub fn strip_fences(text: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE.get_or_init(|| Regex::new(r"```[A-Za-z0-9_+-]*").expect("valid regex"));
    re.replace_all(text, "").into_owned()
}

/// Span from the first `{` to the `}` that closes it. Braces inside string
/// literals do not count.
pub fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if depth == 0 {
            if c == '{' {
                start = i;
                depth = 1;
            }
            continue;
        }

        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn greedy_object(text: &str) -> Option<&str> {
    static GREEDY: OnceLock<Regex> = OnceLock::new();
    let re = GREEDY.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
    re.find(text).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const SCRIPT: &str =
        r#"{"title":"T","logline":"L","acts":[{"a":1}],"characters":[{"c":1}]}"#;

    fn prose(len: usize) -> String {
        "The screenplay follows. ".repeat(len / 24 + 1)
    }

    #[test]
    fn balanced_scan_ignores_braces_inside_strings() {
        let text = r#"Here you go: {"a": "text with } inside", "b": 1} and more"#;
        let span = balanced_object(text).unwrap();
        assert_eq!(span, r#"{"a": "text with } inside", "b": 1}"#);

        let parsed: Value = serde_json::from_str(span).unwrap();
        assert_eq!(parsed["a"], "text with } inside");
        assert_eq!(parsed["b"], 1);
    }

    #[test]
    fn balanced_scan_handles_nesting_and_escaped_quotes() {
        let text = r#"x {"a": {"b": [1, {"c": "say \"}\" now"}]}, "d": 2} {"other": 1}"#;
        let span = balanced_object(text).unwrap();
        assert!(span.ends_with(r#""d": 2}"#));
        assert!(serde_json::from_str::<Value>(span).is_ok());
    }

    #[test]
    fn quotes_in_leading_prose_do_not_confuse_the_scan() {
        let text = r#"She said "here it is": {"a": 1}"#;
        assert_eq!(balanced_object(text), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn unbalanced_text_falls_back_to_greedy_match() {
        let region = RegionSnapshot::from_text(r#"Result: {"title": "T", "acts": {"n": 1} (cut off)"#);
        let result = ExtractionPipeline::default().extract(&region);
        assert_eq!(result.strategy_used, Strategy::RegexFallback);
        assert_eq!(result.candidate_json_text, r#"{"title": "T", "acts": {"n": 1}"#);
        assert!(!result.success);
    }

    #[test]
    fn fenced_text_without_markup_is_stripped() {
        let region = RegionSnapshot::from_text(&format!("```json\n{}\n```", SCRIPT));
        let result = ExtractionPipeline::default().extract(&region);
        assert_eq!(result.strategy_used, Strategy::FenceStripped);
        assert_eq!(result.candidate_json_text, SCRIPT);
        assert!(result.success);
    }

    #[test]
    fn prose_wrapped_object_is_scanned_and_repaired() {
        let region = RegionSnapshot::from_text(
            "Sure! Here is the script:\n{'title': 'T', 'acts': [1, 2,],}\nEnjoy.",
        );
        let result = ExtractionPipeline::default().extract(&region);
        assert_eq!(result.strategy_used, Strategy::BalancedBraces);
        assert_eq!(result.candidate_json_text, r#"{"title": "T", "acts": [1, 2]}"#);
        assert!(result.success);
    }

    #[test]
    fn text_without_any_object_is_returned_best_effort() {
        let region = RegionSnapshot::from_text("  I cannot help with that.  ");
        let result = ExtractionPipeline::default().extract(&region);
        assert_eq!(result.strategy_used, Strategy::None);
        assert_eq!(result.candidate_json_text, "I cannot help with that.");
        assert!(!result.success);

        let blank = ExtractionPipeline::default().extract(&RegionSnapshot::from_text("   "));
        assert!(blank.is_empty());
    }

    #[test]
    fn code_block_needs_the_markers() {
        let html = format!(
            "<p>{}</p><pre><code>{{\"unrelated\": true}}</code></pre><pre><code class=\"language-json\">{}</code></pre>",
            prose(1200),
            SCRIPT
        );
        let result = ExtractionPipeline::default().extract(&RegionSnapshot::from_html(&html));
        assert_eq!(result.strategy_used, Strategy::CodeBlock);
        assert_eq!(result.candidate_json_text, SCRIPT);
    }

    #[test]
    fn code_inside_pre_is_preferred_over_pre_chrome() {
        let html = format!(
            "<pre><div>json</div><button>Copy code</button><code>{}</code></pre>",
            SCRIPT
        );
        let result = ExtractionPipeline::default().extract(&RegionSnapshot::from_html(&html));
        assert_eq!(result.candidate_json_text, SCRIPT);
        assert!(result.success);
    }

    #[test]
    fn fenced_block_in_long_prose_round_trips() {
        let markdown = format!(
            "{}\n```json\n{}\n```\n{}",
            prose(600),
            SCRIPT,
            prose(600)
        );
        let html = format!(
            "<p>{}</p><pre><code class=\"language-json\">{}</code></pre><p>{}</p>",
            prose(600),
            SCRIPT,
            prose(600)
        );
        let region = RegionSnapshot {
            html,
            text: markdown,
        };
        assert!(region.text.chars().count() > 1000);
        assert!(PayloadHeuristic::default().accepts(&region.text));

        let result = ExtractionPipeline::default().extract(&region);
        assert_eq!(result.strategy_used, Strategy::CodeBlock);
        assert_eq!(result.candidate_json_text, SCRIPT);
        assert_eq!(repair(&result.candidate_json_text), SCRIPT);
        assert!(result.success);
    }
}
