//! Instruction frame wrapped around a user prompt for a full flow.

use crate::validate::ScriptSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en-US")]
    EnUs,
    #[serde(rename = "vi-VN")]
    ViVn,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::EnUs => "en-US",
            Language::ViVn => "vi-VN",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "en-US" | "en" => Ok(Language::EnUs),
            "vi-VN" | "vi" => Ok(Language::ViVn),
            other => Err(format!("unsupported language '{}' (expected en-US or vi-VN)", other)),
        }
    }
}

/// Build the message sent to the chat page. The model is asked for exactly
/// one fenced JSON object so the code-block strategy can pick it up.
pub fn frame(prompt: &str, language: Language, schema: &ScriptSchema) -> String {
    let fields = schema
        .required_fields
        .iter()
        .map(|f| format!("\"{}\"", f))
        .collect::<Vec<_>>()
        .join(", ");
    let lists = schema
        .list_fields
        .iter()
        .map(|f| format!("\"{}\"", f))
        .collect::<Vec<_>>()
        .join(", ");

    match language {
        Language::EnUs => format!(
            "Write a screenplay based on the request below.\n\
             Reply with a single JSON object inside one ```json code block and nothing else.\n\
             The object must have the top-level fields {fields}; {lists} must be non-empty arrays.\n\
             Write every text value in English.\n\n\
             Request:\n{prompt}"
        ),
        Language::ViVn => format!(
            "Hãy viết một kịch bản dựa trên yêu cầu dưới đây.\n\
             Chỉ trả lời bằng một đối tượng JSON duy nhất trong một khối mã ```json.\n\
             Đối tượng phải có các trường cấp cao nhất {fields}; {lists} phải là mảng không rỗng.\n\
             Viết mọi giá trị văn bản bằng tiếng Việt.\n\n\
             Yêu cầu:\n{prompt}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_uses_locale_codes_on_the_wire() {
        assert_eq!(serde_json::to_string(&Language::ViVn).unwrap(), "\"vi-VN\"");
        let parsed: Language = serde_json::from_str("\"en-US\"").unwrap();
        assert_eq!(parsed, Language::EnUs);
        assert!(serde_json::from_str::<Language>("\"fr-FR\"").is_err());
        assert_eq!("vi".parse::<Language>().unwrap(), Language::ViVn);
    }

    #[test]
    fn frame_names_every_required_field_and_keeps_the_prompt() {
        let framed = frame("A heist on the moon", Language::EnUs, &ScriptSchema::default());
        assert!(framed.contains("\"title\", \"logline\", \"acts\", \"characters\""));
        assert!(framed.contains("```json"));
        assert!(framed.ends_with("A heist on the moon"));
    }

    #[test]
    fn vietnamese_frame_asks_for_vietnamese_text() {
        let framed = frame("Một chuyến đi", Language::ViVn, &ScriptSchema::default());
        assert!(framed.contains("tiếng Việt"));
        assert!(framed.ends_with("Một chuyến đi"));
    }
}
