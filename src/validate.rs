use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pseudo field name reported when the text does not parse at all.
pub const PARSE_ERROR_FIELD: &str = "<parse-error>";

const CONTEXT_RADIUS: usize = 40;

/// Required top-level shape of a generated script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSchema {
    /// Checked in this order; the order is preserved in reports.
    pub required_fields: Vec<String>,
    /// Must be arrays with at least one element.
    pub list_fields: Vec<String>,
}

impl Default for ScriptSchema {
    fn default() -> Self {
        Self {
            required_fields: ["title", "logline", "acts", "characters"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            list_fields: ["acts", "characters"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseErrorDetail {
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// Character offset of the failure, when the parser reported a position.
    pub offset: Option<usize>,
    /// Text surrounding the failure point.
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub missing_fields: Vec<String>,
    pub malformed_fields: Vec<String>,
    pub parse_error: Option<ParseErrorDetail>,
}

impl ValidationOutcome {
    /// Every problem found, one line each.
    pub fn violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(detail) = &self.parse_error {
            out.push(match detail.offset {
                Some(offset) => format!(
                    "JSON parse error at char {} ({}): near `{}`",
                    offset, detail.message, detail.context
                ),
                None => format!("JSON parse error: {}", detail.message),
            });
        }
        out.extend(
            self.missing_fields
                .iter()
                .filter(|f| f.as_str() != PARSE_ERROR_FIELD)
                .map(|f| format!("missing field '{}'", f)),
        );
        out.extend(
            self.malformed_fields
                .iter()
                .map(|f| format!("field '{}' must be a non-empty array", f)),
        );
        out
    }

    pub fn is_parse_error(&self) -> bool {
        self.parse_error.is_some()
    }
}

pub struct Validator {
    schema: ScriptSchema,
}

impl Validator {
    pub fn new(schema: ScriptSchema) -> Self {
        Self { schema }
    }

    /// Check `json_text` against the schema, collecting every violation in one pass.
    pub fn validate(&self, json_text: &str) -> ValidationOutcome {
        let value: Value = match serde_json::from_str(json_text) {
            Ok(value) => value,
            Err(err) => {
                return ValidationOutcome {
                    valid: false,
                    missing_fields: vec![PARSE_ERROR_FIELD.to_string()],
                    malformed_fields: Vec::new(),
                    parse_error: Some(parse_error_detail(json_text, &err)),
                }
            }
        };

        let object = value.as_object();
        let missing_fields: Vec<String> = self
            .schema
            .required_fields
            .iter()
            .filter(|field| object.map_or(true, |o| !o.contains_key(field.as_str())))
            .cloned()
            .collect();

        let malformed_fields: Vec<String> = self
            .schema
            .list_fields
            .iter()
            .filter_map(|field| {
                let present = object?.get(field.as_str())?;
                match present.as_array() {
                    Some(items) if !items.is_empty() => None,
                    _ => Some(field.clone()),
                }
            })
            .collect();

        ValidationOutcome {
            valid: missing_fields.is_empty() && malformed_fields.is_empty(),
            missing_fields,
            malformed_fields,
            parse_error: None,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ScriptSchema::default())
    }
}

fn parse_error_detail(text: &str, err: &serde_json::Error) -> ParseErrorDetail {
    let byte_offset = byte_offset_of(text, err.line(), err.column());
    let (offset, context) = match byte_offset {
        Some(at) => {
            let start = floor_boundary(text, at.saturating_sub(CONTEXT_RADIUS));
            let end = floor_boundary(text, (at + CONTEXT_RADIUS).min(text.len()));
            (Some(text[..at].chars().count()), text[start..end].to_string())
        }
        None => (None, String::new()),
    };

    ParseErrorDetail {
        message: err.to_string(),
        line: err.line(),
        column: err.column(),
        offset,
        context,
    }
}

/// serde_json reports 1-based lines and byte columns.
fn byte_offset_of(text: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    Some(floor_boundary(text, (line_start + column.saturating_sub(1)).min(text.len())))
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
