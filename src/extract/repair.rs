//! Heuristic repairs for JSON written by a language model.
//!
//! This is a fixed, bounded set of passes, not a relaxed-JSON grammar:
//! invisible characters, curly and single quotes used as string delimiters,
//! trailing commas, and colon spacing. Every pass leaves the contents of
//! double-quoted strings alone, and `repair(repair(x)) == repair(x)`.
//! Anything these passes cannot fix is left for the validator to report.

use regex::Regex;
use std::sync::OnceLock;

const INVISIBLE: &[char] = &['\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{FEFF}'];

pub fn repair(text: &str) -> String {
    let text = strip_invisible(text);
    let text = normalize_quotes(&text);
    let text = map_code(&text, remove_trailing_commas);
    map_code(&text, normalize_colons)
}

pub fn strip_invisible(text: &str) -> String {
    text.chars()
        .filter(|c| !INVISIBLE.contains(c))
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect()
}

/// Rewrite every string literal to use `"` delimiters. Strings opened with a
/// single or curly quote are re-escaped; ordinary double-quoted strings are
/// copied verbatim.
pub fn normalize_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                out.push('"');
                copy_double_quoted(&mut chars, &mut out, &['"']);
            }
            '\u{201C}' | '\u{201D}' => {
                out.push('"');
                copy_double_quoted(&mut chars, &mut out, &['"', '\u{201D}']);
            }
            '\'' | '\u{2018}' | '\u{2019}' => {
                out.push('"');
                copy_single_quoted(&mut chars, &mut out);
            }
            _ => out.push(c),
        }
    }
    out
}

fn copy_double_quoted(chars: &mut std::str::Chars<'_>, out: &mut String, closers: &[char]) {
    let mut escaped = false;
    for c in chars.by_ref() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            out.push(c);
            escaped = true;
        } else if closers.contains(&c) {
            out.push('"');
            return;
        } else {
            out.push(c);
        }
    }
}

fn copy_single_quoted(chars: &mut std::str::Chars<'_>, out: &mut String) {
    let mut escaped = false;
    for c in chars.by_ref() {
        if escaped {
            // \' has no meaning in JSON, the quote alone is enough.
            if c != '\'' {
                out.push('\\');
            }
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '\'' || c == '\u{2019}' {
            out.push('"');
            return;
        } else if c == '"' {
            out.push_str("\\\"");
        } else {
            out.push(c);
        }
    }
}

fn remove_trailing_commas(code: &str) -> String {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    let re = TRAILING.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("valid regex"));
    re.replace_all(code, "$1").into_owned()
}

fn normalize_colons(code: &str) -> String {
    static COLON: OnceLock<Regex> = OnceLock::new();
    let re = COLON.get_or_init(|| Regex::new(r"\s*:(\s*)").expect("valid regex"));
    re.replace_all(code, |caps: &regex::Captures<'_>| {
        if caps[1].is_empty() {
            ":".to_string()
        } else {
            ": ".to_string()
        }
    })
    .into_owned()
}

/// Apply `f` to the parts of `text` outside double-quoted string literals.
fn map_code(text: &str, f: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut code_start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                out.push_str(&text[code_start..=i]);
                code_start = i + 1;
            }
        } else if c == '"' {
            out.push_str(&f(&text[code_start..i]));
            in_string = true;
            code_start = i;
        }
    }

    if in_string {
        out.push_str(&text[code_start..]);
    } else {
        out.push_str(&f(&text[code_start..]));
    }
    out
}
