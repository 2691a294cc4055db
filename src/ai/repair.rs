//! Recovery of JSON from model output.
//!
//! Model responses are often wrapped in code fences or cut off at the output
//! token ceiling. [`parse_json`] tries a direct parse and then one repaired
//! parse; it never fails loudly.

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::{debug, warn};

use crate::analysis::blocks::{find_balanced, Syntax};
use crate::analysis::patterns::Pattern;

static FENCE: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(?P<body>.*?)(?:```|\z)"));

/// `{ "key"` or `, "key"` at the end of the text with no colon after it.
static INCOMPLETE_KEY: Lazy<Pattern> = Lazy::new(|| Pattern::new(r#"[{,]\s*"(?:[^"\\]|\\.)*"\s*\z"#));

static PARTIAL_LITERAL: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"[\[:,]\s*(?P<lit>t|tr|tru|f|fa|fal|fals|n|nu|nul)\z"));

/// Remove a surrounding ```` ```json ```` fence, if any.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.contains("```") {
        return trimmed;
    }
    FENCE
        .captures(trimmed)
        .and_then(|caps| caps.name("body"))
        .map(|body| body.as_str().trim())
        .unwrap_or(trimmed)
}

/// The first JSON array or object in `text`.
///
/// When the region is never closed (truncated output) everything from the
/// opening bracket to the end is returned so that it can be repaired.
pub fn extract_json_array(text: &str) -> Option<&str> {
    json_regions(text).next()
}

/// Candidate JSON regions, one per `[` or `{` in `text`, in order.
///
/// Prose often contains brackets before the payload; callers try each
/// region until one parses.
pub fn json_regions(text: &str) -> impl Iterator<Item = &str> + '_ {
    text.char_indices()
        .filter(|&(_, ch)| matches!(ch, '[' | '{'))
        .map(move |(start, open)| {
            let close = if open == '[' { ']' } else { '}' };
            match find_balanced(text, start, open, close, Syntax::JSON) {
                Some(end) => &text[start..=end],
                None => &text[start..],
            }
        })
}

/// Parse `text` as JSON, repairing truncation once if needed.
pub fn parse_json(text: &str) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(value) => return Some(value),
        Err(e) => debug!(error = %e, "direct JSON parse failed, attempting repair"),
    }
    let repaired = repair_json(text);
    match serde_json::from_str(&repaired) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(error = %e, chars = text.len(), "model output is not valid JSON after repair");
            None
        }
    }
}

/// Close whatever a truncated JSON document left open.
///
/// Steps, in order: close an unterminated string; drop trailing commas and
/// keys without a value; give a dangling `:` a `null` value; complete a
/// cut-off `true`/`false`/`null`; append the missing closing brackets.
pub fn repair_json(text: &str) -> String {
    let mut out = text.trim_end().to_string();

    let state = scan(&out);
    if state.in_string {
        if state.escaped {
            out.pop();
        }
        out.push('"');
    }

    loop {
        let len = out.trim_end().len();
        out.truncate(len);
        if out.ends_with(',') {
            out.pop();
            continue;
        }
        if scan(&out).stack.last() == Some(&'{') {
            let cut = INCOMPLETE_KEY.captures(&out).and_then(|c| c.get(0)).map(|m| m.start());
            if let Some(start) = cut {
                let keep = if out[start..].starts_with('{') { start + 1 } else { start };
                out.truncate(keep);
                continue;
            }
        }
        break;
    }

    if out.ends_with(':') {
        out.push_str(" null");
    }

    let partial = PARTIAL_LITERAL
        .captures(&out)
        .and_then(|caps| caps.name("lit"))
        .map(|lit| (lit.start(), lit.as_str().starts_with('t'), lit.as_str().starts_with('f')));
    if let Some((start, is_true, is_false)) = partial {
        let full = match (is_true, is_false) {
            (true, _) => "true",
            (_, true) => "false",
            _ => "null",
        };
        out.truncate(start);
        out.push_str(full);
    }

    for open in scan(&out).stack.iter().rev() {
        out.push(if *open == '{' { '}' } else { ']' });
    }
    out
}

#[derive(Debug, Default)]
struct ScanState {
    stack: Vec<char>,
    in_string: bool,
    escaped: bool,
}

/// Bracket stack and string state at the end of `text`.
fn scan(text: &str) -> ScanState {
    let mut state = ScanState::default();
    for ch in text.chars() {
        if state.in_string {
            if state.escaped {
                state.escaped = false;
            } else if ch == '\\' {
                state.escaped = true;
            } else if ch == '"' {
                state.in_string = false;
            }
            continue;
        }
        match ch {
            '"' => state.in_string = true,
            '{' | '[' => state.stack.push(ch),
            '}' | ']' => {
                state.stack.pop();
            }
            _ => {}
        }
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("Here you go:\n```\n{\"a\": 1}\n```\nDone."), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```json\n[1, 2"), "[1, 2");
        assert_eq!(strip_code_fences("  [3]  "), "[3]");
    }

    #[test]
    fn test_extract_first_region() {
        assert_eq!(extract_json_array("Result: [1, [2]] trailing"), Some("[1, [2]]"));
        assert_eq!(extract_json_array("x {\"a\": \"]\"} y"), Some("{\"a\": \"]\"}"));
        assert_eq!(extract_json_array("[{\"a\": 1}, {\"b\""), Some("[{\"a\": 1}, {\"b\""));
        assert_eq!(extract_json_array("no json here"), None);
    }

    #[test]
    fn test_regions_follow_each_bracket() {
        let regions: Vec<_> = json_regions("see [notes] then {\"a\": [1]}").collect();
        assert_eq!(regions, vec!["[notes]", "{\"a\": [1]}", "[1]"]);
    }

    #[test]
    fn test_truncated_literal() {
        let value = parse_json(r#"[{"key": "FOO", "required": tru"#).unwrap();
        assert_eq!(value, json!([{"key": "FOO", "required": true}]));
    }

    #[test]
    fn test_unterminated_string() {
        let value = parse_json(r#"[{"name": "User", "description": "A reg"#).unwrap();
        assert_eq!(value, json!([{"name": "User", "description": "A reg"}]));

        let value = parse_json(r#"["a", "b"#).unwrap();
        assert_eq!(value, json!(["a", "b"]));
    }

    #[test]
    fn test_incomplete_trailing_key() {
        let value = parse_json(r#"[{"a": 1, "ke"#).unwrap();
        assert_eq!(value, json!([{"a": 1}]));

        let value = parse_json(r#"[{"a": 1}, {"key""#).unwrap();
        assert_eq!(value, json!([{"a": 1}, {}]));
    }

    #[test]
    fn test_trailing_comma_and_colon() {
        assert_eq!(parse_json("[1, 2,").unwrap(), json!([1, 2]));
        assert_eq!(parse_json(r#"{"a": {"b":"#).unwrap(), json!({"a": {"b": null}}));
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let value = parse_json(r#"[{"q": "say \"hi\""#).unwrap();
        assert_eq!(value, json!([{"q": "say \"hi\""}]));

        let value = parse_json(r#"[{"q": "ends with \"#).unwrap();
        assert_eq!(value, json!([{"q": "ends with "}]));
    }

    #[test]
    fn test_unrepairable_input() {
        assert_eq!(parse_json("not json at all"), None);
        assert_eq!(parse_json(""), None);
    }

    #[test]
    fn test_valid_json_untouched() {
        assert_eq!(repair_json(r#"{"a": [1, 2]}"#), r#"{"a": [1, 2]}"#);
    }
}
