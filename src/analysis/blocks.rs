//! Balanced-block helpers shared by every pattern-based analyzer.
//!
//! Single-pass regexes cannot capture nested bodies, so analyzers find a
//! declaration header with a regex and then isolate its body here. Scanning
//! skips string literals and comments so that braces inside them do not
//! affect nesting depth.

use std::ops::Range;

/// Lexical conventions needed to skip strings and comments while scanning.
#[derive(Debug, Clone, Copy)]
pub struct Syntax {
    /// Characters that open and close a string literal.
    pub quotes: &'static [char],
    /// Line comment introducers.
    pub line_comments: &'static [&'static str],
    /// Block comment delimiters.
    pub block_comment: Option<(&'static str, &'static str)>,
}

impl Syntax {
    /// C, C++, Go, Java-like, JavaScript/TypeScript, Apex, ActionScript, PHP.
    pub const C_LIKE: Syntax = Syntax {
        quotes: &['"', '\'', '`'],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
    };

    /// Rust: single quotes are lifetimes or chars, so only `"` opens a string.
    pub const RUST: Syntax = Syntax {
        quotes: &['"'],
        line_comments: &["//"],
        block_comment: Some(("/*", "*/")),
    };

    /// Python and shell scripts.
    pub const HASH: Syntax = Syntax {
        quotes: &['"', '\''],
        line_comments: &["#"],
        block_comment: None,
    };

    /// Terraform / HCL.
    pub const HCL: Syntax = Syntax {
        quotes: &['"'],
        line_comments: &["#", "//"],
        block_comment: Some(("/*", "*/")),
    };

    pub const LUA: Syntax = Syntax {
        quotes: &['"', '\''],
        line_comments: &["--"],
        block_comment: None,
    };

    pub const JSON: Syntax = Syntax {
        quotes: &['"'],
        line_comments: &[],
        block_comment: None,
    };

    /// PHP also accepts `#` line comments.
    pub const PHP: Syntax = Syntax {
        quotes: &['"', '\''],
        line_comments: &["//", "#"],
        block_comment: Some(("/*", "*/")),
    };
}

/// Return the byte index of the delimiter closing the one at `open_idx`.
///
/// `text[open_idx]` must be `open`. Returns `None` when the block is never
/// closed.
pub fn find_balanced(text: &str, open_idx: usize, open: char, close: char, syntax: Syntax) -> Option<usize> {
    let bytes = text.as_bytes();
    if text.get(open_idx..)?.chars().next()? != open {
        return None;
    }

    let mut depth = 0usize;
    let mut i = open_idx;
    while i < bytes.len() {
        let rest = &text[i..];

        if let Some((start, end)) = syntax.block_comment {
            if rest.starts_with(start) {
                match rest[start.len()..].find(end) {
                    Some(pos) => {
                        i += start.len() + pos + end.len();
                        continue;
                    }
                    None => return None,
                }
            }
        }

        if syntax.line_comments.iter().any(|c| rest.starts_with(c)) {
            match rest.find('\n') {
                Some(pos) => {
                    i += pos + 1;
                    continue;
                }
                None => return None,
            }
        }

        let ch = match rest.chars().next() {
            Some(c) => c,
            None => break,
        };

        if syntax.quotes.contains(&ch) {
            i = skip_string(text, i, ch)?;
            continue;
        }

        if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
        i += ch.len_utf8();
    }
    None
}

/// Skip a string literal starting at `start` (which holds `quote`); returns
/// the index just past the closing quote.
pub fn skip_string(text: &str, start: usize, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (offset, ch) in text[start + quote.len_utf8()..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
            continue;
        }
        if ch == quote {
            return Some(start + quote.len_utf8() + offset + ch.len_utf8());
        }
        // Only backtick strings span lines in the languages we scan.
        if ch == '\n' && quote != '`' && quote != '"' {
            return Some(start + quote.len_utf8() + offset);
        }
    }
    None
}

/// Locate the first `{ ... }` block at or after `from`.
///
/// Returns the byte range of the body, excluding the braces.
pub fn find_brace_block(text: &str, from: usize, syntax: Syntax) -> Option<Range<usize>> {
    let open_idx = from + text.get(from..)?.find('{')?;
    let close_idx = find_balanced(text, open_idx, '{', '}', syntax)?;
    Some(open_idx + 1..close_idx)
}

/// Convenience wrapper over [`find_brace_block`] returning the body text.
pub fn brace_body(text: &str, from: usize, syntax: Syntax) -> Option<&str> {
    find_brace_block(text, from, syntax).map(|r| &text[r])
}

/// Body of the delimited region opening at `open_idx` (`(`, `[` or `{`).
pub fn delimited_body(text: &str, open_idx: usize, syntax: Syntax) -> Option<&str> {
    let open = text.get(open_idx..)?.chars().next()?;
    let close = match open {
        '(' => ')',
        '[' => ']',
        '{' => '}',
        '<' => '>',
        _ => return None,
    };
    let close_idx = find_balanced(text, open_idx, open, close, syntax)?;
    Some(&text[open_idx + open.len_utf8()..close_idx])
}

/// Split `text` on `sep` occurring at nesting depth zero.
pub fn split_top_level(text: &str, sep: char, syntax: Syntax) -> Vec<String> {
    split_nested(text, sep, syntax, false)
}

/// Like [`split_top_level`] but also treats `<...>` as nesting, for generic
/// type lists such as `HashMap<String, u32>, bool`.
pub fn split_top_level_generic(text: &str, sep: char, syntax: Syntax) -> Vec<String> {
    split_nested(text, sep, syntax, true)
}

fn split_nested(text: &str, sep: char, syntax: Syntax, angle: bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut current = String::new();
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if syntax.quotes.contains(&ch) {
            let end = skip_string(text, idx, ch).unwrap_or(text.len());
            current.push_str(&text[idx..end]);
            while let Some(&(next, _)) = chars.peek() {
                if next >= end {
                    break;
                }
                chars.next();
            }
            continue;
        }
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '<' if angle => depth += 1,
            '>' if angle && !current.ends_with('-') && !current.ends_with('=') => depth -= 1,
            _ => {}
        }
        if ch == sep && depth == 0 {
            let part = current.trim().to_string();
            if !part.is_empty() {
                parts.push(part);
            }
            current.clear();
        } else {
            current.push(ch);
        }
    }
    let part = current.trim().to_string();
    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

/// Net bracket depth change (`{[(` minus `}])`) across one line, ignoring
/// strings and comments.
pub fn line_depth_delta(line: &str, syntax: Syntax) -> i32 {
    let mut delta = 0;
    let mut i = 0;
    while i < line.len() {
        let rest = &line[i..];
        if syntax.line_comments.iter().any(|c| rest.starts_with(c)) {
            break;
        }
        if let Some((start, end)) = syntax.block_comment {
            if rest.starts_with(start) {
                match rest[start.len()..].find(end) {
                    Some(pos) => {
                        i += start.len() + pos + end.len();
                        continue;
                    }
                    None => break,
                }
            }
        }
        let Some(ch) = rest.chars().next() else { break };
        if syntax.quotes.contains(&ch) {
            match skip_string(line, i, ch) {
                Some(next) => {
                    i = next;
                    continue;
                }
                None => break,
            }
        }
        match ch {
            '{' | '[' | '(' => delta += 1,
            '}' | ']' | ')' => delta -= 1,
            _ => {}
        }
        i += ch.len_utf8();
    }
    delta
}

/// Comment block immediately above the 1-indexed `decl_line`, with the
/// comment markers stripped and lines joined by spaces.
pub fn doc_comment(lines: &[&str], decl_line: usize, markers: &[&str]) -> Option<String> {
    let mut collected = Vec::new();
    let mut idx = decl_line.checked_sub(1)?;
    while idx > 0 {
        idx -= 1;
        let line = lines.get(idx)?.trim();
        let Some(marker) = markers.iter().find(|m| line.starts_with(**m)) else {
            break;
        };
        let text = line[marker.len()..].trim().trim_end_matches("*/").trim();
        if !text.is_empty() {
            collected.push(text.to_string());
        }
    }
    if collected.is_empty() {
        return None;
    }
    collected.reverse();
    Some(collected.join(" "))
}

/// Number of leading whitespace columns (tabs count as 4).
pub fn indentation(line: &str) -> usize {
    line.chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

/// Line range (0-indexed, exclusive end) of the indented body following `header`.
///
/// The body is every following line indented deeper than the header; blank
/// lines inside the body are included, trailing blank lines are not.
pub fn find_indented_block(lines: &[&str], header: usize) -> Range<usize> {
    let start = header + 1;
    let Some(header_line) = lines.get(header) else {
        return start..start;
    };
    let base = indentation(header_line);

    let mut end = start;
    for (idx, line) in lines.iter().enumerate().skip(start) {
        if line.trim().is_empty() {
            continue;
        }
        if indentation(line) <= base {
            break;
        }
        end = idx + 1;
    }
    start..end
}

/// Maps byte offsets to 1-indexed line numbers.
pub struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        Self {
            newlines: text
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i)
                .collect(),
        }
    }

    /// 1-indexed line containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        match self.newlines.binary_search(&offset) {
            Ok(idx) | Err(idx) => idx + 1,
        }
    }
}

/// 1-indexed line containing `offset` (one-shot; use [`LineIndex`] in loops).
pub fn line_number_at(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    text.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

/// Strip a matching pair of surrounding quotes.
pub fn unquote(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\'', '`'] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_braces() {
        let src = "type A struct { B struct { C int } }\nrest";
        let body = brace_body(src, 0, Syntax::C_LIKE).unwrap();
        assert_eq!(body, " B struct { C int } ");
    }

    #[test]
    fn test_braces_in_strings_and_comments_ignored() {
        let src = r#"fn x() { let s = "}"; // }
 /* { */ let c = 1; }"#;
        let body = brace_body(src, 0, Syntax::RUST).unwrap();
        assert!(body.ends_with("let c = 1; "));
    }

    #[test]
    fn test_rust_lifetimes_do_not_open_strings() {
        let src = "struct A<'a> { s: &'a str }";
        let body = brace_body(src, 0, Syntax::RUST).unwrap();
        assert_eq!(body.trim(), "s: &'a str");
    }

    #[test]
    fn test_unclosed_block() {
        assert!(brace_body("func x() { if y {", 0, Syntax::C_LIKE).is_none());
    }

    #[test]
    fn test_delimited_body() {
        let src = "array('a' => array(1, 2), 'b' => 3)";
        let open = src.find('(').unwrap();
        assert_eq!(
            delimited_body(src, open, Syntax::PHP).unwrap(),
            "'a' => array(1, 2), 'b' => 3"
        );
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level("a, f(b, c), \"d,e\", [x, y]", ',', Syntax::C_LIKE);
        assert_eq!(parts, vec!["a", "f(b, c)", "\"d,e\"", "[x, y]"]);
    }

    #[test]
    fn test_split_generic_and_php_arrows() {
        let parts = split_top_level_generic("m: HashMap<String, u32>, ok: bool", ',', Syntax::RUST);
        assert_eq!(parts, vec!["m: HashMap<String, u32>", "ok: bool"]);

        let parts = split_top_level("'a' => 1, 'b' => 2", ',', Syntax::PHP);
        assert_eq!(parts, vec!["'a' => 1", "'b' => 2"]);
    }

    #[test]
    fn test_indented_block() {
        let src = "class A:\n    x: int\n\n    def f(self):\n        pass\nclass B:\n    y: str\n";
        let lines: Vec<&str> = src.lines().collect();
        let body = find_indented_block(&lines, 0);
        assert_eq!(body, 1..5);
        let body_b = find_indented_block(&lines, 5);
        assert_eq!(body_b, 6..7);
    }

    #[test]
    fn test_line_index() {
        let src = "a\nb\nc";
        let idx = LineIndex::new(src);
        assert_eq!(idx.line_of(0), 1);
        assert_eq!(idx.line_of(2), 2);
        assert_eq!(idx.line_of(4), 3);
        assert_eq!(line_number_at(src, 4), 3);
    }

    #[test]
    fn test_line_depth_delta() {
        assert_eq!(line_depth_delta("tags = {", Syntax::HCL), 1);
        assert_eq!(line_depth_delta("name = \"${x}\" # }", Syntax::HCL), 0);
        assert_eq!(line_depth_delta("Port int `json:\"{\"`", Syntax::C_LIKE), 0);
        assert_eq!(line_depth_delta("}) // {", Syntax::C_LIKE), -2);
    }

    #[test]
    fn test_doc_comment() {
        let src = "package a\n\n// Config holds settings.\n// Loaded at startup.\ntype Config struct {}\n";
        let lines: Vec<&str> = src.lines().collect();
        assert_eq!(
            doc_comment(&lines, 5, &["//"]).as_deref(),
            Some("Config holds settings. Loaded at startup.")
        );
        assert_eq!(doc_comment(&lines, 1, &["//"]), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"x\""), "x");
        assert_eq!(unquote("'y'"), "y");
        assert_eq!(unquote("z"), "z");
    }
}
