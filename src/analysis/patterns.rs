//! Regex rule tables and the scanning loops shared by analyzers.
//!
//! Analyzers declare static tables of `(pattern, label)` rules compiled once
//! through `once_cell::sync::Lazy`. Named capture groups carry the values:
//! `target` for side effects, `key`/`default` for config, `method`/`path`/
//! `handler` for routes.

use std::borrow::Cow;
use std::collections::HashSet;

use regex::{Captures, Regex};
use tracing::error;

use super::blocks::LineIndex;
use super::context::{AnalyzerContext, SourceFile};
use super::model::{ExtractedConfig, ExtractedSideEffect, SideEffectCategory};

/// Upper bound on files inspected per category.
pub const MAX_FILES_PER_CATEGORY: usize = 500;
/// Upper bound on methods recorded for a single model.
pub const MAX_METHODS: usize = 20;
/// Upper bound on fields recorded for a single model.
pub const MAX_FIELDS: usize = 50;

/// Compile a pattern, logging instead of panicking on a bad literal.
pub fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            error!(pattern = %pattern, error = %e, "invalid pattern");
            None
        }
    }
}

/// A regex compiled from a literal; an invalid literal is logged once and
/// then behaves as a pattern that never matches.
#[derive(Debug)]
pub struct Pattern(Option<Regex>);

impl Pattern {
    pub fn new(pattern: &str) -> Self {
        Self(compile(pattern))
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.as_ref().map(|re| re.is_match(haystack)).unwrap_or(false)
    }

    pub fn captures<'h>(&self, haystack: &'h str) -> Option<Captures<'h>> {
        self.0.as_ref()?.captures(haystack)
    }

    pub fn captures_iter<'a, 'h: 'a>(
        &'a self,
        haystack: &'h str,
    ) -> impl Iterator<Item = Captures<'h>> + 'a {
        self.0.iter().flat_map(move |re| re.captures_iter(haystack))
    }

    pub fn find_iter<'a, 'h: 'a>(
        &'a self,
        haystack: &'h str,
    ) -> impl Iterator<Item = regex::Match<'h>> + 'a {
        self.0.iter().flat_map(move |re| re.find_iter(haystack))
    }

    pub fn replace_all<'h>(&self, haystack: &'h str, replacement: &str) -> Cow<'h, str> {
        match &self.0 {
            Some(re) => re.replace_all(haystack, replacement),
            None => Cow::Borrowed(haystack),
        }
    }
}

/// A side-effect rule: matches of `regex` produce `(category, operation)`.
///
/// An `op` capture overrides the operation label and a `target` capture
/// names the resource; `target` falls back to the rule's fixed target.
pub struct SideEffectRule {
    pub regex: Regex,
    pub category: SideEffectCategory,
    pub operation: &'static str,
    pub target: Option<&'static str>,
}

/// Build a side-effect table from `(pattern, category, operation, target)`
/// specs; an empty target means none.
pub fn side_effect_rules(
    specs: &[(&str, SideEffectCategory, &'static str, &'static str)],
) -> Vec<SideEffectRule> {
    specs
        .iter()
        .filter_map(|(pattern, category, operation, target)| {
            compile(pattern).map(|regex| SideEffectRule {
                regex,
                category: *category,
                operation,
                target: (!target.is_empty()).then_some(*target),
            })
        })
        .collect()
}

/// A config rule: `key` capture is required, `default` optional.
pub struct ConfigRule {
    pub regex: Regex,
    pub source: &'static str,
}

pub fn config_rules(specs: &[(&str, &'static str)]) -> Vec<ConfigRule> {
    specs
        .iter()
        .filter_map(|(pattern, source)| compile(pattern).map(|regex| ConfigRule { regex, source }))
        .collect()
}

/// Per-file seen-set implementing the canonical dedup keys: side effects by
/// `(category, operation, target)`, config by key.
#[derive(Debug, Default)]
pub struct Dedup {
    side_effects: HashSet<(SideEffectCategory, String, Option<String>)>,
    config: HashSet<String>,
}

impl Dedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time a side-effect key is seen.
    pub fn side_effect(&mut self, effect: &ExtractedSideEffect) -> bool {
        self.side_effects.insert((
            effect.category,
            effect.operation.clone(),
            effect.target.clone(),
        ))
    }

    /// Returns true the first time a config key is seen.
    pub fn config(&mut self, key: &str) -> bool {
        self.config.insert(key.to_string())
    }
}

/// Text of a named capture, trimmed; empty captures count as absent.
pub fn capture(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// `PutItem` → `put_item`; already snake-cased labels pass through.
pub fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for ch in s.chars() {
        if ch.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            out.push(if ch == '-' || ch == ' ' { '_' } else { ch });
        }
    }
    out
}

/// Apply a side-effect table to one file, deduplicating within the file.
pub fn scan_side_effects(
    ctx: &AnalyzerContext,
    file: &SourceFile,
    rules: &[SideEffectRule],
    dedup: &mut Dedup,
    out: &mut Vec<ExtractedSideEffect>,
) {
    let index = LineIndex::new(&file.content);
    for rule in rules {
        for caps in rule.regex.captures_iter(&file.content) {
            let Some(whole) = caps.get(0) else { continue };
            let line = index.line_of(whole.start());
            let target = capture(&caps, "target").or_else(|| rule.target.map(String::from));
            let operation = capture(&caps, "op")
                .map(|op| snake_case(&op))
                .unwrap_or_else(|| rule.operation.to_string());
            let mut effect =
                ExtractedSideEffect::new(rule.category, operation, target, &file.rel, line);
            if !dedup.side_effect(&effect) {
                continue;
            }
            effect.source_link = ctx.source_link(&file.rel, Some(line));
            out.push(effect);
        }
    }
}

/// Apply a config table to one file, deduplicating keys within the file.
///
/// A config entry is required when no default was captured.
pub fn scan_config(
    ctx: &AnalyzerContext,
    file: &SourceFile,
    rules: &[ConfigRule],
    dedup: &mut Dedup,
    out: &mut Vec<ExtractedConfig>,
) {
    let index = LineIndex::new(&file.content);
    for rule in rules {
        for caps in rule.regex.captures_iter(&file.content) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(key) = capture(&caps, "key") else { continue };
            if !dedup.config(&key) {
                continue;
            }
            let line = index.line_of(whole.start());
            let default = capture(&caps, "default").map(|d| super::blocks::unquote(&d).to_string());
            let mut cfg = ExtractedConfig::new(key, rule.source, &file.rel, line);
            cfg.required = default.is_none();
            cfg.default = default;
            cfg.source_link = ctx.source_link(&file.rel, Some(line));
            out.push(cfg);
        }
    }
}
