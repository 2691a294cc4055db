//! Language detection and whole-repository analysis.
//!
//! Detection looks for indicator files at the repository root first and
//! falls back to counting source files by extension. [`analyze_repository`]
//! runs one analyzer per detected language in parallel and folds the
//! results in detection order.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info};

use super::context::AnalyzerContext;
use super::languages::{create_analyzer, Language};
use super::model::AnalysisResult;

/// Root-level files that identify a project's primary language, in priority order.
const INDICATORS: &[(&str, Language)] = &[
    ("sfdx-project.json", Language::Apex),
    ("go.mod", Language::Go),
    ("Cargo.toml", Language::Rust),
    ("tsconfig.json", Language::TypeScript),
    ("package.json", Language::JavaScript),
    ("composer.json", Language::Php),
    ("pyproject.toml", Language::Python),
    ("requirements.txt", Language::Python),
    ("setup.py", Language::Python),
    ("main.tf", Language::Terraform),
    ("versions.tf", Language::Terraform),
    ("CMakeLists.txt", Language::Cpp),
];

/// Options for [`analyze_repository`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Base URL of the hosted repository, used for source links.
    pub base_url: Option<String>,
    /// Branch used in source links. Defaults to `main`.
    pub branch: Option<String>,
    /// Languages to analyze; detection is skipped when non-empty.
    pub languages: Vec<Language>,
    pub max_file_size: Option<u64>,
    /// Extra directory names to prune.
    pub excluded_dirs: Vec<String>,
    /// Glob patterns of relative paths to skip.
    pub excluded_paths: Vec<String>,
}

impl AnalyzeOptions {
    /// Build the analyzer context these options describe.
    pub fn context(&self, root: &Path) -> AnalyzerContext {
        let mut ctx = AnalyzerContext::new(root)
            .with_base_url(self.base_url.clone())
            .with_excluded_dirs(self.excluded_dirs.iter().cloned())
            .with_excluded_paths(&self.excluded_paths);
        if let Some(branch) = &self.branch {
            ctx = ctx.with_branch(branch.clone());
        }
        if let Some(max) = self.max_file_size {
            ctx = ctx.with_max_file_size(max);
        }
        ctx
    }
}

/// Primary language of the repository at `root`.
///
/// The first indicator file found wins; otherwise the language with the
/// most source files, ties going to the earlier [`Language`] variant.
pub fn detect_language(root: &Path) -> Option<Language> {
    detect_primary(&AnalyzerContext::new(root))
}

/// Every language present in the repository, in [`Language`] order.
pub fn detect_all_languages(root: &Path) -> Vec<Language> {
    detect_present(&AnalyzerContext::new(root))
}

fn detect_primary(ctx: &AnalyzerContext) -> Option<Language> {
    if let Some((name, language)) = INDICATORS.iter().find(|(name, _)| ctx.root().join(name).is_file()) {
        debug!(indicator = name, language = %language, "language detected from indicator");
        return Some(*language);
    }

    let counts = count_by_language(ctx);
    // Strictly greater keeps the earliest variant on ties.
    let mut best: Option<(Language, usize)> = None;
    for (language, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((language, count));
        }
    }
    best.map(|(language, _)| language)
}

fn detect_present(ctx: &AnalyzerContext) -> Vec<Language> {
    let mut present: BTreeSet<Language> = INDICATORS
        .iter()
        .filter(|(name, _)| ctx.root().join(name).is_file())
        .map(|(_, language)| *language)
        .collect();
    present.extend(count_by_language(ctx).into_keys());
    present.into_iter().collect()
}

fn count_by_language(ctx: &AnalyzerContext) -> BTreeMap<Language, usize> {
    let mut counts = BTreeMap::new();
    let files = ctx.find_files_matching(|path| {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Language::from_extension)
            .is_some()
    });
    for path in files {
        if let Some(language) = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Language::from_extension)
        {
            *counts.entry(language).or_insert(0) += 1;
        }
    }
    counts
}

/// TypeScript and JavaScript share one analyzer; TypeScript wins.
fn share_script_analyzer(mut languages: Vec<Language>) -> Vec<Language> {
    if languages.contains(&Language::TypeScript) {
        languages.retain(|l| *l != Language::JavaScript);
    }
    languages
}

/// Analyze every language in the repository and merge the results.
///
/// Never fails: a missing root or a repository with no analyzable language
/// yields a result whose `errors` explain why.
pub fn analyze_repository(root: &Path, options: &AnalyzeOptions) -> AnalysisResult {
    if !root.exists() {
        return AnalysisResult::failed(
            "unknown",
            format!("repository path does not exist: {}", root.display()),
        );
    }

    let ctx = options.context(root);
    let languages = if options.languages.is_empty() {
        detect_present(&ctx)
    } else {
        let mut requested = options.languages.clone();
        requested.dedup();
        requested
    };
    let languages = share_script_analyzer(languages);

    let analyzers: Vec<_> = languages
        .iter()
        .filter_map(|language| create_analyzer(*language, ctx.clone()))
        .collect();
    if analyzers.is_empty() {
        return AnalysisResult::failed("unknown", "no analyzer available for repository");
    }

    info!(
        root = %root.display(),
        languages = ?languages.iter().map(Language::as_str).collect::<Vec<_>>(),
        "analyzing repository"
    );

    // The indexed parallel iterator keeps results in detection order.
    let results: Vec<AnalysisResult> = analyzers.par_iter().map(|analyzer| analyzer.analyze()).collect();

    let mut merged = results
        .into_iter()
        .reduce(AnalysisResult::merge)
        .unwrap_or_else(|| AnalysisResult::new("unknown"));
    if merged.language.is_empty() {
        merged.language = "unknown".to_string();
    }

    let summary = merged.summary();
    info!(
        language = %merged.language,
        models = summary.models,
        endpoints = summary.endpoints,
        side_effects = summary.side_effects,
        config = summary.config,
        dependencies = summary.dependencies,
        errors = summary.errors,
        "analysis complete"
    );
    merged
}
