//! Candidate file selection for model-assisted extraction.

use std::fmt;

use crate::analysis::{is_test_file, AnalyzerContext, SourceFile};

/// Source extensions considered by the model-assisted analyzer.
///
/// Wider than the pattern analyzers: languages without a dedicated
/// analyzer are exactly where the model helps.
pub const SOURCE_EXTENSIONS: &[&str] = &[
    "go", "php", "ts", "tsx", "js", "jsx", "mjs", "py", "cls", "trigger", "lua", "rs", "c", "h",
    "cc", "cpp", "hpp", "sh", "as", "tf", "java", "kt", "scala", "swift", "rb", "cs", "ex", "exs",
    "erl", "clj", "dart",
];

/// Directories searched when no file name matches a category's keywords.
const FALLBACK_COMPONENTS: &[&str] = &["src", "lambda", "lib", "app"];

/// Extraction category, each with its own prompt and candidate files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Endpoints,
    Models,
    Config,
    SideEffects,
}

impl Category {
    pub const ALL: &'static [Category] = &[
        Category::Endpoints,
        Category::Models,
        Category::Config,
        Category::SideEffects,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Endpoints => "endpoints",
            Category::Models => "models",
            Category::Config => "config",
            Category::SideEffects => "side_effects",
        }
    }

    /// Path fragments that suggest a file belongs to this category.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Category::Endpoints => &["controller", "handler", "route", "router", "api", "view", "resource"],
            Category::Models => &["model", "schema", "entity", "dto", "type", "struct"],
            Category::Config => &["config", "settings", "env", "constants"],
            Category::SideEffects => &["service", "repository", "client", "dao", "gateway", "db", "store"],
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Files worth sending to the model for `category`, at most `max_files`.
///
/// Keyword matches on the relative path come first. Without any, files
/// under a conventional source directory are used, then any source file.
pub fn select_candidates(
    files: &[SourceFile],
    category: Category,
    max_files: usize,
) -> Vec<SourceFile> {
    let eligible: Vec<&SourceFile> = files.iter().filter(|f| !is_test_file(&f.rel)).collect();

    let keywords = category.keywords();
    let mut chosen: Vec<&SourceFile> = eligible
        .iter()
        .copied()
        .filter(|f| {
            let rel = f.rel.to_ascii_lowercase();
            keywords.iter().any(|k| rel.contains(k))
        })
        .collect();

    if chosen.is_empty() {
        chosen = eligible
            .iter()
            .copied()
            .filter(|f| f.rel.split('/').any(|c| FALLBACK_COMPONENTS.contains(&c)))
            .collect();
    }
    if chosen.is_empty() {
        chosen = eligible;
    }

    chosen.into_iter().take(max_files).cloned().collect()
}

/// Every candidate source file in the repository.
pub fn source_files(ctx: &AnalyzerContext) -> Vec<SourceFile> {
    ctx.source_files(SOURCE_EXTENSIONS)
}
