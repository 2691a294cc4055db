//! Pattern-based code analysis module.
//!
//! This module extracts language-agnostic facts from source trees. Facts
//! include:
//! - Data models (structs, classes, interfaces, schemas)
//! - API endpoints (HTTP routes, RPC handlers, dialplan apps, listeners)
//! - Side effects (database, HTTP, queue, cache, file, cloud calls)
//! - Configuration keys and declared dependencies
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌────────────────┐
//! │ Repository root │────▶│ Factory      │────▶│ Analyzers      │
//! └─────────────────┘     │ (detection)  │     │ (per language) │
//!                         └──────────────┘     └────────────────┘
//!                                                      │
//!                                                      ▼
//!                                              ┌────────────────┐
//!                                              │ AnalysisResult │
//!                                              │ (merged facts) │
//!                                              └────────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/` (e.g., `kotlin.rs`)
//! 2. Implement the `LanguageAnalyzer` trait
//! 3. Add a `register()` function and call it from `register_all`
//! 4. Add the variant and its extensions to `Language`
//!
//! See `languages/go.rs` for a reference implementation.

pub mod ast;
pub mod blocks;
mod context;
pub mod factory;
pub mod languages;
pub mod manifest;
pub mod model;
pub mod patterns;
mod traits;

pub use context::{
    is_test_file, AnalyzerContext, SourceFile, DEFAULT_BRANCH, DEFAULT_EXCLUDED_DIRS,
    DEFAULT_MAX_FILE_SIZE,
};
pub use factory::{analyze_repository, detect_all_languages, detect_language, AnalyzeOptions};
pub use languages::terraform::{InfrastructureDiagram, TerraformResource};
pub use languages::{create_analyzer, register_all, registered_languages, Language};
pub use model::{
    AnalysisResult, AnalysisSummary, ExtractedConfig, ExtractedDependency, ExtractedEndpoint,
    ExtractedField, ExtractedModel, ExtractedSideEffect, ModelType, SideEffectCategory,
};
pub use traits::{format_error, LanguageAnalyzer, MAX_ERROR_LEN};
