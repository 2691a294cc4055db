//! Core trait implemented by every language analyzer.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, warn};

use super::context::AnalyzerContext;
use super::languages::terraform::InfrastructureDiagram;
use super::model::{
    AnalysisResult, ExtractedConfig, ExtractedDependency, ExtractedEndpoint, ExtractedModel,
    ExtractedSideEffect,
};

/// Maximum length of a recorded per-category error message.
pub const MAX_ERROR_LEN: usize = 200;

/// Language-specific analyzer.
///
/// Implementations are pattern based: they walk the repository held by
/// their [`AnalyzerContext`] and return best-effort facts. Extractors may
/// fail independently; [`LanguageAnalyzer::analyze`] isolates those failures.
///
/// # Thread Safety
///
/// Analyzers are `Send + Sync` so the factory can run them on worker threads.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "go", "rust").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this analyzer handles (without dot).
    fn file_extensions(&self) -> &'static [&'static str];

    /// Repository settings this analyzer was built with.
    fn context(&self) -> &AnalyzerContext;

    fn extract_models(&self) -> anyhow::Result<Vec<ExtractedModel>>;

    fn extract_endpoints(&self) -> anyhow::Result<Vec<ExtractedEndpoint>>;

    fn extract_side_effects(&self) -> anyhow::Result<Vec<ExtractedSideEffect>>;

    fn extract_config(&self) -> anyhow::Result<Vec<ExtractedConfig>>;

    /// Dependencies declared in manifest files. Defaults to none.
    fn extract_dependencies(&self) -> anyhow::Result<Vec<ExtractedDependency>> {
        Ok(Vec::new())
    }

    /// Resource dependency graph, for infrastructure-as-code analyzers.
    fn extract_infrastructure(&self) -> anyhow::Result<Option<InfrastructureDiagram>> {
        Ok(None)
    }

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Run every extraction category and collect the results.
    ///
    /// A failing (or panicking) category is recorded in `errors` as
    /// `"<category>: <message>"` and the remaining categories still run.
    fn analyze(&self) -> AnalysisResult {
        let mut result = AnalysisResult::new(self.language_id());
        let mut errors = Vec::new();

        result.models = isolate("models", &mut errors, || self.extract_models()).unwrap_or_default();
        result.endpoints =
            isolate("endpoints", &mut errors, || self.extract_endpoints()).unwrap_or_default();
        result.side_effects =
            isolate("side_effects", &mut errors, || self.extract_side_effects()).unwrap_or_default();
        result.config = isolate("config", &mut errors, || self.extract_config()).unwrap_or_default();
        result.dependencies =
            isolate("dependencies", &mut errors, || self.extract_dependencies()).unwrap_or_default();
        result.infrastructure =
            isolate("infrastructure", &mut errors, || self.extract_infrastructure()).flatten();

        result.errors = errors;
        debug!(
            language = self.language_id(),
            models = result.models.len(),
            endpoints = result.endpoints.len(),
            side_effects = result.side_effects.len(),
            config = result.config.len(),
            dependencies = result.dependencies.len(),
            errors = result.errors.len(),
            "analyzer finished"
        );
        result
    }
}

/// Run one extractor, converting errors and panics into an error entry.
fn isolate<T, F>(category: &str, errors: &mut Vec<String>, extractor: F) -> Option<T>
where
    F: FnOnce() -> anyhow::Result<T>,
{
    match panic::catch_unwind(AssertUnwindSafe(extractor)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            let entry = format_error(category, &format!("{:#}", e));
            warn!(error = %entry, "extraction failed");
            errors.push(entry);
            None
        }
        Err(payload) => {
            let entry = format_error(category, &panic_message(payload.as_ref()));
            warn!(error = %entry, "extractor panicked");
            errors.push(entry);
            None
        }
    }
}

/// `"<category>: <message>"`, truncated to [`MAX_ERROR_LEN`] characters.
pub fn format_error(category: &str, message: &str) -> String {
    let full = format!("{}: {}", category, message);
    if full.chars().count() <= MAX_ERROR_LEN {
        full
    } else {
        full.chars().take(MAX_ERROR_LEN).collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic during extraction".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::model::ModelType;

    struct Flaky {
        ctx: AnalyzerContext,
    }

    impl LanguageAnalyzer for Flaky {
        fn language_id(&self) -> &'static str {
            "flaky"
        }

        fn file_extensions(&self) -> &'static [&'static str] {
            &["fl"]
        }

        fn context(&self) -> &AnalyzerContext {
            &self.ctx
        }

        fn extract_models(&self) -> anyhow::Result<Vec<ExtractedModel>> {
            Ok(vec![ExtractedModel::new("A", ModelType::Struct, "a.fl", 1)])
        }

        fn extract_endpoints(&self) -> anyhow::Result<Vec<ExtractedEndpoint>> {
            anyhow::bail!("{}", "x".repeat(500))
        }

        fn extract_side_effects(&self) -> anyhow::Result<Vec<ExtractedSideEffect>> {
            panic!("regex table exploded")
        }

        fn extract_config(&self) -> anyhow::Result<Vec<ExtractedConfig>> {
            Ok(vec![ExtractedConfig::new("PORT", "env", "a.fl", 2)])
        }
    }

    #[test]
    fn test_failures_are_isolated() {
        let analyzer = Flaky {
            ctx: AnalyzerContext::new("."),
        };
        let result = analyzer.analyze();

        assert_eq!(result.language, "flaky");
        assert_eq!(result.models.len(), 1);
        assert_eq!(result.config.len(), 1);
        assert!(result.endpoints.is_empty());
        assert!(result.side_effects.is_empty());
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].starts_with("endpoints: "));
        assert_eq!(result.errors[0].chars().count(), MAX_ERROR_LEN);
        assert_eq!(result.errors[1], "side_effects: regex table exploded");
    }

    #[test]
    fn test_handles_extension_case_insensitive() {
        let analyzer = Flaky {
            ctx: AnalyzerContext::new("."),
        };
        assert!(analyzer.handles_extension("FL"));
        assert!(!analyzer.handles_extension("go"));
    }
}
