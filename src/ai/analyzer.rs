//! Model-assisted analyzer.
//!
//! Produces the same [`AnalysisResult`] as the pattern analyzers, but asks a
//! language model to read batches of candidate files. Each category is
//! extracted independently; a failed batch contributes nothing and never
//! aborts the run.

use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::client::LlmClient;
use super::prompts::{instructions, item_schema, render_files, SYSTEM_PROMPT};
use super::select::{select_candidates, source_files, Category};
use super::structured::{Prompt, StructuredGenerator, DEFAULT_MAX_TOKENS};
use crate::analysis::manifest::{collect_dependencies, ManifestKind};
use crate::analysis::{
    AnalysisResult, AnalyzerContext, ExtractedConfig, ExtractedEndpoint, ExtractedField,
    ExtractedModel, ExtractedSideEffect, ModelType, SideEffectCategory, SourceFile,
};

/// Limits for model-assisted extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiOptions {
    /// Candidate files per category.
    pub max_files: usize,
    /// Files per model call.
    pub batch_size: usize,
    /// Characters of each file included in a prompt.
    pub max_file_chars: usize,
    pub max_tokens: u32,
    pub call_timeout: Duration,
    /// Model calls in flight at once.
    pub concurrency: usize,
}

impl Default for AiOptions {
    fn default() -> Self {
        Self {
            max_files: 40,
            batch_size: 5,
            max_file_chars: 12_000,
            max_tokens: DEFAULT_MAX_TOKENS,
            call_timeout: Duration::from_secs(120),
            concurrency: 1,
        }
    }
}

/// Analyzer that delegates reading source files to a language model.
pub struct AiAnalyzer<C> {
    ctx: AnalyzerContext,
    language: String,
    generator: StructuredGenerator<C>,
    options: AiOptions,
}

impl<C: LlmClient> AiAnalyzer<C> {
    pub fn new(ctx: AnalyzerContext, language: impl Into<String>, client: C, options: AiOptions) -> Self {
        let generator = StructuredGenerator::new(client, options.call_timeout);
        Self {
            ctx,
            language: language.into(),
            generator,
            options,
        }
    }

    /// Language tag reported on results, `ai:<language>`.
    pub fn language_id(&self) -> String {
        format!("ai:{}", self.language)
    }

    pub async fn analyze(&self) -> AnalysisResult {
        let mut result = AnalysisResult::new(&self.language_id());
        let files = source_files(&self.ctx);
        info!(language = %self.language, files = files.len(), "starting model-assisted analysis");

        for category in Category::ALL {
            let batches = self.extract(*category, &files).await;
            for (default_file, items) in batches {
                for item in &items {
                    self.convert(*category, item, &default_file, &mut result);
                }
            }
        }
        result.dependencies = collect_dependencies(&self.ctx, ManifestKind::ALL);

        let summary = result.summary();
        info!(
            language = %result.language,
            models = summary.models,
            endpoints = summary.endpoints,
            side_effects = summary.side_effects,
            config = summary.config,
            "model-assisted analysis complete"
        );
        result
    }

    /// Items per batch, with the batch's first file as the fallback location.
    async fn extract(&self, category: Category, files: &[SourceFile]) -> Vec<(String, Vec<Map<String, Value>>)> {
        let candidates = select_candidates(files, category, self.options.max_files);
        if candidates.is_empty() {
            debug!(category = %category, "no candidate files");
            return Vec::new();
        }
        let schema = item_schema(category);

        stream::iter(candidates.chunks(self.options.batch_size.max(1)))
            .map(|batch| self.run_batch(category, batch, &schema))
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await
    }

    async fn run_batch(
        &self,
        category: Category,
        batch: &[SourceFile],
        schema: &Value,
    ) -> (String, Vec<Map<String, Value>>) {
        let default_file = batch.first().map(|f| f.rel.clone()).unwrap_or_default();
        let body = render_files(
            batch.iter().map(|f| (f.rel.as_str(), f.content.as_str())),
            self.options.max_file_chars,
        );
        let prompt = Prompt::new(
            SYSTEM_PROMPT,
            format!("{}\n\n{}", instructions(category, &self.language), body),
        )
        .with_max_tokens(self.options.max_tokens);

        let items = self.generator.generate_structured(&prompt, schema).await;
        debug!(category = %category, files = batch.len(), items = items.len(), "batch complete");
        (default_file, items)
    }

    fn convert(&self, category: Category, item: &Map<String, Value>, default_file: &str, out: &mut AnalysisResult) {
        match category {
            Category::Endpoints => {
                if let Some(mut endpoint) = endpoint_from_item(item, default_file) {
                    endpoint.source_link = self.ctx.source_link(&endpoint.file, Some(endpoint.line));
                    out.endpoints.push(endpoint);
                }
            }
            Category::Models => {
                if let Some(mut model) = model_from_item(item, default_file) {
                    model.source_link = self.ctx.source_link(&model.file, Some(model.line));
                    out.models.push(model);
                }
            }
            Category::Config => {
                if let Some(mut config) = config_from_item(item, default_file) {
                    config.source_link = self.ctx.source_link(&config.file, Some(config.line));
                    out.config.push(config);
                }
            }
            Category::SideEffects => {
                if let Some(mut effect) = side_effect_from_item(item, default_file) {
                    effect.source_link = self.ctx.source_link(&effect.file, Some(effect.line));
                    out.side_effects.push(effect);
                }
            }
        }
    }
}

fn text(item: &Map<String, Value>, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn line(item: &Map<String, Value>) -> usize {
    match item.get("line") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn flag(item: &Map<String, Value>, key: &str) -> Option<bool> {
    match item.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn strings(item: &Map<String, Value>, key: &str) -> Vec<String> {
    match item.get(key) {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Object(o) => text(o, "name"),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn file(item: &Map<String, Value>, default_file: &str) -> String {
    text(item, "file")
        .map(|f| f.trim_start_matches("./").to_string())
        .unwrap_or_else(|| default_file.to_string())
}

pub(crate) fn endpoint_from_item(item: &Map<String, Value>, default_file: &str) -> Option<ExtractedEndpoint> {
    let path = text(item, "path")?;
    let method = text(item, "method").map(|m| m.to_ascii_uppercase()).unwrap_or_else(|| "ANY".to_string());
    let mut endpoint = ExtractedEndpoint::new(method, path, &file(item, default_file), line(item))
        .with_handler(text(item, "handler"));
    endpoint.description = text(item, "description");
    endpoint.parameters = strings(item, "parameters");
    endpoint.response_type = text(item, "response_type");
    Some(endpoint)
}

pub(crate) fn model_from_item(item: &Map<String, Value>, default_file: &str) -> Option<ExtractedModel> {
    let name = text(item, "name")?;
    let model_type = text(item, "model_type")
        .map(|t| ModelType::parse_lenient(&t))
        .unwrap_or(ModelType::Class);
    let mut model = ExtractedModel::new(name, model_type, &file(item, default_file), line(item));
    model.description = text(item, "description");
    model.parent = text(item, "parent");
    model.methods = strings(item, "methods");
    if let Some(Value::Array(fields)) = item.get("fields") {
        for field in fields {
            let Value::Object(field) = field else { continue };
            let Some(name) = text(field, "name") else { continue };
            let mut extracted = ExtractedField::new(name, text(field, "type").unwrap_or_else(|| "any".to_string()));
            extracted.description = text(field, "description");
            extracted.required = flag(field, "required").unwrap_or(true);
            model.fields.push(extracted);
        }
    }
    Some(model)
}

pub(crate) fn config_from_item(item: &Map<String, Value>, default_file: &str) -> Option<ExtractedConfig> {
    let key = text(item, "key")?;
    let source = text(item, "source").unwrap_or_else(|| "env".to_string());
    let default = text(item, "default");
    let mut config = ExtractedConfig::new(key, &source, &file(item, default_file), line(item))
        .with_default(default);
    config.description = text(item, "description");
    config.required = flag(item, "required").unwrap_or(config.default.is_none());
    Some(config)
}

pub(crate) fn side_effect_from_item(item: &Map<String, Value>, default_file: &str) -> Option<ExtractedSideEffect> {
    let category = text(item, "category")
        .map(|c| SideEffectCategory::parse_lenient(&c))
        .unwrap_or(SideEffectCategory::ExternalApi);
    let operation = text(item, "operation").unwrap_or_else(|| "unknown".to_string());
    let mut effect = ExtractedSideEffect::new(
        category,
        operation,
        text(item, "target"),
        &file(item, default_file),
        line(item),
    );
    effect.description = text(item, "description");
    Some(effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::client::{LlmError, LlmRequest};
    use async_trait::async_trait;
    use serde_json::json;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Answers by category, detected from the prompt text.
    struct MockClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmClient for MockClient {
        async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let user = request.user;
            let reply = if user.contains("entry point") {
                r#"```json
[{"method": "post", "path": "/orders", "file": "src/order_handler.go", "line": 12, "handler": "CreateOrder"}]
```"#
                    .to_string()
            } else if user.contains("data models") {
                r#"[{"name": "Order", "model_type": "record", "fields": [{"name": "id", "type": "string"}, {"name": "note", "required": false}]}]"#
                    .to_string()
            } else if user.contains("configuration input") {
                r#"{"config": [{"key": "DATABASE_URL"}, {"key": "PORT", "default": "8080"}]}"#.to_string()
            } else if user.contains("outside the process") {
                return Err(LlmError::Stream("connection reset".to_string()));
            } else {
                "[]".to_string()
            };
            Ok(reply)
        }
    }

    fn repo(files: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        temp
    }

    #[tokio::test]
    async fn test_analyze_converts_items() {
        let temp = repo(&[
            ("go.mod", "module example.com/shop\n\nrequire github.com/lib/pq v1.10.9\n"),
            ("src/order_handler.go", "package shop\n"),
            ("src/order_model.go", "package shop\n"),
            ("src/config.go", "package shop\n"),
        ]);
        let client = Arc::new(MockClient { calls: AtomicUsize::new(0) });
        let ctx = AnalyzerContext::new(temp.path()).with_base_url(Some("https://git.example/shop".to_string()));
        let analyzer = AiAnalyzer::new(ctx, "go", client.clone(), AiOptions::default());

        let result = analyzer.analyze().await;
        assert_eq!(result.language, "ai:go");

        assert_eq!(result.endpoints.len(), 1);
        let endpoint = &result.endpoints[0];
        assert_eq!(endpoint.method, "POST");
        assert_eq!(endpoint.handler.as_deref(), Some("CreateOrder"));
        assert_eq!(
            endpoint.source_link.as_deref(),
            Some("https://git.example/shop/blob/main/src/order_handler.go#L12")
        );

        let model = &result.models[0];
        assert_eq!(model.model_type, ModelType::Class);
        assert_eq!(model.file, "src/order_model.go");
        assert!(model.fields[0].required);
        assert!(!model.fields[1].required);
        assert_eq!(model.fields[1].field_type, "any");

        assert_eq!(result.config.len(), 2);
        assert!(result.config[0].required);
        assert!(!result.config[1].required);
        assert_eq!(result.config[1].source, "env");

        // The failed side-effect batch contributes nothing.
        assert!(result.side_effects.is_empty());
        assert_eq!(result.dependencies[0].name, "github.com/lib/pq");
        assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_batches_respect_limits() {
        let files: Vec<(String, &str)> = (0..7).map(|i| (format!("src/model_{}.py", i), "x = 1\n")).collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(n, c)| (n.as_str(), *c)).collect();
        let temp = repo(&refs);
        let client = Arc::new(MockClient { calls: AtomicUsize::new(0) });
        let options = AiOptions {
            max_files: 6,
            batch_size: 4,
            concurrency: 2,
            ..Default::default()
        };
        let analyzer = AiAnalyzer::new(AnalyzerContext::new(temp.path()), "python", client.clone(), options);
        let batches = analyzer.extract(Category::Models, &source_files(&analyzer.ctx)).await;
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, "src/model_0.py");
        assert_eq!(batches[1].0, "src/model_4.py");
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_item_conversion_defaults() {
        let item = json!({"category": "telepathy", "line": "7"});
        let effect = side_effect_from_item(item.as_object().unwrap(), "a.go").unwrap();
        assert_eq!(effect.category, SideEffectCategory::ExternalApi);
        assert_eq!(effect.operation, "unknown");
        assert_eq!(effect.line, 7);
        assert_eq!(effect.file, "a.go");

        let item = json!({"path": "/health"});
        assert_eq!(endpoint_from_item(item.as_object().unwrap(), "a.go").unwrap().method, "ANY");
        assert!(endpoint_from_item(json!({"method": "GET"}).as_object().unwrap(), "a.go").is_none());
    }
}
