//! Language-agnostic facts mined from source code.
//!
//! Every analyzer (pattern-based or AI-assisted) produces these types, so
//! downstream consumers never need to know which language a fact came from.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::languages::terraform::InfrastructureDiagram;

/// Kind of data model extracted from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Class,
    Struct,
    Interface,
    TypeAlias,
    Enum,
    Trait,
    Protocol,
    Dataclass,
    Pydantic,
    Schema,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Class => "class",
            ModelType::Struct => "struct",
            ModelType::Interface => "interface",
            ModelType::TypeAlias => "type_alias",
            ModelType::Enum => "enum",
            ModelType::Trait => "trait",
            ModelType::Protocol => "protocol",
            ModelType::Dataclass => "dataclass",
            ModelType::Pydantic => "pydantic",
            ModelType::Schema => "schema",
        }
    }

    /// Lenient parse used for LLM output; unknown kinds map to `Class`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "struct" => ModelType::Struct,
            "interface" => ModelType::Interface,
            "type_alias" | "type" | "alias" => ModelType::TypeAlias,
            "enum" => ModelType::Enum,
            "trait" => ModelType::Trait,
            "protocol" => ModelType::Protocol,
            "dataclass" => ModelType::Dataclass,
            "pydantic" => ModelType::Pydantic,
            "schema" => ModelType::Schema,
            _ => ModelType::Class,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of an externally observable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectCategory {
    Database,
    Http,
    File,
    Queue,
    Cache,
    Email,
    Notification,
    ExternalApi,
    CloudService,
}

impl SideEffectCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SideEffectCategory::Database => "database",
            SideEffectCategory::Http => "http",
            SideEffectCategory::File => "file",
            SideEffectCategory::Queue => "queue",
            SideEffectCategory::Cache => "cache",
            SideEffectCategory::Email => "email",
            SideEffectCategory::Notification => "notification",
            SideEffectCategory::ExternalApi => "external_api",
            SideEffectCategory::CloudService => "cloud_service",
        }
    }

    /// Lenient parse used for LLM output; unknown categories map to `ExternalApi`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" | "sql" => SideEffectCategory::Database,
            "http" | "api_call" => SideEffectCategory::Http,
            "file" | "filesystem" | "storage" => SideEffectCategory::File,
            "queue" | "messaging" => SideEffectCategory::Queue,
            "cache" => SideEffectCategory::Cache,
            "email" | "mail" => SideEffectCategory::Email,
            "notification" | "push" => SideEffectCategory::Notification,
            "cloud_service" | "cloud" | "aws" | "gcp" => SideEffectCategory::CloudService,
            _ => SideEffectCategory::ExternalApi,
        }
    }
}

impl fmt::Display for SideEffectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single field of a data model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractedField {
    pub name: String,
    /// Type as written in source; never resolved.
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<String>,
    /// Raw tag/annotation string (Go struct tag, decorator, ...).
    pub tag: Option<String>,
}

impl ExtractedField {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            description: None,
            required: true,
            default: None,
            tag: None,
        }
    }
}

/// A data model (class, struct, interface, schema...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractedModel {
    pub name: String,
    pub model_type: ModelType,
    pub file: String,
    pub line: usize,
    pub fields: Vec<ExtractedField>,
    pub methods: Vec<String>,
    pub description: Option<String>,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub decorators: Vec<String>,
    pub source_link: Option<String>,
}

impl ExtractedModel {
    pub fn new(name: impl Into<String>, model_type: ModelType, file: &str, line: usize) -> Self {
        Self {
            name: name.into(),
            model_type,
            file: file.to_string(),
            line,
            fields: Vec::new(),
            methods: Vec::new(),
            description: None,
            parent: None,
            interfaces: Vec::new(),
            decorators: Vec::new(),
            source_link: None,
        }
    }
}

/// An externally reachable entry point (HTTP route, RPC, dialplan app...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractedEndpoint {
    /// Method token; vocabulary is analyzer-specific (GET, ANY, GRAPHQL, DIALPLAN, AMF, LISTEN...).
    pub method: String,
    pub path: String,
    pub file: String,
    pub line: usize,
    pub handler: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<String>,
    pub response_type: Option<String>,
    pub decorators: Vec<String>,
    pub source_link: Option<String>,
}

impl ExtractedEndpoint {
    pub fn new(method: impl Into<String>, path: impl Into<String>, file: &str, line: usize) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            file: file.to_string(),
            line,
            handler: None,
            description: None,
            parameters: Vec::new(),
            response_type: None,
            decorators: Vec::new(),
            source_link: None,
        }
    }

    pub fn with_handler(mut self, handler: Option<String>) -> Self {
        self.handler = handler;
        self
    }

    pub fn with_decorator(mut self, decorator: &str) -> Self {
        self.decorators.push(decorator.to_string());
        self
    }
}

/// An externally observable operation (database write, HTTP call, file I/O...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractedSideEffect {
    pub category: SideEffectCategory,
    pub operation: String,
    pub target: Option<String>,
    pub file: String,
    pub line: usize,
    pub description: Option<String>,
    pub source_link: Option<String>,
}

impl ExtractedSideEffect {
    pub fn new(
        category: SideEffectCategory,
        operation: impl Into<String>,
        target: Option<String>,
        file: &str,
        line: usize,
    ) -> Self {
        Self {
            category,
            operation: operation.into(),
            target,
            file: file.to_string(),
            line,
            description: None,
            source_link: None,
        }
    }
}

/// A configuration input (environment variable, constant, terraform variable...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractedConfig {
    pub key: String,
    /// Where the value comes from: env, file, constant, terraform_variable...
    pub source: String,
    pub file: String,
    pub line: usize,
    pub default: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub source_link: Option<String>,
}

impl ExtractedConfig {
    pub fn new(key: impl Into<String>, source: &str, file: &str, line: usize) -> Self {
        Self {
            key: key.into(),
            source: source.to_string(),
            file: file.to_string(),
            line,
            default: None,
            description: None,
            required: false,
            source_link: None,
        }
    }

    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }
}

/// A package dependency declared in a manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractedDependency {
    pub name: String,
    pub version: Option<String>,
    pub import_path: Option<String>,
    pub file: String,
    pub line: usize,
}

impl ExtractedDependency {
    pub fn new(name: impl Into<String>, version: Option<String>, file: &str, line: usize) -> Self {
        Self {
            name: name.into(),
            version,
            import_path: None,
            file: file.to_string(),
            line,
        }
    }
}

/// Per-category counts of an analysis result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub models: usize,
    pub endpoints: usize,
    pub side_effects: usize,
    pub config: usize,
    pub dependencies: usize,
    pub errors: usize,
}

/// Aggregate output of one analyzer run over one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub language: String,
    pub models: Vec<ExtractedModel>,
    pub endpoints: Vec<ExtractedEndpoint>,
    pub side_effects: Vec<ExtractedSideEffect>,
    pub config: Vec<ExtractedConfig>,
    pub dependencies: Vec<ExtractedDependency>,
    /// Non-fatal extraction failures, one entry per failed category.
    pub errors: Vec<String>,
    /// Terraform resource dependency graph, when the repository has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infrastructure: Option<InfrastructureDiagram>,
}

impl AnalysisResult {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            ..Self::default()
        }
    }

    /// A result that carries only an explanatory error.
    pub fn failed(language: &str, error: impl Into<String>) -> Self {
        let mut result = Self::new(language);
        result.errors.push(error.into());
        result
    }

    /// Fold another result into this one.
    ///
    /// List fields are concatenated (no deduplication). Languages are joined
    /// with `+` when they differ.
    pub fn merge(mut self, other: AnalysisResult) -> AnalysisResult {
        self.language = join_languages(&self.language, &other.language);
        self.models.extend(other.models);
        self.endpoints.extend(other.endpoints);
        self.side_effects.extend(other.side_effects);
        self.config.extend(other.config);
        self.dependencies.extend(other.dependencies);
        self.errors.extend(other.errors);
        self.infrastructure = match (self.infrastructure.take(), other.infrastructure) {
            (Some(mut a), Some(b)) => {
                a.extend(b);
                Some(a)
            }
            (a, b) => a.or(b),
        };
        self
    }

    pub fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            models: self.models.len(),
            endpoints: self.endpoints.len(),
            side_effects: self.side_effects.len(),
            config: self.config.len(),
            dependencies: self.dependencies.len(),
            errors: self.errors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
            && self.endpoints.is_empty()
            && self.side_effects.is_empty()
            && self.config.is_empty()
            && self.dependencies.is_empty()
    }

    /// JSON-safe representation, suitable for caching and debugging.
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_dict(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

fn join_languages(left: &str, right: &str) -> String {
    if right.is_empty() {
        return left.to_string();
    }
    if left.is_empty() {
        return right.to_string();
    }
    let mut tags: Vec<&str> = left.split('+').collect();
    for tag in right.split('+') {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags.join("+")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(language: &str, model: &str, key: &str) -> AnalysisResult {
        let mut r = AnalysisResult::new(language);
        r.models
            .push(ExtractedModel::new(model, ModelType::Struct, "a.go", 1));
        r.config.push(ExtractedConfig::new(key, "env", "a.go", 2));
        r
    }

    #[test]
    fn test_merge_concatenates_lists() {
        let merged = result_with("go", "A", "X").merge(result_with("go", "A", "X"));
        assert_eq!(merged.language, "go");
        assert_eq!(merged.models.len(), 2);
        assert_eq!(merged.config.len(), 2);
    }

    #[test]
    fn test_merge_joins_languages() {
        let merged = result_with("go", "A", "X").merge(result_with("python", "B", "Y"));
        assert_eq!(merged.language, "go+python");

        let again = merged.merge(result_with("go", "C", "Z"));
        assert_eq!(again.language, "go+python");
    }

    #[test]
    fn test_merge_is_associative() {
        let a = || result_with("go", "A", "X");
        let b = || result_with("php", "B", "Y");
        let c = || result_with("rust", "C", "Z");

        let left = a().merge(b()).merge(c());
        let right = a().merge(b().merge(c()));

        assert_eq!(left.models, right.models);
        assert_eq!(left.config, right.config);
        assert_eq!(left.language, right.language);
    }

    #[test]
    fn test_round_trip_through_json() {
        let mut r = result_with("go", "Config", "PORT");
        r.endpoints
            .push(ExtractedEndpoint::new("GET", "/health", "main.go", 10));
        r.side_effects.push(ExtractedSideEffect::new(
            SideEffectCategory::Database,
            "query",
            Some("users".to_string()),
            "db.go",
            5,
        ));
        r.errors.push("endpoints: boom".to_string());

        let value = r.to_dict();
        assert_eq!(value["models"][0]["model_type"], "struct");
        assert_eq!(value["side_effects"][0]["category"], "database");

        let back = AnalysisResult::from_dict(value).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_lenient_parsing() {
        assert_eq!(ModelType::parse_lenient("Pydantic"), ModelType::Pydantic);
        assert_eq!(ModelType::parse_lenient("record"), ModelType::Class);
        assert_eq!(
            SideEffectCategory::parse_lenient("cloud"),
            SideEffectCategory::CloudService
        );
        assert_eq!(
            SideEffectCategory::parse_lenient("telepathy"),
            SideEffectCategory::ExternalApi
        );
    }
}
