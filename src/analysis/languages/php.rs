//! PHP language analyzer.
//!
//! Models come from class, trait, interface and enum declarations. Endpoints
//! cover Kohana REST controllers as well as Laravel and Slim route tables.

use once_cell::sync::Lazy;

use super::{register, Language};
use crate::analysis::blocks::{
    doc_comment, find_balanced, find_brace_block, line_depth_delta, skip_string, unquote,
    LineIndex, Syntax,
};
use crate::analysis::context::{is_test_file, AnalyzerContext, SourceFile};
use crate::analysis::manifest::{collect_dependencies, ManifestKind};
use crate::analysis::model::{
    ExtractedConfig, ExtractedDependency, ExtractedEndpoint, ExtractedField, ExtractedModel,
    ExtractedSideEffect, ModelType, SideEffectCategory,
};
use crate::analysis::patterns::{
    capture, config_rules, scan_config, scan_side_effects, side_effect_rules, ConfigRule, Dedup,
    Pattern, SideEffectRule, MAX_FIELDS, MAX_FILES_PER_CATEGORY, MAX_METHODS,
};
use crate::analysis::LanguageAnalyzer;

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

static CLASS_DECL: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?m)^[ \t]*(?P<mods>(?:(?:abstract|final|readonly)\s+)*)(?P<kind>class|trait|interface|enum)\s+(?P<name>[A-Za-z_]\w*)(?P<rest>[^{;]*)\{",
    )
});

static EXTENDS: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\bextends\s+(?P<names>[\w\\]+(?:\s*,\s*[\w\\]+)*)"));

static IMPLEMENTS: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\bimplements\s+(?P<names>[\w\\]+(?:\s*,\s*[\w\\]+)*)"));

static TYPED_PROPERTY: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?:public|protected|private|var)(?:\s+(?:static|readonly))*\s+(?P<type>\??[\w\\|]+)\s+\$(?P<name>\w+)\s*(?:=\s*(?P<default>.*?))?\s*;\s*(?://.*)?$",
    )
});

static UNTYPED_PROPERTY: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?:public|protected|private|var)(?:\s+(?:static|readonly))*\s+\$(?P<name>\w+)\s*(?:=\s*(?P<default>.*?))?\s*;?\s*(?://.*)?$",
    )
});

static METHOD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?:(?:public|protected|private|static|abstract|final)\s+)*function\s+&?(?P<name>\w+)\s*\((?P<params>[^)]*)\)(?:\s*:\s*(?P<ret>\??[\w\\|]+))?",
    )
});

static VALIDATION_RULES: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\$_validationRules\s*=\s*(?:array\s*\(|\[)"));

static CALL_METHOD: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"function\s+__call\s*\("));

static CASE_LABEL: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r#"\bcase\s+['"](?P<name>[\w-]+)['"]\s*:"#));

static LARAVEL_ROUTE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"\bRoute::(?P<method>get|post|put|patch|delete|options|any)\(\s*['"](?P<path>[^'"]*)['"]\s*(?:,\s*(?:\[\s*(?P<class>[\w\\]+)::class\s*,\s*['"](?P<action>\w+)['"]\s*\]|['"](?P<handler>[^'"]+)['"]))?"#,
    )
});

static LARAVEL_MATCH: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"\bRoute::match\(\s*\[(?P<methods>[^\]]*)\]\s*,\s*['"](?P<path>[^'"]*)['"]"#)
});

static SLIM_ROUTE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"\$(?:app|router|group|r)->(?P<method>get|post|put|patch|delete|options|any)\(\s*['"](?P<path>/[^'"]*)['"]\s*(?:,\s*['"]?(?P<handler>[\w\\:@]+))?"#,
    )
});

static QUOTED: Lazy<Pattern> = Lazy::new(|| Pattern::new(r#"['"]([^'"]+)['"]"#));

static SERVER_VAR: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r#"\$_SERVER\[\s*['"](?P<key>[A-Z][A-Z0-9_]*)['"]\s*\]"#));

/// `$_SERVER` keys that describe the request rather than configuration.
const REQUEST_SERVER_PREFIXES: &[&str] = &[
    "HTTP_", "REQUEST_", "SERVER_", "REMOTE_", "SCRIPT_", "QUERY_", "PHP_", "DOCUMENT_", "PATH_",
    "CONTENT_", "HTTPS", "ARGV", "ARGC",
];

static SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (
            r#"->(?P<op>query|exec|prepare)\(\s*["'][^"']*?\b(?i:from|into|update)\s+`?(?P<target>\w+)"#,
            Database,
            "query",
            "",
        ),
        (r"->(?P<op>query|exec|prepare)\(\s*\$", Database, "query", ""),
        (
            r#"\bmysqli_(?P<op>query|prepare|multi_query)\(\s*\$\w+\s*,\s*(?:["'][^"']*?\b(?i:from|into|update)\s+`?(?P<target>\w+))?"#,
            Database,
            "query",
            "",
        ),
        (r#"\bDB::table\(\s*['"](?P<target>\w+)['"]"#, Database, "table", ""),
        (
            r#"\bDB::(?P<op>select|insert|update|delete|statement)\(\s*['"][^'"]*?\b(?i:from|into|update)\s+`?(?P<target>\w+)"#,
            Database,
            "query",
            "",
        ),
        (
            r"\b(?P<target>[A-Z]\w+)::(?P<op>where|find|findOrFail|create|firstOrCreate|updateOrCreate|destroy)\(",
            Database,
            "eloquent",
            "",
        ),
        (r#"\bcurl_init\(\s*(?:['"](?P<target>[^'"]+)['"])?"#, Http, "curl", ""),
        (
            r#"\$(?:client|http|guzzle|httpClient)\w*->(?P<op>get|post|put|patch|delete|request|requestAsync|send)\(\s*(?:['"](?:[A-Z]+['"]\s*,\s*['"])?(?P<target>[^'"]+)['"])?"#,
            Http,
            "request",
            "",
        ),
        (r"\bnew\s+\\?(?:GuzzleHttp\\)?Client\(", Http, "guzzle_client", "guzzle"),
        (
            r#"\bHttp::(?P<op>get|post|put|patch|delete)\(\s*['"](?P<target>[^'"]+)['"]"#,
            Http,
            "request",
            "",
        ),
        (
            r#"\bfile_get_contents\(\s*['"](?P<target>https?://[^'"]+)['"]"#,
            Http,
            "file_get_contents",
            "",
        ),
        (
            r#"\b(?P<op>file_put_contents|fopen|fwrite|unlink|mkdir|move_uploaded_file)\(\s*(?:['"](?P<target>[^'"]+)['"])?"#,
            File,
            "file",
            "",
        ),
        (r"(?m)(?:^|[\s;=(!@])mail\(", Email, "mail", "mail"),
        (r"\bMail::(?P<op>send|to|queue|raw)\(", Email, "mail", "laravel_mail"),
        (r"\bnew\s+\\?(?:PHPMailer\\PHPMailer\\)?PHPMailer\b", Email, "phpmailer", "phpmailer"),
        (
            r"\bredis\w*->(?P<op>get|set|setex|setnx|del|hget|hset|hgetall|incr|expire|lpush|rpush|publish)\(",
            Cache,
            "redis",
            "redis",
        ),
        (r"\bRedis::(?P<op>\w+)\(", Cache, "redis", "redis"),
        (r"\bnew\s+\\?Redis\(", Cache, "connect", "redis"),
        (r"\bnew\s+\\?Memcached?\(", Cache, "connect", "memcache"),
        (
            r"\bmemcached?\w*->(?P<op>get|set|add|replace|delete|increment|decrement)\(",
            Cache,
            "memcache",
            "memcache",
        ),
        (r"\bCache::(?P<op>get|put|remember|forget|has|forever)\(", Cache, "cache", "cache"),
        (r"\bQueue::(?P<op>push|later|pushOn)\(", Queue, "queue", "queue"),
    ])
});

static CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    config_rules(&[
        (
            r#"\bdefine\(\s*['"](?P<key>\w+)['"]\s*,\s*(?P<default>[^)]+?)\s*\)"#,
            "constant",
        ),
        (
            r#"\benv\(\s*['"](?P<key>\w+)['"]\s*(?:,\s*(?P<default>[^)]+?)\s*)?\)"#,
            "env",
        ),
        (r#"\bgetenv\(\s*['"](?P<key>\w+)['"]\s*\)"#, "env"),
        (r#"\$_ENV\[\s*['"](?P<key>\w+)['"]\s*\]"#, "env"),
    ])
});

/// PHP language analyzer.
pub struct PhpAnalyzer {
    ctx: AnalyzerContext,
}

/// A `(entity, method)` pair found in `$_validationRules`, with the byte
/// offset of the method key.
#[derive(Debug, PartialEq, Eq)]
struct RuleKey {
    entity: String,
    method: String,
    offset: usize,
}

impl PhpAnalyzer {
    pub fn new(ctx: AnalyzerContext) -> Self {
        Self { ctx }
    }

    fn files(&self) -> Vec<SourceFile> {
        self.ctx
            .source_files(self.file_extensions())
            .into_iter()
            .take(MAX_FILES_PER_CATEGORY)
            .collect()
    }

    fn file_models(&self, file: &SourceFile) -> Vec<ExtractedModel> {
        let content = &file.content;
        let index = LineIndex::new(content);
        let lines: Vec<&str> = content.lines().collect();
        let mut models = Vec::new();

        for caps in CLASS_DECL.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(body) = find_brace_block(content, whole.start(), Syntax::PHP) else {
                continue;
            };
            let model_type = match &caps["kind"] {
                "interface" => ModelType::Interface,
                "trait" => ModelType::Trait,
                "enum" => ModelType::Enum,
                _ => ModelType::Class,
            };
            let line = index.line_of(whole.start());
            let mut model = ExtractedModel::new(&caps["name"], model_type, &file.rel, line);

            if caps["mods"].contains("abstract") {
                model.decorators.push("abstract".to_string());
            }
            if caps["mods"].contains("final") {
                model.decorators.push("final".to_string());
            }

            let rest = &caps["rest"];
            if let Some(ext) = EXTENDS.captures(rest) {
                let mut parents = ext["names"].split(',').map(|s| s.trim().to_string());
                // Interfaces may extend several interfaces.
                if model_type == ModelType::Interface {
                    model.interfaces.extend(parents);
                } else {
                    model.parent = parents.next();
                }
            }
            if let Some(imp) = IMPLEMENTS.captures(rest) {
                model
                    .interfaces
                    .extend(imp["names"].split(',').map(|s| s.trim().to_string()));
            }

            model.description = doc_comment(&lines, line, &["/**", "*/", "*", "//"]);
            Self::parse_members(&content[body], &mut model);
            model.source_link = self.ctx.source_link(&file.rel, Some(line));
            models.push(model);
        }
        models
    }

    /// Properties and method signatures at the top level of a class body.
    fn parse_members(body: &str, model: &mut ExtractedModel) {
        let mut depth = 0;
        for line in body.lines() {
            if depth == 0 {
                if let Some(caps) = METHOD.captures(line) {
                    if model.methods.len() < MAX_METHODS {
                        let mut signature = format!("{}({})", &caps["name"], caps["params"].trim());
                        if let Some(ret) = caps.name("ret") {
                            signature.push_str(": ");
                            signature.push_str(ret.as_str());
                        }
                        model.methods.push(signature);
                    }
                } else if model.fields.len() < MAX_FIELDS {
                    if let Some(field) = Self::parse_property(line) {
                        model.fields.push(field);
                    }
                }
            }
            depth = (depth + line_depth_delta(line, Syntax::PHP)).max(0);
        }
    }

    fn parse_property(line: &str) -> Option<ExtractedField> {
        if let Some(caps) = TYPED_PROPERTY.captures(line) {
            let raw_type = &caps["type"];
            let nullable = raw_type.starts_with('?') || raw_type.contains("null");
            let mut field = ExtractedField::new(&caps["name"], raw_type.trim_start_matches('?'));
            field.default = capture(&caps, "default").filter(|d| !d.is_empty());
            field.required = !nullable && field.default.is_none();
            return Some(field);
        }
        let caps = UNTYPED_PROPERTY.captures(line)?;
        let mut field = ExtractedField::new(&caps["name"], "mixed");
        // A multi-line array initializer leaves an unterminated default.
        field.default = capture(&caps, "default")
            .filter(|d| !d.is_empty() && line.trim_end().ends_with(';'));
        field.required = false;
        Some(field)
    }

    /// URL prefix of a Kohana controller: `User_Controller` and
    /// `Controller_User` both become `user`.
    fn controller_prefix(class_name: &str) -> String {
        let name = class_name
            .strip_suffix("_Controller")
            .or_else(|| class_name.strip_prefix("Controller_"))
            .unwrap_or(class_name);
        name.to_ascii_lowercase()
    }

    fn kohana_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let content = &file.content;
        let index = LineIndex::new(content);

        for caps in CLASS_DECL.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(body) = find_brace_block(content, whole.start(), Syntax::PHP) else {
                continue;
            };
            let prefix = Self::controller_prefix(&caps["name"]);
            let body_text = &content[body.clone()];

            let mut found = Vec::new();
            if let Some(rules) = VALIDATION_RULES.find_iter(body_text).next() {
                let open = body.start + rules.end() - 1;
                let (open_ch, close_ch) = if content[open..].starts_with('[') {
                    ('[', ']')
                } else {
                    ('(', ')')
                };
                if let Some(close) = find_balanced(content, open, open_ch, close_ch, Syntax::PHP) {
                    for key in validation_rule_keys(&content[open + 1..close], open + 1) {
                        let line = index.line_of(key.offset);
                        let path = format!("/{}/{}", prefix, key.entity);
                        found.push(
                            ExtractedEndpoint::new(key.method, path, &file.rel, line)
                                .with_handler(Some(caps["name"].to_string()))
                                .with_decorator("kohana_rest"),
                        );
                    }
                }
            }

            if found.is_empty() {
                for call in CALL_METHOD.find_iter(body_text) {
                    let from = body.start + call.start();
                    let Some(call_body) = find_brace_block(content, from, Syntax::PHP) else {
                        continue;
                    };
                    for case in CASE_LABEL.captures_iter(&content[call_body.clone()]) {
                        let Some(name) = case.name("name") else { continue };
                        let line = index.line_of(call_body.start + name.start());
                        let path = format!("/{}/{}", prefix, name.as_str());
                        found.push(
                            ExtractedEndpoint::new("ANY", path, &file.rel, line)
                                .with_handler(Some(format!("{}::__call", &caps["name"])))
                                .with_decorator("kohana_call"),
                        );
                    }
                }
            }

            for ep in &mut found {
                ep.source_link = self.ctx.source_link(&file.rel, Some(ep.line));
            }
            out.extend(found);
        }
    }

    fn route_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let content = &file.content;
        let index = LineIndex::new(content);
        let mut push = |method: &str, path: &str, handler: Option<String>, offset: usize, framework: &str| {
            let line = index.line_of(offset);
            let path = if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{}", path)
            };
            let mut ep = ExtractedEndpoint::new(method, path, &file.rel, line)
                .with_handler(handler)
                .with_decorator(framework);
            ep.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(ep);
        };

        for caps in LARAVEL_ROUTE.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let handler = match (capture(&caps, "class"), capture(&caps, "action")) {
                (Some(class), Some(action)) => Some(format!("{}@{}", class, action)),
                _ => capture(&caps, "handler"),
            };
            let method = caps["method"].to_ascii_uppercase();
            push(&method, &caps["path"], handler, whole.start(), "laravel");
        }

        for caps in LARAVEL_MATCH.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            for m in QUOTED.captures_iter(&caps["methods"]) {
                let method = m[1].to_ascii_uppercase();
                push(&method, &caps["path"], None, whole.start(), "laravel");
            }
        }

        for caps in SLIM_ROUTE.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let method = caps["method"].to_ascii_uppercase();
            push(&method, &caps["path"], capture(&caps, "handler"), whole.start(), "slim");
        }
    }

    fn server_config(&self, file: &SourceFile, dedup: &mut Dedup, out: &mut Vec<ExtractedConfig>) {
        let index = LineIndex::new(&file.content);
        for caps in SERVER_VAR.captures_iter(&file.content) {
            let Some(key) = caps.name("key") else { continue };
            let key = key.as_str();
            if REQUEST_SERVER_PREFIXES.iter().any(|p| key.starts_with(p)) || !dedup.config(key) {
                continue;
            }
            let line = index.line_of(caps.get(0).map(|m| m.start()).unwrap_or(0));
            let mut cfg = ExtractedConfig::new(key, "env", &file.rel, line);
            cfg.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(cfg);
        }
    }
}

/// Walk the `$_validationRules` array. Depth 0 string keys name the entity,
/// depth 1 string keys name the HTTP method.
fn validation_rule_keys(body: &str, base: usize) -> Vec<RuleKey> {
    let mut keys = Vec::new();
    let mut entity: Option<String> = None;
    let mut depth = 0i32;
    let mut i = 0;

    while i < body.len() {
        let rest = &body[i..];
        if rest.starts_with("//") || rest.starts_with('#') {
            i += rest.find('\n').unwrap_or(rest.len());
            continue;
        }
        if rest.starts_with("/*") {
            i += rest.find("*/").map(|p| p + 2).unwrap_or(rest.len());
            continue;
        }
        let Some(ch) = rest.chars().next() else { break };
        match ch {
            '\'' | '"' => {
                let end = skip_string(body, i, ch).unwrap_or(body.len());
                let literal = unquote(&body[i..end]).to_string();
                let start = i;
                i = end;
                if !body[i..].trim_start().starts_with("=>") {
                    continue;
                }
                match depth {
                    0 => entity = Some(literal),
                    1 => {
                        let method = literal.to_ascii_uppercase();
                        if let Some(entity) = &entity {
                            if HTTP_METHODS.contains(&method.as_str()) {
                                keys.push(RuleKey {
                                    entity: entity.clone(),
                                    method,
                                    offset: base + start,
                                });
                            }
                        }
                    }
                    _ => {}
                }
                continue;
            }
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            _ => {}
        }
        i += ch.len_utf8();
    }
    keys
}

impl LanguageAnalyzer for PhpAnalyzer {
    fn language_id(&self) -> &'static str {
        "php"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["php"]
    }

    fn context(&self) -> &AnalyzerContext {
        &self.ctx
    }

    fn extract_models(&self) -> anyhow::Result<Vec<ExtractedModel>> {
        Ok(self
            .files()
            .iter()
            .filter(|f| !is_test_file(&f.rel))
            .flat_map(|f| self.file_models(f))
            .collect())
    }

    fn extract_endpoints(&self) -> anyhow::Result<Vec<ExtractedEndpoint>> {
        let mut endpoints = Vec::new();
        for file in self.files() {
            self.kohana_endpoints(&file, &mut endpoints);
            self.route_endpoints(&file, &mut endpoints);
        }
        Ok(endpoints)
    }

    fn extract_side_effects(&self) -> anyhow::Result<Vec<ExtractedSideEffect>> {
        let mut effects = Vec::new();
        for file in self.files() {
            let mut dedup = Dedup::new();
            scan_side_effects(&self.ctx, &file, &SIDE_EFFECTS, &mut dedup, &mut effects);
        }
        // Framework facades are not models.
        effects.retain(|e| !matches!(e.target.as_deref(), Some("Route" | "Cache" | "Mail" | "Http")));
        Ok(effects)
    }

    fn extract_config(&self) -> anyhow::Result<Vec<ExtractedConfig>> {
        let mut config = Vec::new();
        for file in self.files() {
            let mut dedup = Dedup::new();
            scan_config(&self.ctx, &file, &CONFIG, &mut dedup, &mut config);
            self.server_config(&file, &mut dedup, &mut config);
        }
        Ok(config)
    }

    fn extract_dependencies(&self) -> anyhow::Result<Vec<ExtractedDependency>> {
        Ok(collect_dependencies(&self.ctx, &[ManifestKind::ComposerJson]))
    }
}

pub(super) fn install() {
    register(Language::Php, |ctx| Box::new(PhpAnalyzer::new(ctx)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn analyzer_with(files: &[(&str, &str)]) -> (TempDir, PhpAnalyzer) {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let ctx = AnalyzerContext::new(temp.path());
        (temp, PhpAnalyzer::new(ctx))
    }

    const KOHANA: &str = r#"<?php
class User_Controller extends Rest_Controller {
    protected $_validationRules = array(
        'profile' => array(
            'GET' => array('id' => 'required'),
            'PUT' => array('id' => 'required', 'name' => 'max_length[64]'),
        ),
        'settings' => array(
            'post' => array(),
        ),
    );

    public function __call($method, $args) {
        switch ($method) {
            case 'ignored':
                break;
        }
    }
}
"#;

    #[test]
    fn test_kohana_validation_rules() {
        let (_temp, analyzer) = analyzer_with(&[("application/controllers/user.php", KOHANA)]);
        let endpoints = analyzer.extract_endpoints().unwrap();
        let found: Vec<_> = endpoints
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str(), e.line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("GET", "/user/profile", 5),
                ("PUT", "/user/profile", 6),
                ("POST", "/user/settings", 9),
            ]
        );
        assert!(endpoints.iter().all(|e| e.decorators == vec!["kohana_rest"]));
    }

    #[test]
    fn test_kohana_call_fallback() {
        let src = r#"<?php
class Controller_Billing extends Controller {
    public function __call($method, $args) {
        switch ($method) {
            case 'invoice':
                return $this->invoice($args);
            case "refund":
                return $this->refund($args);
        }
    }
}
"#;
        let (_temp, analyzer) = analyzer_with(&[("billing.php", src)]);
        let endpoints = analyzer.extract_endpoints().unwrap();
        let paths: Vec<_> = endpoints.iter().map(|e| (e.method.as_str(), e.path.as_str())).collect();
        assert_eq!(paths, vec![("ANY", "/billing/invoice"), ("ANY", "/billing/refund")]);
        assert_eq!(endpoints[0].decorators, vec!["kohana_call"]);
    }

    #[test]
    fn test_class_members() {
        let src = r#"<?php
/**
 * An order placed by a customer.
 */
abstract class Order extends Model implements JsonSerializable, Countable {
    public ?string $note;
    protected int $total = 0;
    public $legacy;
    private static array $cache = [];

    public function total(): int {
        if ($this->total > 0) {
            return $this->total;
        }
        return 0;
    }

    abstract protected function validate(array $data);
}

interface Repository extends Countable, ArrayAccess {
    public function find(int $id): ?Order;
}
"#;
        let (_temp, analyzer) = analyzer_with(&[("Order.php", src)]);
        let models = analyzer.extract_models().unwrap();
        assert_eq!(models.len(), 2);

        let order = &models[0];
        assert_eq!(order.name, "Order");
        assert_eq!(order.line, 5);
        assert_eq!(order.parent.as_deref(), Some("Model"));
        assert_eq!(order.interfaces, vec!["JsonSerializable", "Countable"]);
        assert_eq!(order.decorators, vec!["abstract"]);
        assert_eq!(order.description.as_deref(), Some("An order placed by a customer."));

        let fields: Vec<_> = order
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type.as_str(), f.required))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("note", "string", false),
                ("total", "int", false),
                ("legacy", "mixed", false),
                ("cache", "array", false),
            ]
        );
        assert_eq!(order.methods, vec!["total(): int", "validate(array $data)"]);

        let repo = &models[1];
        assert_eq!(repo.model_type, ModelType::Interface);
        assert_eq!(repo.interfaces, vec!["Countable", "ArrayAccess"]);
        assert_eq!(repo.methods, vec!["find(int $id): ?Order"]);
    }

    #[test]
    fn test_laravel_and_slim_routes() {
        let src = r#"<?php
Route::get('users/{id}', [UserController::class, 'show']);
Route::post('/users', 'UserController@store');
Route::match(['get', 'post'], '/search', $handler);
$app->delete('/items/{id}', 'ItemAction');
"#;
        let (_temp, analyzer) = analyzer_with(&[("routes/web.php", src)]);
        let endpoints = analyzer.extract_endpoints().unwrap();
        let found: Vec<_> = endpoints
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str(), e.handler.as_deref()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("GET", "/users/{id}", Some("UserController@show")),
                ("POST", "/users", Some("UserController@store")),
                ("GET", "/search", None),
                ("POST", "/search", None),
                ("DELETE", "/items/{id}", Some("ItemAction")),
            ]
        );
    }

    #[test]
    fn test_side_effects_and_config() {
        let src = r#"<?php
$rows = $pdo->query("SELECT * FROM orders WHERE id = 1");
$users = DB::table('users')->get();
$ch = curl_init('https://api.example.com/v1');
file_put_contents('/tmp/out.json', $data);
mail($to, $subject, $body);
$redis->set('k', 'v');
define('APP_VERSION', '1.2.3');
$key = getenv('API_KEY');
$host = $_SERVER['DB_HOST'];
$agent = $_SERVER['HTTP_USER_AGENT'];
$debug = env('APP_DEBUG', false);
"#;
        let (_temp, analyzer) = analyzer_with(&[("bootstrap.php", src)]);
        let effects = analyzer.extract_side_effects().unwrap();
        let summary: Vec<_> = effects
            .iter()
            .map(|e| (e.category, e.target.as_deref()))
            .collect();
        assert!(summary.contains(&(SideEffectCategory::Database, Some("orders"))));
        assert!(summary.contains(&(SideEffectCategory::Database, Some("users"))));
        assert!(summary.contains(&(SideEffectCategory::Http, Some("https://api.example.com/v1"))));
        assert!(summary.contains(&(SideEffectCategory::File, Some("/tmp/out.json"))));
        assert!(summary.contains(&(SideEffectCategory::Email, Some("mail"))));
        assert!(summary.contains(&(SideEffectCategory::Cache, Some("redis"))));

        let config = analyzer.extract_config().unwrap();
        let keys: Vec<_> = config.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["APP_VERSION", "APP_DEBUG", "API_KEY", "DB_HOST"]);
        assert_eq!(config[0].default.as_deref(), Some("1.2.3"));
        assert_eq!(config[0].source, "constant");
        assert_eq!(config[1].default.as_deref(), Some("false"));
        assert!(config[2].required);
    }

    #[test]
    fn test_validation_rule_keys_ignores_nested_levels() {
        let body = "'a' => array('GET' => array('GET' => 1)), // 'b' => array('POST' => 1)\n";
        let keys = validation_rule_keys(body, 0);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].entity, "a");
        assert_eq!(keys[0].method, "GET");
    }
}
