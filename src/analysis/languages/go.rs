//! Go language analyzer.
//!
//! Extracts:
//! - Structs (fields with tags) and interfaces (method sets)
//! - Receiver methods, attached to their struct
//! - Routes for chi, gorilla/mux, echo, gin and net/http
//! - SQL, AWS SDK, HTTP client, Redis and file side effects
//! - Config from `os.Getenv`, viper and `env:"..."` struct tags
//! - go.mod dependencies

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{register, Language};
use crate::analysis::ast::{locate_type_declarations, AstLanguage, TypeDecl};
use crate::analysis::blocks::{
    doc_comment, find_balanced, find_brace_block, line_depth_delta, LineIndex, Syntax,
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

static TYPE_DECL: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?m)^\s*type\s+(?P<name>[A-Za-z_]\w*)(?:\[[^\]]*\])?\s+(?P<kind>struct|interface)\s*\{")
});

static TYPE_GROUP: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"(?m)^type\s*\("));

static GROUPED_DECL: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?m)^\s*(?P<name>[A-Za-z_]\w*)\s+(?P<kind>struct|interface)\s*\{")
});

static FIELD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?P<names>[A-Za-z_]\w*(?:\s*,\s*[A-Za-z_]\w*)*)\s+(?P<type>[^\s`/][^`]*?)\s*(?:`(?P<tag>[^`]*)`)?\s*(?://\s*(?P<comment>.*))?$",
    )
});

static EMBEDDED: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^\s*\*?(?P<name>[A-Za-z_][\w.]*)\s*(?:`[^`]*`)?\s*(?://.*)?$"));

static INTERFACE_METHOD: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^\s*(?P<name>[A-Za-z_]\w*)\s*(?P<sig>\(.*)$"));

static RECEIVER_METHOD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?m)^func\s*\(\s*\w*\s*\*?\s*(?P<recv>[A-Za-z_]\w*)(?:\[[^\]]*\])?\s*\)\s*(?P<name>[A-Za-z_]\w*)\s*(?P<sig>\([^{\n]*)",
    )
});

static TAG_PAIR: Lazy<Pattern> = Lazy::new(|| Pattern::new(r#"(?P<k>\w+):"(?P<v>[^"]*)""#));

static ENV_TAG: Lazy<Pattern> = Lazy::new(|| Pattern::new(r#"`(?P<tag>[^`]*\benv:"[^"]+"[^`]*)`"#));

/// chi, echo and gin style `r.Get("/path", handler)`.
static METHOD_ROUTE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"\b\w+\.(?P<method>Get|Post|Put|Delete|Patch|Head|Options|Connect|Trace|GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS|Any)\(\s*"(?P<path>/[^"]*)"\s*(?:,\s*(?P<handler>[\w.]+))?"#,
    )
});

/// gorilla/mux and net/http `HandleFunc("/path", h).Methods("GET", ...)`.
static HANDLE_ROUTE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"\b(?P<recv>\w+)\.(?:HandleFunc|Handle)\(\s*"(?P<path>/[^"]*)"\s*,\s*(?P<handler>[\w.]+)(?:[^\n]*?\.Methods\((?P<methods>[^)]*)\))?"#,
    )
});

static QUOTED: Lazy<Pattern> = Lazy::new(|| Pattern::new(r#""([^"]*)""#));

static SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (
            r#"\b(?:db|tx|conn|pool|DB|sqlDB|database)\.(?P<op>QueryRowContext|QueryContext|QueryRow|Query|SelectContext|Select|GetContext|Get)\([^"`\n)]*(?:[`"][^`"]*?\b(?i:from|join)\s+(?P<target>\w+))?"#,
            Database,
            "query",
            "",
        ),
        (
            r#"\b(?:db|tx|conn|pool|DB|sqlDB|database)\.(?P<op>ExecContext|Exec|NamedExecContext|NamedExec)\([^"`\n)]*(?:[`"]\s*(?i:insert\s+into|update|delete\s+from)\s+(?P<target>\w+))?"#,
            Database,
            "exec",
            "",
        ),
        (
            r"\bdb\.(?P<op>Create|Save|First|Find|Delete|Updates)\(",
            Database,
            "orm",
            "gorm",
        ),
        (
            r"\.(?P<op>PutItem|GetItem|UpdateItem|DeleteItem|Scan|BatchWriteItem|BatchGetItem|TransactWriteItems)(?:WithContext)?\(",
            Database,
            "dynamodb",
            "dynamodb",
        ),
        (
            r"\.(?P<op>PutObject|GetObject|DeleteObject|HeadObject|CopyObject|ListObjectsV2)(?:WithContext)?\(",
            CloudService,
            "s3",
            "s3",
        ),
        (
            r"\.(?P<op>SendMessageBatch|SendMessage|ReceiveMessage|DeleteMessage)(?:WithContext)?\(",
            Queue,
            "sqs",
            "sqs",
        ),
        (
            r"\b(?:sns\w*|\w*[Ss]ns\w*)\.(?P<op>PublishBatch|Publish)(?:WithContext)?\(",
            Notification,
            "sns",
            "sns",
        ),
        (
            r"\b(?:lambda\w*|\w*[Ll]ambda\w*)\.(?P<op>InvokeAsync|Invoke)(?:WithContext)?\(",
            CloudService,
            "lambda",
            "lambda",
        ),
        (
            r#"\bhttp\.(?P<op>Get|Post|PostForm|Head)\(\s*(?:"(?P<target>[^"]+)")?"#,
            Http,
            "request",
            "",
        ),
        (
            r#"\bhttp\.NewRequest(?:WithContext)?\((?:\s*ctx\s*,)?\s*(?:http\.Method(?P<op>\w+)|"[A-Z]+")"#,
            Http,
            "request",
            "",
        ),
        (r"\b\w+\.Do\(\s*req\b", Http, "do", ""),
        (
            r"\b(?:rdb|redis\w*|\w*[Rr]edis\w*|cache)\.(?P<op>Get|Set|SetNX|SetEX|Del|HGet|HSet|HGetAll|Expire|Incr|LPush|RPush|Publish|Subscribe)\(\s*ctx\b",
            Cache,
            "redis",
            "redis",
        ),
        (
            r#"\b(?:os|ioutil)\.(?P<op>Create|OpenFile|Open|WriteFile|ReadFile|Remove|RemoveAll|MkdirAll)\(\s*(?:"(?P<target>[^"]+)")?"#,
            File,
            "file",
            "",
        ),
        (r"\bsmtp\.SendMail\(", Email, "send_mail", "smtp"),
    ])
});

static CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    config_rules(&[
        (
            r#"\bviper\.SetDefault\(\s*"(?P<key>[^"]+)"\s*,\s*(?P<default>[^)]+)\)"#,
            "viper",
        ),
        (r#"\bos\.(?:Getenv|LookupEnv)\(\s*"(?P<key>[^"]+)"\s*\)"#, "env"),
        (
            r#"\bviper\.Get(?:String|Int|Int64|Bool|Duration|Float64|StringSlice|StringMap)?\(\s*"(?P<key>[^"]+)"\s*\)"#,
            "viper",
        ),
    ])
});

/// Go language analyzer.
pub struct GoAnalyzer {
    ctx: AnalyzerContext,
}

impl GoAnalyzer {
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

    /// Struct and interface headers, AST first, patterns as a fallback.
    fn declarations(content: &str) -> Vec<TypeDecl> {
        if let Some(decls) = locate_type_declarations(AstLanguage::Go, content) {
            return decls;
        }

        let index = LineIndex::new(content);
        let mut decls: Vec<TypeDecl> = TYPE_DECL
            .captures_iter(content)
            .filter_map(|caps| {
                let name = caps.name("name")?;
                Some(TypeDecl {
                    name: name.as_str().to_string(),
                    kind: if &caps["kind"] == "struct" { "struct" } else { "interface" },
                    start: name.start(),
                    end: caps.get(0)?.end(),
                    line: index.line_of(name.start()),
                })
            })
            .collect();

        for group in TYPE_GROUP.find_iter(content) {
            let open = group.end() - 1;
            let Some(close) =
                find_balanced(content, open, '(', ')', Syntax::C_LIKE)
            else {
                continue;
            };
            let body = &content[open + 1..close];
            let mut depth = 0;
            let mut offset = open + 1;
            for line in body.split_inclusive('\n') {
                if depth == 0 {
                    if let Some(caps) = GROUPED_DECL.captures(line) {
                        if let Some(name) = caps.name("name") {
                            let start = offset + name.start();
                            decls.push(TypeDecl {
                                name: name.as_str().to_string(),
                                kind: if &caps["kind"] == "struct" { "struct" } else { "interface" },
                                start,
                                end: start,
                                line: index.line_of(start),
                            });
                        }
                    }
                }
                depth += line_depth_delta(line, Syntax::C_LIKE);
                offset += line.len();
            }
        }
        decls.sort_by_key(|d| d.start);
        decls
    }

    fn parse_struct_fields(body: &str, model: &mut ExtractedModel) {
        let mut depth = 0;
        for line in body.split(['\n', ';']) {
            let trimmed = line.trim();
            if depth == 0 && !trimmed.is_empty() && !trimmed.starts_with("//") {
                if let Some(caps) = FIELD.captures(line) {
                    let field_type = caps["type"].trim().trim_end_matches('{').trim().to_string();
                    let tag = capture(&caps, "tag");
                    let description = capture(&caps, "comment");
                    let optional = tag
                        .as_deref()
                        .map(|t| json_tag_is_optional(t))
                        .unwrap_or(false);
                    for name in caps["names"].split(',') {
                        if model.fields.len() >= MAX_FIELDS {
                            break;
                        }
                        let mut field = ExtractedField::new(name.trim(), field_type.clone());
                        field.tag = tag.clone();
                        field.description = description.clone();
                        field.required = !optional;
                        model.fields.push(field);
                    }
                } else if let Some(caps) = EMBEDDED.captures(line) {
                    let embedded = caps["name"].to_string();
                    if model.parent.is_none() {
                        model.parent = Some(embedded);
                    } else {
                        model.interfaces.push(embedded);
                    }
                }
            }
            depth = (depth + line_depth_delta(line, Syntax::C_LIKE)).max(0);
        }
    }

    fn parse_interface_methods(body: &str, model: &mut ExtractedModel) {
        let mut depth = 0;
        for line in body.lines() {
            if depth == 0 {
                if let Some(caps) = INTERFACE_METHOD.captures(line) {
                    if model.methods.len() < MAX_METHODS {
                        model
                            .methods
                            .push(format!("{}{}", &caps["name"], caps["sig"].trim()));
                    }
                } else if let Some(caps) = EMBEDDED.captures(line) {
                    model.interfaces.push(caps["name"].to_string());
                }
            }
            depth = (depth + line_depth_delta(line, Syntax::C_LIKE)).max(0);
        }
    }

    fn file_models(&self, file: &SourceFile) -> Vec<ExtractedModel> {
        let content = &file.content;
        let lines: Vec<&str> = content.lines().collect();
        let mut models = Vec::new();

        for decl in Self::declarations(content) {
            let Some(body) = find_brace_block(content, decl.start, Syntax::C_LIKE) else {
                continue;
            };
            let model_type = if decl.kind == "interface" {
                ModelType::Interface
            } else {
                ModelType::Struct
            };
            let mut model = ExtractedModel::new(decl.name.clone(), model_type, &file.rel, decl.line);
            model.description = doc_comment(&lines, decl.line, &["//"]);
            let body = &content[body];
            match model_type {
                ModelType::Interface => Self::parse_interface_methods(body, &mut model),
                _ => Self::parse_struct_fields(body, &mut model),
            }
            model.source_link = self.ctx.source_link(&file.rel, Some(decl.line));
            models.push(model);
        }
        models
    }

    fn struct_tag_config(&self, file: &SourceFile, dedup: &mut Dedup, out: &mut Vec<ExtractedConfig>) {
        let index = LineIndex::new(&file.content);
        for caps in ENV_TAG.captures_iter(&file.content) {
            let Some(tag) = caps.name("tag") else { continue };
            let pairs: HashMap<String, String> = TAG_PAIR
                .captures_iter(tag.as_str())
                .map(|p| (p["k"].to_string(), p["v"].to_string()))
                .collect();
            let Some(key) = pairs
                .get("env")
                .and_then(|v| v.split(',').next())
                .filter(|k| !k.is_empty())
            else {
                continue;
            };
            if !dedup.config(key) {
                continue;
            }
            let line = index.line_of(tag.start());
            let mut cfg = ExtractedConfig::new(key, "struct_tag", &file.rel, line);
            cfg.default = pairs
                .get("default")
                .or_else(|| pairs.get("envDefault"))
                .cloned();
            cfg.description = pairs
                .get("help")
                .or_else(|| pairs.get("description"))
                .cloned();
            cfg.required = match pairs.get("required").map(String::as_str) {
                Some("true") => true,
                Some("false") => false,
                _ => cfg.default.is_none(),
            };
            cfg.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(cfg);
        }
    }
}

/// `json:"name,omitempty"` marks a field optional.
fn json_tag_is_optional(tag: &str) -> bool {
    TAG_PAIR
        .captures_iter(tag)
        .any(|p| &p["k"] == "json" && p["v"].split(',').skip(1).any(|o| o == "omitempty"))
}

fn push_endpoint(
    ctx: &AnalyzerContext,
    file: &SourceFile,
    out: &mut Vec<ExtractedEndpoint>,
    method: &str,
    path: &str,
    handler: Option<String>,
    line: usize,
    decorator: &str,
) {
    let mut ep = ExtractedEndpoint::new(method, path, &file.rel, line).with_handler(handler);
    ep.decorators.push(decorator.to_string());
    ep.source_link = ctx.source_link(&file.rel, Some(line));
    out.push(ep);
}

impl LanguageAnalyzer for GoAnalyzer {
    fn language_id(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn context(&self) -> &AnalyzerContext {
        &self.ctx
    }

    fn extract_models(&self) -> anyhow::Result<Vec<ExtractedModel>> {
        let files: Vec<SourceFile> = self
            .files()
            .into_iter()
            .filter(|f| !is_test_file(&f.rel))
            .collect();

        let mut models: Vec<ExtractedModel> = files.iter().flat_map(|f| self.file_models(f)).collect();

        // Receiver methods may live in any file of the package.
        for file in &files {
            for caps in RECEIVER_METHOD.captures_iter(&file.content) {
                let receiver = &caps["recv"];
                let signature = format!("{}{}", &caps["name"], caps["sig"].trim());
                if let Some(model) = models
                    .iter_mut()
                    .find(|m| m.name == receiver && m.model_type == ModelType::Struct)
                {
                    if model.methods.len() < MAX_METHODS {
                        model.methods.push(signature);
                    }
                }
            }
        }
        Ok(models)
    }

    fn extract_endpoints(&self) -> anyhow::Result<Vec<ExtractedEndpoint>> {
        let mut endpoints = Vec::new();
        for file in self.files() {
            let index = LineIndex::new(&file.content);

            for caps in METHOD_ROUTE.captures_iter(&file.content) {
                let Some(whole) = caps.get(0) else { continue };
                let method = caps["method"].to_ascii_uppercase();
                push_endpoint(
                    &self.ctx,
                    &file,
                    &mut endpoints,
                    &method,
                    &caps["path"],
                    capture(&caps, "handler"),
                    index.line_of(whole.start()),
                    "router",
                );
            }

            for caps in HANDLE_ROUTE.captures_iter(&file.content) {
                let Some(whole) = caps.get(0) else { continue };
                let line = index.line_of(whole.start());
                let decorator = if &caps["recv"] == "http" { "net_http" } else { "mux" };
                let methods: Vec<String> = caps
                    .name("methods")
                    .map(|m| {
                        QUOTED
                            .captures_iter(m.as_str())
                            .map(|q| q[1].to_ascii_uppercase())
                            .collect()
                    })
                    .unwrap_or_default();
                let methods = if methods.is_empty() {
                    vec!["ANY".to_string()]
                } else {
                    methods
                };
                for method in methods {
                    push_endpoint(
                        &self.ctx,
                        &file,
                        &mut endpoints,
                        &method,
                        &caps["path"],
                        capture(&caps, "handler"),
                        line,
                        decorator,
                    );
                }
            }
        }
        Ok(endpoints)
    }

    fn extract_side_effects(&self) -> anyhow::Result<Vec<ExtractedSideEffect>> {
        let mut effects = Vec::new();
        for file in self.files() {
            let mut dedup = Dedup::new();
            scan_side_effects(&self.ctx, &file, &SIDE_EFFECTS, &mut dedup, &mut effects);
        }
        Ok(effects)
    }

    fn extract_config(&self) -> anyhow::Result<Vec<ExtractedConfig>> {
        let mut config = Vec::new();
        for file in self.files() {
            let mut dedup = Dedup::new();
            self.struct_tag_config(&file, &mut dedup, &mut config);
            scan_config(&self.ctx, &file, &CONFIG, &mut dedup, &mut config);
        }
        Ok(config)
    }

    fn extract_dependencies(&self) -> anyhow::Result<Vec<ExtractedDependency>> {
        Ok(collect_dependencies(&self.ctx, &[ManifestKind::GoMod]))
    }
}

pub(super) fn install() {
    register(Language::Go, |ctx| Box::new(GoAnalyzer::new(ctx)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn analyzer_with(files: &[(&str, &str)]) -> (TempDir, GoAnalyzer) {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let ctx = AnalyzerContext::new(temp.path());
        (temp, GoAnalyzer::new(ctx))
    }

    #[test]
    fn test_config_struct_scenario() {
        let src = "package config\n\ntype Config struct { Port int `env:\"PORT\" default:\"8080\" help:\"listen port\"` }\n";
        let (_temp, analyzer) = analyzer_with(&[("config.go", src)]);

        let models = analyzer.extract_models().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "Config");
        assert_eq!(models[0].fields.len(), 1);
        assert_eq!(models[0].fields[0].name, "Port");
        assert_eq!(models[0].fields[0].field_type, "int");

        let config = analyzer.extract_config().unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(config[0].key, "PORT");
        assert_eq!(config[0].default.as_deref(), Some("8080"));
        assert_eq!(config[0].description.as_deref(), Some("listen port"));
        assert!(!config[0].required);
    }

    #[test]
    fn test_structs_interfaces_and_methods() {
        let src = r#"package user

// User is an account holder.
type User struct {
	ID    int64  `json:"id"`
	Email string `json:"email,omitempty"`
	Address struct {
		City string
	}
	BaseEntity
}

type Store interface {
	Get(ctx context.Context, id int64) (*User, error)
	Save(u *User) error
}

func (u *User) Validate() error {
	return nil
}
"#;
        let (_temp, analyzer) = analyzer_with(&[("user.go", src), ("user_test.go", "package user\ntype Fixture struct{}\n")]);
        let models = analyzer.extract_models().unwrap();
        assert_eq!(models.len(), 2);

        let user = &models[0];
        assert_eq!(user.description.as_deref(), Some("User is an account holder."));
        let names: Vec<_> = user.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["ID", "Email", "Address"]);
        assert!(user.fields[0].required);
        assert!(!user.fields[1].required);
        assert_eq!(user.fields[2].field_type, "struct");
        assert_eq!(user.parent.as_deref(), Some("BaseEntity"));
        assert_eq!(user.methods, vec!["Validate() error"]);

        let store = &models[1];
        assert_eq!(store.model_type, ModelType::Interface);
        assert_eq!(store.methods.len(), 2);
        assert!(store.methods[0].starts_with("Get(ctx"));
    }

    #[test]
    fn test_routes() {
        let src = r#"package main

func routes(r chi.Router, m *mux.Router, e *echo.Echo) {
	r.Get("/users/{id}", getUser)
	e.POST("/orders", h.CreateOrder)
	m.HandleFunc("/items", listItems).Methods("GET", "HEAD")
	http.HandleFunc("/health", health)
	resp, _ := client.Get("https://example.com")
}
"#;
        let (_temp, analyzer) = analyzer_with(&[("main.go", src)]);
        let endpoints = analyzer.extract_endpoints().unwrap();
        let found: Vec<_> = endpoints
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("GET", "/users/{id}"),
                ("POST", "/orders"),
                ("GET", "/items"),
                ("HEAD", "/items"),
                ("ANY", "/health"),
            ]
        );
        assert_eq!(endpoints[1].handler.as_deref(), Some("h.CreateOrder"));
        assert_eq!(endpoints[4].decorators, vec!["net_http"]);
    }

    #[test]
    fn test_side_effects_and_env() {
        let src = r#"package repo

func (r *Repo) Load(ctx context.Context) {
	rows, _ := r.db.QueryContext(ctx, "SELECT id FROM orders WHERE x = $1", 1)
	db.Exec("INSERT INTO audit (id) VALUES ($1)", 1)
	svc.PutItem(&dynamodb.PutItemInput{})
	rdb.Set(ctx, "k", "v", 0)
	port := os.Getenv("PORT")
	viper.SetDefault("log.level", "info")
	lvl := viper.GetString("log.level")
}
"#;
        let (_temp, analyzer) = analyzer_with(&[("repo.go", src)]);
        let effects = analyzer.extract_side_effects().unwrap();
        let summary: Vec<_> = effects
            .iter()
            .map(|e| (e.category, e.target.as_deref()))
            .collect();
        assert!(summary.contains(&(SideEffectCategory::Database, Some("orders"))));
        assert!(summary.contains(&(SideEffectCategory::Database, Some("audit"))));
        assert!(summary.contains(&(SideEffectCategory::Database, Some("dynamodb"))));
        assert!(summary.contains(&(SideEffectCategory::Cache, Some("redis"))));

        let config = analyzer.extract_config().unwrap();
        let keys: Vec<_> = config.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["log.level", "PORT"]);
        assert_eq!(config[0].default.as_deref(), Some("info"));
        assert!(config[1].required);
    }
}
