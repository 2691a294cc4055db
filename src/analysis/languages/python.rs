//! Python language analyzer.
//!
//! Class bodies are isolated by indentation. Class kinds are inferred from
//! decorators and base classes: `@dataclass`, pydantic `BaseModel` and
//! `BaseSettings`, `Enum`, `Protocol` and `TypedDict`.

use std::collections::HashMap;
use std::ops::Range;

use once_cell::sync::Lazy;

use super::{register, Language};
use crate::analysis::ast::{locate_type_declarations, AstLanguage};
use crate::analysis::blocks::{
    find_balanced, find_indented_block, indentation, split_top_level, unquote, LineIndex, Syntax,
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

static CLASS_LINE: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"(?m)^[ \t]*class\s+\w+"));

static CLASS_HEAD: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^[ \t]*class\s+(?P<name>\w+)\s*(?:\[[^\]]*\])?\s*"));

static DECORATOR: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"^\s*@(?P<name>[\w.]+)"));

static DEF: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"^\s*(?:async\s+)?def\s+(?P<name>\w+)\s*\((?P<params>[^)]*)(?P<close>\))?")
});

static ANNOTATED: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?P<name>[A-Za-z_]\w*)\s*:\s*(?P<type>[^=#]+?)\s*(?:=\s*(?P<default>[^#]+?))?\s*(?:#\s*(?P<comment>.*))?$",
    )
});

static ASSIGNMENT: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"^\s*(?P<name>[A-Za-z_]\w*)\s*=\s*(?P<value>.+?)\s*(?:#.*)?$")
});

static FIELD_ARG_DEFAULT: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\bdefault\s*=\s*(?P<v>[^,)]+)"));

static FIELD_ARG_FACTORY: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\bdefault_factory\s*=\s*(?P<v>[^,)]+)"));

static FIELD_ARG_DESCRIPTION: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r#"\bdescription\s*=\s*['"](?P<v>[^'"]*)['"]"#));

static ENV_PREFIX: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r#"\benv_prefix\s*=\s*['"](?P<p>[^'"]*)['"]"#));

static ROUTE_DECORATOR: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"(?m)^[ \t]*@(?P<recv>\w+)\.(?P<method>route|api_route|get|post|put|patch|delete|options|head|websocket)\(\s*[rfb]?['"](?P<path>[^'"]*)['"](?P<args>[^\n]*)"#,
    )
});

static METHODS_ARG: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\bmethods\s*=\s*[\[(](?P<m>[^\])]*)[\])]"));

static ROUTER_PREFIX: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"(?m)^(?P<var>\w+)\s*=\s*(?:APIRouter|Blueprint)\([^)]*?\b(?:url_)?prefix\s*=\s*['"](?P<prefix>[^'"]*)['"]"#,
    )
});

static NEXT_DEF: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"\bdef\s+(?P<name>\w+)"));

static DJANGO_PATH: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"(?m)(?:^|[\s(\[,=])(?:re_path|path|url)\(\s*r?['"](?P<path>[^'"]*)['"]\s*,\s*(?P<view>[\w.]+(?:\.as_view\(\))?)"#,
    )
});

static PATH_PARAM: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\{(?P<a>\w+)(?::[^}]*)?\}|<(?:\w+:)?(?P<b>\w+)>"));

static QUOTED: Lazy<Pattern> = Lazy::new(|| Pattern::new(r#"['"]([^'"]+)['"]"#));

static SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (
            r"\b\w*session\.(?P<op>query|add_all|add|delete|commit|merge|execute|flush)\(\s*(?P<target>[A-Z]\w*)?",
            Database,
            "session",
            "",
        ),
        (
            r#"\b(?:cursor|cur|conn|connection|engine|db)\.(?P<op>executemany|execute)\(\s*(?:f?(?:'''|"""|'|")[^'"]*?\b(?i:from|into|update)\s+(?P<target>\w+))?"#,
            Database,
            "execute",
            "",
        ),
        (
            r"\b(?P<target>[A-Z]\w+)\.objects\.(?P<op>filter|get_or_create|update_or_create|get|create|all|exclude|update|delete|bulk_create|values|count|first)\(",
            Database,
            "orm",
            "",
        ),
        (
            r#"\b(?:requests|httpx)\.(?P<op>get|post|put|patch|delete|head|request)\(\s*(?:f?['"](?P<target>[^'"]+)['"])?"#,
            Http,
            "request",
            "",
        ),
        (r"\b(?:httpx\.(?:Async)?Client|aiohttp\.ClientSession)\(", Http, "client", ""),
        (r#"\burlopen\(\s*(?:f?['"](?P<target>[^'"]+)['"])?"#, Http, "urlopen", ""),
        (r#"\bboto3\.(?:client|resource)\(\s*['"]s3['"]"#, CloudService, "client", "s3"),
        (r#"\bboto3\.(?:client|resource)\(\s*['"]dynamodb['"]"#, Database, "client", "dynamodb"),
        (r#"\bboto3\.(?:client|resource)\(\s*['"]sqs['"]"#, Queue, "client", "sqs"),
        (r#"\bboto3\.(?:client|resource)\(\s*['"]sns['"]"#, Notification, "client", "sns"),
        (r#"\bboto3\.(?:client|resource)\(\s*['"]lambda['"]"#, CloudService, "client", "lambda"),
        (r#"\bboto3\.(?:client|resource)\(\s*['"]ses['"]"#, Email, "client", "ses"),
        (r#"\bboto3\.(?:client|resource)\(\s*['"]kinesis['"]"#, Queue, "client", "kinesis"),
        (
            r#"\bboto3\.(?:client|resource)\(\s*['"](?P<target>secretsmanager|ssm|stepfunctions|events|sts|ecs|cloudwatch)['"]"#,
            CloudService,
            "client",
            "",
        ),
        (
            r"\.(?P<op>put_object|get_object|upload_file|download_file|delete_object|upload_fileobj)\(",
            CloudService,
            "s3",
            "s3",
        ),
        (
            r"\b\w*(?:table|dynamodb)\w*\.(?P<op>put_item|get_item|update_item|delete_item|batch_write_item|query|scan)\(",
            Database,
            "dynamodb",
            "dynamodb",
        ),
        (
            r"\.(?P<op>send_message_batch|send_message|receive_message|delete_message)\(",
            Queue,
            "sqs",
            "sqs",
        ),
        (r"\b\w*sns\w*\.publish\(", Notification, "publish", "sns"),
        (r"\.invoke\(\s*FunctionName\s*=", CloudService, "invoke", "lambda"),
        (r#"\bopen\(\s*(?:f?['"](?P<target>[^'"]+)['"])?"#, File, "open", ""),
        (r"\.(?P<op>write_text|write_bytes|read_text|read_bytes)\(", File, "path", ""),
        (r"\bshutil\.(?P<op>copy2|copyfile|copy|move|rmtree)\(", File, "shutil", ""),
        (r"\bos\.(?P<op>remove|unlink|makedirs|rename)\(", File, "os", ""),
        (r"\bredis\.(?:Redis|StrictRedis|from_url)\(", Cache, "connect", "redis"),
        (
            r"\b\w*[Rr]edis\w*\.(?P<op>get|set|setex|delete|hget|hset|incr|expire|lpush|rpush|publish)\(",
            Cache,
            "redis",
            "redis",
        ),
        (r"\bcache\.(?P<op>get|set|delete|get_or_set)\(", Cache, "cache", "cache"),
        (r"\bsmtplib\.SMTP(?:_SSL)?\(", Email, "smtp", "smtp"),
        (r"\.sendmail\(", Email, "sendmail", "smtp"),
        (r"\bsend_mail\(", Email, "send_mail", "django"),
        (r"\b\w+\.(?P<op>delay|apply_async)\(", Queue, "task", "celery"),
    ])
});

static CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    config_rules(&[
        (
            r#"\bos\.environ\.get\(\s*['"](?P<key>\w+)['"]\s*(?:,\s*(?P<default>[^)]+?)\s*)?\)"#,
            "env",
        ),
        (
            r#"\bos\.getenv\(\s*['"](?P<key>\w+)['"]\s*(?:,\s*(?P<default>[^)]+?)\s*)?\)"#,
            "env",
        ),
        (r#"\bos\.environ\[\s*['"](?P<key>\w+)['"]\s*\]"#, "env"),
        (
            r#"\bconfig\(\s*['"](?P<key>[A-Z][A-Z0-9_]*)['"]\s*(?:,\s*default\s*=\s*(?P<default>[^,)]+))?"#,
            "decouple",
        ),
    ])
});

/// A parsed class with the line range of its body.
struct ClassBlock {
    model: ExtractedModel,
    bases: Vec<String>,
    body: Range<usize>,
}

/// Python language analyzer.
pub struct PythonAnalyzer {
    ctx: AnalyzerContext,
}

impl PythonAnalyzer {
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

    fn classes(&self, file: &SourceFile) -> Vec<ClassBlock> {
        let content = &file.content;
        let index = LineIndex::new(content);
        let lines: Vec<&str> = content.lines().collect();
        let starts = line_starts(content);

        let headers: Vec<usize> = match locate_type_declarations(AstLanguage::Python, content) {
            Some(decls) => decls.iter().map(|d| d.line.saturating_sub(1)).collect(),
            None => CLASS_LINE
                .find_iter(content)
                .map(|m| index.line_of(m.start()) - 1)
                .collect(),
        };

        headers
            .into_iter()
            .filter_map(|idx| self.parse_class(file, &lines, &starts, &index, idx))
            .collect()
    }

    fn parse_class(
        &self,
        file: &SourceFile,
        lines: &[&str],
        starts: &[usize],
        index: &LineIndex,
        idx: usize,
    ) -> Option<ClassBlock> {
        let content = &file.content;
        let line_start = *starts.get(idx)?;
        let caps = CLASS_HEAD.captures(&content[line_start..])?;
        let name = caps["name"].to_string();
        let header_indent = indentation(lines.get(idx)?);

        // Inner configuration classes are not models of their own.
        if header_indent > 0 && matches!(name.as_str(), "Config" | "Meta") {
            return None;
        }

        let mut pos = line_start + caps.get(0)?.end();
        let mut bases = Vec::new();
        if content[pos..].starts_with('(') {
            let close = find_balanced(content, pos, '(', ')', Syntax::HASH)?;
            bases = split_top_level(&content[pos + 1..close], ',', Syntax::HASH)
                .into_iter()
                .map(|b| b.trim().to_string())
                .filter(|b| !b.is_empty() && !b.contains('='))
                .collect();
            pos = close + 1;
        }
        let header_end = index.line_of(pos) - 1;
        let body = find_indented_block(lines, header_end);

        let decorators = decorators_above(lines, idx);
        let short: Vec<&str> = bases.iter().map(|b| short_name(b)).collect();
        let model_type = if decorators.iter().any(|d| short_name(d) == "dataclass") {
            ModelType::Dataclass
        } else if short.iter().any(|b| matches!(*b, "BaseModel" | "BaseSettings")) {
            ModelType::Pydantic
        } else if short
            .iter()
            .any(|b| matches!(*b, "Enum" | "IntEnum" | "StrEnum" | "Flag" | "IntFlag"))
        {
            ModelType::Enum
        } else if short.contains(&"Protocol") {
            ModelType::Protocol
        } else if short.contains(&"TypedDict") {
            ModelType::Schema
        } else {
            ModelType::Class
        };

        let mut model = ExtractedModel::new(name, model_type, &file.rel, idx + 1);
        model.decorators = decorators;
        let mut inherited = bases
            .iter()
            .filter(|b| b.as_str() != "object" && !b.starts_with("Generic["))
            .cloned();
        model.parent = inherited.next();
        model.interfaces = inherited.collect();

        parse_body(&lines[body.clone()], &mut model);
        model.source_link = self.ctx.source_link(&file.rel, Some(idx + 1));
        Some(ClassBlock { model, bases, body })
    }

    /// Fields of `BaseSettings` subclasses, read from the environment.
    fn settings_config(&self, file: &SourceFile, dedup: &mut Dedup, out: &mut Vec<ExtractedConfig>) {
        let lines: Vec<&str> = file.content.lines().collect();
        for class in self.classes(file) {
            if !class.bases.iter().any(|b| short_name(b) == "BaseSettings") {
                continue;
            }
            let body_text = lines[class.body.clone()].join("\n");
            let prefix = ENV_PREFIX
                .captures(&body_text)
                .map(|c| c["p"].to_string())
                .unwrap_or_default();
            for field in &class.model.fields {
                let key = format!("{}{}", prefix, field.name).to_ascii_uppercase();
                if !dedup.config(&key) {
                    continue;
                }
                let line = lines[class.body.clone()]
                    .iter()
                    .position(|l| l.trim_start().starts_with(&format!("{}:", field.name)))
                    .map(|p| class.body.start + p + 1)
                    .unwrap_or(class.model.line);
                let mut cfg = ExtractedConfig::new(key, "pydantic_settings", &file.rel, line);
                cfg.default = field.default.clone();
                cfg.description = field.description.clone();
                cfg.required = field.required;
                cfg.source_link = self.ctx.source_link(&file.rel, Some(line));
                out.push(cfg);
            }
        }
    }

    fn decorator_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let content = &file.content;
        let index = LineIndex::new(content);
        let prefixes: HashMap<String, String> = ROUTER_PREFIX
            .captures_iter(content)
            .map(|c| (c["var"].to_string(), c["prefix"].to_string()))
            .collect();
        let framework = if content.contains("fastapi") {
            "fastapi"
        } else if content.contains("flask") {
            "flask"
        } else {
            "router"
        };

        for caps in ROUTE_DECORATOR.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let methods: Vec<String> = match &caps["method"] {
                "route" | "api_route" => METHODS_ARG
                    .captures(&caps["args"])
                    .map(|m| {
                        QUOTED
                            .captures_iter(&m["m"])
                            .map(|q| q[1].to_ascii_uppercase())
                            .collect()
                    })
                    .filter(|m: &Vec<String>| !m.is_empty())
                    .unwrap_or_else(|| vec!["GET".to_string()]),
                other => vec![other.to_ascii_uppercase()],
            };
            let prefix = prefixes.get(&caps["recv"]).map(String::as_str).unwrap_or("");
            let path = join_route(prefix, &caps["path"]);
            let handler = NEXT_DEF
                .captures(&content[whole.end()..])
                .map(|c| c["name"].to_string());
            let line = index.line_of(whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len()));

            for method in methods {
                let mut ep = ExtractedEndpoint::new(method, path.clone(), &file.rel, line)
                    .with_handler(handler.clone())
                    .with_decorator(framework);
                ep.parameters = path_parameters(&path);
                ep.source_link = self.ctx.source_link(&file.rel, Some(line));
                out.push(ep);
            }
        }
    }

    fn django_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        if !(file.file_name() == "urls.py" || file.content.contains("urlpatterns")) {
            return;
        }
        let index = LineIndex::new(&file.content);
        for caps in DJANGO_PATH.captures_iter(&file.content) {
            let Some(path) = caps.name("path") else { continue };
            let raw = path.as_str().trim_start_matches('^').trim_end_matches('$');
            let route = format!("/{}", raw.trim_start_matches('/'));
            let line = index.line_of(path.start());
            let mut ep = ExtractedEndpoint::new("ANY", route.clone(), &file.rel, line)
                .with_handler(capture(&caps, "view"))
                .with_decorator("django");
            ep.parameters = path_parameters(&route);
            ep.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(ep);
        }
    }
}

/// Byte offset of the start of each line.
fn line_starts(content: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(content.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Last dotted segment without generic arguments: `models.Model` → `Model`.
fn short_name(name: &str) -> &str {
    let name = name.split('[').next().unwrap_or(name);
    let name = name.split('(').next().unwrap_or(name);
    name.rsplit('.').next().unwrap_or(name).trim()
}

fn decorators_above(lines: &[&str], idx: usize) -> Vec<String> {
    let mut found = Vec::new();
    let mut i = idx;
    while i > 0 {
        i -= 1;
        let Some(caps) = lines.get(i).and_then(|l| DECORATOR.captures(l)) else {
            break;
        };
        found.push(caps["name"].to_string());
    }
    found.reverse();
    found
}

fn is_optional(type_hint: &str) -> bool {
    let t = type_hint.replace(' ', "");
    t.starts_with("Optional[") || t.contains("|None") || t.starts_with("None|") || t == "Any"
}

/// Default, description and explicit requiredness of a `Field(...)` value.
fn field_spec(raw: &str) -> (Option<String>, Option<String>, bool) {
    let Some(args) = raw.strip_prefix("Field(") else {
        return (Some(raw.to_string()), None, false);
    };
    let args = args.strip_suffix(')').unwrap_or(args).trim();
    let description = FIELD_ARG_DESCRIPTION.captures(args).map(|c| c["v"].to_string());
    if args.starts_with("...") {
        return (None, description, true);
    }
    let default = FIELD_ARG_DEFAULT
        .captures(args)
        .map(|c| c["v"].trim().to_string())
        .or_else(|| {
            FIELD_ARG_FACTORY
                .captures(args)
                .map(|c| format!("{}()", c["v"].trim()))
        })
        .or_else(|| {
            split_top_level(args, ',', Syntax::HASH)
                .into_iter()
                .next()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty() && !a.contains('='))
        });
    (default, description, false)
}

fn docstring(body: &[&str]) -> Option<String> {
    let first = body.iter().position(|l| !l.trim().is_empty())?;
    let opening = body[first].trim();
    let opening = opening.trim_start_matches(['r', 'u', 'R', 'U']);
    let quote = ["\"\"\"", "'''"].into_iter().find(|q| opening.starts_with(q))?;
    let rest = &opening[quote.len()..];
    if let Some(end) = rest.find(quote) {
        return Some(rest[..end].trim().to_string()).filter(|s| !s.is_empty());
    }

    let mut parts = vec![rest.trim().to_string()];
    for line in &body[first + 1..] {
        let text = line.trim();
        if let Some(end) = text.find(quote) {
            parts.push(text[..end].trim().to_string());
            break;
        }
        if text.is_empty() && parts.iter().any(|p| !p.is_empty()) {
            break;
        }
        parts.push(text.to_string());
    }
    let joined = parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn parse_body(body: &[&str], model: &mut ExtractedModel) {
    model.description = docstring(body);
    let Some(body_indent) = body
        .iter()
        .find(|l| !l.trim().is_empty())
        .map(|l| indentation(l))
    else {
        return;
    };

    for line in body {
        if line.trim().is_empty() || indentation(line) != body_indent {
            continue;
        }
        if let Some(caps) = DEF.captures(line) {
            if model.methods.len() < MAX_METHODS {
                let signature = if caps.name("close").is_some() {
                    format!("{}({})", &caps["name"], caps["params"].trim())
                } else {
                    format!("{}(...)", &caps["name"])
                };
                model.methods.push(signature);
            }
            continue;
        }
        if model.fields.len() >= MAX_FIELDS {
            continue;
        }
        if model.model_type == ModelType::Enum {
            if let Some(caps) = ASSIGNMENT.captures(line) {
                let value = caps["value"].to_string();
                let field_type = if value.starts_with(['"', '\'']) {
                    "str"
                } else if value.starts_with("auto(") {
                    "auto"
                } else {
                    "int"
                };
                let mut field = ExtractedField::new(&caps["name"], field_type);
                field.default = Some(unquote(&value).to_string());
                model.fields.push(field);
            }
            continue;
        }
        let Some(caps) = ANNOTATED.captures(line) else { continue };
        let type_hint = caps["type"].trim();
        if type_hint.starts_with("ClassVar") || &caps["name"] == "model_config" {
            continue;
        }
        let mut field = ExtractedField::new(&caps["name"], type_hint);
        let (default, description, explicit_required) = match capture(&caps, "default") {
            Some(raw) => field_spec(raw.trim()),
            None => (None, None, false),
        };
        field.required = explicit_required || (default.is_none() && !is_optional(type_hint));
        field.default = default;
        field.description = description.or_else(|| capture(&caps, "comment"));
        model.fields.push(field);
    }
}

fn join_route(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{}", path),
        (false, true) => format_prefix(prefix),
        (false, false) => format!("{}/{}", format_prefix(prefix), path),
    }
}

fn format_prefix(prefix: &str) -> String {
    if prefix.starts_with('/') {
        prefix.to_string()
    } else {
        format!("/{}", prefix)
    }
}

/// Path parameters in FastAPI (`{id}`), Flask (`<int:id>`) and Django
/// (`<slug:name>`) syntax.
fn path_parameters(path: &str) -> Vec<String> {
    PATH_PARAM
        .captures_iter(path)
        .filter_map(|c| capture(&c, "a").or_else(|| capture(&c, "b")))
        .collect()
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn context(&self) -> &AnalyzerContext {
        &self.ctx
    }

    fn extract_models(&self) -> anyhow::Result<Vec<ExtractedModel>> {
        Ok(self
            .files()
            .iter()
            .filter(|f| !is_test_file(&f.rel))
            .flat_map(|f| self.classes(f))
            .map(|c| c.model)
            .collect())
    }

    fn extract_endpoints(&self) -> anyhow::Result<Vec<ExtractedEndpoint>> {
        let mut endpoints = Vec::new();
        for file in self.files() {
            self.decorator_endpoints(&file, &mut endpoints);
            self.django_endpoints(&file, &mut endpoints);
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
            scan_config(&self.ctx, &file, &CONFIG, &mut dedup, &mut config);
            if file.content.contains("BaseSettings") {
                self.settings_config(&file, &mut dedup, &mut config);
            }
        }
        // `os.getenv("X", None)` supplies no default but is still optional.
        for cfg in &mut config {
            if cfg.default.as_deref() == Some("None") {
                cfg.default = None;
                cfg.required = false;
            }
        }
        Ok(config)
    }

    fn extract_dependencies(&self) -> anyhow::Result<Vec<ExtractedDependency>> {
        Ok(collect_dependencies(
            &self.ctx,
            &[ManifestKind::Requirements, ManifestKind::Pyproject],
        ))
    }
}

pub(super) fn install() {
    register(Language::Python, |ctx| Box::new(PythonAnalyzer::new(ctx)));
}
