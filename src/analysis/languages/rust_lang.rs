//! Rust language analyzer.
//!
//! Extracts:
//! - Structs (named and tuple fields, serde attributes), enums and traits
//! - Impl methods and implemented traits, attached to their type
//! - Routes for Axum, Actix-web and Rocket
//! - sqlx, diesel, reqwest, filesystem, AWS SDK, Redis and lettre side effects
//! - Config from `std::env`, `env!`/`option_env!`, dotenvy and clap `env = ...`
//! - Cargo.toml dependencies

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{register, Language};
use crate::analysis::ast::{locate_type_declarations, AstLanguage};
use crate::analysis::blocks::{
    delimited_body, find_balanced, line_depth_delta, split_top_level_generic, LineIndex, Syntax,
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

static DECL: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?m)^[ \t]*(?P<vis>pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?(?P<kind>struct|enum|trait)\s+(?P<name>[A-Za-z_]\w*)",
    )
});

static TYPE_ALIAS: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?m)^(?:pub(?:\([^)]*\))?\s+)?type\s+(?P<name>[A-Za-z_]\w*)(?:<[^=]*>)?\s*=\s*(?P<value>[^;]+);")
});

static FIELD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?P<name>r#\w+|[a-z_]\w*)\s*:\s*(?P<type>.+)$")
});

static VARIANT: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"^\s*(?P<name>[A-Z]\w*)\s*(?P<rest>.*)$"));

static FN: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:(?:const|async|unsafe|default)\s+|extern\s+"[^"]*"\s+)*fn\s+(?P<name>\w+)"#,
    )
});

static NEXT_FN: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"\bfn\s+(?P<name>\w+)"));

static IMPL: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"(?m)^[ \t]*(?:unsafe\s+)?impl\b(?P<header>[^{;]*)\{"));

static DERIVE: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"^#\[derive\((?P<list>[^)]*)\)\]"));
static ATTR_NAME: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"^#\[(?P<name>[\w:]+)"));
static SERDE_DEFAULT: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r#"\bdefault(?:\s*=\s*"(?P<path>[^"]+)")?"#));

static AXUM_ROUTE: Lazy<Pattern> = Lazy::new(|| Pattern::new(r#"\.route\(\s*"(?P<path>[^"]+)"\s*,"#));

static METHOD_ROUTER: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?:^|[^\w])(?P<method>get|post|put|patch|delete|head|options|any)\s*\(\s*(?P<handler>[A-Za-z_][\w:]*)?")
});

static ACTIX_METHOD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"\bweb::(?P<method>get|post|put|patch|delete|head)\(\)\s*\.to\(\s*(?P<handler>[\w:]+)")
});

static ACTIX_RESOURCE: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r#"\bweb::resource\(\s*"(?P<path>[^"]+)"\s*\)"#));

static ATTR_ROUTE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"(?m)^\s*#\[(?:(?:actix_web|rocket)::)?(?P<method>get|post|put|patch|delete|head|options)\(\s*"(?P<path>[^"]+)"[^\]]*\]"#,
    )
});

static PATH_PARAM: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\{(?P<a>\w+)[^}]*\}|<(?P<b>\w+)(?:\.\.)?>|/:(?P<c>\w+)|/\*(?P<d>\w+)"));

static SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (
            r#"(?i)\bsqlx::query\w*!?\s*(?:::<[^>]*>)?\(\s*r?#?"(?:[^"]*?\b(?:FROM|INTO|UPDATE)\s+(?P<target>\w+))?"#,
            Database,
            "sqlx_query",
            "",
        ),
        (r"\bsqlx::(?:Pg|MySql|Sqlite|Any)Pool::connect\w*\(", Database, "connect", "sqlx"),
        (r"(?:^|[^:\w])(?P<op>query(?:_as|_scalar)?)!\(", Database, "query", ""),
        (
            r"\bdiesel::(?P<op>insert_into|update|delete)\(\s*(?P<target>\w+)",
            Database,
            "diesel",
            "",
        ),
        (r"\b(?:Pg|Mysql|Sqlite)Connection::establish\(", Database, "connect", "diesel"),
        (r"\breqwest::(?:blocking::)?get\(", Http, "get", "reqwest"),
        (r"\breqwest::(?:blocking::)?Client::(?:new|builder)\(\)", Http, "client", "reqwest"),
        (
            r#"\bclient\s*\.\s*(?P<op>get|post|put|patch|delete)\(\s*(?:"(?P<target>[^"]+)")?"#,
            Http,
            "request",
            "",
        ),
        (
            r"\btokio::fs::(?P<op>read_to_string|read|write|create_dir_all|remove_file|remove_dir_all|copy|rename|create_dir)\(",
            File,
            "fs",
            "",
        ),
        (
            r"(?:^|[^:\w])(?:std::)?fs::(?P<op>read_to_string|read|write|create_dir_all|remove_file|remove_dir_all|copy|rename|create_dir)\(",
            File,
            "fs",
            "",
        ),
        (r"\bFile::(?P<op>open|create)\(", File, "file", ""),
        (
            r"\baws_sdk_(?P<target>s3|dynamodb|sqs|sns|lambda|secretsmanager|ses|kinesis)::Client::new\(",
            CloudService,
            "client",
            "",
        ),
        (
            r"\.(?P<op>put_object|get_object|delete_object|list_objects_v2|head_object)\(\)",
            CloudService,
            "s3",
            "s3",
        ),
        (
            r"\.(?P<op>put_item|get_item|delete_item|update_item|batch_write_item)\(\)",
            Database,
            "dynamodb",
            "dynamodb",
        ),
        (r"\.(?P<op>send_message|receive_message)\(\)", Queue, "sqs", "sqs"),
        (r"\.publish\(\)\s*\.\s*topic_arn\(", Notification, "publish", "sns"),
        (r"\.invoke\(\)\s*\.\s*function_name\(", CloudService, "invoke", "lambda"),
        (r"\bredis::Client::open\(", Cache, "connect", "redis"),
        (r#"\bredis::cmd\(\s*"(?P<op>\w+)""#, Cache, "command", "redis"),
        (
            r"\b(?:con|conn|redis|redis_conn|cache)\s*\.\s*(?P<op>get|set|set_ex|del|incr|expire|hget|hset|lpush|rpush)\s*(?:::<[^>]*>)?\(",
            Cache,
            "command",
            "redis",
        ),
        (
            r"\b(?:Async)?SmtpTransport::(?:relay|starttls_relay|builder_dangerous)\(",
            Email,
            "smtp",
            "lettre",
        ),
        (r"\bbasic_publish\(", Queue, "publish", "amqp"),
        (r#"\bFutureRecord::to\(\s*&?\s*(?:"(?P<target>[^"]+)")?"#, Queue, "produce", "kafka"),
    ])
});

/// Lookups whose absence is handled by the caller.
static OPTIONAL_CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    config_rules(&[
        (r#"\boption_env!\(\s*"(?P<key>[^"]+)""#, "env"),
        (r#"\benv::var_os\(\s*"(?P<key>[^"]+)""#, "env"),
        (r#"\benv::var\(\s*"(?P<key>[^"]+)"\s*\)\s*\.\s*(?:ok|is_ok|is_err)\(\)"#, "env"),
    ])
});

static CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    config_rules(&[
        (
            r#"\benv::var\(\s*"(?P<key>[^"]+)"\s*\)(?:\s*\.\s*unwrap_or(?:_else)?\(\s*(?:\|[^|]*\|\s*)?"(?P<default>[^"]*)")?"#,
            "env",
        ),
        (r#"(?:^|[^_\w])env!\(\s*"(?P<key>[^"]+)""#, "compile_env"),
        (
            r#"\bdotenvy?::var\(\s*"(?P<key>[^"]+)"\s*\)(?:\s*\.\s*unwrap_or(?:_else)?\(\s*(?:\|[^|]*\|\s*)?"(?P<default>[^"]*)")?"#,
            "env",
        ),
        (
            r#"#\[(?:clap|arg)\([^\]]*?\benv\s*=\s*"(?P<key>[^"]+)"(?:[^\]]*?\bdefault_value(?:_t)?\s*=\s*"?(?P<default>[^",)\]]+)"?)?"#,
            "clap",
        ),
    ])
});

/// Rust analyzer.
pub struct RustAnalyzer {
    ctx: AnalyzerContext,
}

/// A type declaration header, from the AST locator or the regex fallback.
struct Header {
    kind: &'static str,
    name: String,
    start: usize,
    line: usize,
}

/// Methods and implemented traits gathered from `impl` blocks.
#[derive(Default)]
struct ImplInfo {
    methods: Vec<String>,
    traits: Vec<String>,
}

impl RustAnalyzer {
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

    fn headers(&self, content: &str, index: &LineIndex) -> Vec<Header> {
        if let Some(decls) = locate_type_declarations(AstLanguage::Rust, content) {
            return decls
                .into_iter()
                .map(|d| Header {
                    kind: d.kind,
                    name: d.name,
                    start: d.start,
                    line: d.line,
                })
                .collect();
        }
        DECL.captures_iter(content)
            .filter_map(|caps| {
                let name = caps.name("name")?;
                let kind = match &caps["kind"] {
                    "struct" => "struct",
                    "enum" => "enum",
                    _ => "trait",
                };
                Some(Header {
                    kind,
                    name: name.as_str().to_string(),
                    start: caps.get(0)?.start(),
                    line: index.line_of(name.start()),
                })
            })
            .collect()
    }

    fn file_models(&self, file: &SourceFile) -> Vec<ExtractedModel> {
        let content = &file.content;
        let index = LineIndex::new(content);
        let lines: Vec<&str> = content.lines().collect();
        let mut models = Vec::new();

        for header in self.headers(content, &index) {
            let Some(name_end) = name_end(content, &header) else { continue };
            let model_type = match header.kind {
                "enum" => ModelType::Enum,
                "trait" => ModelType::Trait,
                _ => ModelType::Struct,
            };
            let mut model = ExtractedModel::new(&header.name, model_type, &file.rel, header.line);
            let (attrs, doc) = preamble(&lines, header.line);
            model.description = doc;
            model.decorators = decorators(&attrs);

            let rest = &content[name_end..];
            if let Some(open) = rest.find(['{', '(', ';']) {
                let open_idx = name_end + open;
                match (model_type, &rest[open..open + 1]) {
                    (ModelType::Struct, "{") => {
                        if let Some(body) = delimited_body(content, open_idx, Syntax::RUST) {
                            parse_named_fields(body, &mut model);
                        }
                    }
                    (ModelType::Struct, "(") => {
                        if let Some(body) = delimited_body(content, open_idx, Syntax::RUST) {
                            parse_tuple_fields(body, &mut model);
                        }
                    }
                    (ModelType::Enum, "{") => {
                        if let Some(body) = delimited_body(content, open_idx, Syntax::RUST) {
                            parse_variants(body, &mut model);
                        }
                    }
                    (ModelType::Trait, "{") => {
                        if let Some(body) = delimited_body(content, open_idx, Syntax::RUST) {
                            model.methods = top_level_fns(body);
                        }
                    }
                    _ => {}
                }
            }
            model.source_link = self.ctx.source_link(&file.rel, Some(header.line));
            models.push(model);
        }

        for caps in TYPE_ALIAS.captures_iter(content) {
            let Some(name) = caps.name("name") else { continue };
            let line = index.line_of(name.start());
            let mut model = ExtractedModel::new(name.as_str(), ModelType::TypeAlias, &file.rel, line);
            model.parent = Some(caps["value"].trim().to_string());
            let (_, doc) = preamble(&lines, line);
            model.description = doc;
            model.source_link = self.ctx.source_link(&file.rel, Some(line));
            models.push(model);
        }
        models.sort_by_key(|m| m.line);
        models
    }

    /// Impl blocks across all files, keyed by the implementing type name.
    fn collect_impls(&self, files: &[SourceFile]) -> HashMap<String, ImplInfo> {
        let mut impls: HashMap<String, ImplInfo> = HashMap::new();
        for file in files {
            let content = &file.content;
            for caps in IMPL.captures_iter(content) {
                let Some(whole) = caps.get(0) else { continue };
                let Some((trait_name, type_name)) = impl_target(&caps["header"]) else {
                    continue;
                };
                let open_idx = whole.end() - 1;
                let Some(body) = delimited_body(content, open_idx, Syntax::RUST) else {
                    continue;
                };
                let info = impls.entry(type_name).or_default();
                if let Some(trait_name) = trait_name {
                    if !info.traits.contains(&trait_name) {
                        info.traits.push(trait_name);
                    }
                } else {
                    info.methods.extend(top_level_fns(body));
                }
            }
        }
        impls
    }

    fn file_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let content = &file.content;
        let index = LineIndex::new(content);

        for caps in AXUM_ROUTE.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let open_idx = whole.start() + ".route".len();
            let Some(args) = delimited_body(content, open_idx, Syntax::RUST) else {
                continue;
            };
            let path = &caps["path"];
            let line = index.line_of(whole.start());
            let methods = match args.split_once(',') {
                Some((_, rest)) => rest,
                None => continue,
            };
            let actix: Vec<_> = ACTIX_METHOD.captures_iter(methods).collect();
            if !actix.is_empty() {
                for m in actix {
                    out.push(self.endpoint(&m["method"], path, capture(&m, "handler"), "actix", file, line));
                }
                continue;
            }
            for m in METHOD_ROUTER.captures_iter(methods) {
                out.push(self.endpoint(&m["method"], path, capture(&m, "handler"), "axum", file, line));
            }
        }

        for caps in ACTIX_RESOURCE.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let rest = &content[whole.end()..];
            let segment_end = [rest.find("web::resource("), rest.find(';')]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(rest.len());
            let line = index.line_of(whole.start());
            for m in ACTIX_METHOD.captures_iter(&rest[..segment_end]) {
                out.push(self.endpoint(&m["method"], &caps["path"], capture(&m, "handler"), "actix", file, line));
            }
        }

        let framework = if content.contains("rocket") { "rocket" } else { "actix" };
        for caps in ATTR_ROUTE.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let handler = NEXT_FN
                .captures(&content[whole.end()..])
                .and_then(|c| capture(&c, "name"));
            let line = index.line_of(whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len()));
            out.push(self.endpoint(&caps["method"], &caps["path"], handler, framework, file, line));
        }
    }

    fn endpoint(
        &self,
        method: &str,
        path: &str,
        handler: Option<String>,
        framework: &str,
        file: &SourceFile,
        line: usize,
    ) -> ExtractedEndpoint {
        let mut ep = ExtractedEndpoint::new(method.to_ascii_uppercase(), path, &file.rel, line)
            .with_handler(handler)
            .with_decorator(framework);
        ep.parameters = path_parameters(path);
        ep.source_link = self.ctx.source_link(&file.rel, Some(line));
        ep
    }
}

/// Byte offset just past the declared name.
fn name_end(content: &str, header: &Header) -> Option<usize> {
    let text = content.get(header.start..)?;
    let kw = text.find(header.kind)? + header.kind.len();
    let name = text[kw..].find(header.name.as_str())?;
    Some(header.start + kw + name + header.name.len())
}

/// Attributes and `///` doc comment directly above the 1-indexed `decl_line`.
fn preamble(lines: &[&str], decl_line: usize) -> (Vec<String>, Option<String>) {
    let mut attrs = Vec::new();
    let mut docs = Vec::new();
    let mut idx = decl_line.saturating_sub(1);
    while idx > 0 {
        idx -= 1;
        let Some(line) = lines.get(idx).map(|l| l.trim()) else { break };
        if line.starts_with("#[") {
            attrs.push(line.to_string());
        } else if let Some(doc) = line.strip_prefix("///") {
            let doc = doc.trim();
            if !doc.is_empty() {
                docs.push(doc.to_string());
            }
        } else {
            break;
        }
    }
    attrs.reverse();
    docs.reverse();
    let doc = (!docs.is_empty()).then(|| docs.join(" "));
    (attrs, doc)
}

/// Derived traits plus the names of other outer attributes.
fn decorators(attrs: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for attr in attrs {
        if let Some(caps) = DERIVE.captures(attr) {
            out.extend(
                caps["list"]
                    .split(',')
                    .map(|d| d.trim().rsplit("::").next().unwrap_or("").to_string())
                    .filter(|d| !d.is_empty()),
            );
        } else if let Some(caps) = ATTR_NAME.captures(attr) {
            out.push(caps["name"].to_string());
        }
    }
    out
}

fn parse_named_fields(body: &str, model: &mut ExtractedModel) {
    let mut depth = 0;
    let mut attrs: Vec<&str> = Vec::new();
    let mut docs: Vec<&str> = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if depth == 0 {
            if let Some(doc) = trimmed.strip_prefix("///") {
                docs.push(doc.trim());
            } else if trimmed.starts_with("#[") {
                attrs.push(trimmed);
            } else if let Some(caps) = FIELD.captures(line) {
                if model.fields.len() < MAX_FIELDS {
                    let field_type = strip_trailing(&caps["type"]);
                    let mut field = ExtractedField::new(caps["name"].trim_start_matches("r#"), &field_type);
                    field.required = !field_type.starts_with("Option<");
                    let docs_text = docs.join(" ");
                    field.description = (!docs_text.trim().is_empty()).then(|| docs_text.trim().to_string());
                    apply_serde(&attrs, &mut field);
                    model.fields.push(field);
                }
                attrs.clear();
                docs.clear();
            } else if !trimmed.is_empty() && !trimmed.starts_with("//") {
                attrs.clear();
                docs.clear();
            }
        }
        depth = (depth + line_depth_delta(line, Syntax::RUST)).max(0);
    }
}

fn apply_serde(attrs: &[&str], field: &mut ExtractedField) {
    let serde: Vec<&str> = attrs
        .iter()
        .filter(|a| a.starts_with("#[serde("))
        .map(|a| a.trim_start_matches("#[").trim_end_matches(']'))
        .collect();
    if serde.is_empty() {
        return;
    }
    for attr in &serde {
        if let Some(caps) = SERDE_DEFAULT.captures(attr) {
            field.required = false;
            field.default = Some(match capture(&caps, "path") {
                Some(path) => format!("{}()", path),
                None => "Default::default()".to_string(),
            });
        }
    }
    field.tag = Some(serde.join(" "));
}

/// Type text without the trailing comma or line comment.
fn strip_trailing(raw: &str) -> String {
    let text = raw.split(" //").next().unwrap_or(raw);
    text.trim().trim_end_matches(',').trim().to_string()
}

fn parse_tuple_fields(body: &str, model: &mut ExtractedModel) {
    for (i, part) in split_top_level_generic(body, ',', Syntax::RUST)
        .into_iter()
        .take(MAX_FIELDS)
        .enumerate()
    {
        let ty = part.trim_start_matches("pub ").trim().to_string();
        let mut field = ExtractedField::new(i.to_string(), &ty);
        field.required = !ty.starts_with("Option<");
        model.fields.push(field);
    }
}

fn parse_variants(body: &str, model: &mut ExtractedModel) {
    let mut depth = 0;
    for line in body.lines() {
        let trimmed = line.trim();
        if depth == 0 && !trimmed.starts_with("//") && !trimmed.starts_with("#[") {
            if let Some(caps) = VARIANT.captures(line) {
                if model.fields.len() >= MAX_FIELDS {
                    break;
                }
                let rest = caps["rest"].trim();
                let shape = match rest.chars().next() {
                    Some('(') => "tuple",
                    Some('{') => "struct",
                    _ => "unit",
                };
                let mut field = ExtractedField::new(&caps["name"], shape);
                field.required = false;
                field.default = rest
                    .strip_prefix('=')
                    .map(|v| v.trim().trim_end_matches(',').trim().to_string());
                model.fields.push(field);
            }
        }
        depth = (depth + line_depth_delta(line, Syntax::RUST)).max(0);
    }
}

/// Names of `fn` items at the top level of an impl or trait body.
fn top_level_fns(body: &str) -> Vec<String> {
    let mut depth = 0;
    let mut names = Vec::new();
    for line in body.lines() {
        if depth == 0 {
            if let Some(caps) = FN.captures(line) {
                if names.len() < MAX_METHODS {
                    names.push(caps["name"].to_string());
                }
            }
        }
        depth = (depth + line_depth_delta(line, Syntax::RUST)).max(0);
    }
    names
}

/// `(trait, type)` named by an impl header such as `<T> Display for Wrapper<T>`.
fn impl_target(header: &str) -> Option<(Option<String>, String)> {
    let header = header.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut text = header.as_str();
    if text.starts_with('<') {
        let close = find_balanced(text, 0, '<', '>', Syntax::RUST)?;
        text = text[close + 1..].trim();
    }
    let text = text.split(" where ").next().unwrap_or(text).trim();
    match text.split_once(" for ") {
        Some((trait_part, type_part)) => Some((base_name(trait_part), base_name(type_part)?)),
        None => Some((None, base_name(text)?)),
    }
}

fn base_name(ty: &str) -> Option<String> {
    let ty = ty.trim().trim_start_matches('&').trim_start_matches("mut ").trim();
    let ty = ty.split('<').next()?;
    let name = ty.rsplit("::").next()?.trim();
    (!name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')).then(|| name.to_string())
}

fn path_parameters(path: &str) -> Vec<String> {
    PATH_PARAM
        .captures_iter(path)
        .filter_map(|c| {
            capture(&c, "a")
                .or_else(|| capture(&c, "b"))
                .or_else(|| capture(&c, "c"))
                .or_else(|| capture(&c, "d"))
        })
        .collect()
}

impl LanguageAnalyzer for RustAnalyzer {
    fn language_id(&self) -> &'static str {
        "rust"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["rs"]
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
        let impls = self.collect_impls(&files);
        let mut models: Vec<ExtractedModel> = files.iter().flat_map(|f| self.file_models(f)).collect();

        for model in &mut models {
            if !matches!(model.model_type, ModelType::Struct | ModelType::Enum) {
                continue;
            }
            let Some(info) = impls.get(&model.name) else { continue };
            for method in &info.methods {
                if model.methods.len() >= MAX_METHODS {
                    break;
                }
                model.methods.push(method.clone());
            }
            model.interfaces.extend(info.traits.iter().cloned());
        }
        Ok(models)
    }

    fn extract_endpoints(&self) -> anyhow::Result<Vec<ExtractedEndpoint>> {
        let mut endpoints = Vec::new();
        for file in self.files() {
            self.file_endpoints(&file, &mut endpoints);
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
            let before = config.len();
            scan_config(&self.ctx, &file, &OPTIONAL_CONFIG, &mut dedup, &mut config);
            for cfg in &mut config[before..] {
                cfg.required = false;
            }
            scan_config(&self.ctx, &file, &CONFIG, &mut dedup, &mut config);
        }
        Ok(config)
    }

    fn extract_dependencies(&self) -> anyhow::Result<Vec<ExtractedDependency>> {
        Ok(collect_dependencies(&self.ctx, &[ManifestKind::CargoToml]))
    }
}

pub(super) fn install() {
    register(Language::Rust, |ctx| Box::new(RustAnalyzer::new(ctx)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn analyzer_with(files: &[(&str, &str)]) -> (TempDir, RustAnalyzer) {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let ctx = AnalyzerContext::new(temp.path());
        (temp, RustAnalyzer::new(ctx))
    }

    const MODELS: &str = r#"use serde::{Deserialize, Serialize};

/// A registered user, unique by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    /// Login email, lower-cased.
    pub email: String,
    pub nickname: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default = "default_quota")]
    quota: u32,
}

pub struct UserId(pub u64);

pub enum Role {
    Admin,
    Member { since: u32 },
    Guest = 9,
}

pub trait UserStore {
    fn get(&self, id: u64) -> Option<User>;
    fn put(&mut self, user: User) {
        let _ = user;
    }
}

pub type Users = Vec<User>;

impl User {
    pub fn new(id: u64, email: String) -> Self {
        Self { id, email, nickname: None, roles: vec![], quota: 1 }
    }

    pub async fn reload(&mut self) {}
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.email)
    }
}
"#;

    #[test]
    fn test_structs_enums_traits() {
        let (_temp, analyzer) = analyzer_with(&[("src/model.rs", MODELS)]);
        let models = analyzer.extract_models().unwrap();
        let names: Vec<_> = models.iter().map(|m| (m.name.as_str(), m.model_type)).collect();
        assert_eq!(
            names,
            vec![
                ("User", ModelType::Struct),
                ("UserId", ModelType::Struct),
                ("Role", ModelType::Enum),
                ("UserStore", ModelType::Trait),
                ("Users", ModelType::TypeAlias),
            ]
        );

        let user = &models[0];
        assert_eq!(user.description.as_deref(), Some("A registered user, unique by email."));
        assert_eq!(user.decorators, vec!["Debug", "Clone", "Serialize", "Deserialize", "serde"]);
        assert_eq!(user.methods, vec!["new", "reload"]);
        assert_eq!(user.interfaces, vec!["Display"]);

        let fields: Vec<_> = user
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type.as_str(), f.required))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("id", "u64", true),
                ("email", "String", true),
                ("nickname", "Option<String>", false),
                ("roles", "Vec<Role>", false),
                ("quota", "u32", false),
            ]
        );
        assert_eq!(user.fields[1].description.as_deref(), Some("Login email, lower-cased."));
        assert_eq!(user.fields[4].default.as_deref(), Some("default_quota()"));

        assert_eq!(models[1].fields[0].field_type, "u64");
        let variants: Vec<_> = models[2].fields.iter().map(|f| (f.name.as_str(), f.field_type.as_str())).collect();
        assert_eq!(variants, vec![("Admin", "unit"), ("Member", "struct"), ("Guest", "unit")]);
        assert_eq!(models[2].fields[2].default.as_deref(), Some("9"));
        assert_eq!(models[3].methods, vec!["get", "put"]);
        assert_eq!(models[4].parent.as_deref(), Some("Vec<User>"));
    }

    #[test]
    fn test_axum_actix_and_rocket_routes() {
        let axum = r#"
pub fn router() -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", routing::delete(handlers::remove_user))
}
"#;
        let actix = r#"
#[get("/health")]
async fn health() -> impl Responder { "ok" }

fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/orders/{id}").route(web::get().to(get_order)).route(web::put().to(update_order)));
}
"#;
        let (_temp, analyzer) = analyzer_with(&[("src/routes.rs", axum), ("src/web.rs", actix)]);
        let endpoints = analyzer.extract_endpoints().unwrap();
        let found: Vec<_> = endpoints
            .iter()
            .map(|e| {
                (
                    e.method.as_str(),
                    e.path.as_str(),
                    e.handler.as_deref(),
                    e.decorators[0].as_str(),
                )
            })
            .collect();
        assert_eq!(
            found,
            vec![
                ("GET", "/users", Some("list_users"), "axum"),
                ("POST", "/users", Some("create_user"), "axum"),
                ("DELETE", "/users/:id", Some("handlers::remove_user"), "axum"),
                ("GET", "/orders/{id}", Some("get_order"), "actix"),
                ("PUT", "/orders/{id}", Some("update_order"), "actix"),
                ("GET", "/health", Some("health"), "actix"),
            ]
        );
        assert_eq!(endpoints[2].parameters, vec!["id"]);
        assert_eq!(endpoints[3].parameters, vec!["id"]);
    }

    #[test]
    fn test_side_effects_and_config() {
        let src = r#"
async fn run(pool: &PgPool, client: &reqwest::Client) -> anyhow::Result<()> {
    let url = std::env::var("DATABASE_URL")?;
    let level = env::var("LOG_LEVEL").unwrap_or("info".to_string());
    let debug = env::var("DEBUG").is_ok();
    let version = env!("CARGO_PKG_VERSION");
    let rows = sqlx::query("SELECT id FROM orders WHERE id = $1").fetch_all(pool).await?;
    client.post("https://hooks.example.com/notify").send().await?;
    tokio::fs::write("/tmp/out.json", b"{}").await?;
    let s3 = aws_sdk_s3::Client::new(&config);
    s3.put_object().bucket("b").send().await?;
    Ok(())
}
"#;
        let (_temp, analyzer) = analyzer_with(&[("src/jobs.rs", src)]);
        let effects = analyzer.extract_side_effects().unwrap();
        let summary: Vec<_> = effects
            .iter()
            .map(|e| (e.category, e.operation.as_str(), e.target.as_deref()))
            .collect();
        assert!(summary.contains(&(SideEffectCategory::Database, "sqlx_query", Some("orders"))));
        assert!(summary.contains(&(SideEffectCategory::Http, "post", Some("https://hooks.example.com/notify"))));
        assert!(summary.contains(&(SideEffectCategory::File, "write", None)));
        assert!(summary.contains(&(SideEffectCategory::CloudService, "client", Some("s3"))));
        assert!(summary.contains(&(SideEffectCategory::CloudService, "put_object", Some("s3"))));

        let config = analyzer.extract_config().unwrap();
        let keys: Vec<_> = config
            .iter()
            .map(|c| (c.key.as_str(), c.source.as_str(), c.required, c.default.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("DEBUG", "env", false, None),
                ("DATABASE_URL", "env", true, None),
                ("LOG_LEVEL", "env", false, Some("info")),
                ("CARGO_PKG_VERSION", "compile_env", true, None),
            ]
        );
    }

    #[test]
    fn test_cargo_dependencies() {
        let manifest = "[package]\nname = \"svc\"\n\n[dependencies]\naxum = \"0.7\"\n";
        let (_temp, analyzer) = analyzer_with(&[("Cargo.toml", manifest), ("src/main.rs", "fn main() {}\n")]);
        let deps = analyzer.extract_dependencies().unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "axum");
        assert_eq!(deps[0].version.as_deref(), Some("0.7"));
    }
}
