//! TypeScript and JavaScript analyzer.
//!
//! One implementation serves both languages; the [`Language`] it was built
//! for selects the file extensions and the reported language id.
//!
//! Extracts:
//! - Interfaces, object type aliases, classes, enums and Zod schemas
//! - Express/Fastify/Hono routes, NestJS controllers and Next.js API files
//! - ORM, HTTP, AWS SDK, filesystem, Redis and mail side effects
//! - `process.env` and `import.meta.env` config

use once_cell::sync::Lazy;

use super::{register, Language};
use crate::analysis::ast::{locate_type_declarations, AstLanguage};
use crate::analysis::blocks::{find_brace_block, line_depth_delta, LineIndex, Syntax};
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

/// A TypeScript project also covers its plain JavaScript files.
const TS_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];
const JS_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs"];

const HTTP_VERBS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Header of a type declaration: keyword, name and everything up to `{`.
static DECL: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?m)^[ \t]*(?:export\s+)?(?:default\s+)?(?:declare\s+)?(?:abstract\s+)?(?:const\s+)?(?P<kind>interface|class|enum|type)\s+(?P<name>[A-Za-z_$][\w$]*)(?P<rest>[^{=;]*(?:=\s*)?)\{",
    )
});

static ZOD_SCHEMA: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?m)^[ \t]*(?:export\s+)?const\s+(?P<name>\w+)\s*=\s*z\.object\(\s*\{")
});

static EXTENDS: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"\bextends\s+(?P<names>[^{]+?)(?:\s+implements\b|$)"));
static IMPLEMENTS: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"\bimplements\s+(?P<names>[^{]+)"));
static DECORATOR: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"^\s*@(?P<name>[\w.]+)"));

static TYPE_MEMBER: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"^\s*(?:readonly\s+)?(?P<name>[A-Za-z_$][\w$]*|'[^']+'|"[^"]+")(?P<opt>\?)?\s*:\s*(?P<type>.+?)\s*[;,]?\s*(?://\s*(?P<comment>.*))?$"#,
    )
});

static TYPE_METHOD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"^\s*(?P<name>[A-Za-z_$][\w$]*)\??\s*(?:<[^>]*>)?\((?P<params>.*)\)\s*:\s*(?P<ret>.+?);?\s*$")
});

static CLASS_FIELD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?:(?:public|private|protected|readonly|static|declare|override)\s+)*(?P<name>[A-Za-z_$#][\w$]*)(?P<opt>[?!])?\s*(?::\s*(?P<type>[^=;]+?))?\s*(?:=\s*(?P<default>[^;]+?))?\s*;\s*$",
    )
});

static CLASS_METHOD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?:(?:public|private|protected|static|async|override|abstract|get|set)\s+)*(?P<name>[A-Za-z_$#][\w$]*)\s*(?:<[^>]*>)?\((?P<params>[^)]*)\)\s*(?::\s*(?P<ret>[^{;]+?))?\s*[{;]?\s*$",
    )
});

static ENUM_MEMBER: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^\s*(?P<name>[A-Za-z_$][\w$]*)\s*(?:=\s*(?P<value>[^,]+?))?\s*,?\s*$"));

static ZOD_FIELD: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^\s*(?P<name>\w+)\s*:\s*z\.(?P<type>\w+)\((?P<rest>.*)$"));

static ROUTE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"\b(?:app|router|server|api|fastify|hono|routes|r)\.(?P<method>get|post|put|patch|delete|options|head|all)\(\s*['"`](?P<path>/[^'"`]*)['"`]\s*(?:,\s*(?P<handler>[\w.]+)\s*[,)])?"#,
    )
});

static NEST_CONTROLLER: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"@Controller\(\s*(?:['"`](?P<prefix>[^'"`]*)['"`])?\s*\)"#)
});

static CLASS_KEYWORD: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"\bclass\s+\w+"));

static NEST_ROUTE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"@(?P<method>Get|Post|Put|Patch|Delete|Options|Head|All)\(\s*(?:['"`](?P<path>[^'"`]*)['"`])?\s*\)(?:\s*@\w+\([^)]*\))*\s*(?:public\s+|private\s+|protected\s+)?(?:async\s+)?(?P<handler>\w+)\s*\("#,
    )
});

static NEXT_EXPORT: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?m)^export\s+(?:async\s+function\s+|function\s+|const\s+)(?P<method>GET|POST|PUT|PATCH|DELETE|HEAD|OPTIONS)\b",
    )
});

/// Receivers that look like ORM models but are language built-ins.
const BUILTIN_RECEIVERS: &[&str] = &[
    "Object", "Array", "Promise", "Math", "JSON", "Date", "Reflect", "Number", "String", "Symbol",
    "Map", "Set", "React", "Buffer", "URL",
];

static SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (
            r"\bprisma\.(?P<target>\w+)\.(?P<op>findMany|findUnique|findFirst|create|createMany|update|updateMany|upsert|delete|deleteMany|count|aggregate)\(",
            Database,
            "prisma",
            "",
        ),
        (r"\bprisma\.\$(?P<op>queryRaw|executeRaw)", Database, "raw", "prisma"),
        (r"\bgetRepository\(\s*(?P<target>\w+)\s*\)", Database, "repository", ""),
        (
            r"\b\w*[Rr]epo(?:sitory)?\.(?P<op>save|find|findOne|findOneBy|findBy|insert|update|delete|remove|createQueryBuilder)\(",
            Database,
            "typeorm",
            "",
        ),
        (
            r"\b(?P<target>[A-Z]\w+)\.(?P<op>findAll|findByPk|findOne|findOrCreate|bulkCreate|destroy|create|findById|findOneAndUpdate|insertMany|updateOne|updateMany|deleteOne|deleteMany|aggregate|countDocuments)\(",
            Database,
            "model",
            "",
        ),
        (r#"\bmongoose\.model\(\s*['"](?P<target>\w+)['"]"#, Database, "model", ""),
        (r#"\bfetch\(\s*(?:['"`](?P<target>[^'"`]+)['"`])?"#, Http, "fetch", ""),
        (
            r#"\baxios\.(?P<op>get|post|put|patch|delete|request|head)\(\s*(?:['"`](?P<target>[^'"`]+)['"`])?"#,
            Http,
            "request",
            "",
        ),
        (r"\baxios\(\s*\{", Http, "request", "axios"),
        (r"\bnew\s+S3(?:Client)?\(", CloudService, "client", "s3"),
        (
            r"\bnew\s+(?P<op>PutObject|GetObject|DeleteObject|CopyObject|ListObjectsV2)Command\(",
            CloudService,
            "s3",
            "s3",
        ),
        (r"\bnew\s+(?:DynamoDB(?:Client)?|DocumentClient|DynamoDBDocumentClient)\(", Database, "client", "dynamodb"),
        (
            r"\bnew\s+(?P<op>PutItem|GetItem|UpdateItem|DeleteItem|BatchWriteItem|Put|Get|Query|Scan|Update|Delete)Command\(",
            Database,
            "dynamodb",
            "dynamodb",
        ),
        (r"\bnew\s+SQS(?:Client)?\(", Queue, "client", "sqs"),
        (
            r"\bnew\s+(?P<op>SendMessage|SendMessageBatch|ReceiveMessage|DeleteMessage)Command\(",
            Queue,
            "sqs",
            "sqs",
        ),
        (r"\bnew\s+(?:SNS(?:Client)?\(|PublishCommand\()", Notification, "publish", "sns"),
        (r"\bnew\s+(?:Lambda(?:Client)?\(|InvokeCommand\()", CloudService, "invoke", "lambda"),
        (r"\bnew\s+(?:SES(?:Client)?\(|SendEmailCommand\()", Email, "send_email", "ses"),
        (
            r#"\bfs(?:\.promises)?\.(?P<op>writeFileSync|writeFile|readFileSync|readFile|appendFileSync|appendFile|unlinkSync|unlink|mkdirSync|mkdir|createWriteStream|createReadStream|rmSync|rm)\(\s*(?:['"`](?P<target>[^'"`]+)['"`])?"#,
            File,
            "file",
            "",
        ),
        (
            r"\b\w*[Rr]edis\w*\.(?P<op>get|set|setex|del|hget|hset|hgetall|expire|incr|lpush|rpush|publish|subscribe)\(",
            Cache,
            "redis",
            "redis",
        ),
        (r"\bnew\s+(?:Redis|IORedis)\(", Cache, "connect", "redis"),
        (r"\bredis\.createClient\(", Cache, "connect", "redis"),
        (r"\bnodemailer\.createTransport\(", Email, "create_transport", "smtp"),
        (r"\b\w*[Tt]ransport(?:er)?\.sendMail\(", Email, "send_mail", "smtp"),
        (r#"\bnew\s+(?:Queue|Bull)\(\s*['"](?P<target>[^'"]+)['"]"#, Queue, "queue", ""),
    ])
});

static CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    const DEFAULT: &str = r#"(?:\s*(?:\|\||\?\?)\s*(?P<default>'[^']*'|"[^"]*"|`[^`]*`|[\w.-]+))?"#;
    let dotted = format!(r"\bprocess\.env\.(?P<key>[A-Za-z_]\w*){}", DEFAULT);
    let indexed = format!(r#"\bprocess\.env\[\s*['"](?P<key>[^'"]+)['"]\s*\]{}"#, DEFAULT);
    let meta = format!(r"\bimport\.meta\.env\.(?P<key>[A-Za-z_]\w*){}", DEFAULT);
    config_rules(&[
        (dotted.as_str(), "env"),
        (indexed.as_str(), "env"),
        (meta.as_str(), "import_meta"),
    ])
});

/// Analyzer for TypeScript and JavaScript sources.
pub struct TypeScriptAnalyzer {
    ctx: AnalyzerContext,
    language: Language,
}

/// A located declaration header.
struct Header {
    name: String,
    kind: String,
    rest: String,
    /// Offset of the declaration keyword line.
    start: usize,
}

impl TypeScriptAnalyzer {
    pub fn new(ctx: AnalyzerContext, language: Language) -> Self {
        Self { ctx, language }
    }

    fn files(&self) -> Vec<SourceFile> {
        self.ctx
            .source_files(self.file_extensions())
            .into_iter()
            .take(MAX_FILES_PER_CATEGORY)
            .collect()
    }

    fn ast_language(&self, file: &SourceFile) -> AstLanguage {
        match (self.language, file.extension()) {
            (Language::TypeScript, "tsx") => AstLanguage::Tsx,
            (Language::TypeScript, "ts") => AstLanguage::TypeScript,
            _ => AstLanguage::JavaScript,
        }
    }

    /// Declaration headers. The AST locator picks the declarations; the
    /// header pattern then reads their `extends`/`implements` clauses.
    fn headers(&self, file: &SourceFile) -> Vec<Header> {
        let content = &file.content;
        let from_pattern = |from: usize| -> Option<Header> {
            let caps = DECL.captures(content.get(from..)?)?;
            let whole = caps.get(0)?;
            Some(Header {
                name: caps["name"].to_string(),
                kind: caps["kind"].to_string(),
                rest: caps["rest"].to_string(),
                start: from + whole.start(),
            })
        };

        match locate_type_declarations(self.ast_language(file), content) {
            Some(decls) if !decls.is_empty() => decls
                .iter()
                .filter_map(|decl| {
                    // Step back to the line start so the anchored header matches.
                    let line_start = content[..decl.start].rfind('\n').map(|i| i + 1).unwrap_or(0);
                    from_pattern(line_start).filter(|h| h.name == decl.name)
                })
                .collect(),
            _ => DECL
                .captures_iter(content)
                .filter_map(|caps| {
                    let whole = caps.get(0)?;
                    Some(Header {
                        name: caps["name"].to_string(),
                        kind: caps["kind"].to_string(),
                        rest: caps["rest"].to_string(),
                        start: whole.start(),
                    })
                })
                .collect(),
        }
    }

    fn file_models(&self, file: &SourceFile) -> Vec<ExtractedModel> {
        let content = &file.content;
        let index = LineIndex::new(content);
        let lines: Vec<&str> = content.lines().collect();
        let mut models = Vec::new();

        for header in self.headers(file) {
            let Some(body) = find_brace_block(content, header.start, Syntax::C_LIKE) else {
                continue;
            };
            let body = &content[body];
            // Header matches start at the line start; skip leading whitespace.
            let keyword_at = header.start + content[header.start..].len()
                - content[header.start..].trim_start().len();
            let line = index.line_of(keyword_at);
            let model_type = match header.kind.as_str() {
                "interface" => ModelType::Interface,
                "type" => ModelType::TypeAlias,
                "enum" => ModelType::Enum,
                _ => ModelType::Class,
            };
            let mut model = ExtractedModel::new(&header.name, model_type, &file.rel, line);
            model.decorators = decorators_above(&lines, line);

            if let Some(ext) = EXTENDS.captures(header.rest.trim()) {
                let names = split_type_list(&ext["names"]);
                if model_type == ModelType::Interface {
                    model.interfaces.extend(names);
                } else {
                    model.parent = names.into_iter().next();
                }
            }
            if let Some(imp) = IMPLEMENTS.captures(&header.rest) {
                model.interfaces.extend(split_type_list(&imp["names"]));
            }

            match model_type {
                ModelType::Interface | ModelType::TypeAlias => parse_type_members(body, &mut model),
                ModelType::Enum => parse_enum_members(body, &mut model),
                _ => parse_class_members(body, &mut model),
            }
            model.source_link = self.ctx.source_link(&file.rel, Some(line));
            models.push(model);
        }

        for caps in ZOD_SCHEMA.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(body) = find_brace_block(content, whole.end() - 1, Syntax::C_LIKE) else {
                continue;
            };
            let line = index.line_of(whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len()));
            let mut model = ExtractedModel::new(&caps["name"], ModelType::Schema, &file.rel, line);
            model.decorators.push("zod".to_string());
            parse_zod_fields(&content[body], &mut model);
            model.source_link = self.ctx.source_link(&file.rel, Some(line));
            models.push(model);
        }

        models.sort_by_key(|m| m.line);
        models
    }

    fn nest_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let content = &file.content;
        let index = LineIndex::new(content);
        for controller in NEST_CONTROLLER.captures_iter(content) {
            let Some(whole) = controller.get(0) else { continue };
            let prefix = capture(&controller, "prefix").unwrap_or_default();
            let Some(class) = CLASS_KEYWORD.find_iter(&content[whole.end()..]).next() else {
                continue;
            };
            let Some(body) = find_brace_block(content, whole.end() + class.end(), Syntax::C_LIKE) else {
                continue;
            };
            for route in NEST_ROUTE.captures_iter(&content[body.clone()]) {
                let Some(at) = route.get(0) else { continue };
                let method = match &route["method"] {
                    "All" => "ANY".to_string(),
                    m => m.to_ascii_uppercase(),
                };
                let path = join_paths(&prefix, route.name("path").map(|p| p.as_str()).unwrap_or(""));
                let line = index.line_of(body.start + at.start());
                let mut ep = ExtractedEndpoint::new(method, path, &file.rel, line)
                    .with_handler(capture(&route, "handler"))
                    .with_decorator("nestjs");
                ep.source_link = self.ctx.source_link(&file.rel, Some(line));
                out.push(ep);
            }
        }
    }

    fn route_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let index = LineIndex::new(&file.content);
        for caps in ROUTE.captures_iter(&file.content) {
            let Some(whole) = caps.get(0) else { continue };
            let method = match &caps["method"] {
                "all" => "ANY".to_string(),
                m => m.to_ascii_uppercase(),
            };
            let line = index.line_of(whole.start());
            let mut ep = ExtractedEndpoint::new(method, &caps["path"], &file.rel, line)
                .with_handler(capture(&caps, "handler"))
                .with_decorator("router");
            ep.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(ep);
        }
    }

    /// Next.js file-system routes: `pages/api/**` and `app/**/route.*`.
    fn next_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let Some((route, is_app)) = next_route_path(&file.rel) else {
            return;
        };
        let index = LineIndex::new(&file.content);
        let mut push = |method: &str, line: usize, handler: &str| {
            let mut ep = ExtractedEndpoint::new(method, route.clone(), &file.rel, line)
                .with_handler(Some(handler.to_string()))
                .with_decorator("nextjs");
            ep.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(ep);
        };

        if is_app {
            for caps in NEXT_EXPORT.captures_iter(&file.content) {
                let Some(whole) = caps.get(0) else { continue };
                let method = &caps["method"];
                if HTTP_VERBS.contains(&method) {
                    push(method, index.line_of(whole.start()), method);
                }
            }
        } else {
            let line = file
                .content
                .lines()
                .position(|l| l.contains("export default"))
                .map(|i| i + 1)
                .unwrap_or(1);
            push("ANY", line, "default");
        }
    }
}

/// Route path of a Next.js API file, with whether it uses the app router.
fn next_route_path(rel: &str) -> Option<(String, bool)> {
    let stem = rel.rsplit_once('.').map(|(s, _)| s).unwrap_or(rel);
    let segments: Vec<&str> = stem.split('/').collect();

    if let Some(pos) = segments.windows(2).position(|w| w == ["pages", "api"]) {
        let mut parts: Vec<&str> = segments[pos + 1..].to_vec();
        if parts.last() == Some(&"index") {
            parts.pop();
        }
        return Some((format!("/{}", parts.join("/")), false));
    }

    if segments.last() == Some(&"route") {
        let pos = segments.iter().position(|s| *s == "app")?;
        let parts: Vec<&str> = segments[pos + 1..segments.len() - 1]
            .iter()
            .copied()
            // Route groups do not contribute to the URL.
            .filter(|s| !(s.starts_with('(') && s.ends_with(')')))
            .collect();
        return Some((format!("/{}", parts.join("/")), true));
    }
    None
}

fn join_paths(prefix: &str, path: &str) -> String {
    let joined: Vec<&str> = [prefix, path]
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty())
        .collect();
    format!("/{}", joined.join("/"))
}

fn split_type_list(list: &str) -> Vec<String> {
    crate::analysis::blocks::split_top_level_generic(list, ',', Syntax::C_LIKE)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `@Decorator` lines directly above a declaration.
fn decorators_above(lines: &[&str], decl_line: usize) -> Vec<String> {
    let mut found = Vec::new();
    let mut idx = decl_line.saturating_sub(1);
    while idx > 0 {
        idx -= 1;
        let Some(caps) = lines.get(idx).and_then(|l| DECORATOR.captures(l)) else {
            break;
        };
        found.push(caps["name"].to_string());
    }
    found.reverse();
    found
}

/// Walk top-level lines of a body, skipping nested blocks.
fn top_level_lines(body: &str) -> Vec<&str> {
    let mut depth = 0;
    let mut out = Vec::new();
    for line in body.lines() {
        if depth == 0 {
            out.push(line);
        }
        depth = (depth + line_depth_delta(line, Syntax::C_LIKE)).max(0);
    }
    out
}

fn parse_type_members(body: &str, model: &mut ExtractedModel) {
    for line in top_level_lines(body) {
        if let Some(caps) = TYPE_METHOD.captures(line) {
            if model.methods.len() < MAX_METHODS {
                model.methods.push(format!("{}({})", &caps["name"], caps["params"].trim()));
            }
        } else if let Some(caps) = TYPE_MEMBER.captures(line) {
            if model.fields.len() >= MAX_FIELDS {
                break;
            }
            let name = crate::analysis::blocks::unquote(&caps["name"]).to_string();
            let field_type = caps["type"].trim_end_matches(['{', ';', ',']).trim();
            let mut field = ExtractedField::new(name, if field_type.is_empty() { "object" } else { field_type });
            field.required = caps.name("opt").is_none();
            field.description = capture(&caps, "comment");
            model.fields.push(field);
        }
    }
}

fn parse_class_members(body: &str, model: &mut ExtractedModel) {
    for line in top_level_lines(body) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('@') || trimmed.starts_with("//") {
            continue;
        }
        if let Some(caps) = CLASS_FIELD.captures(line) {
            if model.fields.len() < MAX_FIELDS {
                let field_type = capture(&caps, "type").unwrap_or_else(|| "any".to_string());
                let mut field = ExtractedField::new(&caps["name"], field_type);
                field.default = capture(&caps, "default");
                field.required = caps.name("opt").map(|o| o.as_str() != "?").unwrap_or(true);
                model.fields.push(field);
            }
        } else if let Some(caps) = CLASS_METHOD.captures(line) {
            let name = &caps["name"];
            if matches!(name, "if" | "for" | "while" | "switch" | "catch" | "return" | "function") {
                continue;
            }
            if model.methods.len() < MAX_METHODS {
                model.methods.push(format!("{}({})", name, caps["params"].trim()));
            }
        }
    }
}

fn parse_enum_members(body: &str, model: &mut ExtractedModel) {
    for part in body.split([',', '\n']) {
        let Some(caps) = ENUM_MEMBER.captures(part) else { continue };
        if model.fields.len() >= MAX_FIELDS {
            break;
        }
        let value = capture(&caps, "value");
        let field_type = match value.as_deref() {
            Some(v) if v.starts_with(['\'', '"', '`']) => "string",
            _ => "number",
        };
        let mut field = ExtractedField::new(&caps["name"], field_type);
        field.default = value;
        model.fields.push(field);
    }
}

fn parse_zod_fields(body: &str, model: &mut ExtractedModel) {
    for line in top_level_lines(body) {
        let Some(caps) = ZOD_FIELD.captures(line) else { continue };
        if model.fields.len() >= MAX_FIELDS {
            break;
        }
        let rest = &caps["rest"];
        let mut field = ExtractedField::new(&caps["name"], &caps["type"]);
        field.required = !(rest.contains(".optional()") || rest.contains(".nullish()") || rest.contains(".default("));
        if let Some(start) = rest.find(".describe(") {
            let tail = &rest[start + ".describe(".len()..];
            if let Some(end) = tail.find(')') {
                field.description = Some(crate::analysis::blocks::unquote(tail[..end].trim()).to_string());
            }
        }
        model.fields.push(field);
    }
}

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn language_id(&self) -> &'static str {
        self.language.as_str()
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        match self.language {
            Language::JavaScript => JS_EXTENSIONS,
            _ => TS_EXTENSIONS,
        }
    }

    fn context(&self) -> &AnalyzerContext {
        &self.ctx
    }

    fn extract_models(&self) -> anyhow::Result<Vec<ExtractedModel>> {
        Ok(self
            .files()
            .iter()
            .filter(|f| !is_test_file(&f.rel) && !f.rel.ends_with(".d.ts"))
            .flat_map(|f| self.file_models(f))
            .collect())
    }

    fn extract_endpoints(&self) -> anyhow::Result<Vec<ExtractedEndpoint>> {
        let mut endpoints = Vec::new();
        for file in self.files() {
            self.route_endpoints(&file, &mut endpoints);
            self.nest_endpoints(&file, &mut endpoints);
            self.next_endpoints(&file, &mut endpoints);
        }
        Ok(endpoints)
    }

    fn extract_side_effects(&self) -> anyhow::Result<Vec<ExtractedSideEffect>> {
        let mut effects = Vec::new();
        for file in self.files() {
            let mut dedup = Dedup::new();
            scan_side_effects(&self.ctx, &file, &SIDE_EFFECTS, &mut dedup, &mut effects);
        }
        effects.retain(|e| {
            !e.target
                .as_deref()
                .map(|t| BUILTIN_RECEIVERS.contains(&t))
                .unwrap_or(false)
        });
        Ok(effects)
    }

    fn extract_config(&self) -> anyhow::Result<Vec<ExtractedConfig>> {
        let mut config = Vec::new();
        for file in self.files() {
            let mut dedup = Dedup::new();
            scan_config(&self.ctx, &file, &CONFIG, &mut dedup, &mut config);
        }
        Ok(config)
    }

    fn extract_dependencies(&self) -> anyhow::Result<Vec<ExtractedDependency>> {
        Ok(collect_dependencies(&self.ctx, &[ManifestKind::PackageJson]))
    }
}

pub(super) fn install() {
    register(Language::TypeScript, |ctx| {
        Box::new(TypeScriptAnalyzer::new(ctx, Language::TypeScript))
    });
    register(Language::JavaScript, |ctx| {
        Box::new(TypeScriptAnalyzer::new(ctx, Language::JavaScript))
    });
}
