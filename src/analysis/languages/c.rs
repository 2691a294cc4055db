//! C and C++ analyzer.
//!
//! One implementation serves both languages; the [`Language`] it was built
//! for selects the file extensions and the grammar.
//!
//! Extracts:
//! - Structs, unions, classes (with base classes), typedef'd structs and enums
//! - Socket listeners, FreeSWITCH API/application registrations and
//!   mongoose URI handlers
//! - Socket, file, libcurl, sqlite/mysql, hiredis and process side effects
//! - Config from `getenv` and upper-case `#define` constants
//! - `find_package` dependencies from CMakeLists.txt

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Captures;

use super::{register, Language};
use crate::analysis::ast::{locate_type_declarations, AstLanguage};
use crate::analysis::blocks::{
    delimited_body, doc_comment, find_balanced, line_depth_delta, split_top_level, LineIndex,
    Syntax,
};
use crate::analysis::context::{is_test_file, AnalyzerContext, SourceFile};
use crate::analysis::model::{
    ExtractedConfig, ExtractedDependency, ExtractedEndpoint, ExtractedField, ExtractedModel,
    ExtractedSideEffect, ModelType, SideEffectCategory,
};
use crate::analysis::patterns::{
    capture, config_rules, scan_config, scan_side_effects, side_effect_rules, ConfigRule, Dedup,
    Pattern, SideEffectRule, MAX_FIELDS, MAX_FILES_PER_CATEGORY, MAX_METHODS,
};
use crate::analysis::LanguageAnalyzer;

const C_EXTENSIONS: &[&str] = &["c", "h"];
const CPP_EXTENSIONS: &[&str] = &["cc", "cpp", "cxx", "hpp", "hh"];

const DOC_MARKERS: &[&str] = &["*/", "/**", "/*", "*", "///", "//"];

static DECL_START: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"(?m)^[ \t]*(?:typedef\s+)?(?P<kw>struct|class|enum|union)\b"));

/// Header of a type definition, applied at the `struct`/`class`/... keyword.
static HEADER: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^(?P<kind>struct|class|enum|union)(?:\s+(?:class|struct))?(?:\s+(?:__attribute__\s*\(\([^)]*\)\)\s*)?(?P<name>[A-Za-z_]\w*))?\s*(?:final\s*)?(?P<bases>:[^{;()]*)?\{",
    )
});

static TYPEDEF_ALIAS: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^\s*(?:\*\s*)?(?P<alias>[A-Za-z_]\w*)\s*[;,]"));

static FIELD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?P<type>(?:(?:const|static|unsigned|signed|struct|enum|union|volatile|mutable|long|short)\s+)*[A-Za-z_][\w:]*(?:<[^;]*>)?(?:\s*[*&]+\s*|\s+))(?P<name>[A-Za-z_]\w*)\s*(?P<array>(?:\[[^\]]*\])*)\s*(?::\s*\d+\s*)?(?:=\s*(?P<default>[^;]+))?;",
    )
});

static METHOD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?:(?:virtual|static|inline|explicit|constexpr)\s+)*(?:[\w:<>,*&]+\s+[*&]*)*(?P<name>~?[A-Za-z_]\w*|operator\S+)\s*\([^;{]*\)\s*(?:const\s*)?(?:noexcept\s*)?(?:override\s*)?(?:=\s*(?:0|default|delete)\s*)?[;{]",
    )
});

static ENUM_MEMBER: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^\s*(?P<name>[A-Za-z_]\w*)\s*(?:=\s*(?P<value>.+?))?\s*$"));

static BLOCK_COMMENT: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"(?s)/\*.*?\*/"));

static DEFINE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?m)^[ \t]*#[ \t]*define[ \t]+(?P<key>[A-Z][A-Z0-9_]*)[ \t]+(?P<value>[^\s/][^\n]*?)[ \t]*(?://[^\n]*|/\*[^\n]*)?$")
});

static LISTEN: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"\blisten\s*\(\s*\w+\s*,"));
static HTONS: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\bhtons\s*\(\s*(?P<port>\d+|[A-Za-z_]\w*)\s*\)"));

static FREESWITCH_ADD: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\bSWITCH_ADD_(?P<kind>API|APP)\s*\("));

static MONGOOSE_URI: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"\bmg_(?:http_match_uri\s*\(\s*\w+\s*,|match\s*\([^,]*,\s*mg_str\()\s*"(?P<path>[^"]+)""#)
});

static FIND_PACKAGE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?mi)^\s*find_package\s*\(\s*(?P<name>[\w.:-]+)(?:\s+(?P<version>\d[\w.]*))?")
});

static SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (
            r"\b(?P<op>connect|send|sendto|recv|recvfrom)\s*\(\s*\w+\s*,",
            ExternalApi,
            "socket",
            "socket",
        ),
        (
            r#"\b(?P<op>fopen|open|unlink|remove|rename|mkdir)\s*\(\s*(?:"(?P<target>[^"]+)")?"#,
            File,
            "file",
            "",
        ),
        (r"\b(?P<op>fwrite|fputs|fprintf)\s*\(", File, "write", ""),
        (r"(?:std::)?(?:o|i)?fstream\s+\w+\s*\(", File, "stream", ""),
        (
            r#"\bcurl_easy_setopt\s*\(\s*\w+\s*,\s*CURLOPT_URL\s*,\s*"(?P<target>[^"]+)""#,
            Http,
            "request",
            "",
        ),
        (r"\bcurl_easy_perform\s*\(", Http, "perform", "libcurl"),
        (
            r"\bsqlite3_(?P<op>open_v2|open|exec|prepare_v2|prepare)\s*\(",
            Database,
            "sqlite",
            "sqlite",
        ),
        (
            r"\bmysql_(?P<op>real_connect|real_query|query)\s*\(",
            Database,
            "mysql",
            "mysql",
        ),
        (
            r"\bswitch_(?:cache_db_execute_sql|core_db_exec)\w*\s*\(",
            Database,
            "execute_sql",
            "freeswitch_db",
        ),
        (r"\bswitch_event_fire\s*\(", Queue, "event_fire", "freeswitch_event"),
        (r"\bredisConnect\w*\s*\(", Cache, "connect", "redis"),
        (
            r#"\bredisCommand\s*\(\s*\w+\s*,\s*"(?P<op>\w+)"#,
            Cache,
            "command",
            "redis",
        ),
        (
            r#"\b(?P<op>system|popen|execvp|execv|execl)\s*\(\s*(?:"(?P<target>[^"\s]+))?"#,
            ExternalApi,
            "exec",
            "",
        ),
    ])
});

static CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    config_rules(&[
        (r#"\b(?:std::)?getenv\s*\(\s*"(?P<key>[^"]+)""#, "env"),
        (
            r#"\bswitch_core_get_variable\w*\s*\(\s*"(?P<key>[^"]+)""#,
            "freeswitch_variable",
        ),
        (
            r"(?m)^[ \t]*#[ \t]*define[ \t]+(?P<key>[A-Z][A-Z0-9_]*)[ \t]+(?P<default>[^\s/][^\n]*?)[ \t]*(?://[^\n]*|/\*[^\n]*)?$",
            "constant",
        ),
    ])
});

/// C/C++ analyzer.
pub struct CAnalyzer {
    ctx: AnalyzerContext,
    language: Language,
}

impl CAnalyzer {
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

    /// Byte offsets of every `struct`/`class`/`enum`/`union` keyword that may
    /// open a definition.
    fn declaration_starts(&self, file: &SourceFile) -> Vec<usize> {
        let grammar = if file.extension() == "c" {
            AstLanguage::C
        } else {
            AstLanguage::Cpp
        };
        let mut starts: Vec<usize> = match locate_type_declarations(grammar, &file.content) {
            // Anonymous typedefs are invisible to the locator.
            Some(decls) => decls
                .into_iter()
                .map(|d| d.start)
                .chain(
                    DECL_START
                        .captures_iter(&file.content)
                        .filter(|c| {
                            c.get(0)
                                .map(|m| m.as_str().trim_start().starts_with("typedef"))
                                .unwrap_or(false)
                        })
                        .filter_map(|c| c.name("kw").map(|m| m.start())),
                )
                .collect(),
            None => DECL_START
                .captures_iter(&file.content)
                .filter_map(|c| c.name("kw").map(|m| m.start()))
                .collect(),
        };
        starts.sort_unstable();
        starts.dedup();
        starts
    }

    fn file_models(&self, file: &SourceFile) -> Vec<ExtractedModel> {
        let content = &file.content;
        let index = LineIndex::new(content);
        let lines: Vec<&str> = content.lines().collect();
        let mut models = Vec::new();

        for start in self.declaration_starts(file) {
            let Some(caps) = content.get(start..).and_then(|t| HEADER.captures(t)) else {
                continue;
            };
            let Some(whole) = caps.get(0) else { continue };
            let open_idx = start + whole.end() - 1;
            let Some(close_idx) = find_balanced(content, open_idx, '{', '}', Syntax::C_LIKE) else {
                continue;
            };
            let body = &content[open_idx + 1..close_idx];
            let typedef = content[..start].trim_end().ends_with("typedef");
            let alias = typedef
                .then(|| TYPEDEF_ALIAS.captures(&content[close_idx + 1..]))
                .flatten()
                .map(|c| c["alias"].to_string());

            let Some(name) = capture(&caps, "name").or_else(|| alias.clone()) else {
                continue;
            };
            let line = index.line_of(start);
            let kind = &caps["kind"];
            let model_type = match kind {
                "class" => ModelType::Class,
                "enum" => ModelType::Enum,
                _ => ModelType::Struct,
            };
            let mut model = ExtractedModel::new(&name, model_type, &file.rel, line);
            model.description = doc_comment(&lines, line, DOC_MARKERS);
            if alias.is_some() {
                model.decorators.push("typedef".to_string());
            }
            if kind == "union" {
                model.decorators.push("union".to_string());
            }
            if model_type != ModelType::Enum {
                if let Some(bases) = caps.name("bases") {
                    let mut bases = parse_bases(bases.as_str()).into_iter();
                    model.parent = bases.next();
                    model.interfaces = bases.collect();
                }
                parse_members(body, &mut model);
            } else {
                parse_enum(body, &mut model);
            }
            model.source_link = self.ctx.source_link(&file.rel, Some(line));
            models.push(model);
        }
        models
    }

    fn file_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let content = &file.content;
        let index = LineIndex::new(content);
        let defines = defines(content);

        for m in LISTEN.find_iter(content) {
            let line = index.line_of(m.start());
            // The port is configured by the nearest preceding htons().
            let port = HTONS
                .captures_iter(&content[..m.start()])
                .last()
                .and_then(|c| capture(&c, "port"))
                .map(|p| defines.get(&p).cloned().unwrap_or(p));
            let path = match port {
                Some(port) => format!(":{}", port),
                None => "socket".to_string(),
            };
            let mut ep = ExtractedEndpoint::new("LISTEN", path, &file.rel, line).with_decorator("socket");
            ep.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(ep);
        }

        for caps in FREESWITCH_ADD.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(args) = delimited_body(content, whole.end() - 1, Syntax::C_LIKE) else {
                continue;
            };
            let args = split_top_level(args, ',', Syntax::C_LIKE);
            // SWITCH_ADD_API(iface, name, desc, fn, syntax)
            // SWITCH_ADD_APP(iface, name, short, long, fn, syntax, flags)
            let (handler_idx, decorator) = match &caps["kind"] {
                "API" => (3, "freeswitch_api"),
                _ => (4, "freeswitch_app"),
            };
            let Some(name) = args.get(1).map(|a| unquote_c(a)) else { continue };
            let line = index.line_of(whole.start());
            let mut ep = ExtractedEndpoint::new("DIALPLAN", name, &file.rel, line)
                .with_handler(args.get(handler_idx).map(|h| h.trim().to_string()))
                .with_decorator(decorator);
            ep.description = args.get(2).map(|d| unquote_c(d)).filter(|d| !d.is_empty());
            ep.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(ep);
        }

        for caps in MONGOOSE_URI.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let line = index.line_of(whole.start());
            let mut ep = ExtractedEndpoint::new("ANY", &caps["path"], &file.rel, line)
                .with_decorator("mongoose");
            ep.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(ep);
        }
    }

    fn cmake_dependencies(&self) -> Vec<ExtractedDependency> {
        let mut deps = Vec::new();
        for path in self.ctx.find_named("CMakeLists.txt") {
            let Some(file) = self.ctx.load(&path) else { continue };
            let index = LineIndex::new(&file.content);
            for caps in FIND_PACKAGE.captures_iter(&file.content) {
                let Some(name) = caps.name("name") else { continue };
                deps.push(ExtractedDependency::new(
                    name.as_str(),
                    capture(&caps, "version"),
                    &file.rel,
                    index.line_of(name.start()),
                ));
            }
        }
        deps
    }
}

fn unquote_c(arg: &str) -> String {
    arg.trim().trim_matches('"').to_string()
}

/// Upper-case `#define` constants with a value, used to resolve ports.
fn defines(content: &str) -> HashMap<String, String> {
    DEFINE
        .captures_iter(content)
        .map(|c| (c["key"].to_string(), c["value"].trim().to_string()))
        .collect()
}

/// `: public Base, private Mixin` → `["Base", "Mixin"]`.
fn parse_bases(bases: &str) -> Vec<String> {
    bases
        .trim_start_matches(':')
        .split(',')
        .map(|b| {
            b.split_whitespace()
                .filter(|w| !matches!(*w, "public" | "private" | "protected" | "virtual"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|b| !b.is_empty())
        .collect()
}

fn parse_members(body: &str, model: &mut ExtractedModel) {
    let body = BLOCK_COMMENT.replace_all(body, "");
    let mut depth = 0;
    for line in body.lines() {
        let code = line.split("//").next().unwrap_or(line);
        let trimmed = code.trim();
        if depth == 0 && !trimmed.is_empty() && !trimmed.starts_with('#') {
            if let Some(caps) = METHOD.captures(code) {
                let name = &caps["name"];
                if model.methods.len() < MAX_METHODS && !is_keyword(name) {
                    model.methods.push(name.to_string());
                }
            } else if let Some(caps) = FIELD.captures(code) {
                push_field(&caps, model);
            }
        }
        depth = (depth + line_depth_delta(code, Syntax::C_LIKE)).max(0);
    }
}

fn push_field(caps: &Captures<'_>, model: &mut ExtractedModel) {
    let base = caps["type"].trim();
    if model.fields.len() >= MAX_FIELDS || matches!(base, "return" | "using" | "typedef" | "friend") {
        return;
    }
    let field_type = format!("{}{}", base, caps.name("array").map(|a| a.as_str()).unwrap_or(""));
    let mut field = ExtractedField::new(&caps["name"], field_type);
    field.default = capture(caps, "default");
    field.required = field.default.is_none() && !base.ends_with('*');
    model.fields.push(field);
}

fn is_keyword(name: &str) -> bool {
    matches!(name, "if" | "for" | "while" | "switch" | "return" | "sizeof")
}

fn parse_enum(body: &str, model: &mut ExtractedModel) {
    let body = BLOCK_COMMENT.replace_all(body, "");
    for line in body.lines() {
        let code = line.split("//").next().unwrap_or(line);
        for part in code.split(',') {
            let Some(caps) = ENUM_MEMBER.captures(part) else { continue };
            if model.fields.len() >= MAX_FIELDS {
                return;
            }
            let mut field = ExtractedField::new(&caps["name"], "enumerator");
            field.default = capture(&caps, "value");
            field.required = false;
            model.fields.push(field);
        }
    }
}

impl LanguageAnalyzer for CAnalyzer {
    fn language_id(&self) -> &'static str {
        self.language.as_str()
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        match self.language {
            Language::Cpp => CPP_EXTENSIONS,
            _ => C_EXTENSIONS,
        }
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
            scan_config(&self.ctx, &file, &CONFIG, &mut dedup, &mut config);
        }
        Ok(config)
    }

    fn extract_dependencies(&self) -> anyhow::Result<Vec<ExtractedDependency>> {
        Ok(self.cmake_dependencies())
    }
}

pub(super) fn install() {
    register(Language::C, |ctx| Box::new(CAnalyzer::new(ctx, Language::C)));
    register(Language::Cpp, |ctx| Box::new(CAnalyzer::new(ctx, Language::Cpp)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn analyzer_with(language: Language, files: &[(&str, &str)]) -> (TempDir, CAnalyzer) {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let ctx = AnalyzerContext::new(temp.path());
        (temp, CAnalyzer::new(ctx, language))
    }

    #[test]
    fn test_c_structs_typedefs_and_enums() {
        let src = r#"#include <stdio.h>

#define MAX_CALLS 64
#define LISTEN_PORT 5060

/* A registered SIP peer. */
struct peer {
    char name[32];
    int port;
    struct peer *next;
};

typedef struct {
    unsigned int id;
    const char *label;
} call_t;

enum call_state {
    CALL_IDLE = 0,
    CALL_RINGING, /* ringing */
    CALL_UP
};
"#;
        let (_temp, analyzer) = analyzer_with(Language::C, &[("src/peer.h", src)]);
        let models = analyzer.extract_models().unwrap();
        let names: Vec<_> = models.iter().map(|m| (m.name.as_str(), m.model_type)).collect();
        assert_eq!(
            names,
            vec![
                ("peer", ModelType::Struct),
                ("call_t", ModelType::Struct),
                ("call_state", ModelType::Enum),
            ]
        );
        assert_eq!(models[0].description.as_deref(), Some("A registered SIP peer."));
        let fields: Vec<_> = models[0]
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![("name", "char[32]"), ("port", "int"), ("next", "struct peer *")]
        );
        assert_eq!(models[1].decorators, vec!["typedef"]);
        assert_eq!(models[1].fields.len(), 2);
        let states: Vec<_> = models[2].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(states, vec!["CALL_IDLE", "CALL_RINGING", "CALL_UP"]);
        assert_eq!(models[2].fields[0].default.as_deref(), Some("0"));

        let config = analyzer.extract_config().unwrap();
        let keys: Vec<_> = config
            .iter()
            .map(|c| (c.key.as_str(), c.source.as_str(), c.default.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("MAX_CALLS", "constant", Some("64")),
                ("LISTEN_PORT", "constant", Some("5060")),
            ]
        );
    }

    #[test]
    fn test_block_comments_inside_struct_body() {
        let src = r#"struct session {
    /* legacy layout:
       int ghost;
    */
    int fd; /* socket */
    char *user;
};
"#;
        let (_temp, analyzer) = analyzer_with(Language::C, &[("src/session.h", src)]);
        let models = analyzer.extract_models().unwrap();
        assert_eq!(models.len(), 1);
        let fields: Vec<_> = models[0].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["fd", "user"]);
    }

    #[test]
    fn test_cpp_class_with_bases() {
        let src = r#"
namespace media {

/// Mixes call audio.
class Mixer : public Component, private Noncopyable {
public:
    explicit Mixer(int rate);
    virtual ~Mixer();
    void mix(const Frame &frame) override;
    int channels() const { return channels_; }

private:
    int channels_ = 2;
    std::vector<Frame> frames_;
};

}
"#;
        let (_temp, analyzer) = analyzer_with(Language::Cpp, &[("src/mixer.hpp", src)]);
        let models = analyzer.extract_models().unwrap();
        assert_eq!(models.len(), 1);
        let mixer = &models[0];
        assert_eq!(mixer.model_type, ModelType::Class);
        assert_eq!(mixer.parent.as_deref(), Some("Component"));
        assert_eq!(mixer.interfaces, vec!["Noncopyable"]);
        assert_eq!(mixer.description.as_deref(), Some("Mixes call audio."));
        assert_eq!(mixer.methods, vec!["Mixer", "~Mixer", "mix", "channels"]);
        let fields: Vec<_> = mixer
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type.as_str(), f.default.as_deref()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("channels_", "int", Some("2")),
                ("frames_", "std::vector<Frame>", None),
            ]
        );
        assert_eq!(analyzer.language_id(), "cpp");
    }

    #[test]
    fn test_endpoints() {
        let src = r#"
#define CONTROL_PORT 8021

SWITCH_MODULE_LOAD_FUNCTION(mod_example_load)
{
    SWITCH_ADD_API(api_interface, "example_status", "Show status", example_status_function, "");
    SWITCH_ADD_APP(app_interface, "example_park", "Park call", "Parks the call", example_park_function, "", SAF_NONE);
    return SWITCH_STATUS_SUCCESS;
}

static int start_control(void)
{
    struct sockaddr_in addr;
    addr.sin_port = htons(CONTROL_PORT);
    bind(fd, (struct sockaddr *)&addr, sizeof(addr));
    listen(fd, 16);
    return fd;
}

static void handler(struct mg_connection *c, int ev, void *ev_data) {
    if (mg_http_match_uri(hm, "/api/calls")) {
        mg_http_reply(c, 200, "", "{}");
    }
}
"#;
        let (_temp, analyzer) = analyzer_with(Language::C, &[("mod_example.c", src)]);
        let endpoints = analyzer.extract_endpoints().unwrap();
        let found: Vec<_> = endpoints
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str(), e.handler.as_deref()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("LISTEN", ":8021", None),
                ("DIALPLAN", "example_status", Some("example_status_function")),
                ("DIALPLAN", "example_park", Some("example_park_function")),
                ("ANY", "/api/calls", None),
            ]
        );
        assert_eq!(endpoints[1].description.as_deref(), Some("Show status"));
        assert_eq!(endpoints[2].decorators, vec!["freeswitch_app"]);
    }

    #[test]
    fn test_side_effects_and_dependencies() {
        let src = r#"
int sync_calls(void) {
    const char *home = getenv("SYNC_HOME");
    FILE *f = fopen("/var/log/sync.log", "a");
    curl_easy_setopt(curl, CURLOPT_URL, "https://api.example.com/calls");
    curl_easy_perform(curl);
    sqlite3_open("calls.db", &db);
    system("logrotate /etc/sync.conf");
    return 0;
}
"#;
        let cmake = "cmake_minimum_required(VERSION 3.16)\nfind_package(CURL 7.80 REQUIRED)\nfind_package(SQLite3)\n";
        let (_temp, analyzer) = analyzer_with(Language::C, &[("sync.c", src), ("CMakeLists.txt", cmake)]);
        let effects = analyzer.extract_side_effects().unwrap();
        let summary: Vec<_> = effects
            .iter()
            .map(|e| (e.category, e.operation.as_str(), e.target.as_deref()))
            .collect();
        assert!(summary.contains(&(SideEffectCategory::File, "fopen", Some("/var/log/sync.log"))));
        assert!(summary.contains(&(SideEffectCategory::Http, "request", Some("https://api.example.com/calls"))));
        assert!(summary.contains(&(SideEffectCategory::Database, "open", Some("sqlite"))));
        assert!(summary.contains(&(SideEffectCategory::ExternalApi, "system", Some("logrotate"))));

        let config = analyzer.extract_config().unwrap();
        assert_eq!(config.len(), 1);
        assert_eq!(config[0].key, "SYNC_HOME");
        assert!(config[0].required);

        let deps = analyzer.extract_dependencies().unwrap();
        let names: Vec<_> = deps.iter().map(|d| (d.name.as_str(), d.version.as_deref())).collect();
        assert_eq!(names, vec![("CURL", Some("7.80")), ("SQLite3", None)]);
    }
}
