//! Lua analyzer.
//!
//! Lua has no class syntax; classes are tables with methods, recognized by
//! `X.__index = X`, `function X:method()` definitions, `setmetatable`
//! inheritance and the `class()`/`:extend()` helpers of common OOP
//! libraries. Endpoints cover lapis, OpenResty method dispatch and
//! FreeSWITCH dialplan scripts.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;

use super::{register, Language};
use crate::analysis::blocks::{doc_comment, LineIndex};
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

static TABLE_DECL: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"(?m)^[ \t]*(?:local\s+)?(?P<name>[A-Z]\w*)\s*=\s*\{\s*\}"));

static CLASS_HELPER: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"(?m)^[ \t]*(?:local\s+)?(?P<name>[A-Z]\w*)\s*=\s*(?:class\s*\(\s*["'][\w.]+["']\s*(?:,\s*(?P<base>[\w.]+))?\s*\)|(?P<extends>[A-Z][\w.]*)\s*:\s*extend\s*\()"#,
    )
});

static INDEX_SELF: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"(?m)^[ \t]*(?P<name>[A-Z]\w*)\.__index\s*=\s*(?P<value>[\w.]+)"));

static SETMETATABLE_BASE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"\bsetmetatable\(\s*(?P<name>[A-Z]\w*)\s*,\s*(?:\{\s*__index\s*=\s*(?P<base>[\w.]+)|(?P<direct>[A-Z][\w.]*)\s*\))")
});

static METHOD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?m)^[ \t]*(?:function\s+(?P<class>[A-Z]\w*)[:.](?P<name>\w+)\s*\(|(?P<class2>[A-Z]\w*)\.(?P<name2>\w+)\s*=\s*function\b)")
});

static TABLE_FIELD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?m)^[ \t]*(?P<class>[A-Z]\w*)\.(?P<name>[a-z_]\w*)\s*=\s*(?P<value>[^\n]+?)\s*$")
});

static SELF_FIELD: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^\s*self\.(?P<name>[a-z_]\w*)\s*=\s*(?P<value>[^\n]+?)\s*$"));

static FUNCTION_HEAD: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^\s*function\s+(?P<class>[A-Z]\w*)[:.]\w+\s*\("));

static LAPIS_ROUTE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"\b(?:app|self)\s*:\s*(?P<method>get|post|put|delete|patch|match)\s*\(\s*(?:["'](?P<name>[\w.-]+)["']\s*,\s*)?["'](?P<path>/[^"']*)["']"#,
    )
});

static NGX_METHOD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"\bngx\.req\.get_method\(\)\s*==\s*["'](?P<method>[A-Z]+)["']"#)
});

static NGX_URI: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"\bngx\.var\.(?:uri|request_uri)\s*==\s*["'](?P<path>[^"']+)["']"#)
});

static SESSION_EXECUTE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"\bsession\s*:\s*execute\(\s*["'](?P<app>\w+)["']\s*(?:,\s*["'](?P<args>[^"']*)["'])?"#)
});

static API_EXECUTE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"\bapi\s*:\s*execute(?:String)?\(\s*["'](?P<command>[\w_]+)"#)
});

static ROCKSPEC_DEPS: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"(?s)\bdependencies\s*=\s*\{(?P<body>[^}]*)\}"));

static ROCKSPEC_ENTRY: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"["'](?P<name>[\w.-]+)\s*(?P<version>(?:[<>=~]+\s*[\w.-]+\s*,?\s*)*)["']"#)
});

static SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (r#"\bfreeswitch\.Dbh\(\s*["'](?P<target>[^"']+)"#, Database, "connect", ""),
        (r"\b\w*dbh\s*:\s*(?P<op>query|execute|affected_rows)\s*\(", Database, "query", "freeswitch_dbh"),
        (r"\bluasql\.(?P<target>\w+)\s*\(", Database, "connect", ""),
        (
            r#"(?i):\s*execute\(\s*["'][^"']*?\b(?:FROM|INTO|UPDATE)\s+(?P<target>\w+)"#,
            Database,
            "sql",
            "",
        ),
        (r#"\bngx\.location\.capture\(\s*["'](?P<target>[^"']+)"#, Http, "subrequest", ""),
        (r#"\bhttpc?\s*[.:]\s*request(?:_uri)?\(\s*(?:["'](?P<target>[^"']+))?"#, Http, "request", ""),
        (r#"\brequire\s*\(?\s*["'](?P<target>socket\.http|resty\.http|ssl\.https)["']"#, Http, "client", ""),
        (r#"\bio\.open\(\s*(?:["'](?P<target>[^"']+)["'])?"#, File, "open", ""),
        (r"\bos\.(?P<op>remove|rename)\(", File, "file", ""),
        (r#"\brequire\s*\(?\s*["'](?:resty\.)?redis["']"#, Cache, "connect", "redis"),
        (
            r"\bred\s*:\s*(?P<op>get|set|hget|hset|del|incr|expire|publish|lpush|rpush)\s*\(",
            Cache,
            "command",
            "redis",
        ),
        (r"\bfreeswitch\.API\(\)", ExternalApi, "api", "freeswitch"),
        (r#"\bfreeswitch\.Event\(\s*["'](?P<target>[\w:]+)"#, Queue, "event_fire", ""),
    ])
});

static CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    config_rules(&[
        (
            r#"\bos\.getenv\(\s*["'](?P<key>[^"']+)["']\s*\)(?:\s*or\s*(?P<default>"[^"]*"|'[^']*'|[\w.]+))?"#,
            "env",
        ),
        (
            r#"\bfreeswitch\.getGlobalVariable\(\s*["'](?P<key>[^"']+)["']\s*\)(?:\s*or\s*(?P<default>"[^"]*"|'[^']*'|[\w.]+))?"#,
            "freeswitch_global",
        ),
        (
            r#"\bsession\s*:\s*getVariable\(\s*["'](?P<key>[^"']+)["']\s*\)(?:\s*or\s*(?P<default>"[^"]*"|'[^']*'|[\w.]+))?"#,
            "channel_variable",
        ),
    ])
});

/// Lua analyzer.
pub struct LuaAnalyzer {
    ctx: AnalyzerContext,
}

impl LuaAnalyzer {
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

        let mut classes: BTreeMap<String, ExtractedModel> = BTreeMap::new();
        let mut tables: Vec<(String, usize)> = Vec::new();

        for caps in CLASS_HELPER.captures_iter(content) {
            let Some(name) = caps.name("name") else { continue };
            let line = index.line_of(name.start());
            let mut model = ExtractedModel::new(name.as_str(), ModelType::Class, &file.rel, line);
            model.parent = capture(&caps, "base").or_else(|| capture(&caps, "extends"));
            classes.insert(name.as_str().to_string(), model);
        }
        for caps in TABLE_DECL.captures_iter(content) {
            let Some(name) = caps.name("name") else { continue };
            tables.push((name.as_str().to_string(), index.line_of(name.start())));
        }

        // A plain table becomes a class once it carries methods or indexes itself.
        let methods = self.methods(content);
        let self_indexed: HashSet<String> = INDEX_SELF
            .captures_iter(content)
            .filter(|c| c["name"] == c["value"])
            .map(|c| c["name"].to_string())
            .collect();
        for (name, line) in tables {
            if classes.contains_key(&name) {
                continue;
            }
            if self_indexed.contains(&name) || methods.iter().any(|(class, _)| *class == name) {
                classes.insert(name.clone(), ExtractedModel::new(&name, ModelType::Class, &file.rel, line));
            }
        }

        for caps in SETMETATABLE_BASE.captures_iter(content) {
            if let Some(model) = classes.get_mut(&caps["name"]) {
                if model.parent.is_none() {
                    model.parent = capture(&caps, "base").or_else(|| capture(&caps, "direct"));
                }
            }
        }

        for (class, method) in methods {
            if let Some(model) = classes.get_mut(&class) {
                if model.methods.len() < MAX_METHODS && !model.methods.contains(&method) {
                    model.methods.push(method);
                }
            }
        }

        for caps in TABLE_FIELD.captures_iter(content) {
            let value = &caps["value"];
            if value.starts_with("function") || caps["name"].starts_with("__") {
                continue;
            }
            if let Some(model) = classes.get_mut(&caps["class"]) {
                push_field(model, &caps["name"], value);
            }
        }

        // `self.x = ...` belongs to the class of the enclosing method.
        let mut current: Option<String> = None;
        for line in &lines {
            if let Some(caps) = FUNCTION_HEAD.captures(line) {
                current = Some(caps["class"].to_string());
            } else if let Some(caps) = SELF_FIELD.captures(line) {
                if let Some(model) = current.as_ref().and_then(|c| classes.get_mut(c)) {
                    push_field(model, &caps["name"], &caps["value"]);
                }
            }
        }

        let mut models: Vec<ExtractedModel> = classes
            .into_values()
            .map(|mut model| {
                model.description = doc_comment(&lines, model.line, &["---", "--"]);
                model.source_link = self.ctx.source_link(&file.rel, Some(model.line));
                model
            })
            .collect();
        models.sort_by_key(|m| m.line);
        models
    }

    /// `(class, method)` pairs in source order.
    fn methods(&self, content: &str) -> Vec<(String, String)> {
        METHOD
            .captures_iter(content)
            .filter_map(|c| {
                let class = capture(&c, "class").or_else(|| capture(&c, "class2"))?;
                let name = capture(&c, "name").or_else(|| capture(&c, "name2"))?;
                Some((class, name))
            })
            .filter(|(_, name)| name != "__index")
            .collect()
    }

    fn file_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let content = &file.content;
        let index = LineIndex::new(content);
        let mut push = |method: &str, path: String, decorator: &str, offset: usize, description: Option<String>| {
            let line = index.line_of(offset);
            let mut ep = ExtractedEndpoint::new(method, path, &file.rel, line).with_decorator(decorator);
            ep.description = description;
            ep.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(ep);
        };

        for caps in LAPIS_ROUTE.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let method = match &caps["method"] {
                "match" => "ANY".to_string(),
                other => other.to_ascii_uppercase(),
            };
            push(&method, caps["path"].to_string(), "lapis", whole.start(), capture(&caps, "name"));
        }

        // OpenResty handlers dispatch on the method inside one location; pair
        // each method check with the closest preceding URI check.
        let fallback = format!("/{}", file.file_name().trim_end_matches(".lua"));
        for caps in NGX_METHOD.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let path = NGX_URI
                .captures_iter(&content[..whole.start()])
                .last()
                .map(|c| c["path"].to_string())
                .unwrap_or_else(|| fallback.clone());
            push(&caps["method"], path, "openresty", whole.start(), None);
        }

        for caps in SESSION_EXECUTE.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            push("DIALPLAN", caps["app"].to_string(), "freeswitch_session", whole.start(), capture(&caps, "args"));
        }
        for caps in API_EXECUTE.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            push("API", caps["command"].to_string(), "freeswitch_api", whole.start(), None);
        }
    }

    fn rockspec_dependencies(&self) -> Vec<ExtractedDependency> {
        let files = self.ctx.find_files_matching(|p| {
            p.extension().map(|e| e == "rockspec").unwrap_or(false)
        });
        let mut deps = Vec::new();
        for path in files {
            let Some(file) = self.ctx.load(&path) else { continue };
            let index = LineIndex::new(&file.content);
            let Some(block) = ROCKSPEC_DEPS.captures(&file.content) else { continue };
            let Some(body) = block.name("body") else { continue };
            for entry in ROCKSPEC_ENTRY.captures_iter(body.as_str()) {
                let Some(name) = entry.name("name") else { continue };
                if name.as_str() == "lua" {
                    continue;
                }
                deps.push(ExtractedDependency::new(
                    name.as_str(),
                    capture(&entry, "version").map(|v| v.trim_end_matches(',').trim().to_string()),
                    &file.rel,
                    index.line_of(body.start() + name.start()),
                ));
            }
        }
        deps
    }
}

fn push_field(model: &mut ExtractedModel, name: &str, value: &str) {
    if model.fields.len() >= MAX_FIELDS || model.fields.iter().any(|f| f.name == name) {
        return;
    }
    let value = value.trim_end_matches(';').trim();
    let field_type = if value.starts_with(['"', '\'']) || value.starts_with("[[") {
        "string"
    } else if value == "true" || value == "false" {
        "boolean"
    } else if value == "nil" {
        "nil"
    } else if value.starts_with('{') {
        "table"
    } else if value.parse::<f64>().is_ok() {
        "number"
    } else {
        "any"
    };
    let mut field = ExtractedField::new(name, field_type);
    field.required = false;
    if field_type != "any" && field_type != "table" {
        field.default = Some(value.to_string());
    }
    model.fields.push(field);
}

impl LanguageAnalyzer for LuaAnalyzer {
    fn language_id(&self) -> &'static str {
        "lua"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["lua"]
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
        // Channel variables are per-call and may be unset.
        for cfg in config.iter_mut().filter(|c| c.source == "channel_variable") {
            cfg.required = false;
        }
        Ok(config)
    }

    fn extract_dependencies(&self) -> anyhow::Result<Vec<ExtractedDependency>> {
        Ok(self.rockspec_dependencies())
    }
}

pub(super) fn install() {
    register(Language::Lua, |ctx| Box::new(LuaAnalyzer::new(ctx)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn analyzer_with(files: &[(&str, &str)]) -> (TempDir, LuaAnalyzer) {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let ctx = AnalyzerContext::new(temp.path());
        (temp, LuaAnalyzer::new(ctx))
    }

    const QUEUE: &str = r#"-- Call queue with priority ordering.
local CallQueue = {}
CallQueue.__index = CallQueue
CallQueue.max_size = 100

function CallQueue.new(name)
    local self = setmetatable({}, CallQueue)
    self.name = name
    self.items = {}
    self.paused = false
    return self
end

function CallQueue:push(call)
    table.insert(self.items, call)
end

local PriorityQueue = {}
setmetatable(PriorityQueue, { __index = CallQueue })

function PriorityQueue:pop()
    return table.remove(self.items, 1)
end

return CallQueue
"#;

    #[test]
    fn test_table_classes() {
        let (_temp, analyzer) = analyzer_with(&[("lib/queue.lua", QUEUE)]);
        let models = analyzer.extract_models().unwrap();
        assert_eq!(models.len(), 2);

        let queue = &models[0];
        assert_eq!(queue.name, "CallQueue");
        assert_eq!(queue.model_type, ModelType::Class);
        assert_eq!(queue.description.as_deref(), Some("Call queue with priority ordering."));
        assert_eq!(queue.methods, vec!["new", "push"]);
        let fields: Vec<_> = queue
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type.as_str(), f.default.as_deref()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("max_size", "number", Some("100")),
                ("name", "any", None),
                ("items", "table", None),
                ("paused", "boolean", Some("false")),
            ]
        );

        let priority = &models[1];
        assert_eq!(priority.name, "PriorityQueue");
        assert_eq!(priority.parent.as_deref(), Some("CallQueue"));
        assert_eq!(priority.methods, vec!["pop"]);
    }

    #[test]
    fn test_endpoints() {
        let lapis = r#"
local app = lapis.Application()
app:get("/health", function() return "ok" end)
app:match("user", "/users/:id", respond_to({}))
"#;
        let dialplan = r#"
local dest = session:getVariable("destination_number")
local timeout = freeswitch.getGlobalVariable("ivr_timeout") or "30"
session:execute("playback", "/sounds/welcome.wav")
session:execute("bridge", "user/1000")
local api = freeswitch.API()
api:executeString("reloadxml")
"#;
        let resty = r#"
if ngx.var.uri == "/orders" then
    if ngx.req.get_method() == "POST" then
        local res = ngx.location.capture("/internal/orders")
    end
end
"#;
        let (_temp, analyzer) = analyzer_with(&[
            ("app.lua", lapis),
            ("ivr.lua", dialplan),
            ("orders.lua", resty),
        ]);
        let endpoints = analyzer.extract_endpoints().unwrap();
        let found: Vec<_> = endpoints
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str(), e.decorators[0].as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("GET", "/health", "lapis"),
                ("ANY", "/users/:id", "lapis"),
                ("DIALPLAN", "playback", "freeswitch_session"),
                ("DIALPLAN", "bridge", "freeswitch_session"),
                ("API", "reloadxml", "freeswitch_api"),
                ("POST", "/orders", "openresty"),
            ]
        );
        assert_eq!(endpoints[2].description.as_deref(), Some("/sounds/welcome.wav"));

        let config = analyzer.extract_config().unwrap();
        let keys: Vec<_> = config
            .iter()
            .map(|c| (c.key.as_str(), c.source.as_str(), c.required, c.default.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("ivr_timeout", "freeswitch_global", false, Some("30")),
                ("destination_number", "channel_variable", false, None),
            ]
        );

        let effects = analyzer.extract_side_effects().unwrap();
        let summary: Vec<_> = effects
            .iter()
            .map(|e| (e.category, e.operation.as_str(), e.target.as_deref()))
            .collect();
        assert!(summary.contains(&(SideEffectCategory::ExternalApi, "api", Some("freeswitch"))));
        assert!(summary.contains(&(SideEffectCategory::Http, "subrequest", Some("/internal/orders"))));
    }

    #[test]
    fn test_rockspec_dependencies() {
        let rockspec = r#"package = "ivr"
version = "1.0-1"
dependencies = {
   "lua >= 5.1",
   "lapis >= 1.9",
   "lua-cjson",
}
"#;
        let (_temp, analyzer) = analyzer_with(&[("ivr-1.0-1.rockspec", rockspec)]);
        let deps = analyzer.extract_dependencies().unwrap();
        let found: Vec<_> = deps.iter().map(|d| (d.name.as_str(), d.version.as_deref(), d.line)).collect();
        assert_eq!(found, vec![("lapis", Some(">= 1.9"), 5), ("lua-cjson", None, 6)]);
    }
}
