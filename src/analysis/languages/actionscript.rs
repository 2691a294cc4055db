//! ActionScript 3 / Flex analyzer.
//!
//! Flash clients talk to servers through `NetConnection` (AMF/RTMP),
//! `URLRequest` and Flex `RemoteObject` destinations; these are reported as
//! the endpoints the client depends on. MXML files are scanned for
//! `RemoteObject` and `HTTPService` declarations only.

use once_cell::sync::Lazy;

use super::{register, Language};
use crate::analysis::blocks::{doc_comment, find_brace_block, line_depth_delta, LineIndex, Syntax};
use crate::analysis::context::{is_test_file, AnalyzerContext, SourceFile};
use crate::analysis::model::{
    ExtractedConfig, ExtractedEndpoint, ExtractedField, ExtractedModel, ExtractedSideEffect,
    ModelType, SideEffectCategory,
};
use crate::analysis::patterns::{
    capture, config_rules, scan_config, scan_side_effects, side_effect_rules, ConfigRule, Dedup,
    Pattern, SideEffectRule, MAX_FIELDS, MAX_FILES_PER_CATEGORY, MAX_METHODS,
};
use crate::analysis::LanguageAnalyzer;

/// How far after `new URLRequest(...)` to look for the request method.
const REQUEST_METHOD_WINDOW: usize = 400;

static PACKAGE: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"(?m)^\s*package\s+(?P<name>[\w.]+)"));

static CLASS: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?m)^[ \t]*(?:(?:public|internal|final|dynamic)\s+)*(?P<kind>class|interface)\s+(?P<name>\w+)(?P<rest>[^{]*)\{",
    )
});

static EXTENDS: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"\bextends\s+(?P<names>[\w.,\s]+?)(?:\s+implements\b|\s*$)"));
static IMPLEMENTS: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"\bimplements\s+(?P<names>[\w.,\s]+)"));

static METADATA: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"^\s*\[(?P<name>\w+)(?:\([^)]*\))?\]\s*$"));

static VAR: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?P<meta>(?:\[[^\]]*\]\s*)*)(?P<mods>(?:(?:public|private|protected|internal|static|override)\s+)*)(?P<kw>var|const)\s+(?P<name>\w+)\s*(?::\s*(?P<type>[\w.*<>]+))?\s*(?:=\s*(?P<default>[^;]+?))?\s*;",
    )
});

static FUNCTION: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"^\s*(?:(?:public|private|protected|internal|static|override|final)\s+)*function\s+(?:(?P<accessor>get|set)\s+)?(?P<name>\w+)\s*\(",
    )
});

static NET_CONNECT: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"\.connect\(\s*["'](?P<url>(?:rtmp[a-z]*|https?)://[^"']+)["']"#)
});

static URL_REQUEST: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r#"\bnew\s+URLRequest\(\s*["'](?P<url>[^"']+)["']"#));

static REQUEST_METHOD: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"URLRequestMethod\.(?P<method>GET|POST|PUT|DELETE|HEAD)"));

static REMOTE_OBJECT: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"<(?:\w+:)?RemoteObject\b[^>]*?\bdestination\s*=\s*"(?P<mxml>[^"]+)"|\bnew\s+RemoteObject\(\s*["'](?P<ctor>[^"']+)["']|\.destination\s*=\s*["'](?P<assign>[^"']+)["']"#,
    )
});

static HTTP_SERVICE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"<(?:\w+:)?HTTPService\b(?P<attrs>[^>]*?)\burl\s*=\s*"(?P<url>[^"]+)""#)
});

static HTTP_SERVICE_METHOD: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r#"\bmethod\s*=\s*"(?P<method>\w+)""#));

static SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (r"\bnew\s+URLLoader\(", Http, "url_loader", ""),
        (
            r#"\b(?P<op>sendToURL|navigateToURL)\(\s*(?:new\s+URLRequest\(\s*["'](?P<target>[^"']+))?"#,
            Http,
            "request",
            "",
        ),
        (r#"\bSharedObject\.getLocal\(\s*["'](?P<target>[^"']+)"#, Cache, "shared_object", ""),
        (r"\bnew\s+FileReference\(", File, "file_reference", ""),
        (r"\bnew\s+FileStream\(", File, "file_stream", ""),
        (r"\bnew\s+(?P<target>Socket|XMLSocket)\(", ExternalApi, "socket", ""),
        (r#"\bExternalInterface\.call\(\s*["'](?P<target>[\w.]+)"#, ExternalApi, "external_interface", ""),
        (r"\bnew\s+SQLConnection\(", Database, "connect", "sqlite"),
        (
            r#"(?i)\.text\s*=\s*["'](?:SELECT\b[^"']*?\bFROM|INSERT\s+INTO|UPDATE|DELETE\s+FROM)\s+(?P<target>\w+)"#,
            Database,
            "sql",
            "",
        ),
    ])
});

static CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    config_rules(&[
        (
            r"(?m)^[ \t]*(?:(?:public|private|protected|internal)\s+)?static\s+const\s+(?P<key>[A-Z][A-Z0-9_]*)\s*:\s*\w+\s*=\s*(?P<default>[^;\n]+?)\s*;",
            "constant",
        ),
        (r"\bloaderInfo\.parameters\.(?P<key>\w+)", "flashvars"),
        (r#"\bparameters\[\s*["'](?P<key>\w+)["']\s*\]"#, "flashvars"),
    ])
});

/// ActionScript / Flex analyzer.
pub struct ActionScriptAnalyzer {
    ctx: AnalyzerContext,
}

impl ActionScriptAnalyzer {
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
        let package = PACKAGE.captures(content).map(|c| c["name"].to_string());

        let mut models = Vec::new();
        for caps in CLASS.captures_iter(content) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.name("name")) else { continue };
            let line = index.line_of(name.start());
            let is_interface = &caps["kind"] == "interface";
            let model_type = if is_interface { ModelType::Interface } else { ModelType::Class };
            let mut model = ExtractedModel::new(name.as_str(), model_type, &file.rel, line);

            let rest = caps["rest"].trim();
            let extends = EXTENDS.captures(rest).map(|c| split_names(&c["names"])).unwrap_or_default();
            let implements = IMPLEMENTS.captures(rest).map(|c| split_names(&c["names"])).unwrap_or_default();
            if is_interface {
                model.interfaces = extends;
            } else {
                model.parent = extends.into_iter().next();
                model.interfaces = implements;
            }

            model.decorators = metadata_above(&lines, line);
            let doc_line = line - model.decorators.len();
            model.description = doc_comment(&lines, doc_line, &["*/", "/**", "/*", "*", "//"])
                .or_else(|| package.as_ref().map(|p| format!("package {}", p)));

            if let Some(body) = find_brace_block(content, whole.end() - 1, Syntax::C_LIKE) {
                parse_members(&content[body], &mut model);
            }
            model.source_link = self.ctx.source_link(&file.rel, Some(line));
            models.push(model);
        }
        models
    }

    fn file_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let content = &file.content;
        let index = LineIndex::new(content);
        let mut push = |method: &str, path: &str, decorator: &str, offset: usize| {
            let line = index.line_of(offset);
            let mut ep = ExtractedEndpoint::new(method, path, &file.rel, line).with_decorator(decorator);
            ep.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(ep);
        };

        for caps in NET_CONNECT.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            push("AMF", &caps["url"], "net_connection", whole.start());
        }

        for caps in URL_REQUEST.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let mut window_end = (whole.end() + REQUEST_METHOD_WINDOW).min(content.len());
            while !content.is_char_boundary(window_end) {
                window_end -= 1;
            }
            // The method is set on the request after construction, before the
            // next request is built.
            let window = &content[whole.end()..window_end];
            let window = window.find("new URLRequest").map_or(window, |i| &window[..i]);
            let method = REQUEST_METHOD
                .captures(window)
                .map(|c| c["method"].to_string())
                .unwrap_or_else(|| "GET".to_string());
            push(&method, &caps["url"], "url_request", whole.start());
        }

        for caps in REMOTE_OBJECT.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(destination) = capture(&caps, "mxml")
                .or_else(|| capture(&caps, "ctor"))
                .or_else(|| capture(&caps, "assign"))
            else {
                continue;
            };
            push("AMF", &destination, "remote_object", whole.start());
        }

        for caps in HTTP_SERVICE.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let method = HTTP_SERVICE_METHOD
                .captures(&caps["attrs"])
                .map(|c| c["method"].to_ascii_uppercase())
                .unwrap_or_else(|| "GET".to_string());
            push(&method, &caps["url"], "http_service", whole.start());
        }
    }
}

fn split_names(names: &str) -> Vec<String> {
    names
        .split(',')
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(|n| n.rsplit('.').next().unwrap_or(n).to_string())
        .collect()
}

/// `[Metadata]` tags on the lines directly above a declaration.
fn metadata_above(lines: &[&str], decl_line: usize) -> Vec<String> {
    let mut found = Vec::new();
    let mut idx = decl_line.saturating_sub(1);
    while idx > 0 {
        idx -= 1;
        let Some(caps) = lines.get(idx).and_then(|l| METADATA.captures(l)) else {
            break;
        };
        found.push(caps["name"].to_string());
    }
    found.reverse();
    found
}

fn parse_members(body: &str, model: &mut ExtractedModel) {
    let mut depth = 0;
    let mut pending_meta: Vec<String> = Vec::new();
    for line in body.lines() {
        if depth == 0 {
            if let Some(caps) = METADATA.captures(line) {
                pending_meta.push(format!("[{}]", &caps["name"]));
            } else if let Some(caps) = FUNCTION.captures(line) {
                let name = &caps["name"];
                if name != model.name && model.methods.len() < MAX_METHODS {
                    let method = match capture(&caps, "accessor") {
                        Some(accessor) => format!("{} {}", accessor, name),
                        None => name.to_string(),
                    };
                    if !model.methods.contains(&method) {
                        model.methods.push(method);
                    }
                }
                pending_meta.clear();
            } else if let Some(caps) = VAR.captures(line) {
                if model.fields.len() < MAX_FIELDS {
                    let field_type = capture(&caps, "type").unwrap_or_else(|| "*".to_string());
                    let mut field = ExtractedField::new(&caps["name"], field_type);
                    field.default = capture(&caps, "default");
                    field.required = field.default.is_none();
                    let mut tags: Vec<String> = std::mem::take(&mut pending_meta);
                    if let Some(meta) = capture(&caps, "meta") {
                        tags.extend(meta.split_whitespace().map(str::to_string));
                    }
                    if &caps["kw"] == "const" {
                        tags.push("const".to_string());
                    }
                    if caps["mods"].contains("static") {
                        tags.push("static".to_string());
                    }
                    if !tags.is_empty() {
                        field.tag = Some(tags.join(" "));
                    }
                    model.fields.push(field);
                }
                pending_meta.clear();
            } else if !line.trim().is_empty() {
                pending_meta.clear();
            }
        }
        depth = (depth + line_depth_delta(line, Syntax::C_LIKE)).max(0);
    }
}

impl LanguageAnalyzer for ActionScriptAnalyzer {
    fn language_id(&self) -> &'static str {
        "actionscript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["as", "mxml"]
    }

    fn context(&self) -> &AnalyzerContext {
        &self.ctx
    }

    fn extract_models(&self) -> anyhow::Result<Vec<ExtractedModel>> {
        Ok(self
            .files()
            .iter()
            .filter(|f| f.extension() == "as" && !is_test_file(&f.rel))
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
        // Constants always have their value; FlashVars may be absent at embed time.
        for cfg in &mut config {
            cfg.required = false;
        }
        Ok(config)
    }
}

pub(super) fn install() {
    register(Language::ActionScript, |ctx| Box::new(ActionScriptAnalyzer::new(ctx)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn analyzer_with(files: &[(&str, &str)]) -> (TempDir, ActionScriptAnalyzer) {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let ctx = AnalyzerContext::new(temp.path());
        (temp, ActionScriptAnalyzer::new(ctx))
    }

    const USER: &str = r#"package com.example.models {
    import flash.events.EventDispatcher;

    /**
     * A player account synced with the lobby server.
     */
    [Bindable]
    [RemoteClass(alias="com.example.User")]
    public class User extends flash.events.EventDispatcher implements IEntity, ISerializable {
        public static const MAX_LEVEL:int = 99;
        public var id:int;
        public var name:String = "guest";
        [Transient]
        public var cache:Object;

        public function User() {
            super();
        }

        public function get displayName():String {
            return name;
        }

        public function save():void {
            var request:URLRequest = new URLRequest("http://api.example.com/users");
            request.method = URLRequestMethod.POST;
            var loader:URLLoader = new URLLoader();
            loader.load(request);
        }
    }
}
"#;

    #[test]
    fn test_class_model() {
        let (_temp, analyzer) = analyzer_with(&[("src/com/example/models/User.as", USER)]);
        let models = analyzer.extract_models().unwrap();
        assert_eq!(models.len(), 1);

        let user = &models[0];
        assert_eq!(user.name, "User");
        assert_eq!(user.model_type, ModelType::Class);
        assert_eq!(user.parent.as_deref(), Some("EventDispatcher"));
        assert_eq!(user.interfaces, vec!["IEntity", "ISerializable"]);
        assert_eq!(user.decorators, vec!["Bindable", "RemoteClass"]);
        assert_eq!(user.description.as_deref(), Some("A player account synced with the lobby server."));
        assert_eq!(user.methods, vec!["get displayName", "save"]);

        let fields: Vec<_> = user
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.field_type.as_str(), f.required, f.tag.as_deref()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("MAX_LEVEL", "int", false, Some("const static")),
                ("id", "int", true, None),
                ("name", "String", false, None),
                ("cache", "Object", true, Some("[Transient]")),
            ]
        );
        assert_eq!(user.fields[1].default, None);
        assert_eq!(user.fields[2].default.as_deref(), Some("\"guest\""));
    }

    #[test]
    fn test_interface_extends() {
        let source = r#"package com.example {
    public interface IEntity extends IEventDispatcher {
        function get id():int;
    }
}
"#;
        let (_temp, analyzer) = analyzer_with(&[("IEntity.as", source)]);
        let models = analyzer.extract_models().unwrap();
        assert_eq!(models[0].model_type, ModelType::Interface);
        assert_eq!(models[0].interfaces, vec!["IEventDispatcher"]);
        assert_eq!(models[0].parent, None);
        assert_eq!(models[0].methods, vec!["get id"]);
        assert_eq!(models[0].description.as_deref(), Some("package com.example"));
    }

    #[test]
    fn test_endpoints() {
        let lobby = r#"package {
    public class Lobby {
        public function join():void {
            nc.connect("rtmp://media.example.com/live");
            var svc:RemoteObject = new RemoteObject("lobbyService");
            var ping:URLRequest = new URLRequest("http://api.example.com/ping");
        }
    }
}
"#;
        let mxml = r#"<s:Application xmlns:s="library://ns.adobe.com/flex/spark">
  <fx:Declarations>
    <s:RemoteObject id="users" destination="userService"/>
    <s:HTTPService id="feed" method="post" url="http://api.example.com/feed"/>
  </fx:Declarations>
</s:Application>
"#;
        let (_temp, analyzer) = analyzer_with(&[
            ("Lobby.as", lobby),
            ("Main.mxml", mxml),
            ("User.as", USER),
        ]);
        let endpoints = analyzer.extract_endpoints().unwrap();
        let found: Vec<_> = endpoints
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str(), e.decorators[0].as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("AMF", "rtmp://media.example.com/live", "net_connection"),
                ("GET", "http://api.example.com/ping", "url_request"),
                ("AMF", "lobbyService", "remote_object"),
                ("AMF", "userService", "remote_object"),
                ("POST", "http://api.example.com/feed", "http_service"),
                ("POST", "http://api.example.com/users", "url_request"),
            ]
        );
    }

    #[test]
    fn test_side_effects_and_config() {
        let source = r#"package {
    public class Settings extends Sprite {
        private static const API_BASE:String = "https://api.example.com";

        public function Settings() {
            var so:SharedObject = SharedObject.getLocal("prefs");
            var token:String = loaderInfo.parameters.token;
            var lang:String = root.loaderInfo.parameters["lang"];
            ExternalInterface.call("trackEvent", "boot");
            var socket:XMLSocket = new XMLSocket();
        }
    }
}
"#;
        let (_temp, analyzer) = analyzer_with(&[("Settings.as", source)]);

        let effects = analyzer.extract_side_effects().unwrap();
        let summary: Vec<_> = effects
            .iter()
            .map(|e| (e.category, e.operation.as_str(), e.target.as_deref()))
            .collect();
        assert!(summary.contains(&(SideEffectCategory::Cache, "shared_object", Some("prefs"))));
        assert!(summary.contains(&(SideEffectCategory::ExternalApi, "external_interface", Some("trackEvent"))));
        assert!(summary.contains(&(SideEffectCategory::ExternalApi, "socket", Some("XMLSocket"))));

        let config = analyzer.extract_config().unwrap();
        let keys: Vec<_> = config
            .iter()
            .map(|c| (c.key.as_str(), c.source.as_str(), c.required, c.default.as_deref()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("API_BASE", "constant", false, Some("https://api.example.com")),
                ("token", "flashvars", false, None),
                ("lang", "flashvars", false, None),
            ]
        );
    }
}
