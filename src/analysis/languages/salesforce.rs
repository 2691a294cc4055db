//! Salesforce analyzer: Apex classes and triggers, Lightning Web Components
//! and custom object metadata.
//!
//! Apex keywords are case-insensitive, so every Apex pattern is compiled
//! with `(?i)`.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use tracing::debug;

use super::{register, Language};
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

static CLASS_DECL: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?mi)^[ \t]*(?P<mods>(?:(?:public|private|global|protected|virtual|abstract|static|with\s+sharing|without\s+sharing|inherited\s+sharing)\s+)*)(?P<kind>class|interface|enum)\s+(?P<name>\w+)(?P<rest>[^{;]*)\{",
    )
});

static EXTENDS: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"(?i)\bextends\s+(?P<name>[\w.]+)"));
static IMPLEMENTS: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"(?i)\bimplements\s+(?P<names>[\w.<>]+(?:\s*,\s*[\w.<>]+)*)"));

static ANNOTATION: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^\s*@(?P<name>\w+)(?:\s*\((?P<args>[^)]*)\))?\s*$"));

static TRIGGER: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?mi)^\s*trigger\s+(?P<name>\w+)\s+on\s+(?P<object>\w+)\s*\((?P<events>[^)]*)\)")
});

static METHOD: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?i)^\s*(?:@\w+(?:\([^)]*\))?\s+)*(?:(?:public|private|global|protected|static|override|virtual|abstract|webservice|testmethod)\s+)*(?P<ret>[\w.<>, \[\]]+?)\s+(?P<name>\w+)\s*\((?P<params>[^)]*)\)",
    )
});

static PROPERTY: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?i)^\s*(?:@\w+(?:\([^)]*\))?\s+)*(?P<mods>(?:(?:public|private|global|protected|static|final|transient)\s+)*)(?P<type>[\w.]+(?:<[\w.<>, ]+>)?(?:\[\])?)\s+(?P<name>\w+)\s*(?P<tail>\{|=|;)",
    )
});

static ENUM_VALUE: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"\b(?P<name>[A-Za-z_]\w*)\b"));

static REST_RESOURCE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"(?i)@RestResource\s*\(\s*urlMapping\s*=\s*['"](?P<path>[^'"]+)['"]"#)
});

static HTTP_HANDLER: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?i)@Http(?P<method>Get|Post|Put|Patch|Delete)\b(?:\s*@\w+(?:\([^)]*\))?)*\s*(?:(?:global|public|static|webservice|override)\s+)*[\w.<>,\[\] ]+?\s+(?P<handler>\w+)\s*\(",
    )
});

static AURA_HANDLER: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r"(?i)@(?P<kind>AuraEnabled|RemoteAction)\b(?:\s*\([^)]*\))?(?:\s*@\w+(?:\([^)]*\))?)*\s*(?:(?:global|public|static|webservice|override)\s+)*[\w.<>,\[\] ]+?\s+(?P<handler>\w+)\s*\(",
    )
});

static LWC_CLASS: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?m)^export\s+default\s+class\s+(?P<name>\w+)\s+extends\s+(?P<parent>[\w.]+)\s*\{")
});

static LWC_PROPERTY: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"(?m)^\s*@(?P<kind>api|track)\s+(?:get\s+|set\s+)?(?P<name>\w+)\s*(?:=\s*(?P<default>[^;\n]+?))?\s*[;(\n]")
});

static LWC_WIRE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"@wire\(\s*(?P<adapter>[\w.]+)[^)]*\)\s*(?P<handler>\w+)")
});

static LWC_APEX_IMPORT: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r#"import\s+\w+\s+from\s+['"]@salesforce/apex/(?P<target>[\w.]+)['"]"#)
});

static APEX_SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (r"(?i)\[\s*SELECT\b[^\]]*?\bFROM\s+(?P<target>\w+)", Database, "soql", ""),
        (r"(?i)\[\s*FIND\b[^\]]*\]", Database, "sosl", ""),
        (r"(?i)\bDatabase\.query\(", Database, "dynamic_soql", ""),
        (r"(?i)\bSearch\.query\(", Database, "sosl", ""),
        (
            r"(?im)^\s*(?P<op>insert|update|delete|upsert|undelete|merge)\s+(?P<target>\w+)\s*;",
            Database,
            "dml",
            "",
        ),
        (
            r"(?i)\bDatabase\.(?P<op>insert|update|delete|upsert|undelete|merge)\(\s*(?P<target>\w+)",
            Database,
            "dml",
            "",
        ),
        (r"(?i)\bnew\s+Http\(\s*\)\.send\(|\bhttp\w*\.send\(", Http, "callout", ""),
        (r"(?i)\bnew\s+HttpRequest\(\s*\)", Http, "http_request", ""),
        (r"(?i)\.setEndpoint\(\s*'(?P<target>[^']+)'", Http, "callout", ""),
        (r"(?i)\bMessaging\.sendEmail\(", Email, "send_email", "messaging"),
        (r"(?i)\bEventBus\.publish\(", Queue, "publish", "event_bus"),
        (r"(?i)\bSystem\.enqueueJob\(", Queue, "enqueue_job", "queueable"),
        (r"(?i)\bDatabase\.executeBatch\(", Queue, "execute_batch", "batch"),
    ])
});

static LWC_SIDE_EFFECTS: Lazy<Vec<SideEffectRule>> = Lazy::new(|| {
    use SideEffectCategory::*;
    side_effect_rules(&[
        (r#"\bfetch\(\s*(?:['"`](?P<target>[^'"`]+)['"`])?"#, Http, "fetch", ""),
        (r"\b(?P<op>createRecord|updateRecord|deleteRecord)\(", Database, "lds", "ui_record_api"),
    ])
});

static CONFIG: Lazy<Vec<ConfigRule>> = Lazy::new(|| {
    config_rules(&[
        (
            r"(?i)\b(?P<key>\w+__c)\.(?:getInstance|getOrgDefaults|getValues|getAll)\(",
            "custom_setting",
        ),
        (
            r"(?i)\b(?P<key>\w+__mdt)\.(?:getInstance|getAll)\(",
            "custom_metadata",
        ),
        (r"(?i)\b(?:System\.)?Label\.(?P<key>\w+)", "custom_label"),
    ])
});

/// Salesforce analyzer.
pub struct SalesforceAnalyzer {
    ctx: AnalyzerContext,
}

impl SalesforceAnalyzer {
    pub fn new(ctx: AnalyzerContext) -> Self {
        Self { ctx }
    }

    fn apex_files(&self) -> Vec<SourceFile> {
        self.ctx
            .source_files(self.file_extensions())
            .into_iter()
            .take(MAX_FILES_PER_CATEGORY)
            .collect()
    }

    /// Lightning Web Component modules under an `lwc/` directory.
    fn lwc_files(&self) -> Vec<SourceFile> {
        let root = self.ctx.root().to_path_buf();
        self.ctx
            .find_files_matching(|path| {
                let rel = path.strip_prefix(&root).unwrap_or(path);
                path.extension().map(|e| e == "js").unwrap_or(false)
                    && rel.components().any(|c| c.as_os_str() == "lwc")
                    && !rel.components().any(|c| c.as_os_str() == "__tests__")
            })
            .into_iter()
            .take(MAX_FILES_PER_CATEGORY)
            .filter_map(|p| self.ctx.load(&p))
            .collect()
    }

    fn metadata_files(&self) -> Vec<SourceFile> {
        self.ctx
            .find_files_matching(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(".object-meta.xml") || n.ends_with(".field-meta.xml") || n.ends_with(".object"))
                    .unwrap_or(false)
            })
            .into_iter()
            .filter_map(|p| self.ctx.load(&p))
            .collect()
    }

    fn apex_models(&self, file: &SourceFile) -> Vec<ExtractedModel> {
        let content = &file.content;
        let index = LineIndex::new(content);
        let lines: Vec<&str> = content.lines().collect();
        let mut models = Vec::new();

        for caps in CLASS_DECL.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let line = index.line_of(whole.start());
            let annotations = annotations_above(&lines, line);
            if annotations.iter().any(|a| a.eq_ignore_ascii_case("isTest")) {
                continue;
            }
            let Some(body) = find_brace_block(content, whole.start(), Syntax::C_LIKE) else {
                continue;
            };
            let model_type = match caps["kind"].to_ascii_lowercase().as_str() {
                "interface" => ModelType::Interface,
                "enum" => ModelType::Enum,
                _ => ModelType::Class,
            };
            let mut model = ExtractedModel::new(&caps["name"], model_type, &file.rel, line);
            model.decorators = annotations;
            model.decorators.extend(sharing_modifiers(&caps["mods"]));

            if let Some(ext) = EXTENDS.captures(&caps["rest"]) {
                model.parent = Some(ext["name"].to_string());
            }
            if let Some(imp) = IMPLEMENTS.captures(&caps["rest"]) {
                model
                    .interfaces
                    .extend(imp["names"].split(',').map(|s| s.trim().to_string()));
            }

            let body = &content[body];
            if model_type == ModelType::Enum {
                for value in ENUM_VALUE.captures_iter(body).take(MAX_FIELDS) {
                    model.fields.push(ExtractedField::new(&value["name"], "enum_value"));
                }
            } else {
                parse_members(body, &mut model);
            }
            model.source_link = self.ctx.source_link(&file.rel, Some(line));
            models.push(model);
        }

        for caps in TRIGGER.captures_iter(content) {
            let Some(name) = caps.name("name") else { continue };
            let line = index.line_of(name.start());
            let mut model = ExtractedModel::new(name.as_str(), ModelType::Class, &file.rel, line);
            model.decorators.push("trigger".to_string());
            model.description = Some(format!("Trigger on {}", &caps["object"]));
            model.methods = caps["events"]
                .split(',')
                .map(|e| e.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase())
                .filter(|e| !e.is_empty())
                .collect();
            model.source_link = self.ctx.source_link(&file.rel, Some(line));
            models.push(model);
        }
        models
    }

    fn lwc_model(&self, file: &SourceFile) -> Option<ExtractedModel> {
        let caps = LWC_CLASS.captures(&file.content)?;
        let whole = caps.get(0)?;
        let index = LineIndex::new(&file.content);
        let line = index.line_of(whole.start());
        let mut model = ExtractedModel::new(&caps["name"], ModelType::Class, &file.rel, line);
        model.parent = Some(caps["parent"].to_string());
        model.decorators.push("lwc".to_string());
        for prop in LWC_PROPERTY.captures_iter(&file.content).take(MAX_FIELDS) {
            let mut field = ExtractedField::new(&prop["name"], "any");
            field.tag = Some(format!("@{}", &prop["kind"]));
            field.default = capture(&prop, "default");
            field.required = false;
            model.fields.push(field);
        }
        model.source_link = self.ctx.source_link(&file.rel, Some(line));
        Some(model)
    }

    /// Custom objects from `*.object-meta.xml`, legacy `*.object` files and
    /// per-field `*.field-meta.xml`, merged by object name.
    fn object_models(&self) -> Vec<ExtractedModel> {
        let mut objects: BTreeMap<String, ExtractedModel> = BTreeMap::new();

        for file in self.metadata_files() {
            let doc = match roxmltree::Document::parse(&file.content) {
                Ok(doc) => doc,
                Err(e) => {
                    debug!(path = %file.rel, error = %e, "skipping unparseable metadata");
                    continue;
                }
            };
            let root = doc.root_element();
            let name = file.file_name();

            if let Some(object) = name
                .strip_suffix(".object-meta.xml")
                .or_else(|| name.strip_suffix(".object"))
            {
                let model = objects
                    .entry(object.to_string())
                    .or_insert_with(|| new_object_model(object, &file.rel));
                model.file = file.rel.clone();
                model.description = child_text(root, "description").or_else(|| child_text(root, "label"));
                for field in root.children().filter(|n| n.has_tag_name("fields")) {
                    if model.fields.len() < MAX_FIELDS {
                        model.fields.push(metadata_field(field));
                    }
                }
                model.source_link = self.ctx.source_link(&file.rel, Some(1));
            } else if name.ends_with(".field-meta.xml") {
                // objects/<Object>/fields/<Field>.field-meta.xml
                let Some(object) = Path::new(&file.rel)
                    .parent()
                    .filter(|p| p.file_name().map(|n| n == "fields").unwrap_or(false))
                    .and_then(|p| p.parent())
                    .and_then(|p| p.file_name())
                    .and_then(|n| n.to_str())
                else {
                    continue;
                };
                let model = objects
                    .entry(object.to_string())
                    .or_insert_with(|| new_object_model(object, &file.rel));
                if model.fields.len() < MAX_FIELDS {
                    model.fields.push(metadata_field(root));
                }
            }
        }
        objects.into_values().collect()
    }

    fn apex_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let content = &file.content;
        let index = LineIndex::new(content);

        for caps in CLASS_DECL.captures_iter(content) {
            let Some(whole) = caps.get(0) else { continue };
            let Some(body) = find_brace_block(content, whole.start(), Syntax::C_LIKE) else {
                continue;
            };
            let class_name = &caps["name"];
            // The annotation sits above the class header.
            let header_start = content[..whole.start()]
                .rfind(['}', ';'])
                .map(|i| i + 1)
                .unwrap_or(0);
            let base_path = REST_RESOURCE
                .captures(&content[header_start..whole.end()])
                .map(|c| c["path"].to_string());
            let body_text = &content[body.clone()];

            if let Some(base) = &base_path {
                for handler in HTTP_HANDLER.captures_iter(body_text) {
                    let Some(at) = handler.get(0) else { continue };
                    let line = index.line_of(body.start + at.start());
                    let mut ep = ExtractedEndpoint::new(handler["method"].to_ascii_uppercase(), base.clone(), &file.rel, line)
                        .with_handler(Some(format!("{}.{}", class_name, &handler["handler"])))
                        .with_decorator("rest_resource");
                    ep.source_link = self.ctx.source_link(&file.rel, Some(line));
                    out.push(ep);
                }
            }

            for handler in AURA_HANDLER.captures_iter(body_text) {
                let Some(at) = handler.get(0) else { continue };
                let (method, decorator) = if handler["kind"].eq_ignore_ascii_case("AuraEnabled") {
                    ("AURA", "aura_enabled")
                } else {
                    ("REMOTE", "remote_action")
                };
                let line = index.line_of(body.start + at.start());
                let path = format!("/{}/{}", class_name, &handler["handler"]);
                let mut ep = ExtractedEndpoint::new(method, path, &file.rel, line)
                    .with_handler(Some(format!("{}.{}", class_name, &handler["handler"])))
                    .with_decorator(decorator);
                ep.source_link = self.ctx.source_link(&file.rel, Some(line));
                out.push(ep);
            }
        }
    }

    fn lwc_endpoints(&self, file: &SourceFile, out: &mut Vec<ExtractedEndpoint>) {
        let component = Path::new(&file.rel)
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("component");
        let index = LineIndex::new(&file.content);
        for caps in LWC_WIRE.captures_iter(&file.content) {
            let Some(at) = caps.get(0) else { continue };
            let line = index.line_of(at.start());
            let path = format!("/lwc/{}/{}", component, &caps["adapter"]);
            let mut ep = ExtractedEndpoint::new("WIRE", path, &file.rel, line)
                .with_handler(capture(&caps, "handler"))
                .with_decorator("wire");
            ep.source_link = self.ctx.source_link(&file.rel, Some(line));
            out.push(ep);
        }
    }

    fn lwc_side_effects(&self, file: &SourceFile, dedup: &mut Dedup, out: &mut Vec<ExtractedSideEffect>) {
        scan_side_effects(&self.ctx, file, &LWC_SIDE_EFFECTS, dedup, out);
        let index = LineIndex::new(&file.content);
        for caps in LWC_APEX_IMPORT.captures_iter(&file.content) {
            let Some(at) = caps.get(0) else { continue };
            let line = index.line_of(at.start());
            let mut effect = ExtractedSideEffect::new(
                SideEffectCategory::ExternalApi,
                "apex_call",
                capture(&caps, "target"),
                &file.rel,
                line,
            );
            if dedup.side_effect(&effect) {
                effect.source_link = self.ctx.source_link(&file.rel, Some(line));
                out.push(effect);
            }
        }
    }
}

fn new_object_model(name: &str, file: &str) -> ExtractedModel {
    let mut model = ExtractedModel::new(name, ModelType::Schema, file, 1);
    model.decorators.push("custom_object".to_string());
    model
}

fn child_text(node: roxmltree::Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|n| n.has_tag_name(tag))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn metadata_field(node: roxmltree::Node<'_, '_>) -> ExtractedField {
    let name = child_text(node, "fullName").unwrap_or_else(|| "unknown".to_string());
    let mut field_type = child_text(node, "type").unwrap_or_else(|| "Text".to_string());
    if let Some(reference) = child_text(node, "referenceTo") {
        field_type = format!("{}({})", field_type, reference);
    }
    let mut field = ExtractedField::new(name, field_type);
    field.required = child_text(node, "required").map(|r| r == "true").unwrap_or(false);
    field.description = child_text(node, "description").or_else(|| child_text(node, "label"));
    field.default = child_text(node, "defaultValue");
    field
}

fn sharing_modifiers(mods: &str) -> Vec<String> {
    let mods = mods.to_ascii_lowercase();
    let words: Vec<&str> = mods.split_whitespace().collect();
    words
        .windows(2)
        .filter(|w| w[1] == "sharing")
        .map(|w| format!("{}_sharing", w[0]))
        .collect()
}

/// Annotation names on the lines directly above a declaration.
fn annotations_above(lines: &[&str], decl_line: usize) -> Vec<String> {
    let mut found = Vec::new();
    let mut idx = decl_line.saturating_sub(1);
    while idx > 0 {
        idx -= 1;
        let Some(caps) = lines.get(idx).and_then(|l| ANNOTATION.captures(l)) else {
            break;
        };
        found.push(caps["name"].to_string());
    }
    found.reverse();
    found
}

fn parse_members(body: &str, model: &mut ExtractedModel) {
    let mut depth = 0;
    for line in body.lines() {
        if depth == 0 {
            if let Some(caps) = METHOD.captures(line) {
                let ret = caps["ret"].trim();
                let keyword = ret.rsplit(' ').next().unwrap_or(ret).to_ascii_lowercase();
                let is_statement = matches!(keyword.as_str(), "return" | "new" | "else" | "throw");
                if !is_statement && model.methods.len() < MAX_METHODS {
                    model.methods.push(format!("{}({})", &caps["name"], caps["params"].trim()));
                }
            } else if let Some(caps) = PROPERTY.captures(line) {
                if model.fields.len() < MAX_FIELDS {
                    let mut field = ExtractedField::new(&caps["name"], &caps["type"]);
                    field.required = false;
                    if caps["mods"].to_ascii_lowercase().contains("final") {
                        field.tag = Some("final".to_string());
                    }
                    model.fields.push(field);
                }
            }
        }
        depth = (depth + line_depth_delta(line, Syntax::C_LIKE)).max(0);
    }
}

impl LanguageAnalyzer for SalesforceAnalyzer {
    fn language_id(&self) -> &'static str {
        "apex"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["cls", "trigger"]
    }

    fn context(&self) -> &AnalyzerContext {
        &self.ctx
    }

    fn extract_models(&self) -> anyhow::Result<Vec<ExtractedModel>> {
        let mut models: Vec<ExtractedModel> = self
            .apex_files()
            .iter()
            .filter(|f| !is_test_file(&f.rel))
            .flat_map(|f| self.apex_models(f))
            .collect();
        models.extend(
            self.lwc_files()
                .iter()
                .filter(|f| !is_test_file(&f.rel))
                .filter_map(|f| self.lwc_model(f)),
        );
        models.extend(self.object_models());
        Ok(models)
    }

    fn extract_endpoints(&self) -> anyhow::Result<Vec<ExtractedEndpoint>> {
        let mut endpoints = Vec::new();
        for file in self.apex_files() {
            self.apex_endpoints(&file, &mut endpoints);
        }
        for file in self.lwc_files() {
            self.lwc_endpoints(&file, &mut endpoints);
        }
        Ok(endpoints)
    }

    fn extract_side_effects(&self) -> anyhow::Result<Vec<ExtractedSideEffect>> {
        let mut effects = Vec::new();
        for file in self.apex_files() {
            let mut dedup = Dedup::new();
            scan_side_effects(&self.ctx, &file, &APEX_SIDE_EFFECTS, &mut dedup, &mut effects);
        }
        for file in self.lwc_files() {
            let mut dedup = Dedup::new();
            self.lwc_side_effects(&file, &mut dedup, &mut effects);
        }
        Ok(effects)
    }

    fn extract_config(&self) -> anyhow::Result<Vec<ExtractedConfig>> {
        let mut config = Vec::new();
        for file in self.apex_files() {
            let mut dedup = Dedup::new();
            scan_config(&self.ctx, &file, &CONFIG, &mut dedup, &mut config);
        }
        // Every metadata lookup is optional at runtime.
        for cfg in &mut config {
            cfg.required = false;
        }
        Ok(config)
    }

    fn extract_dependencies(&self) -> anyhow::Result<Vec<ExtractedDependency>> {
        Ok(collect_dependencies(&self.ctx, &[ManifestKind::SfdxProject]))
    }
}

pub(super) fn install() {
    register(Language::Apex, |ctx| Box::new(SalesforceAnalyzer::new(ctx)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn analyzer_with(files: &[(&str, &str)]) -> (TempDir, SalesforceAnalyzer) {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let ctx = AnalyzerContext::new(temp.path());
        (temp, SalesforceAnalyzer::new(ctx))
    }

    const ACCOUNT_API: &str = r#"@RestResource(urlMapping='/accounts/*')
global with sharing class AccountApi extends BaseApi implements Loggable {
    public String region { get; set; }
    private static final Integer LIMIT_ROWS = 200;

    @HttpGet
    global static Account getAccount() {
        Account acc = [SELECT Id, Name FROM Account WHERE Id = :id LIMIT 1];
        return acc;
    }

    @HttpPost
    global static Id createAccount(String name) {
        Account acc = new Account(Name = name);
        insert acc;
        EventBus.publish(new Account_Created__e());
        return acc.Id;
    }

    @AuraEnabled(cacheable=true)
    public static List<Account> listAccounts() {
        Integer max = Limits__c.getInstance().Max_Rows__c;
        String title = Label.Account_Title;
        return new List<Account>();
    }
}
"#;

    #[test]
    fn test_apex_class_members() {
        let (_temp, analyzer) = analyzer_with(&[("force-app/main/default/classes/AccountApi.cls", ACCOUNT_API)]);
        let models = analyzer.extract_models().unwrap();
        assert_eq!(models.len(), 1);
        let api = &models[0];
        assert_eq!(api.name, "AccountApi");
        assert_eq!(api.line, 2);
        assert_eq!(api.parent.as_deref(), Some("BaseApi"));
        assert_eq!(api.interfaces, vec!["Loggable"]);
        assert_eq!(api.decorators, vec!["RestResource", "with_sharing"]);
        let fields: Vec<_> = api.fields.iter().map(|f| (f.name.as_str(), f.field_type.as_str())).collect();
        assert_eq!(fields, vec![("region", "String"), ("LIMIT_ROWS", "Integer")]);
        assert_eq!(
            api.methods,
            vec!["getAccount()", "createAccount(String name)", "listAccounts()"]
        );
    }

    #[test]
    fn test_apex_endpoints() {
        let (_temp, analyzer) = analyzer_with(&[("classes/AccountApi.cls", ACCOUNT_API)]);
        let endpoints = analyzer.extract_endpoints().unwrap();
        let found: Vec<_> = endpoints
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str(), e.handler.as_deref()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("GET", "/accounts/*", Some("AccountApi.getAccount")),
                ("POST", "/accounts/*", Some("AccountApi.createAccount")),
                ("AURA", "/AccountApi/listAccounts", Some("AccountApi.listAccounts")),
            ]
        );
    }

    #[test]
    fn test_apex_side_effects_and_config() {
        let (_temp, analyzer) = analyzer_with(&[("classes/AccountApi.cls", ACCOUNT_API)]);
        let effects = analyzer.extract_side_effects().unwrap();
        let summary: Vec<_> = effects
            .iter()
            .map(|e| (e.category, e.operation.as_str(), e.target.as_deref()))
            .collect();
        assert!(summary.contains(&(SideEffectCategory::Database, "soql", Some("Account"))));
        assert!(summary.contains(&(SideEffectCategory::Database, "insert", Some("acc"))));
        assert!(summary.contains(&(SideEffectCategory::Queue, "publish", Some("event_bus"))));

        let config = analyzer.extract_config().unwrap();
        let keys: Vec<_> = config.iter().map(|c| (c.key.as_str(), c.source.as_str())).collect();
        assert_eq!(
            keys,
            vec![("Limits__c", "custom_setting"), ("Account_Title", "custom_label")]
        );
    }

    #[test]
    fn test_trigger_and_lwc() {
        let trigger = "trigger OrderTrigger on Order__c (before insert, after   update) {\n}\n";
        let lwc = r#"import { LightningElement, api, wire } from 'lwc';
import getOrders from '@salesforce/apex/OrderController.getOrders';

export default class OrderList extends LightningElement {
    @api recordId;
    @track filter = 'open';

    @wire(getOrders, { recordId: '$recordId' })
    orders;
}
"#;
        let (_temp, analyzer) = analyzer_with(&[
            ("triggers/OrderTrigger.trigger", trigger),
            ("force-app/lwc/orderList/orderList.js", lwc),
        ]);
        let models = analyzer.extract_models().unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].name, "OrderTrigger");
        assert_eq!(models[0].decorators, vec!["trigger"]);
        assert_eq!(models[0].methods, vec!["before insert", "after update"]);
        assert_eq!(models[1].name, "OrderList");
        let props: Vec<_> = models[1]
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.tag.as_deref()))
            .collect();
        assert_eq!(props, vec![("recordId", Some("@api")), ("filter", Some("@track"))]);

        let endpoints = analyzer.extract_endpoints().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, "WIRE");
        assert_eq!(endpoints[0].path, "/lwc/orderList/getOrders");
        assert_eq!(endpoints[0].handler.as_deref(), Some("orders"));

        let effects = analyzer.extract_side_effects().unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(effects[0].target.as_deref(), Some("OrderController.getOrders"));
    }

    #[test]
    fn test_custom_object_metadata() {
        let object = r#"<?xml version="1.0" encoding="UTF-8"?>
<CustomObject xmlns="http://soap.sforce.com/2006/04/metadata">
    <label>Invoice</label>
    <description>Customer invoice</description>
</CustomObject>
"#;
        let field = r#"<?xml version="1.0" encoding="UTF-8"?>
<CustomField xmlns="http://soap.sforce.com/2006/04/metadata">
    <fullName>Account__c</fullName>
    <label>Account</label>
    <referenceTo>Account</referenceTo>
    <required>true</required>
    <type>Lookup</type>
</CustomField>
"#;
        let (_temp, analyzer) = analyzer_with(&[
            ("objects/Invoice__c/Invoice__c.object-meta.xml", object),
            ("objects/Invoice__c/fields/Account__c.field-meta.xml", field),
            ("objects/Broken__c/Broken__c.object-meta.xml", "<CustomObject>"),
        ]);
        let models = analyzer.extract_models().unwrap();
        assert_eq!(models.len(), 1);
        let invoice = &models[0];
        assert_eq!(invoice.name, "Invoice__c");
        assert_eq!(invoice.model_type, ModelType::Schema);
        assert_eq!(invoice.description.as_deref(), Some("Customer invoice"));
        assert_eq!(invoice.fields.len(), 1);
        assert_eq!(invoice.fields[0].name, "Account__c");
        assert_eq!(invoice.fields[0].field_type, "Lookup(Account)");
        assert!(invoice.fields[0].required);
    }
}
