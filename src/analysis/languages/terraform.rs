//! Terraform / HCL analyzer.
//!
//! Top-level blocks are located with a header pattern and isolated by brace
//! depth. Resources, data sources and modules become models; variables,
//! outputs and locals become config; managed cloud resources become side
//! effects; API gateway routes become endpoints. Reference expressions
//! between blocks produce an [`InfrastructureDiagram`].

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::{Lazy, OnceCell};
use serde::{Deserialize, Serialize};

use super::{register, Language};
use crate::analysis::blocks::{find_balanced, line_depth_delta, unquote, LineIndex, Syntax};
use crate::analysis::context::AnalyzerContext;
use crate::analysis::model::{
    ExtractedConfig, ExtractedDependency, ExtractedEndpoint, ExtractedField, ExtractedModel,
    ExtractedSideEffect, ModelType, SideEffectCategory,
};
use crate::analysis::patterns::{Dedup, Pattern, MAX_FIELDS, MAX_FILES_PER_CATEGORY};
use crate::analysis::LanguageAnalyzer;

static BLOCK_HEADER: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(
        r#"(?m)^[ \t]*(?P<kind>resource|data|module|variable|output|locals|terraform|provider)(?P<labels>(?:[ \t]+"[^"]*")*)[ \t]*\{"#,
    )
});

static LABEL: Lazy<Pattern> = Lazy::new(|| Pattern::new(r#""([^"]*)""#));

static ATTRIBUTE: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r"^\s*(?P<name>[A-Za-z_][\w-]*)\s*=\s*(?P<value>.*?)\s*$"));

static NESTED_BLOCK: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(r#"^\s*(?P<name>[A-Za-z_][\w-]*)(?:\s+"[^"]*")*\s*\{"#));

static HEREDOC: Lazy<Pattern> = Lazy::new(|| Pattern::new(r"^<<-?(?P<tag>\w+)"));

static REFERENCE: Lazy<Pattern> = Lazy::new(|| {
    Pattern::new(r"\b(?:data\.[a-z][\w-]*\.[\w-]+|module\.[\w-]+|[a-z][a-z0-9]*_[\w-]+\.[A-Za-z_][\w-]*)")
});

/// Resource type prefixes mapped to the side-effect category and service they provision.
const RESOURCE_CATEGORIES: &[(&str, SideEffectCategory, &str)] = &[
    ("aws_s3_bucket", SideEffectCategory::CloudService, "s3"),
    ("aws_dynamodb_table", SideEffectCategory::Database, "dynamodb"),
    ("aws_sqs_queue", SideEffectCategory::Queue, "sqs"),
    ("aws_sns_topic", SideEffectCategory::Notification, "sns"),
    ("aws_lambda_function", SideEffectCategory::CloudService, "lambda"),
    ("aws_api_gateway_", SideEffectCategory::Http, "api_gateway"),
    ("aws_apigatewayv2_", SideEffectCategory::Http, "api_gateway"),
    ("aws_elasticache_", SideEffectCategory::Cache, "elasticache"),
    ("aws_db_instance", SideEffectCategory::Database, "rds"),
    ("aws_rds_", SideEffectCategory::Database, "rds"),
    ("aws_ses_", SideEffectCategory::Email, "ses"),
    ("aws_kinesis_", SideEffectCategory::Queue, "kinesis"),
    ("aws_secretsmanager_", SideEffectCategory::CloudService, "secretsmanager"),
    ("aws_cloudwatch_event_", SideEffectCategory::Queue, "eventbridge"),
    ("google_storage_bucket", SideEffectCategory::File, "gcs"),
    ("google_pubsub_", SideEffectCategory::Queue, "pubsub"),
    ("google_sql_", SideEffectCategory::Database, "cloudsql"),
    ("google_redis_instance", SideEffectCategory::Cache, "memorystore"),
    ("google_cloudfunctions", SideEffectCategory::CloudService, "cloudfunctions"),
    ("azurerm_storage_", SideEffectCategory::File, "azure_storage"),
    ("azurerm_servicebus_", SideEffectCategory::Queue, "servicebus"),
    ("azurerm_cosmosdb_", SideEffectCategory::Database, "cosmosdb"),
    ("azurerm_mssql_", SideEffectCategory::Database, "azure_sql"),
    ("azurerm_redis_cache", SideEffectCategory::Cache, "azure_redis"),
    ("azurerm_function_app", SideEffectCategory::CloudService, "azure_functions"),
];

/// A resource, data source or module and its reference edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerraformResource {
    /// `aws_vpc.main`, `data.aws_ami.ubuntu` or `module.vpc`.
    pub address: String,
    /// Resource type (`aws_vpc`); `module` for module calls.
    pub resource_type: String,
    pub name: String,
    /// `resource`, `data` or `module`.
    pub kind: String,
    pub file: String,
    pub line: usize,
    /// Addresses this block references.
    pub dependencies: Vec<String>,
    /// Addresses that reference this block.
    pub dependents: Vec<String>,
    /// Top-level attribute assignments (single-line values only).
    pub attributes: BTreeMap<String, String>,
}

/// Resource dependency graph of a Terraform configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfrastructureDiagram {
    pub resources: Vec<TerraformResource>,
}

impl InfrastructureDiagram {
    pub fn get(&self, address: &str) -> Option<&TerraformResource> {
        self.resources.iter().find(|r| r.address == address)
    }

    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a TerraformResource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.resource_type == resource_type)
    }

    /// Resources that depend on nothing else in the configuration.
    pub fn roots(&self) -> Vec<&TerraformResource> {
        self.resources
            .iter()
            .filter(|r| r.dependencies.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Append resources not already present (by address) and relink.
    pub fn extend(&mut self, other: InfrastructureDiagram) {
        for resource in other.resources {
            if self.get(&resource.address).is_none() {
                self.resources.push(resource);
            }
        }
        self.link();
    }

    /// Rebuild `dependents` from `dependencies`.
    fn link(&mut self) {
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for resource in &self.resources {
            for dep in &resource.dependencies {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(resource.address.clone());
            }
        }
        for resource in &mut self.resources {
            resource.dependents = dependents.remove(&resource.address).unwrap_or_default();
        }
    }

    /// Render as a Mermaid flowchart. Edges point from dependent to dependency.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("flowchart LR\n");
        for resource in &self.resources {
            out.push_str(&format!(
                "    {}[\"{}\"]\n",
                mermaid_id(&resource.address),
                resource.address
            ));
        }
        for resource in &self.resources {
            for dep in &resource.dependencies {
                out.push_str(&format!(
                    "    {} --> {}\n",
                    mermaid_id(&resource.address),
                    mermaid_id(dep)
                ));
            }
        }
        out
    }
}

fn mermaid_id(address: &str) -> String {
    address
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Resource,
    Data,
    Module,
    Variable,
    Output,
    Locals,
    Terraform,
    Provider,
}

impl BlockKind {
    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "resource" => BlockKind::Resource,
            "data" => BlockKind::Data,
            "module" => BlockKind::Module,
            "variable" => BlockKind::Variable,
            "output" => BlockKind::Output,
            "locals" => BlockKind::Locals,
            "terraform" => BlockKind::Terraform,
            "provider" => BlockKind::Provider,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
struct Attribute {
    name: String,
    /// Raw value text; for nested blocks, the block body.
    value: String,
    line: usize,
    is_block: bool,
}

#[derive(Debug, Clone)]
struct Block {
    kind: BlockKind,
    labels: Vec<String>,
    file: String,
    line: usize,
    body: String,
    attributes: Vec<Attribute>,
}

impl Block {
    fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    fn attr_str(&self, name: &str) -> Option<String> {
        self.attr(name)
            .filter(|a| !a.is_block)
            .map(|a| unquote(&a.value).to_string())
    }

    fn address(&self) -> Option<String> {
        match (self.kind, self.labels.as_slice()) {
            (BlockKind::Resource, [t, n, ..]) => Some(format!("{}.{}", t, n)),
            (BlockKind::Data, [t, n, ..]) => Some(format!("data.{}.{}", t, n)),
            (BlockKind::Module, [n, ..]) => Some(format!("module.{}", n)),
            _ => None,
        }
    }
}

fn depth_delta(line: &str) -> i32 {
    line_depth_delta(line, Syntax::HCL)
}

/// Top-level attributes and nested blocks of a block body.
///
/// Multi-line values (`tags = {` ... `}`) and nested blocks are recorded
/// with `is_block` set and their inner lines as the value.
fn parse_attributes(body: &str, first_line: usize) -> Vec<Attribute> {
    let lines: Vec<&str> = body.lines().collect();
    let mut attrs = Vec::new();
    let mut depth = 0i32;
    let mut heredoc: Option<String> = None;
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];
        let line_no = first_line + idx;

        if let Some(tag) = &heredoc {
            if line.trim() == tag {
                heredoc = None;
            }
            idx += 1;
            continue;
        }

        if depth == 0 {
            let header = ATTRIBUTE
                .captures(line)
                .map(|caps| (caps["name"].to_string(), Some(caps["value"].to_string())))
                .or_else(|| {
                    NESTED_BLOCK
                        .captures(line)
                        .map(|caps| (caps["name"].to_string(), None))
                });
            if let Some((name, value)) = header {
                let opens = depth_delta(line);
                if opens > 0 {
                    let (inner, next) = collect_nested(&lines, idx, opens);
                    attrs.push(Attribute {
                        name,
                        value: inner,
                        line: line_no,
                        is_block: true,
                    });
                    idx = next;
                    continue;
                }
                if let Some(value) = value {
                    if let Some(tag) = HEREDOC.captures(&value) {
                        heredoc = Some(tag["tag"].to_string());
                    }
                    attrs.push(Attribute {
                        name,
                        value,
                        line: line_no,
                        is_block: false,
                    });
                }
            }
        }
        depth = (depth + depth_delta(line)).max(0);
        idx += 1;
    }
    attrs
}

/// Inner lines of a region opened on `lines[start]` with `opens` unclosed
/// brackets, and the index of the line after the region.
fn collect_nested(lines: &[&str], start: usize, opens: i32) -> (String, usize) {
    let mut inner = Vec::new();
    let mut depth = opens;
    let mut j = start + 1;
    while j < lines.len() && depth > 0 {
        depth += depth_delta(lines[j]);
        if depth > 0 {
            inner.push(lines[j]);
        }
        j += 1;
    }
    (inner.join("\n"), j)
}

fn parse_blocks(content: &str, file: &str) -> Vec<Block> {
    let index = LineIndex::new(content);
    let mut blocks = Vec::new();
    let mut resume = 0usize;

    for caps in BLOCK_HEADER.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() < resume {
            continue;
        }
        let Some(kind) = BlockKind::parse(&caps["kind"]) else { continue };
        let open = whole.end() - 1;
        let Some(close) = find_balanced(content, open, '{', '}', Syntax::HCL) else {
            continue;
        };
        resume = close + 1;

        let labels = caps
            .name("labels")
            .map(|l| {
                LABEL
                    .captures_iter(l.as_str())
                    .map(|c| c[1].to_string())
                    .collect()
            })
            .unwrap_or_default();
        let body = content[open + 1..close].to_string();
        let body_line = index.line_of(open + 1);
        let attributes = parse_attributes(&body, body_line);
        blocks.push(Block {
            kind,
            labels,
            file: file.to_string(),
            line: index.line_of(whole.start()),
            body,
            attributes,
        });
    }
    blocks
}

/// Terraform / HCL analyzer.
pub struct TerraformAnalyzer {
    ctx: AnalyzerContext,
    blocks: OnceCell<Vec<Block>>,
}

impl TerraformAnalyzer {
    pub fn new(ctx: AnalyzerContext) -> Self {
        Self {
            ctx,
            blocks: OnceCell::new(),
        }
    }

    fn blocks(&self) -> &[Block] {
        self.blocks.get_or_init(|| {
            self.ctx
                .source_files(self.file_extensions())
                .into_iter()
                .take(MAX_FILES_PER_CATEGORY)
                .flat_map(|f| parse_blocks(&f.content, &f.rel))
                .collect()
        })
    }

    fn blocks_of(&self, kind: BlockKind) -> impl Iterator<Item = &Block> {
        self.blocks().iter().filter(move |b| b.kind == kind)
    }

    /// Build the resource dependency graph.
    pub fn diagram(&self) -> InfrastructureDiagram {
        let addressed: Vec<(String, &Block)> = self
            .blocks()
            .iter()
            .filter_map(|b| b.address().map(|a| (a, b)))
            .collect();

        let known: HashSet<&str> = addressed.iter().map(|(a, _)| a.as_str()).collect();

        let mut resources = Vec::new();
        for (address, block) in &addressed {
            let mut dependencies: Vec<String> = Vec::new();
            for m in REFERENCE.find_iter(&block.body) {
                let mut reference = m.as_str();
                // `aws_vpc.main.id` style references resolve to the block address.
                if !known.contains(reference) {
                    if let Some((head, _)) = reference.rsplit_once('.') {
                        reference = head;
                    }
                }
                if reference != address.as_str()
                    && known.contains(reference)
                    && !dependencies.iter().any(|d| d == reference)
                {
                    dependencies.push(reference.to_string());
                }
            }

            let (resource_type, name) = match block.kind {
                BlockKind::Module => ("module".to_string(), block.labels[0].clone()),
                _ => (block.labels[0].clone(), block.labels[1].clone()),
            };
            let kind = match block.kind {
                BlockKind::Data => "data",
                BlockKind::Module => "module",
                _ => "resource",
            };
            let attributes = block
                .attributes
                .iter()
                .filter(|a| !a.is_block)
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect();

            resources.push(TerraformResource {
                address: address.clone(),
                resource_type,
                name,
                kind: kind.to_string(),
                file: block.file.clone(),
                line: block.line,
                dependencies,
                dependents: Vec::new(),
                attributes,
            });
        }

        let mut diagram = InfrastructureDiagram { resources };
        diagram.link();
        diagram
    }

    fn api_gateway_endpoints(&self) -> Vec<ExtractedEndpoint> {
        let mut endpoints = Vec::new();

        // HTTP APIs: route_key = "GET /users"
        for block in self.blocks_of(BlockKind::Resource) {
            if block.labels.first().map(String::as_str) != Some("aws_apigatewayv2_route") {
                continue;
            }
            let Some(route_key) = block.attr_str("route_key") else { continue };
            let (method, path) = match route_key.split_once(' ') {
                Some((m, p)) => (m.to_string(), p.to_string()),
                None => ("ANY".to_string(), route_key.clone()),
            };
            let mut ep = ExtractedEndpoint::new(method, path, &block.file, block.line)
                .with_decorator("aws_apigatewayv2_route");
            ep.handler = block.attr_str("target");
            ep.source_link = self.ctx.source_link(&block.file, Some(block.line));
            endpoints.push(ep);
        }

        // REST APIs: resources carry path_part, methods reference a resource.
        let parts: HashMap<String, &Block> = self
            .blocks_of(BlockKind::Resource)
            .filter(|b| b.labels.first().map(String::as_str) == Some("aws_api_gateway_resource"))
            .filter_map(|b| b.labels.get(1).map(|n| (n.clone(), b)))
            .collect();
        let mut with_methods = Vec::new();
        for block in self.blocks_of(BlockKind::Resource) {
            if block.labels.first().map(String::as_str) != Some("aws_api_gateway_method") {
                continue;
            }
            let method = block.attr_str("http_method").unwrap_or_else(|| "ANY".to_string());
            let resource_name = block
                .attr("resource_id")
                .and_then(|a| a.value.strip_prefix("aws_api_gateway_resource."))
                .and_then(|rest| rest.split('.').next())
                .map(String::from);
            let path = match resource_name.as_ref().and_then(|n| parts.get(n)) {
                Some(res) => format!("/{}", res.attr_str("path_part").unwrap_or_default()),
                None => "/".to_string(),
            };
            if let Some(name) = resource_name {
                with_methods.push(name);
            }
            let mut ep = ExtractedEndpoint::new(method, path, &block.file, block.line)
                .with_decorator("aws_api_gateway_method");
            ep.source_link = self.ctx.source_link(&block.file, Some(block.line));
            endpoints.push(ep);
        }
        let mut bare: Vec<_> = parts
            .iter()
            .filter(|(name, _)| !with_methods.contains(name))
            .collect();
        bare.sort_by(|a, b| (&a.1.file, a.1.line).cmp(&(&b.1.file, b.1.line)));
        for (_, res) in bare {
            let path = format!("/{}", res.attr_str("path_part").unwrap_or_default());
            let mut ep = ExtractedEndpoint::new("ANY", path, &res.file, res.line)
                .with_decorator("aws_api_gateway_resource");
            ep.source_link = self.ctx.source_link(&res.file, Some(res.line));
            endpoints.push(ep);
        }

        endpoints
    }
}

impl LanguageAnalyzer for TerraformAnalyzer {
    fn language_id(&self) -> &'static str {
        "terraform"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["tf"]
    }

    fn context(&self) -> &AnalyzerContext {
        &self.ctx
    }

    fn extract_models(&self) -> anyhow::Result<Vec<ExtractedModel>> {
        let mut models = Vec::new();
        for block in self.blocks() {
            let Some(address) = block.address() else { continue };
            let kind = match block.kind {
                BlockKind::Resource => "resource",
                BlockKind::Data => "data",
                _ => "module",
            };
            let mut model = ExtractedModel::new(address, ModelType::Schema, &block.file, block.line);
            model.decorators.push(kind.to_string());
            if block.kind != BlockKind::Module {
                model.decorators.push(block.labels[0].clone());
            }
            model.description = block.attr_str("description");
            model.fields = block
                .attributes
                .iter()
                .take(MAX_FIELDS)
                .map(|a| {
                    let mut field =
                        ExtractedField::new(a.name.clone(), if a.is_block { "block" } else { "attribute" });
                    if !a.is_block {
                        field.default = Some(a.value.clone());
                    }
                    field
                })
                .collect();
            model.source_link = self.ctx.source_link(&block.file, Some(block.line));
            models.push(model);
        }
        Ok(models)
    }

    fn extract_endpoints(&self) -> anyhow::Result<Vec<ExtractedEndpoint>> {
        Ok(self.api_gateway_endpoints())
    }

    fn extract_side_effects(&self) -> anyhow::Result<Vec<ExtractedSideEffect>> {
        let mut effects = Vec::new();
        let mut dedup: HashMap<&str, Dedup> = HashMap::new();
        for block in self.blocks_of(BlockKind::Resource) {
            let (Some(resource_type), Some(address)) = (block.labels.first(), block.address()) else {
                continue;
            };
            let Some((_, category, service)) = RESOURCE_CATEGORIES
                .iter()
                .find(|(prefix, _, _)| resource_type.starts_with(prefix))
            else {
                continue;
            };
            let mut effect = ExtractedSideEffect::new(
                *category,
                address,
                Some(service.to_string()),
                &block.file,
                block.line,
            );
            if !dedup.entry(block.file.as_str()).or_default().side_effect(&effect) {
                continue;
            }
            effect.description = Some(format!("provisions {}", resource_type));
            effect.source_link = self.ctx.source_link(&block.file, Some(block.line));
            effects.push(effect);
        }
        Ok(effects)
    }

    fn extract_config(&self) -> anyhow::Result<Vec<ExtractedConfig>> {
        let mut config = Vec::new();
        let mut dedup: HashMap<&str, Dedup> = HashMap::new();

        for block in self.blocks() {
            let seen = dedup.entry(block.file.as_str()).or_default();
            match block.kind {
                BlockKind::Variable | BlockKind::Output => {
                    let Some(name) = block.labels.first() else { continue };
                    let source = if block.kind == BlockKind::Variable {
                        "terraform_variable"
                    } else {
                        "terraform_output"
                    };
                    if !seen.config(&format!("{}:{}", source, name)) {
                        continue;
                    }
                    let mut cfg = ExtractedConfig::new(name.clone(), source, &block.file, block.line);
                    cfg.description = block.attr_str("description");
                    if block.kind == BlockKind::Variable {
                        cfg.default = block.attr("default").map(|a| unquote(&a.value).to_string());
                        cfg.required = cfg.default.is_none();
                    }
                    cfg.source_link = self.ctx.source_link(&block.file, Some(block.line));
                    config.push(cfg);
                }
                BlockKind::Locals => {
                    for attr in &block.attributes {
                        if !seen.config(&format!("terraform_local:{}", attr.name)) {
                            continue;
                        }
                        let mut cfg =
                            ExtractedConfig::new(attr.name.clone(), "terraform_local", &block.file, attr.line);
                        if !attr.is_block {
                            cfg.default = Some(unquote(&attr.value).to_string());
                        }
                        cfg.source_link = self.ctx.source_link(&block.file, Some(attr.line));
                        config.push(cfg);
                    }
                }
                _ => {}
            }
        }
        Ok(config)
    }

    fn extract_dependencies(&self) -> anyhow::Result<Vec<ExtractedDependency>> {
        let mut deps = Vec::new();
        for block in self.blocks() {
            match block.kind {
                BlockKind::Terraform => {
                    let Some(providers) = block
                        .attributes
                        .iter()
                        .find(|a| a.is_block && a.name == "required_providers")
                    else {
                        continue;
                    };
                    let entries = parse_attributes(&providers.value, providers.line + 1);
                    for entry in entries {
                        let inner_text = if entry.is_block {
                            entry.value.clone()
                        } else {
                            // Single-line form: `aws = { source = "x", version = "y" }`
                            entry
                                .value
                                .trim()
                                .trim_start_matches('{')
                                .trim_end_matches('}')
                                .replace(',', "\n")
                        };
                        let inner = parse_attributes(&inner_text, entry.line + 1);
                        let get = |key: &str| {
                            inner
                                .iter()
                                .find(|a| a.name == key)
                                .map(|a| unquote(&a.value).to_string())
                        };
                        let name = get("source").unwrap_or_else(|| entry.name.clone());
                        let mut dep = ExtractedDependency::new(name, get("version"), &block.file, entry.line);
                        dep.import_path = Some(entry.name.clone());
                        deps.push(dep);
                    }
                }
                BlockKind::Module => {
                    let Some(source) = block.attr_str("source") else { continue };
                    let mut dep =
                        ExtractedDependency::new(source, block.attr_str("version"), &block.file, block.line);
                    dep.import_path = block.labels.first().map(|n| format!("module.{}", n));
                    deps.push(dep);
                }
                _ => {}
            }
        }
        Ok(deps)
    }

    fn extract_infrastructure(&self) -> anyhow::Result<Option<InfrastructureDiagram>> {
        let diagram = self.diagram();
        Ok((!diagram.is_empty()).then_some(diagram))
    }
}

pub(super) fn install() {
    register(Language::Terraform, |ctx| Box::new(TerraformAnalyzer::new(ctx)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MAIN_TF: &str = r#"terraform {
  required_providers {
    aws = {
      source  = "hashicorp/aws"
      version = "~> 5.0"
    }
  }
}

variable "region" {
  type        = string
  default     = "us-east-1"
  description = "AWS region"
}

variable "db_password" {
  type = string
}

locals {
  name = "orders"
}

resource "aws_vpc" "main" {
  cidr_block = "10.0.0.0/16"
  tags = {
    Name = "${local.name}-vpc"
  }
}

resource "aws_subnet" "a" {
  vpc_id     = aws_vpc.main.id
  cidr_block = "10.0.1.0/24"
}

resource "aws_sqs_queue" "jobs" {
  name       = "jobs"
  depends_on = [aws_subnet.a]
}

module "db" {
  source  = "terraform-aws-modules/rds/aws"
  version = "6.0.0"
  subnets = [aws_subnet.a.id]
}

resource "aws_apigatewayv2_route" "list" {
  route_key = "GET /orders"
}

output "vpc_id" {
  value = aws_vpc.main.id
}
"#;

    fn analyzer() -> (TempDir, TerraformAnalyzer) {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("main.tf"), MAIN_TF).unwrap();
        let ctx = AnalyzerContext::new(temp.path());
        (temp, TerraformAnalyzer::new(ctx))
    }

    #[test]
    fn test_dependency_graph() {
        let (_temp, analyzer) = analyzer();
        let diagram = analyzer.diagram();

        let subnet = diagram.get("aws_subnet.a").unwrap();
        assert_eq!(subnet.dependencies, vec!["aws_vpc.main"]);
        assert_eq!(subnet.line, 31);

        let vpc = diagram.get("aws_vpc.main").unwrap();
        assert!(vpc.dependencies.is_empty());
        assert!(vpc.dependents.contains(&"aws_subnet.a".to_string()));

        let queue = diagram.get("aws_sqs_queue.jobs").unwrap();
        assert_eq!(queue.dependencies, vec!["aws_subnet.a"]);

        let db = diagram.get("module.db").unwrap();
        assert_eq!(db.dependencies, vec!["aws_subnet.a"]);

        let mermaid = diagram.to_mermaid();
        assert!(mermaid.starts_with("flowchart LR\n"));
        assert!(mermaid.contains("aws_subnet_a --> aws_vpc_main"));
    }

    #[test]
    fn test_models_and_side_effects() {
        let (_temp, analyzer) = analyzer();
        let models = analyzer.extract_models().unwrap();
        let vpc = models.iter().find(|m| m.name == "aws_vpc.main").unwrap();
        assert_eq!(vpc.model_type, ModelType::Schema);
        assert_eq!(vpc.decorators, vec!["resource", "aws_vpc"]);
        assert!(vpc.fields.iter().any(|f| f.name == "tags" && f.field_type == "block"));

        let effects = analyzer.extract_side_effects().unwrap();
        let queue = effects.iter().find(|e| e.operation == "aws_sqs_queue.jobs").unwrap();
        assert_eq!(queue.category, SideEffectCategory::Queue);
        assert_eq!(queue.target.as_deref(), Some("sqs"));
    }

    #[test]
    fn test_config_and_dependencies() {
        let (_temp, analyzer) = analyzer();
        let config = analyzer.extract_config().unwrap();

        let region = config.iter().find(|c| c.key == "region").unwrap();
        assert_eq!(region.source, "terraform_variable");
        assert_eq!(region.default.as_deref(), Some("us-east-1"));
        assert!(!region.required);

        let password = config.iter().find(|c| c.key == "db_password").unwrap();
        assert!(password.required);

        assert!(config.iter().any(|c| c.key == "name" && c.source == "terraform_local"));
        assert!(config.iter().any(|c| c.key == "vpc_id" && c.source == "terraform_output"));

        let deps = analyzer.extract_dependencies().unwrap();
        let aws = deps.iter().find(|d| d.name == "hashicorp/aws").unwrap();
        assert_eq!(aws.version.as_deref(), Some("~> 5.0"));
        assert!(deps
            .iter()
            .any(|d| d.name == "terraform-aws-modules/rds/aws" && d.version.as_deref() == Some("6.0.0")));
    }

    #[test]
    fn test_endpoints() {
        let (_temp, analyzer) = analyzer();
        let endpoints = analyzer.extract_endpoints().unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].method, "GET");
        assert_eq!(endpoints[0].path, "/orders");
    }
}
