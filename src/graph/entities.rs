//! Typed knowledge graph entities.
//!
//! Every entity carries an [`EntityBase`] plus attributes specific to its
//! kind. The serialized form is flat: base fields and attributes share one
//! JSON object, discriminated by `"entity_type"`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The nine entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Service,
    Domain,
    Api,
    Endpoint,
    Schema,
    Document,
    Person,
    Repository,
    Integration,
}

impl EntityType {
    pub const ALL: &'static [EntityType] = &[
        EntityType::Service,
        EntityType::Domain,
        EntityType::Api,
        EntityType::Endpoint,
        EntityType::Schema,
        EntityType::Document,
        EntityType::Person,
        EntityType::Repository,
        EntityType::Integration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Service => "service",
            EntityType::Domain => "domain",
            EntityType::Api => "api",
            EntityType::Endpoint => "endpoint",
            EntityType::Schema => "schema",
            EntityType::Document => "document",
            EntityType::Person => "person",
            EntityType::Repository => "repository",
            EntityType::Integration => "integration",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("unknown entity type: {}", s))
    }
}

/// Conventional id for an entity: `"<type>:<slug>"`.
pub fn entity_id(entity_type: EntityType, name: &str) -> String {
    format!("{}:{}", entity_type, slugify(name))
}

/// Lower-case `name`, keeping alphanumerics, `.` and `_`; other runs become `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() || matches!(ch, '.' | '_') {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Fields shared by every entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBase {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Open-ended annotations.
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    /// Where the facts came from (files, URLs).
    #[serde(default)]
    pub source_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityBase {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            metadata: BTreeMap::new(),
            source_refs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[default]
    Active,
    Deprecated,
    Planned,
}

/// Known service characteristics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceTraits {
    /// e.g. `lambda`, `web`, `worker`, `library`.
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub is_api_gateway: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub apis: Vec<String>,
    #[serde(default)]
    pub databases: Vec<String>,
    #[serde(default)]
    pub config_files: Vec<String>,
    #[serde(default)]
    pub documentation_status: Option<String>,
    #[serde(default)]
    pub traits: ServiceTraits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub parent_domain: Option<String>,
    #[serde(default)]
    pub sub_domains: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiType {
    #[default]
    Rest,
    Graphql,
    Grpc,
    Websocket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Api {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub api_type: ApiType,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth_type: Option<String>,
    #[serde(default)]
    pub spec_file: Option<String>,
    /// Endpoint entity ids.
    #[serde(default)]
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(default)]
    pub api_id: Option<String>,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub request_schema: Option<String>,
    #[serde(default)]
    pub response_schema: Option<String>,
    #[serde(default)]
    pub auth_required: bool,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub examples: Vec<Value>,
}

/// One field of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(flatten)]
    pub base: EntityBase,
    /// database, event, request, response, graphql, openapi, metadata,
    /// infrastructure, model, ...
    pub schema_type: String,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub definition: Option<Value>,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
    #[serde(default)]
    pub relationships: Vec<String>,
    #[serde(default)]
    pub graphql_kind: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    Confluence,
    Github,
    Jira,
    Docs360,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    High,
    #[default]
    Medium,
    Low,
    Reference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(flatten)]
    pub base: EntityBase,
    pub source_type: DocumentSource,
    pub url: String,
    /// May be a truncated preview.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub linked_services: Vec<String>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trust_level: TrustLevel,
    #[serde(default)]
    pub disclaimer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub team: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub owned_services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(flatten)]
    pub base: EntityBase,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
}

fn default_branch() -> String {
    crate::analysis::DEFAULT_BRANCH.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    #[serde(flatten)]
    pub base: EntityBase,
    /// Side-effect category: database, queue, cache, external_api, ...
    pub integration_type: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub config_keys: Vec<String>,
}

/// A node of the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum Entity {
    Service(Service),
    Domain(Domain),
    Api(Api),
    Endpoint(Endpoint),
    Schema(Schema),
    Document(Document),
    Person(Person),
    Repository(Repository),
    Integration(Integration),
}

impl Entity {
    pub fn base(&self) -> &EntityBase {
        match self {
            Entity::Service(e) => &e.base,
            Entity::Domain(e) => &e.base,
            Entity::Api(e) => &e.base,
            Entity::Endpoint(e) => &e.base,
            Entity::Schema(e) => &e.base,
            Entity::Document(e) => &e.base,
            Entity::Person(e) => &e.base,
            Entity::Repository(e) => &e.base,
            Entity::Integration(e) => &e.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut EntityBase {
        match self {
            Entity::Service(e) => &mut e.base,
            Entity::Domain(e) => &mut e.base,
            Entity::Api(e) => &mut e.base,
            Entity::Endpoint(e) => &mut e.base,
            Entity::Schema(e) => &mut e.base,
            Entity::Document(e) => &mut e.base,
            Entity::Person(e) => &mut e.base,
            Entity::Repository(e) => &mut e.base,
            Entity::Integration(e) => &mut e.base,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        match self {
            Entity::Service(_) => EntityType::Service,
            Entity::Domain(_) => EntityType::Domain,
            Entity::Api(_) => EntityType::Api,
            Entity::Endpoint(_) => EntityType::Endpoint,
            Entity::Schema(_) => EntityType::Schema,
            Entity::Document(_) => EntityType::Document,
            Entity::Person(_) => EntityType::Person,
            Entity::Repository(_) => EntityType::Repository,
            Entity::Integration(_) => EntityType::Integration,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.base().updated_at
    }

    pub fn as_service(&self) -> Option<&Service> {
        match self {
            Entity::Service(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_api(&self) -> Option<&Api> {
        match self {
            Entity::Api(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_schema(&self) -> Option<&Schema> {
        match self {
            Entity::Schema(s) => Some(s),
            _ => None,
        }
    }

    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_dict(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            base: EntityBase::new(entity_id(EntityType::Service, &name), name),
            repository: None,
            language: None,
            framework: None,
            status: ServiceStatus::Active,
            team: None,
            dependencies: Vec::new(),
            apis: Vec::new(),
            databases: Vec::new(),
            config_files: Vec::new(),
            documentation_status: None,
            traits: ServiceTraits::default(),
        }
    }
}

impl Domain {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            base: EntityBase::new(entity_id(EntityType::Domain, &name), name),
            services: Vec::new(),
            parent_domain: None,
            sub_domains: Vec::new(),
        }
    }
}

impl Api {
    pub fn new(id: impl Into<String>, name: impl Into<String>, api_type: ApiType) -> Self {
        Self {
            base: EntityBase::new(id, name),
            service_id: None,
            api_type,
            version: None,
            base_url: None,
            auth_type: None,
            spec_file: None,
            endpoints: Vec::new(),
        }
    }
}

impl Endpoint {
    pub fn new(id: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        let method = method.into();
        let path = path.into();
        Self {
            base: EntityBase::new(id, format!("{} {}", method, path)),
            api_id: None,
            path,
            method,
            request_schema: None,
            response_schema: None,
            auth_required: false,
            deprecated: false,
            examples: Vec::new(),
        }
    }
}

impl Schema {
    pub fn new(id: impl Into<String>, name: impl Into<String>, schema_type: impl Into<String>) -> Self {
        Self {
            base: EntityBase::new(id, name),
            schema_type: schema_type.into(),
            service_id: None,
            definition: None,
            fields: Vec::new(),
            relationships: Vec::new(),
            graphql_kind: None,
        }
    }
}

impl Document {
    pub fn new(name: impl Into<String>, source_type: DocumentSource, url: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            base: EntityBase::new(entity_id(EntityType::Document, &name), name),
            source_type,
            url: url.into(),
            content: None,
            content_hash: String::new(),
            labels: Vec::new(),
            linked_services: Vec::new(),
            last_modified: None,
            trust_level: TrustLevel::default(),
            disclaimer: None,
        }
    }
}

impl Person {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            base: EntityBase::new(entity_id(EntityType::Person, &name), name),
            email: None,
            team: None,
            role: None,
            owned_services: Vec::new(),
        }
    }
}

impl Repository {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            base: EntityBase::new(entity_id(EntityType::Repository, &name), name),
            url: None,
            default_branch: default_branch(),
            languages: Vec::new(),
            services: Vec::new(),
        }
    }
}

impl Integration {
    pub fn new(id: impl Into<String>, name: impl Into<String>, integration_type: impl Into<String>) -> Self {
        Self {
            base: EntityBase::new(id, name),
            integration_type: integration_type.into(),
            provider: None,
            services: Vec::new(),
            config_keys: Vec::new(),
        }
    }
}

macro_rules! impl_from_entity {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Entity {
                fn from(value: $variant) -> Self {
                    Entity::$variant(value)
                }
            }
        )*
    };
}

impl_from_entity!(Service, Domain, Api, Endpoint, Schema, Document, Person, Repository, Integration);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Payment Service"), "payment-service");
        assert_eq!(slugify("  orders/API v2!  "), "orders-api-v2");
        assert_eq!(slugify("GET /users/{id}"), "get-users-id");
        assert_eq!(entity_id(EntityType::Service, "User Auth"), "service:user-auth");
    }

    #[test]
    fn test_serialized_form_is_flat_and_tagged() {
        let mut service = Service::new("billing");
        service.traits.is_api_gateway = true;
        let value = Entity::from(service).to_dict();
        assert_eq!(value["entity_type"], json!("service"));
        assert_eq!(value["id"], json!("service:billing"));
        assert_eq!(value["status"], json!("active"));
        assert_eq!(value["traits"]["is_api_gateway"], json!(true));
        assert!(value.get("base").is_none());
    }

    #[test]
    fn test_entity_round_trip_keeps_variant() {
        let mut schema = Schema::new("schema:user", "User", "model");
        schema.fields.push(SchemaField {
            name: "id".to_string(),
            field_type: "string".to_string(),
            description: None,
            required: true,
        });
        schema.base.metadata.insert("origin".to_string(), json!("go"));
        let entity = Entity::from(schema);
        let back = Entity::from_dict(entity.to_dict()).unwrap();
        assert_eq!(back, entity);
        assert_eq!(back.entity_type(), EntityType::Schema);
        assert_eq!(back.as_schema().unwrap().fields[0].name, "id");
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let entity = Entity::from_dict(json!({
            "entity_type": "repository",
            "id": "repository:shop",
            "name": "shop",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let Entity::Repository(repo) = entity else { panic!("wrong variant") };
        assert_eq!(repo.default_branch, "main");
        assert!(repo.languages.is_empty());
    }

    #[test]
    fn test_entity_type_parse() {
        assert_eq!("API".parse::<EntityType>().unwrap(), EntityType::Api);
        assert!("gadget".parse::<EntityType>().is_err());
    }
}
