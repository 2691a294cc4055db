//! Lifting extraction results into the knowledge graph.
//!
//! One repository analysis becomes:
//!
//! ```text
//! repository:<name> ─contains─▶ service:<name> ─owns────▶ schema:<name>.<model>
//!                                    │        ─exposes─▶ api:<name> ─contains─▶ endpoint:...
//!                                    │        ─uses────▶ integration:<category>-<target>
//!                                    └────────owns────▶ infra:<address> ─depends_on─▶ infra:...
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::analysis::{
    AnalysisResult, ExtractedEndpoint, ExtractedModel, ExtractedSideEffect, InfrastructureDiagram,
    SideEffectCategory,
};
use crate::graph::{
    entity_id, slugify, Api, ApiType, Endpoint, Entity, EntityType, Integration, KnowledgeGraph,
    Relation, RelationType, Repository, Schema, SchemaField, Service,
};

/// Entities created or refreshed by [`integrate_analysis`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationSummary {
    pub service_id: String,
    pub schemas: usize,
    pub endpoints: usize,
    pub integrations: usize,
    pub infrastructure: usize,
}

/// Add the service described by `result` to `graph`.
///
/// Re-integrating the same service refreshes its entities in place.
pub fn integrate_analysis(
    graph: &mut KnowledgeGraph,
    service_name: &str,
    repository_url: Option<&str>,
    result: &AnalysisResult,
) -> IntegrationSummary {
    let service_id = entity_id(EntityType::Service, service_name);
    let slug = slugify(service_name);
    let mut summary = IntegrationSummary {
        service_id: service_id.clone(),
        ..Default::default()
    };

    let mut service = Service::new(service_name);
    service.repository = repository_url.map(str::to_string);
    service.language = Some(result.language.clone());
    service.dependencies = result
        .dependencies
        .iter()
        .map(|d| d.name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    service.config_files = result
        .config
        .iter()
        .map(|c| c.file.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    service.databases = result
        .side_effects
        .iter()
        .filter(|e| e.category == SideEffectCategory::Database)
        .filter_map(|e| e.target.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let config_keys: BTreeSet<&str> = result.config.iter().map(|c| c.key.as_str()).collect();
    service
        .base
        .metadata
        .insert("config_keys".to_string(), json!(config_keys));
    if !result.endpoints.is_empty() {
        service.apis.push(format!("api:{}", slug));
    }
    graph.add_entity(service);

    let repository_id = entity_id(EntityType::Repository, service_name);
    let mut repository = Repository::new(service_name);
    repository.url = repository_url.map(str::to_string);
    repository.languages = result.language.split('+').map(str::to_string).collect();
    repository.services = vec![service_id.clone()];
    graph.add_entity(repository);
    graph.add_relation(Relation::new(&repository_id, &service_id, RelationType::Contains));

    let schema_ids = lift_models(graph, &service_id, &slug, &result.models);
    summary.schemas = schema_ids.len();
    summary.endpoints = lift_endpoints(graph, &service_id, &slug, &result.endpoints, &schema_ids);
    summary.integrations = lift_side_effects(graph, &service_id, &result.side_effects);
    if let Some(diagram) = &result.infrastructure {
        summary.infrastructure = lift_infrastructure(graph, Some(&service_id), diagram);
    }

    info!(
        service = %service_id,
        schemas = summary.schemas,
        endpoints = summary.endpoints,
        integrations = summary.integrations,
        infrastructure = summary.infrastructure,
        "analysis integrated into graph"
    );
    summary
}

/// Schema entities for models; returns model name → schema id.
fn lift_models(
    graph: &mut KnowledgeGraph,
    service_id: &str,
    slug: &str,
    models: &[ExtractedModel],
) -> HashMap<String, String> {
    let mut ids: HashMap<String, String> = HashMap::new();
    let mut used = BTreeSet::new();
    for model in models {
        let mut id = format!("schema:{}.{}", slug, slugify(&model.name));
        if used.contains(&id) {
            let qualified = format!("schema:{}.{}.{}", slug, slugify(&model.file), slugify(&model.name));
            id = qualified.clone();
            let mut n = 2;
            while used.contains(&id) {
                id = format!("{}-{}", qualified, n);
                n += 1;
            }
        }
        used.insert(id.clone());

        let mut schema = Schema::new(id.clone(), model.name.clone(), "model");
        schema.service_id = Some(service_id.to_string());
        schema.base.description = model.description.clone();
        schema.base.source_refs = vec![model.source_link.clone().unwrap_or_else(|| format!("{}:{}", model.file, model.line))];
        schema.fields = model
            .fields
            .iter()
            .map(|f| SchemaField {
                name: f.name.clone(),
                field_type: f.field_type.clone(),
                description: f.description.clone(),
                required: f.required,
            })
            .collect();
        schema.definition = Some(json!({
            "model_type": model.model_type,
            "file": model.file,
            "line": model.line,
            "methods": model.methods,
            "parent": model.parent,
            "interfaces": model.interfaces,
            "decorators": model.decorators,
        }));
        schema.relationships = model.parent.iter().chain(model.interfaces.iter()).cloned().collect();
        graph.add_entity(schema);
        graph.add_relation(Relation::new(service_id, &id, RelationType::Owns));
        ids.entry(model.name.clone()).or_insert(id);
    }

    for model in models {
        let Some(source) = ids.get(&model.name) else { continue };
        for parent in model.parent.iter().chain(model.interfaces.iter()) {
            if let Some(target) = ids.get(parent) {
                if target != source {
                    graph.add_relation(Relation::new(source, target, RelationType::Implements));
                }
            }
        }
    }
    ids
}

fn lift_endpoints(
    graph: &mut KnowledgeGraph,
    service_id: &str,
    slug: &str,
    endpoints: &[ExtractedEndpoint],
    schema_ids: &HashMap<String, String>,
) -> usize {
    if endpoints.is_empty() {
        return 0;
    }
    let api_id = format!("api:{}", slug);
    let api_type = if endpoints.iter().all(|e| e.method.eq_ignore_ascii_case("GRAPHQL")) {
        ApiType::Graphql
    } else {
        ApiType::Rest
    };

    let mut endpoint_ids = Vec::new();
    let mut lifted = Vec::new();
    for endpoint in endpoints {
        let id = format!("endpoint:{}:{}", slug, slugify(&format!("{} {}", endpoint.method, endpoint.path)));
        if endpoint_ids.contains(&id) {
            debug!(endpoint = %id, "duplicate endpoint, keeping the first");
            continue;
        }
        let mut entity = Endpoint::new(id.clone(), endpoint.method.clone(), endpoint.path.clone());
        entity.api_id = Some(api_id.clone());
        entity.base.description = endpoint.description.clone();
        entity.base.source_refs = vec![endpoint
            .source_link
            .clone()
            .unwrap_or_else(|| format!("{}:{}", endpoint.file, endpoint.line))];
        if let Some(handler) = &endpoint.handler {
            entity.base.metadata.insert("handler".to_string(), json!(handler));
        }
        if !endpoint.parameters.is_empty() {
            entity.base.metadata.insert("parameters".to_string(), json!(endpoint.parameters));
        }
        if !endpoint.decorators.is_empty() {
            entity.base.metadata.insert("decorators".to_string(), json!(endpoint.decorators));
        }
        entity.response_schema = endpoint
            .response_type
            .as_ref()
            .and_then(|t| schema_ids.get(t.trim_end_matches("[]")))
            .cloned();
        endpoint_ids.push(id.clone());
        lifted.push(entity);
    }

    let mut api = Api::new(api_id.clone(), format!("{} API", slug), api_type);
    api.service_id = Some(service_id.to_string());
    api.endpoints = endpoint_ids;
    graph.add_entity(api);
    graph.add_relation(Relation::new(service_id, &api_id, RelationType::Exposes));

    let count = lifted.len();
    for endpoint in lifted {
        let id = endpoint.base.id.clone();
        let response = endpoint.response_schema.clone();
        graph.add_entity(endpoint);
        graph.add_relation(Relation::new(&api_id, &id, RelationType::Contains));
        if let Some(schema) = response {
            graph.add_relation(Relation::new(&id, schema, RelationType::References));
        }
    }
    count
}

/// One integration per (category, target); untargeted effects are only counted.
fn lift_side_effects(graph: &mut KnowledgeGraph, service_id: &str, effects: &[ExtractedSideEffect]) -> usize {
    let mut grouped: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
    let mut untargeted: BTreeMap<String, usize> = BTreeMap::new();
    for effect in effects {
        let category = effect.category.as_str().to_string();
        match &effect.target {
            Some(target) => {
                grouped
                    .entry((category, target.clone()))
                    .or_default()
                    .insert(effect.operation.clone());
            }
            None => *untargeted.entry(category).or_insert(0) += 1,
        }
    }

    for ((category, target), operations) in &grouped {
        let id = entity_id(EntityType::Integration, &format!("{}-{}", category, target));
        let mut integration = match graph.get_entity(&id).and_then(|e| match e {
            Entity::Integration(i) => Some(i.clone()),
            _ => None,
        }) {
            Some(existing) => existing,
            None => Integration::new(id.clone(), target.clone(), category.clone()),
        };
        integration.provider = Some(target.clone());
        if !integration.services.iter().any(|s| s == service_id) {
            integration.services.push(service_id.to_string());
        }
        integration
            .base
            .metadata
            .insert("operations".to_string(), json!(operations));
        graph.add_entity(integration);
        graph.add_relation(Relation::new(service_id, &id, RelationType::Uses));
    }

    if !untargeted.is_empty() {
        if let Some(Entity::Service(service)) = graph.get_entity(service_id).cloned() {
            let mut service = service;
            service
                .base
                .metadata
                .insert("untargeted_side_effects".to_string(), json!(untargeted));
            graph.add_entity(service);
        }
    }
    grouped.len()
}

/// Lift Terraform resources into `infra:<address>` schemas with
/// `depends_on` relations. Returns the number of resources lifted.
pub fn lift_infrastructure(
    graph: &mut KnowledgeGraph,
    owner: Option<&str>,
    diagram: &InfrastructureDiagram,
) -> usize {
    for resource in &diagram.resources {
        let id = format!("infra:{}", resource.address);
        let mut schema = Schema::new(id.clone(), resource.address.clone(), "infrastructure");
        schema.service_id = owner.map(str::to_string);
        schema.base.source_refs = vec![format!("{}:{}", resource.file, resource.line)];
        schema.definition = Some(json!({
            "kind": resource.kind,
            "resource_type": resource.resource_type,
            "name": resource.name,
            "file": resource.file,
            "line": resource.line,
            "attributes": resource.attributes,
        }));
        schema.relationships = resource.dependencies.clone();
        graph.add_entity(schema);
        if let Some(owner) = owner {
            graph.add_relation(Relation::new(owner, &id, RelationType::Owns));
        }
    }

    for resource in &diagram.resources {
        let source = format!("infra:{}", resource.address);
        for dependency in &resource.dependencies {
            let target = format!("infra:{}", dependency);
            if graph.contains(&target) {
                graph.add_relation(
                    Relation::new(&source, &target, RelationType::DependsOn)
                        .with_metadata("source", Value::String("terraform".to_string())),
                );
            }
        }
    }
    diagram.resources.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{
        ExtractedConfig, ExtractedDependency, ExtractedField, ModelType, TerraformResource,
    };
    use crate::graph::Direction;

    fn result() -> AnalysisResult {
        let mut result = AnalysisResult::new("go+terraform");
        let mut user = ExtractedModel::new("User", ModelType::Struct, "models/user.go", 3);
        user.fields.push(ExtractedField::new("ID", "string"));
        user.interfaces.push("Entity".to_string());
        result.models.push(user);
        result.models.push(ExtractedModel::new("Entity", ModelType::Interface, "models/entity.go", 1));

        let mut get = ExtractedEndpoint::new("GET", "/users/{id}", "api/routes.go", 10)
            .with_handler(Some("GetUser".to_string()));
        get.response_type = Some("User".to_string());
        result.endpoints.push(get);
        result.endpoints.push(ExtractedEndpoint::new("POST", "/users", "api/routes.go", 11));

        result.side_effects.push(ExtractedSideEffect::new(
            SideEffectCategory::Database,
            "query",
            Some("users".to_string()),
            "store/user.go",
            20,
        ));
        result.side_effects.push(ExtractedSideEffect::new(SideEffectCategory::File, "write", None, "store/user.go", 30));
        result.config.push(ExtractedConfig::new("DATABASE_URL", "env", "main.go", 5));
        result.dependencies.push(ExtractedDependency::new("github.com/lib/pq", Some("v1.10.9".to_string()), "go.mod", 3));
        result
    }

    #[test]
    fn test_integrate_analysis() {
        let mut graph = KnowledgeGraph::new();
        let summary = integrate_analysis(&mut graph, "user-service", Some("https://git.example/users"), &result());
        assert_eq!(summary.service_id, "service:user-service");
        assert_eq!((summary.schemas, summary.endpoints, summary.integrations), (2, 2, 1));

        let service = graph.get_entity("service:user-service").unwrap().as_service().unwrap();
        assert_eq!(service.dependencies, vec!["github.com/lib/pq"]);
        assert_eq!(service.databases, vec!["users"]);
        assert_eq!(service.base.metadata["untargeted_side_effects"]["file"], json!(1));

        let apis = graph.get_service_apis("service:user-service");
        assert_eq!(apis.len(), 1);
        let endpoints = graph.get_related_entities("api:user-service", Some(RelationType::Contains), Direction::Outgoing);
        assert_eq!(endpoints.len(), 2);

        assert!(graph.has_relation(
            "schema:user-service.user",
            "schema:user-service.entity",
            RelationType::Implements
        ));
        assert!(graph.has_relation(
            "endpoint:user-service:get-users-id",
            "schema:user-service.user",
            RelationType::References
        ));
        assert!(graph.has_relation(
            "repository:user-service",
            "service:user-service",
            RelationType::Contains
        ));
        assert!(graph.contains("integration:database-users"));
    }

    #[test]
    fn test_colliding_model_names_get_distinct_schemas() {
        let mut result = AnalysisResult::new("go");
        for line in [3, 9, 15] {
            result.models.push(ExtractedModel::new("Event", ModelType::Struct, "events.go", line));
        }
        let mut graph = KnowledgeGraph::new();
        integrate_analysis(&mut graph, "audit", None, &result);
        assert!(graph.contains("schema:audit.event"));
        assert!(graph.contains("schema:audit.events.go.event"));
        assert!(graph.contains("schema:audit.events.go.event-2"));
        let owned = graph.get_relations(Some("service:audit"), None, Some(RelationType::Owns));
        assert_eq!(owned.len(), 3);
    }

    #[test]
    fn test_reintegration_is_stable() {
        let mut graph = KnowledgeGraph::new();
        integrate_analysis(&mut graph, "svc", None, &result());
        let (entities, edges) = (graph.entity_count(), graph.edge_count());
        integrate_analysis(&mut graph, "svc", None, &result());
        assert_eq!((graph.entity_count(), graph.edge_count()), (entities, edges));
    }

    #[test]
    fn test_lift_infrastructure() {
        let resource = |address: &str, deps: &[&str]| TerraformResource {
            address: address.to_string(),
            resource_type: address.split('.').next().unwrap_or_default().to_string(),
            name: address.rsplit('.').next().unwrap_or_default().to_string(),
            kind: "resource".to_string(),
            file: "main.tf".to_string(),
            line: 1,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            dependents: Vec::new(),
            attributes: Default::default(),
        };
        let diagram = InfrastructureDiagram {
            resources: vec![
                resource("aws_subnet.a", &["aws_vpc.main", "var.region"]),
                resource("aws_vpc.main", &[]),
            ],
        };
        let mut graph = KnowledgeGraph::new();
        assert_eq!(lift_infrastructure(&mut graph, None, &diagram), 2);
        assert!(graph.has_relation("infra:aws_subnet.a", "infra:aws_vpc.main", RelationType::DependsOn));
        assert_eq!(graph.edge_count(), 1);
        let schema = graph.get_entity("infra:aws_vpc.main").unwrap().as_schema().unwrap();
        assert_eq!(schema.schema_type, "infrastructure");
        assert_eq!(
            graph.find_paths("infra:aws_subnet.a", "infra:aws_vpc.main", 2),
            vec![vec!["infra:aws_subnet.a".to_string(), "infra:aws_vpc.main".to_string()]]
        );
    }
}
