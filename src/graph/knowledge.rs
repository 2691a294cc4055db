//! In-memory knowledge graph.
//!
//! Entities are nodes of a petgraph [`DiGraph`], relations are edges. The
//! graph is a multigraph keyed by (source, target, type): relations of
//! different types between the same ordered pair coexist, re-adding the
//! same triple overwrites its metadata. Dangling relations are never stored.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::Utc;
use petgraph::algo::{all_simple_paths, connected_components};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction as EdgeDirection;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::entities::{Entity, EntityType};
use super::relations::{Relation, RelationEdge, RelationType};

/// Which edges of an entity to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
    Both,
}

/// Serialized graph: `{"entities": [...], "relations": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

/// Summary counts of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub entity_counts: BTreeMap<String, usize>,
    pub total_entities: usize,
    pub total_relations: usize,
    pub relation_counts: BTreeMap<String, usize>,
    /// Weakly connected components.
    pub connected_components: usize,
}

#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<Entity, RelationEdge>,
    index: HashMap<String, NodeIndex>,
    by_type: HashMap<EntityType, BTreeSet<String>>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity by id.
    ///
    /// On replacement the stored `created_at` is kept and `updated_at`
    /// becomes now.
    pub fn add_entity(&mut self, entity: impl Into<Entity>) {
        let mut entity = entity.into();
        if let Some(existing) = self.get_entity(entity.id()) {
            let created_at = existing.base().created_at;
            let base = entity.base_mut();
            base.created_at = created_at;
            base.updated_at = Utc::now();
        }
        self.put(entity);
    }

    /// Insert or replace without touching timestamps.
    fn put(&mut self, entity: Entity) {
        let id = entity.id().to_string();
        let entity_type = entity.entity_type();
        match self.index.get(&id).copied() {
            Some(idx) => {
                let old_type = self.graph[idx].entity_type();
                if old_type != entity_type {
                    if let Some(ids) = self.by_type.get_mut(&old_type) {
                        ids.remove(&id);
                    }
                }
                self.graph[idx] = entity;
            }
            None => {
                let idx = self.graph.add_node(entity);
                self.index.insert(id.clone(), idx);
            }
        }
        self.by_type.entry(entity_type).or_default().insert(id);
    }

    pub fn get_entity(&self, id: &str) -> Option<&Entity> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Entities of one kind, ordered by id.
    pub fn get_entities_by_type(&self, entity_type: EntityType) -> Vec<&Entity> {
        self.by_type
            .get(&entity_type)
            .map(|ids| ids.iter().filter_map(|id| self.get_entity(id)).collect())
            .unwrap_or_default()
    }

    /// All entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.graph.node_weights()
    }

    pub fn entity_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Add a relation. Returns false, and stores nothing, when either end
    /// is unknown.
    pub fn add_relation(&mut self, relation: Relation) -> bool {
        let (Some(source), Some(target)) = (
            self.index.get(&relation.source_id).copied(),
            self.index.get(&relation.target_id).copied(),
        ) else {
            warn!(
                source = %relation.source_id,
                target = %relation.target_id,
                relation = %relation.relation_type,
                "dropping relation with unknown endpoint"
            );
            return false;
        };
        match self.find_edge(source, target, relation.relation_type) {
            Some(edge) => {
                if let Some(weight) = self.graph.edge_weight_mut(edge) {
                    weight.metadata = relation.metadata;
                }
            }
            None => {
                self.graph.add_edge(source, target, RelationEdge::from(&relation));
            }
        }
        true
    }

    fn find_edge(&self, source: NodeIndex, target: NodeIndex, relation_type: RelationType) -> Option<EdgeIndex> {
        self.graph
            .edges_connecting(source, target)
            .find(|e| e.weight().relation_type == relation_type)
            .map(|e| e.id())
    }

    pub fn has_relation(&self, source_id: &str, target_id: &str, relation_type: RelationType) -> bool {
        match (self.index.get(source_id), self.index.get(target_id)) {
            (Some(s), Some(t)) => self.find_edge(*s, *t, relation_type).is_some(),
            _ => false,
        }
    }

    fn relation_at(&self, edge: EdgeIndex) -> Option<Relation> {
        let (source, target) = self.graph.edge_endpoints(edge)?;
        let weight = self.graph.edge_weight(edge)?;
        Some(Relation {
            source_id: self.graph[source].id().to_string(),
            target_id: self.graph[target].id().to_string(),
            relation_type: weight.relation_type,
            metadata: weight.metadata.clone(),
        })
    }

    /// Relations matching every given filter. An unknown id matches nothing.
    pub fn get_relations(
        &self,
        source_id: Option<&str>,
        target_id: Option<&str>,
        relation_type: Option<RelationType>,
    ) -> Vec<Relation> {
        let source = source_id.map(|id| self.index.get(id).copied());
        let target = target_id.map(|id| self.index.get(id).copied());
        if matches!(source, Some(None)) || matches!(target, Some(None)) {
            return Vec::new();
        }
        let (source, target) = (source.flatten(), target.flatten());

        let edges: Vec<EdgeIndex> = match (source, target) {
            (Some(s), _) => self.graph.edges_directed(s, EdgeDirection::Outgoing).map(|e| e.id()).collect(),
            (None, Some(t)) => self.graph.edges_directed(t, EdgeDirection::Incoming).map(|e| e.id()).collect(),
            (None, None) => self.graph.edge_indices().collect(),
        };

        let mut relations: Vec<Relation> = edges
            .into_iter()
            .filter(|edge| {
                let Some((s, t)) = self.graph.edge_endpoints(*edge) else { return false };
                target.map_or(true, |want| want == t)
                    && source.map_or(true, |want| want == s)
                    && relation_type.map_or(true, |want| self.graph[*edge].relation_type == want)
            })
            .filter_map(|edge| self.relation_at(edge))
            .collect();
        // petgraph walks adjacency lists newest first.
        relations.sort_by(|a, b| {
            (&a.source_id, &a.target_id, a.relation_type).cmp(&(&b.source_id, &b.target_id, b.relation_type))
        });
        relations
    }

    /// Neighbouring entities, each reported once.
    pub fn get_related_entities(
        &self,
        id: &str,
        relation_type: Option<RelationType>,
        direction: Direction,
    ) -> Vec<&Entity> {
        let Some(node) = self.index.get(id).copied() else {
            return Vec::new();
        };
        let mut neighbours = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            neighbours.extend(
                self.graph
                    .edges_directed(node, EdgeDirection::Outgoing)
                    .filter(|e| relation_type.map_or(true, |t| e.weight().relation_type == t))
                    .map(|e| e.target()),
            );
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            neighbours.extend(
                self.graph
                    .edges_directed(node, EdgeDirection::Incoming)
                    .filter(|e| relation_type.map_or(true, |t| e.weight().relation_type == t))
                    .map(|e| e.source()),
            );
        }
        let mut seen = HashSet::new();
        let mut related: Vec<&Entity> = neighbours
            .into_iter()
            .filter(|n| seen.insert(*n))
            .map(|n| &self.graph[n])
            .collect();
        related.sort_by(|a, b| a.id().cmp(b.id()));
        related
    }

    pub fn get_services(&self) -> Vec<&Entity> {
        self.get_entities_by_type(EntityType::Service)
    }

    pub fn get_domains(&self) -> Vec<&Entity> {
        self.get_entities_by_type(EntityType::Domain)
    }

    /// APIs exposed by a service, or declaring it as their owner.
    pub fn get_service_apis(&self, service_id: &str) -> Vec<&Entity> {
        let mut apis: Vec<&Entity> = self
            .get_related_entities(service_id, Some(RelationType::Exposes), Direction::Outgoing)
            .into_iter()
            .filter(|e| e.entity_type() == EntityType::Api)
            .collect();
        for api in self.get_entities_by_type(EntityType::Api) {
            let owned = api.as_api().and_then(|a| a.service_id.as_deref()) == Some(service_id);
            if owned && !apis.iter().any(|e| e.id() == api.id()) {
                apis.push(api);
            }
        }
        apis.sort_by(|a, b| a.id().cmp(b.id()));
        apis
    }

    /// Services a domain contains, or that belong to it.
    pub fn get_domain_services(&self, domain_id: &str) -> Vec<&Entity> {
        let mut services = self.get_related_entities(domain_id, Some(RelationType::Contains), Direction::Outgoing);
        for service in self.get_related_entities(domain_id, Some(RelationType::BelongsTo), Direction::Incoming) {
            if !services.iter().any(|e| e.id() == service.id()) {
                services.push(service);
            }
        }
        services.retain(|e| e.entity_type() == EntityType::Service);
        services.sort_by(|a, b| a.id().cmp(b.id()));
        services
    }

    pub fn get_service_dependencies(&self, service_id: &str) -> Vec<&Entity> {
        self.get_related_entities(service_id, Some(RelationType::DependsOn), Direction::Outgoing)
    }

    pub fn get_service_dependents(&self, service_id: &str) -> Vec<&Entity> {
        self.get_related_entities(service_id, Some(RelationType::DependsOn), Direction::Incoming)
    }

    /// Simple paths from `source_id` to `target_id` of at most `max_length`
    /// edges, shortest first. Empty when either id is unknown.
    pub fn find_paths(&self, source_id: &str, target_id: &str, max_length: usize) -> Vec<Vec<String>> {
        let (Some(source), Some(target)) = (self.index.get(source_id), self.index.get(target_id)) else {
            return Vec::new();
        };
        if max_length == 0 || source == target {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let mut paths: Vec<Vec<String>> =
            all_simple_paths::<Vec<NodeIndex>, _>(&self.graph, *source, *target, 0, Some(max_length - 1))
                .filter(|path| seen.insert(path.clone()))
                .map(|path| path.into_iter().map(|n| self.graph[n].id().to_string()).collect())
                .collect();
        paths.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        paths
    }

    /// Graph induced by `ids`; unknown ids are ignored.
    pub fn get_subgraph<S: AsRef<str>>(&self, ids: &[S]) -> KnowledgeGraph {
        let mut sub = KnowledgeGraph::new();
        for id in ids {
            if let Some(entity) = self.get_entity(id.as_ref()) {
                sub.put(entity.clone());
            }
        }
        for edge in self.graph.edge_indices() {
            if let Some(relation) = self.relation_at(edge) {
                if sub.contains(&relation.source_id) && sub.contains(&relation.target_id) {
                    sub.add_relation(relation);
                }
            }
        }
        sub
    }

    /// Fold `other` into this graph.
    ///
    /// The entity with the later `updated_at` wins; relations are added only
    /// when the same (source, target, type) is absent here.
    pub fn merge(&mut self, other: &KnowledgeGraph) {
        let mut replaced = 0usize;
        for entity in other.entities() {
            let newer = match self.get_entity(entity.id()) {
                Some(existing) => entity.updated_at() > existing.updated_at(),
                None => true,
            };
            if newer {
                self.put(entity.clone());
                replaced += 1;
            }
        }
        let mut added = 0usize;
        for edge in other.graph.edge_indices() {
            let Some(relation) = other.relation_at(edge) else { continue };
            if !self.has_relation(&relation.source_id, &relation.target_id, relation.relation_type)
                && self.add_relation(relation)
            {
                added += 1;
            }
        }
        debug!(entities = replaced, relations = added, "graphs merged");
    }

    pub fn to_dict(&self) -> GraphSnapshot {
        GraphSnapshot {
            entities: self.entities().cloned().collect(),
            relations: self.graph.edge_indices().filter_map(|e| self.relation_at(e)).collect(),
        }
    }

    /// Rebuild a graph from a snapshot, dropping relations whose endpoints
    /// are missing.
    pub fn from_dict(snapshot: GraphSnapshot) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        for entity in snapshot.entities {
            graph.put(entity);
        }
        for relation in snapshot.relations {
            graph.add_relation(relation);
        }
        graph
    }

    pub fn get_statistics(&self) -> GraphStatistics {
        let mut entity_counts = BTreeMap::new();
        for entity_type in EntityType::ALL {
            let count = self.by_type.get(entity_type).map_or(0, BTreeSet::len);
            if count > 0 {
                entity_counts.insert(entity_type.to_string(), count);
            }
        }
        let mut relation_counts = BTreeMap::new();
        for weight in self.graph.edge_weights() {
            *relation_counts.entry(weight.relation_type.to_string()).or_insert(0) += 1;
        }
        GraphStatistics {
            entity_counts,
            total_entities: self.entity_count(),
            total_relations: self.edge_count(),
            relation_counts,
            connected_components: connected_components(&self.graph),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::entities::{Api, ApiType, Domain, Schema, Service};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn service(name: &str) -> Service {
        Service::new(name)
    }

    fn sample() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        graph.add_entity(service("orders"));
        graph.add_entity(service("billing"));
        graph.add_entity(service("ledger"));
        graph.add_entity(Domain::new("commerce"));
        let mut api = Api::new("api:orders", "Orders API", ApiType::Rest);
        api.service_id = Some("service:orders".to_string());
        graph.add_entity(api);
        graph.add_entity(Api::new("api:billing", "Billing API", ApiType::Graphql));

        graph.add_relation(Relation::new("service:orders", "service:billing", RelationType::DependsOn));
        graph.add_relation(Relation::new("service:billing", "service:ledger", RelationType::DependsOn));
        graph.add_relation(Relation::new("service:orders", "service:ledger", RelationType::Calls));
        graph.add_relation(Relation::new("service:billing", "api:billing", RelationType::Exposes));
        graph.add_relation(Relation::new("domain:commerce", "service:orders", RelationType::Contains));
        graph.add_relation(Relation::new("service:billing", "domain:commerce", RelationType::BelongsTo));
        graph
    }

    fn ids(entities: &[&Entity]) -> Vec<String> {
        entities.iter().map(|e| e.id().to_string()).collect()
    }

    #[test]
    fn test_dangling_relation_rejected() {
        let mut graph = sample();
        let before = graph.edge_count();
        assert!(!graph.add_relation(Relation::new("service:orders", "service:ghost", RelationType::Calls)));
        assert_eq!(graph.edge_count(), before);
    }

    #[test]
    fn test_readd_preserves_created_at() {
        let mut graph = KnowledgeGraph::new();
        let mut first = service("orders");
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        first.base.created_at = created;
        first.base.updated_at = created;
        graph.add_entity(first);

        let mut second = service("orders");
        second.language = Some("go".to_string());
        graph.add_entity(second);

        let stored = graph.get_entity("service:orders").unwrap();
        assert_eq!(stored.base().created_at, created);
        assert!(stored.updated_at() > created);
        assert_eq!(stored.as_service().unwrap().language.as_deref(), Some("go"));
        assert_eq!(graph.entity_count(), 1);
    }

    #[test]
    fn test_multigraph_keyed_by_type() {
        let mut graph = sample();
        let before = graph.edge_count();
        assert!(graph.add_relation(Relation::new("service:orders", "service:billing", RelationType::Calls)));
        assert_eq!(graph.edge_count(), before + 1);

        assert!(graph.add_relation(
            Relation::new("service:orders", "service:billing", RelationType::Calls).with_metadata("protocol", json!("grpc"))
        ));
        assert_eq!(graph.edge_count(), before + 1);
        let calls = graph.get_relations(Some("service:orders"), Some("service:billing"), Some(RelationType::Calls));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].metadata["protocol"], json!("grpc"));
    }

    #[test]
    fn test_get_relations_filters() {
        let graph = sample();
        assert_eq!(graph.get_relations(None, None, None).len(), 6);
        assert_eq!(graph.get_relations(None, None, Some(RelationType::DependsOn)).len(), 2);
        let into_ledger = graph.get_relations(None, Some("service:ledger"), None);
        assert_eq!(into_ledger.len(), 2);
        assert!(graph.get_relations(Some("service:ghost"), None, None).is_empty());
    }

    #[test]
    fn test_related_entities_directions() {
        let graph = sample();
        assert_eq!(
            ids(&graph.get_related_entities("service:billing", None, Direction::Outgoing)),
            vec!["api:billing", "domain:commerce", "service:ledger"]
        );
        assert_eq!(
            ids(&graph.get_related_entities("service:billing", None, Direction::Incoming)),
            vec!["service:orders"]
        );
        assert_eq!(graph.get_related_entities("service:billing", None, Direction::Both).len(), 4);
    }

    #[test]
    fn test_service_and_domain_helpers() {
        let graph = sample();
        assert_eq!(graph.get_services().len(), 3);
        assert_eq!(ids(&graph.get_service_apis("service:orders")), vec!["api:orders"]);
        assert_eq!(ids(&graph.get_service_apis("service:billing")), vec!["api:billing"]);
        assert_eq!(
            ids(&graph.get_domain_services("domain:commerce")),
            vec!["service:billing", "service:orders"]
        );
        assert_eq!(ids(&graph.get_service_dependencies("service:orders")), vec!["service:billing"]);
        assert_eq!(ids(&graph.get_service_dependents("service:ledger")), vec!["service:billing"]);
    }

    #[test]
    fn test_find_paths() {
        let graph = sample();
        let paths = graph.find_paths("service:orders", "service:ledger", 3);
        assert_eq!(
            paths,
            vec![
                vec!["service:orders".to_string(), "service:ledger".to_string()],
                vec![
                    "service:orders".to_string(),
                    "service:billing".to_string(),
                    "service:ledger".to_string()
                ],
            ]
        );
        assert_eq!(graph.find_paths("service:orders", "service:ledger", 1).len(), 1);
        assert!(graph.find_paths("service:orders", "service:ghost", 3).is_empty());
        assert!(graph.find_paths("service:ledger", "service:orders", 3).is_empty());
    }

    #[test]
    fn test_parallel_edges_do_not_duplicate_paths() {
        let mut graph = sample();
        graph.add_relation(Relation::new("service:orders", "service:ledger", RelationType::Uses));
        assert_eq!(graph.find_paths("service:orders", "service:ledger", 1).len(), 1);
    }

    #[test]
    fn test_subgraph() {
        let graph = sample();
        let sub = graph.get_subgraph(&["service:orders", "service:billing", "service:ghost"]);
        assert_eq!(sub.entity_count(), 2);
        assert_eq!(sub.edge_count(), 1);
        assert!(sub.has_relation("service:orders", "service:billing", RelationType::DependsOn));
    }

    #[test]
    fn test_merge_prefers_newer_entity() {
        let mut left = sample();
        let mut right = KnowledgeGraph::new();

        let mut newer = service("orders");
        newer.language = Some("rust".to_string());
        newer.base.updated_at = Utc::now() + Duration::hours(1);
        right.put(newer.into());

        let mut older = service("billing");
        older.language = Some("cobol".to_string());
        older.base.updated_at = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        right.put(older.into());

        right.add_entity(Schema::new("schema:order", "Order", "model"));
        right.add_relation(Relation::new("service:billing", "service:orders", RelationType::Calls));
        right.add_relation(Relation::new("service:orders", "service:billing", RelationType::DependsOn).with_metadata("x", json!(1)));

        left.merge(&right);
        let orders = left.get_entity("service:orders").unwrap().as_service().unwrap();
        assert_eq!(orders.language.as_deref(), Some("rust"));
        let billing = left.get_entity("service:billing").unwrap().as_service().unwrap();
        assert_eq!(billing.language, None);
        assert!(left.contains("schema:order"));
        assert!(left.has_relation("service:billing", "service:orders", RelationType::Calls));
        let existing = left.get_relations(Some("service:orders"), Some("service:billing"), Some(RelationType::DependsOn));
        assert!(existing[0].metadata.is_empty());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let graph = sample();
        let json = serde_json::to_string(&graph.to_dict()).unwrap();
        let snapshot: GraphSnapshot = serde_json::from_str(&json).unwrap();
        let back = KnowledgeGraph::from_dict(snapshot);

        assert_eq!(back.entity_count(), graph.entity_count());
        assert_eq!(back.get_relations(None, None, None), graph.get_relations(None, None, None));
        for entity in graph.entities() {
            assert_eq!(back.get_entity(entity.id()), Some(entity));
        }
        assert!(back.get_entity("service:orders").unwrap().as_service().is_some());
    }

    #[test]
    fn test_from_dict_drops_dangling() {
        let snapshot = GraphSnapshot {
            entities: vec![service("orders").into()],
            relations: vec![Relation::new("service:orders", "service:gone", RelationType::Calls)],
        };
        let graph = KnowledgeGraph::from_dict(snapshot);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_statistics() {
        let mut graph = sample();
        graph.add_entity(Schema::new("schema:island", "Island", "model"));
        let stats = graph.get_statistics();
        assert_eq!(stats.total_entities, 7);
        assert_eq!(stats.entity_counts["service"], 3);
        assert_eq!(stats.entity_counts["api"], 2);
        assert_eq!(stats.relation_counts["depends_on"], 2);
        assert_eq!(stats.total_relations, 6);
        // api:orders is linked only through its service_id field.
        assert_eq!(stats.connected_components, 3);
    }
}
