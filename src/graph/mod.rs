//! Knowledge graph of services, APIs, schemas and their relations.

mod entities;
mod knowledge;
mod relations;

pub use entities::{
    entity_id, slugify, Api, ApiType, Document, DocumentSource, Domain, Endpoint, Entity,
    EntityBase, EntityType, Integration, Person, Repository, Schema, SchemaField, Service,
    ServiceStatus, ServiceTraits, TrustLevel,
};
pub use knowledge::{Direction, GraphSnapshot, GraphStatistics, KnowledgeGraph};
pub use relations::{Relation, RelationEdge, RelationType};
