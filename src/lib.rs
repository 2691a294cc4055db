//! Repograph - repository knowledge graph builder.
//!
//! Repograph reads a checked-out repository and extracts what a reader
//! needs to understand a service: data models, API endpoints, side effects
//! (databases, queues, HTTP calls), configuration keys and declared
//! dependencies. The facts are lifted into a typed knowledge graph that is
//! persisted alongside a registry of generated documents.
//!
//! # Architecture
//!
//! - `analysis`: Pattern analyzers per language, detection and the factory
//! - `ai`: Model-assisted analyzer with tolerant JSON parsing
//! - `graph`: Entities, relations and the petgraph-backed knowledge graph
//! - `store`: On-disk graph, document registry and agent checkpoints
//! - `integration`: Lifts analysis results into the graph
//! - `config`: `repograph.yaml` settings
//! - `report`: Output formatting (pretty, JSON)
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Implement `LanguageAnalyzer`
//! and register it in `languages/mod.rs`.

pub mod ai;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod graph;
pub mod integration;
pub mod report;
pub mod store;

pub use analysis::{
    analyze_repository, create_analyzer, detect_all_languages, detect_language, AnalysisResult,
    AnalyzeOptions, AnalyzerContext, Language, LanguageAnalyzer,
};
pub use config::Config;
pub use graph::{Entity, EntityType, KnowledgeGraph, Relation, RelationType};
pub use integration::{integrate_analysis, lift_infrastructure, IntegrationSummary};
pub use store::{compute_entity_hash, KnowledgeStore, StoreError};

/// Register every built-in analyzer.
///
/// [`create_analyzer`] does this on first use; calling it again is a no-op.
pub fn init() {
    analysis::register_all();
}
