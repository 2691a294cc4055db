//! Durable storage for the knowledge graph.
//!
//! Layout of a store directory:
//!
//! ```text
//! <dir>/
//!     knowledge_graph.json      graph snapshot
//!     document_registry.json    generated document → source hash
//!     checkpoints/<agent>.json  per-agent resumable state
//! ```
//!
//! Loading never fails: a missing or corrupt file yields an empty graph or
//! registry and a warning. Writes go to a `.tmp` sibling and are renamed
//! into place.

mod hash;

pub use hash::{compute_entity_hash, HASH_LEN};

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::graph::{GraphSnapshot, KnowledgeGraph};

pub const GRAPH_FILE: &str = "knowledge_graph.json";
pub const REGISTRY_FILE: &str = "document_registry.json";
pub const CHECKPOINT_DIR: &str = "checkpoints";

/// Errors that can occur while writing the store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A generated document and the source state it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub path: String,
    pub source_hash: String,
    pub generated_at: DateTime<Utc>,
    pub agent_version: String,
    pub entity_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub agent: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

pub struct KnowledgeStore {
    dir: PathBuf,
    graph: KnowledgeGraph,
    documents: BTreeMap<String, DocumentRecord>,
    agent_version: String,
}

impl KnowledgeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            graph: KnowledgeGraph::new(),
            documents: BTreeMap::new(),
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Version recorded on documents registered from now on.
    pub fn with_agent_version(mut self, version: impl Into<String>) -> Self {
        self.agent_version = version.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut KnowledgeGraph {
        &mut self.graph
    }

    pub fn set_graph(&mut self, graph: KnowledgeGraph) {
        self.graph = graph;
    }

    fn graph_path(&self) -> PathBuf {
        self.dir.join(GRAPH_FILE)
    }

    fn registry_path(&self) -> PathBuf {
        self.dir.join(REGISTRY_FILE)
    }

    fn checkpoint_dir(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_DIR)
    }

    fn checkpoint_path(&self, agent: &str) -> PathBuf {
        let file = agent.replace(['/', '\\', ':'], "_");
        self.checkpoint_dir().join(format!("{}.json", file))
    }

    /// Replace in-memory state with what is on disk.
    pub async fn load(&mut self) {
        self.graph = match read_json::<GraphSnapshot>(&self.graph_path()).await {
            Some(snapshot) => KnowledgeGraph::from_dict(snapshot),
            None => KnowledgeGraph::new(),
        };
        self.documents = read_json(&self.registry_path()).await.unwrap_or_default();
        info!(
            dir = %self.dir.display(),
            entities = self.graph.entity_count(),
            relations = self.graph.edge_count(),
            documents = self.documents.len(),
            "knowledge store loaded"
        );
    }

    pub async fn save(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;
        write_json(&self.graph_path(), &self.graph.to_dict()).await?;
        write_json(&self.registry_path(), &self.documents).await?;
        info!(
            dir = %self.dir.display(),
            entities = self.graph.entity_count(),
            documents = self.documents.len(),
            "knowledge store saved"
        );
        Ok(())
    }

    pub async fn save_checkpoint(&self, agent: &str, data: Value) -> Result<(), StoreError> {
        let dir = self.checkpoint_dir();
        fs::create_dir_all(&dir).await.map_err(|e| StoreError::io(&dir, e))?;
        let checkpoint = Checkpoint {
            agent: agent.to_string(),
            timestamp: Utc::now(),
            data,
        };
        write_json(&self.checkpoint_path(agent), &checkpoint).await?;
        debug!(agent, "checkpoint saved");
        Ok(())
    }

    pub async fn load_checkpoint(&self, agent: &str) -> Option<Checkpoint> {
        read_json(&self.checkpoint_path(agent)).await
    }

    /// Delete an agent's checkpoint. Returns whether one existed.
    pub async fn clear_checkpoint(&self, agent: &str) -> Result<bool, StoreError> {
        let path = self.checkpoint_path(agent);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Agents with a stored checkpoint, sorted.
    pub async fn list_checkpoints(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.checkpoint_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };
        let mut agents = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| StoreError::io(&dir, e))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                agents.push(stem.to_string());
            }
        }
        agents.sort();
        Ok(agents)
    }

    /// Record that `path` was generated from entities hashing to `source_hash`.
    pub fn register_document(&mut self, path: &str, source_hash: &str, entity_ids: Vec<String>) -> &DocumentRecord {
        let record = DocumentRecord {
            path: path.to_string(),
            source_hash: source_hash.to_string(),
            generated_at: Utc::now(),
            agent_version: self.agent_version.clone(),
            entity_ids,
        };
        self.documents.insert(path.to_string(), record);
        &self.documents[path]
    }

    /// True when `path` was never registered or its sources changed.
    pub fn needs_regeneration(&self, path: &str, current_hash: &str) -> bool {
        self.documents
            .get(path)
            .map_or(true, |record| record.source_hash != current_hash)
    }

    pub fn get_document_record(&self, path: &str) -> Option<&DocumentRecord> {
        self.documents.get(path)
    }

    pub fn remove_document(&mut self, path: &str) -> Option<DocumentRecord> {
        self.documents.remove(path)
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.documents.values()
    }

    /// Paths in `current` (path → hash) that need regeneration, sorted.
    pub fn stale_documents(&self, current: &HashMap<String, String>) -> Vec<String> {
        let mut stale: Vec<String> = current
            .iter()
            .filter(|(path, hash)| self.needs_regeneration(path, hash))
            .map(|(path, _)| path.clone())
            .collect();
        stale.sort();
        stale
    }
}

/// Parse a JSON file, treating absence and corruption as `None`.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "store file absent");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read store file, starting empty");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "corrupt store file, starting empty");
            None
        }
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let text = serde_json::to_vec_pretty(value)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, text).await.map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).await.map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Relation, RelationType, Service};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut store = KnowledgeStore::new(temp.path().join("store"));
        store.graph_mut().add_entity(Service::new("orders"));
        store.graph_mut().add_entity(Service::new("billing"));
        store
            .graph_mut()
            .add_relation(Relation::new("service:orders", "service:billing", RelationType::Calls));
        store.register_document("services/orders/README.md", "abc", vec!["service:orders".to_string()]);
        store.save().await.unwrap();
        assert!(!temp.path().join("store/knowledge_graph.json.tmp").exists());

        let mut reloaded = KnowledgeStore::new(temp.path().join("store"));
        reloaded.load().await;
        assert_eq!(reloaded.graph().entity_count(), 2);
        assert_eq!(reloaded.graph().edge_count(), 1);
        let record = reloaded.get_document_record("services/orders/README.md").unwrap();
        assert_eq!(record.agent_version, env!("CARGO_PKG_VERSION"));
        assert_eq!(record.entity_ids, vec!["service:orders"]);
    }

    #[tokio::test]
    async fn test_corrupt_files_load_empty() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(GRAPH_FILE), "{\"entities\": [").unwrap();
        std::fs::write(temp.path().join(REGISTRY_FILE), "not json").unwrap();
        let mut store = KnowledgeStore::new(temp.path());
        store.load().await;
        assert_eq!(store.graph().entity_count(), 0);
        assert_eq!(store.documents().count(), 0);

        let mut empty = KnowledgeStore::new(temp.path().join("missing"));
        empty.load().await;
        assert_eq!(empty.graph().entity_count(), 0);
    }

    #[test]
    fn test_needs_regeneration() {
        let mut store = KnowledgeStore::new("/unused").with_agent_version("2.1.0");
        let path = "services/x/README.md";
        assert!(store.needs_regeneration(path, "hash_v1"));
        store.register_document(path, "hash_v1", vec!["service:x".to_string()]);
        assert!(!store.needs_regeneration(path, "hash_v1"));
        assert!(store.needs_regeneration(path, "hash_v2"));
        assert_eq!(store.get_document_record(path).unwrap().agent_version, "2.1.0");

        let current = HashMap::from([
            (path.to_string(), "hash_v1".to_string()),
            ("services/y/README.md".to_string(), "h".to_string()),
        ]);
        assert_eq!(store.stale_documents(&current), vec!["services/y/README.md"]);

        assert!(store.remove_document(path).is_some());
        assert!(store.needs_regeneration(path, "hash_v1"));
    }

    #[tokio::test]
    async fn test_checkpoints() {
        let temp = TempDir::new().unwrap();
        let store = KnowledgeStore::new(temp.path());
        assert!(store.list_checkpoints().await.unwrap().is_empty());
        assert!(store.load_checkpoint("writer").await.is_none());

        store.save_checkpoint("writer", json!({"done": ["a", "b"]})).await.unwrap();
        store.save_checkpoint("reviewer", json!(3)).await.unwrap();
        assert_eq!(store.list_checkpoints().await.unwrap(), vec!["reviewer", "writer"]);

        let checkpoint = store.load_checkpoint("writer").await.unwrap();
        assert_eq!(checkpoint.agent, "writer");
        assert_eq!(checkpoint.data["done"][1], json!("b"));

        assert!(store.clear_checkpoint("writer").await.unwrap());
        assert!(!store.clear_checkpoint("writer").await.unwrap());
        assert_eq!(store.list_checkpoints().await.unwrap(), vec!["reviewer"]);
    }
}
