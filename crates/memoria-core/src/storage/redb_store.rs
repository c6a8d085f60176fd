//! Concrete `StorePort` : node/edge persistence over `redb`,
//! with the flat vector index and BM25 index kept in memory alongside
//! it and rebuilt from the table on open.

use crate::error::{MemoriaError, Result};
use crate::ids::{EdgeId, NodeId};
use crate::ports::{
    BehaviorPort, Bm25Hit, CommitEdge, CommitNode, CommitOutcome, GraphMetrics, Neighbor,
    RerankFields, StorePort, VectorHit,
};
use crate::storage::bm25_index::Bm25Index;
use crate::storage::vector_index::FlatVectorIndex;
use crate::types::{Edge, Node, UserBehaviorModel};
use redb::{Database, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::RwLock;

const NODES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("nodes");
const EDGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("edges");
const EDGES_BY_FROM: MultimapTableDefinition<&[u8], &[u8]> = MultimapTableDefinition::new("edges_by_from");
const EDGES_BY_TO: MultimapTableDefinition<&[u8], &[u8]> = MultimapTableDefinition::new("edges_by_to");
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");
const BEHAVIOR: TableDefinition<&str, &[u8]> = TableDefinition::new("behavior");

/// Weight given to each new prompt/save observation in the behavior
/// model's running averages (UserBehaviorModel, rates updated
/// incrementally rather than recomputed from full history).
const BEHAVIOR_EMA_ALPHA: f32 = 0.1;

const CURRENT_SCHEMA_VERSION: u32 = 1;

/// How many of the most recently embedded nodes the similarity
/// maintenance pass is willing to rescan.
const RECENT_WINDOW: usize = 500;

pub struct RedbStore {
    db: Database,
    vector_index: RwLock<FlatVectorIndex>,
    bm25_index: RwLock<Bm25Index>,
    recent: RwLock<VecDeque<NodeId>>,
}

impl RedbStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = Database::create(path)?;
        Self::init_tables(&db)?;
        check_schema_version(&db)?;

        let store = Self {
            db,
            vector_index: RwLock::new(FlatVectorIndex::new()),
            bm25_index: RwLock::new(Bm25Index::new()),
            recent: RwLock::new(VecDeque::new()),
        };
        store.rebuild_indexes()?;
        Ok(store)
    }

    fn init_tables(db: &Database) -> Result<()> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(NODES)?;
            let _ = write_txn.open_table(EDGES)?;
            let _ = write_txn.open_multimap_table(EDGES_BY_FROM)?;
            let _ = write_txn.open_multimap_table(EDGES_BY_TO)?;
            let _ = write_txn.open_table(META)?;
            let _ = write_txn.open_table(BEHAVIOR)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn rebuild_indexes(&self) -> Result<()> {
        let read_txn = self.db.begin_read()?;
        let nodes_table = read_txn.open_table(NODES)?;

        let mut loaded: Vec<Node> = Vec::new();
        for entry in nodes_table.iter()? {
            let (_, value) = entry?;
            let node: Node = bincode::deserialize(value.value())?;
            loaded.push(node);
        }
        loaded.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut vector_index = self.vector_index.write().unwrap();
        let mut bm25_index = self.bm25_index.write().unwrap();
        let mut recent = self.recent.write().unwrap();
        for node in &loaded {
            if let Some(embedding) = &node.embedding {
                vector_index.insert(node.id, embedding.vector.clone());
            }
            bm25_index.index(node.id, &node.body);
        }
        recent.extend(loaded.iter().take(RECENT_WINDOW).map(|n| n.id));
        Ok(())
    }
}

fn node_key(id: NodeId) -> Vec<u8> {
    id.0.as_bytes().as_slice().to_vec()
}

fn edge_key(id: EdgeId) -> Vec<u8> {
    id.0.as_bytes().as_slice().to_vec()
}

fn check_schema_version(db: &Database) -> Result<()> {
    let write_txn = db.begin_write()?;
    {
        let mut meta = write_txn.open_table(META)?;
        match meta.get("schema_version")? {
            Some(guard) => {
                let bytes = guard.value();
                let version = u32::from_be_bytes(bytes.try_into().map_err(|_| {
                    MemoriaError::Validation("corrupt schema_version entry".to_string())
                })?);
                if version != CURRENT_SCHEMA_VERSION {
                    return Err(MemoriaError::Validation(format!(
                        "schema version {version} does not match current {CURRENT_SCHEMA_VERSION}"
                    )));
                }
            }
            None => {
                meta.insert("schema_version", CURRENT_SCHEMA_VERSION.to_be_bytes().as_slice())?;
            }
        }
    }
    write_txn.commit()?;
    Ok(())
}

impl StorePort for RedbStore {
    fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NODES)?;
        match table.get(node_key(id).as_slice())? {
            Some(guard) => Ok(Some(bincode::deserialize(guard.value())?)),
            None => Ok(None),
        }
    }

    fn get_neighbors(&self, node_id: NodeId) -> Result<Vec<Neighbor>> {
        let read_txn = self.db.begin_read()?;
        let by_from = read_txn.open_multimap_table(EDGES_BY_FROM)?;
        let edges_table = read_txn.open_table(EDGES)?;
        let nodes_table = read_txn.open_table(NODES)?;

        let mut neighbors = Vec::new();
        for item in by_from.get(node_key(node_id).as_slice())? {
            let edge_id_bytes = item?.value().to_vec();
            let Some(edge_guard) = edges_table.get(edge_id_bytes.as_slice())? else {
                continue;
            };
            let edge: Edge = bincode::deserialize(edge_guard.value())?;
            drop(edge_guard);
            let Some(node_guard) = nodes_table.get(node_key(edge.to).as_slice())? else {
                continue;
            };
            let node: Node = bincode::deserialize(node_guard.value())?;
            neighbors.push(Neighbor { node, edge });
        }
        Ok(neighbors)
    }

    fn vector_search(&self, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        let index = self.vector_index.read().unwrap();
        Ok(index
            .search(vector, limit)
            .into_iter()
            .map(|(node_id, score)| VectorHit { node_id, score })
            .collect())
    }

    fn bm25_search(&self, terms: &[String], limit: usize) -> Result<Vec<Bm25Hit>> {
        let index = self.bm25_index.read().unwrap();
        Ok(index
            .search(terms, limit)
            .into_iter()
            .map(|(node_id, score)| Bm25Hit { node_id, score })
            .collect())
    }

    fn get_graph_metrics(&self) -> Result<GraphMetrics> {
        let read_txn = self.db.begin_read()?;
        let nodes_table = read_txn.open_table(NODES)?;
        let edges_table = read_txn.open_table(EDGES)?;
        let total_nodes = nodes_table.len()?;
        let total_edges = edges_table.len()?;
        let avg_degree = if total_nodes > 0 {
            total_edges as f32 / total_nodes as f32
        } else {
            0.0
        };
        Ok(GraphMetrics { total_nodes, total_edges, avg_degree })
    }

    fn get_node_for_reranking(&self, id: NodeId) -> Result<Option<RerankFields>> {
        Ok(self.get_node(id)?.map(|node| RerankFields {
            id: node.id,
            last_accessed: node.last_accessed_at,
            created_at: node.created_at,
            access_count: node.access_count,
            inbound_edge_count: node.inbound_edge_count,
            subtype: node.subtype,
        }))
    }

    fn commit(&self, nodes: &[CommitNode], edges: &[CommitEdge]) -> Result<CommitOutcome> {
        let mut created_ids = Vec::with_capacity(nodes.len());
        let mut linked_edge_ids = Vec::with_capacity(edges.len());

        let write_txn = self.db.begin_write()?;
        {
            let mut nodes_table = write_txn.open_table(NODES)?;
            for commit_node in nodes {
                let bytes = bincode::serialize(&commit_node.node)?;
                nodes_table.insert(node_key(commit_node.node.id).as_slice(), bytes.as_slice())?;
                created_ids.push(commit_node.node.id);
            }
        }

        if !edges.is_empty() {
            let mut inbound_bumps: HashMap<NodeId, u64> = HashMap::new();
            for e in edges {
                *inbound_bumps.entry(e.to).or_insert(0) += 1;
            }

            {
                let mut nodes_table = write_txn.open_table(NODES)?;
                for (&target, &bump) in &inbound_bumps {
                    let key = node_key(target);
                    if let Some(existing) = nodes_table.get(key.as_slice())?.map(|g| g.value().to_vec()) {
                        let mut node: Node = bincode::deserialize(&existing)?;
                        node.inbound_edge_count += bump;
                        let bytes = bincode::serialize(&node)?;
                        nodes_table.insert(key.as_slice(), bytes.as_slice())?;
                    }
                }
            }

            let mut edges_table = write_txn.open_table(EDGES)?;
            let mut by_from = write_txn.open_multimap_table(EDGES_BY_FROM)?;
            let mut by_to = write_txn.open_multimap_table(EDGES_BY_TO)?;
            for commit_edge in edges {
                let edge = Edge::new(commit_edge.from, commit_edge.to, commit_edge.edge_type, commit_edge.weight);
                let edge_bytes = bincode::serialize(&edge)?;
                edges_table.insert(edge_key(edge.id).as_slice(), edge_bytes.as_slice())?;
                by_from.insert(node_key(edge.from).as_slice(), edge_key(edge.id).as_slice())?;
                by_to.insert(node_key(edge.to).as_slice(), edge_key(edge.id).as_slice())?;
                linked_edge_ids.push(edge.id);
            }
        }
        write_txn.commit()?;

        {
            let mut vector_index = self.vector_index.write().unwrap();
            let mut bm25_index = self.bm25_index.write().unwrap();
            let mut recent = self.recent.write().unwrap();
            for commit_node in nodes {
                if let Some(embedding) = &commit_node.node.embedding {
                    vector_index.insert(commit_node.node.id, embedding.vector.clone());
                }
                bm25_index.index(commit_node.node.id, &commit_node.node.body);
                recent.push_front(commit_node.node.id);
                if recent.len() > RECENT_WINDOW {
                    recent.pop_back();
                }
            }
        }

        Ok(CommitOutcome { created_ids, updated_ids: Vec::new(), linked_edge_ids })
    }

    fn upsert_edge(&self, edge: &Edge) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut edges_table = write_txn.open_table(EDGES)?;
            let bytes = bincode::serialize(edge)?;
            edges_table.insert(edge_key(edge.id).as_slice(), bytes.as_slice())?;

            let mut by_from = write_txn.open_multimap_table(EDGES_BY_FROM)?;
            by_from.insert(node_key(edge.from).as_slice(), edge_key(edge.id).as_slice())?;
            let mut by_to = write_txn.open_multimap_table(EDGES_BY_TO)?;
            by_to.insert(node_key(edge.to).as_slice(), edge_key(edge.id).as_slice())?;

            let mut nodes_table = write_txn.open_table(NODES)?;
            let key = node_key(edge.to);
            if let Some(existing) = nodes_table.get(key.as_slice())?.map(|g| g.value().to_vec()) {
                let mut node: Node = bincode::deserialize(&existing)?;
                node.inbound_edge_count += 1;
                let bytes = bincode::serialize(&node)?;
                nodes_table.insert(key.as_slice(), bytes.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove_edge(&self, id: EdgeId) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let key = edge_key(id);
            let existing = {
                let edges_table = write_txn.open_table(EDGES)?;
                edges_table.get(key.as_slice())?.map(|g| g.value().to_vec())
            };
            {
                let mut edges_table = write_txn.open_table(EDGES)?;
                edges_table.remove(key.as_slice())?;
            }

            if let Some(bytes) = existing {
                let edge: Edge = bincode::deserialize(&bytes)?;

                let mut by_from = write_txn.open_multimap_table(EDGES_BY_FROM)?;
                by_from.remove(node_key(edge.from).as_slice(), key.as_slice())?;
                let mut by_to = write_txn.open_multimap_table(EDGES_BY_TO)?;
                by_to.remove(node_key(edge.to).as_slice(), key.as_slice())?;

                let mut nodes_table = write_txn.open_table(NODES)?;
                let node_key_bytes = node_key(edge.to);
                if let Some(existing_node) =
                    nodes_table.get(node_key_bytes.as_slice())?.map(|g| g.value().to_vec())
                {
                    let mut node: Node = bincode::deserialize(&existing_node)?;
                    node.inbound_edge_count = node.inbound_edge_count.saturating_sub(1);
                    let bytes = bincode::serialize(&node)?;
                    nodes_table.insert(node_key_bytes.as_slice(), bytes.as_slice())?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn recent_embedded_nodes(&self, limit: usize) -> Result<Vec<Node>> {
        let ids: Vec<NodeId> = {
            let recent = self.recent.read().unwrap();
            recent.iter().take(limit).copied().collect()
        };
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.get_node(id)? {
                out.push(node);
            }
        }
        Ok(out)
    }

    fn update_embedding(&self, node_id: NodeId, embedding: crate::types::Embedding) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut nodes_table = write_txn.open_table(NODES)?;
            let key = node_key(node_id);
            let Some(existing) = nodes_table.get(key.as_slice())?.map(|g| g.value().to_vec()) else {
                return Err(MemoriaError::NodeNotFound(node_id));
            };
            let mut node: Node = bincode::deserialize(&existing)?;
            node.embedding = Some(embedding);
            let bytes = bincode::serialize(&node)?;
            nodes_table.insert(key.as_slice(), bytes.as_slice())?;
        }
        write_txn.commit()?;

        let node = self.get_node(node_id)?.expect("just written");
        let mut vector_index = self.vector_index.write().unwrap();
        let mut recent = self.recent.write().unwrap();
        if let Some(embedding) = &node.embedding {
            vector_index.insert(node_id, embedding.vector.clone());
        }
        recent.retain(|id| *id != node_id);
        recent.push_front(node_id);
        if recent.len() > RECENT_WINDOW {
            recent.pop_back();
        }
        Ok(())
    }
}

/// Per-user behavior, kept in the same `redb` database as nodes/edges so
/// a server wiring one store up gets both `StorePort` and `BehaviorPort`
/// for free.
impl BehaviorPort for RedbStore {
    fn load(&self, user_id: &str) -> Result<Option<UserBehaviorModel>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BEHAVIOR)?;
        match table.get(user_id)? {
            Some(guard) => Ok(Some(bincode::deserialize(guard.value())?)),
            None => Ok(None),
        }
    }

    fn record_prompt(&self, user_id: &str, was_shown: bool) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BEHAVIOR)?;
            let mut model = match table.get(user_id)? {
                Some(guard) => bincode::deserialize(guard.value())?,
                None => UserBehaviorModel::default(),
            };
            if was_shown {
                model.session.prompts_shown += 1;
                model.prompt_response_rate =
                    (1.0 - BEHAVIOR_EMA_ALPHA) * model.prompt_response_rate + BEHAVIOR_EMA_ALPHA;
            } else {
                model.dismissed_prompts += 1;
                model.prompt_response_rate = (1.0 - BEHAVIOR_EMA_ALPHA) * model.prompt_response_rate;
            }
            let bytes = bincode::serialize(&model)?;
            table.insert(user_id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn record_save(&self, user_id: &str, was_saved: bool) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BEHAVIOR)?;
            let mut model = match table.get(user_id)? {
                Some(guard) => bincode::deserialize(guard.value())?,
                None => UserBehaviorModel::default(),
            };
            let observation = if was_saved { 1.0 } else { 0.0 };
            model.typical_save_rate =
                (1.0 - BEHAVIOR_EMA_ALPHA) * model.typical_save_rate + BEHAVIOR_EMA_ALPHA * observation;
            let bytes = bincode::serialize(&model)?;
            table.insert(user_id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentCategory, EdgeType, NodeKind, Provenance, SourceType, StagingRecord};
    use tempfile::NamedTempFile;

    fn staged(body: &str) -> StagingRecord {
        StagingRecord {
            id: crate::ids::StagingId::new(),
            kind: NodeKind::Note,
            subtype: None,
            title: body.to_string(),
            body: body.to_string(),
            content_category: ContentCategory::General,
            provenance: Provenance {
                source_type: SourceType::Manual,
                input_id: "inp_x".to_string(),
                session_id: "s".to_string(),
                timestamp: chrono::Utc::now(),
            },
            confidence: 0.8,
            suggested_edges: Vec::new(),
            tags: Vec::new(),
        }
    }

    fn commit_node(record: StagingRecord) -> CommitNode {
        let node = Node::new(record.kind, record.subtype.clone(), record.body.clone(), record.content_category);
        CommitNode { staged: record, node }
    }

    #[test]
    fn roundtrips_a_node_through_commit_and_get() {
        let file = NamedTempFile::new().unwrap();
        let store = RedbStore::open(file.path()).unwrap();
        let node = commit_node(staged("hello world"));
        let node_id = node.node.id;
        store.commit(&[node], &[]).unwrap();
        let fetched = store.get_node(node_id).unwrap().unwrap();
        assert_eq!(fetched.body, "hello world");
    }

    #[test]
    fn get_neighbors_follows_committed_edges() {
        let file = NamedTempFile::new().unwrap();
        let store = RedbStore::open(file.path()).unwrap();
        let a = commit_node(staged("node a"));
        let b = commit_node(staged("node b"));
        let (a_id, b_id) = (a.node.id, b.node.id);
        store.commit(&[a, b], &[]).unwrap();
        store
            .commit(&[], &[CommitEdge { from: a_id, to: b_id, edge_type: EdgeType::RelatesTo, weight: 0.5 }])
            .unwrap();
        let neighbors = store.get_neighbors(a_id).unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].node.id, b_id);
    }

    #[test]
    fn commit_bumps_inbound_edge_count_on_target() {
        let file = NamedTempFile::new().unwrap();
        let store = RedbStore::open(file.path()).unwrap();
        let a = commit_node(staged("node a"));
        let b = commit_node(staged("node b"));
        let (a_id, b_id) = (a.node.id, b.node.id);
        store.commit(&[a, b], &[CommitEdge { from: a_id, to: b_id, edge_type: EdgeType::RelatesTo, weight: 0.5 }]).unwrap();
        let fetched = store.get_node(b_id).unwrap().unwrap();
        assert_eq!(fetched.inbound_edge_count, 1);
    }

    #[test]
    fn vector_search_finds_committed_embedding() {
        let file = NamedTempFile::new().unwrap();
        let store = RedbStore::open(file.path()).unwrap();
        let mut n = commit_node(staged("vector carrying node"));
        n.node.embedding = Some(crate::types::Embedding {
            vector: vec![1.0, 0.0],
            dimensions: 2,
            model: "test".to_string(),
            context_prefix: String::new(),
            context_hash: crate::cee::stable_hash(""),
            created_at: chrono::Utc::now(),
            provisional: false,
            version: 1,
        });
        let id = n.node.id;
        store.commit(&[n], &[]).unwrap();
        let hits = store.vector_search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(hits[0].node_id, id);
    }

    #[test]
    fn reopening_rebuilds_in_memory_indexes() {
        let file = NamedTempFile::new().unwrap();
        let node_id;
        {
            let store = RedbStore::open(file.path()).unwrap();
            let n = commit_node(staged("persisted across reopen"));
            node_id = n.node.id;
            store.commit(&[n], &[]).unwrap();
        }
        let store = RedbStore::open(file.path()).unwrap();
        let hits = store.bm25_search(&["persisted".to_string()], 5).unwrap();
        assert_eq!(hits[0].node_id, node_id);
    }

    #[test]
    fn behavior_load_is_none_for_unknown_user() {
        let file = NamedTempFile::new().unwrap();
        let store = RedbStore::open(file.path()).unwrap();
        assert!(store.load("nobody").unwrap().is_none());
    }

    #[test]
    fn record_prompt_shown_nudges_response_rate_up() {
        let file = NamedTempFile::new().unwrap();
        let store = RedbStore::open(file.path()).unwrap();
        store.record_prompt("u1", true).unwrap();
        let model = store.load("u1").unwrap().unwrap();
        assert_eq!(model.session.prompts_shown, 1);
        assert!(model.prompt_response_rate > 0.5);
    }

    #[test]
    fn record_save_false_pulls_save_rate_toward_zero() {
        let file = NamedTempFile::new().unwrap();
        let store = RedbStore::open(file.path()).unwrap();
        store.record_save("u1", false).unwrap();
        let model = store.load("u1").unwrap().unwrap();
        assert!(model.typical_save_rate < 0.5);
    }
}
