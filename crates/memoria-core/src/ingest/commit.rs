//! Stage 6 COMMIT : assign stable ids, persist through the
//! store port, and report a thought path of what happened.

use crate::error::Result;
use crate::ids::NodeId;
use crate::ports::{CommitEdge, CommitNode, CommitOutcome, StorePort};
use crate::types::{Edge, Node, StagingRecord};
use std::collections::HashMap;
use std::time::Instant;

/// One step of the trace returned alongside a commit (Stage 6
/// "populate thoughtPath with accessed/created/updated ids and confidence
/// scores").
#[derive(Debug, Clone)]
pub struct ThoughtStep {
    pub node_id: NodeId,
    pub kind: ThoughtKind,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThoughtKind {
    Created,
    Updated,
    Accessed,
}

#[derive(Debug, Clone)]
pub struct CommitResult {
    pub outcome: CommitOutcome,
    pub thought_path: Vec<ThoughtStep>,
    pub duration_ms: u64,
}

/// Turn validated staged records into `Node`s and hand them, along with
/// any suggested-edge writes, to the store port in a single all-or-nothing
/// call (Stage 6). A `StoreError` during commit is fatal, not retried.
pub fn commit(store: &dyn StorePort, staged: Vec<StagingRecord>) -> Result<CommitResult> {
    let started = Instant::now();

    let mut staging_to_node: HashMap<crate::ids::StagingId, NodeId> = HashMap::new();
    let mut commit_nodes: Vec<CommitNode> = Vec::with_capacity(staged.len());

    for record in &staged {
        let mut node = Node::new(
            record.kind,
            record.subtype.clone(),
            record.body.clone(),
            record.content_category,
        );
        node.title = record.title.clone();
        node.tags = record.tags.clone();
        staging_to_node.insert(record.id, node.id);
        commit_nodes.push(CommitNode {
            staged: record.clone(),
            node,
        });
    }

    let mut commit_edges: Vec<CommitEdge> = Vec::new();
    for record in &staged {
        let Some(&from) = staging_to_node.get(&record.id) else {
            continue;
        };
        for suggestion in &record.suggested_edges {
            commit_edges.push(CommitEdge {
                from,
                to: suggestion.to,
                edge_type: suggestion.edge_type,
                weight: suggestion.weight,
            });
        }
    }

    let confidences: HashMap<NodeId, f32> = commit_nodes
        .iter()
        .map(|c| (c.node.id, c.staged.confidence))
        .collect();

    let outcome = store.commit(&commit_nodes, &commit_edges)?;
    log::info!(
        "commit: {} created, {} updated, {} edges linked",
        outcome.created_ids.len(),
        outcome.updated_ids.len(),
        outcome.linked_edge_ids.len()
    );

    let mut thought_path = Vec::new();
    for &id in &outcome.created_ids {
        thought_path.push(ThoughtStep {
            node_id: id,
            kind: ThoughtKind::Created,
            confidence: confidences.get(&id).copied().unwrap_or(1.0),
        });
    }
    for &id in &outcome.updated_ids {
        thought_path.push(ThoughtStep {
            node_id: id,
            kind: ThoughtKind::Updated,
            confidence: confidences.get(&id).copied().unwrap_or(1.0),
        });
    }

    Ok(CommitResult {
        outcome,
        thought_path,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

/// Record a read as an "accessed" thought-path step, used by the query
/// path rather than ingestion (Stage 6 mentions "accessed" ids
/// alongside created/updated).
pub fn accessed_step(node: &Node, confidence: f32) -> ThoughtStep {
    ThoughtStep {
        node_id: node.id,
        kind: ThoughtKind::Accessed,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Bm25Hit, GraphMetrics, Neighbor, RerankFields, VectorHit};
    use crate::types::{ContentCategory, NodeKind, Provenance, SourceType};
    use std::sync::Mutex;

    struct FakeStore {
        committed: Mutex<Vec<(Vec<CommitNode>, Vec<CommitEdge>)>>,
    }

    impl StorePort for FakeStore {
        fn get_node(&self, _id: NodeId) -> Result<Option<Node>> {
            Ok(None)
        }
        fn get_neighbors(&self, _node_id: NodeId) -> Result<Vec<Neighbor>> {
            Ok(Vec::new())
        }
        fn vector_search(&self, _vector: &[f32], _limit: usize) -> Result<Vec<VectorHit>> {
            Ok(Vec::new())
        }
        fn bm25_search(&self, _terms: &[String], _limit: usize) -> Result<Vec<Bm25Hit>> {
            Ok(Vec::new())
        }
        fn get_graph_metrics(&self) -> Result<GraphMetrics> {
            Ok(GraphMetrics::default())
        }
        fn get_node_for_reranking(&self, _id: NodeId) -> Result<Option<RerankFields>> {
            Ok(None)
        }
        fn commit(&self, nodes: &[CommitNode], edges: &[CommitEdge]) -> Result<CommitOutcome> {
            let created_ids = nodes.iter().map(|n| n.node.id).collect();
            self.committed.lock().unwrap().push((nodes.to_vec(), edges.to_vec()));
            Ok(CommitOutcome {
                created_ids,
                updated_ids: Vec::new(),
                linked_edge_ids: Vec::new(),
            })
        }
        fn upsert_edge(&self, _edge: &Edge) -> Result<()> {
            Ok(())
        }
        fn remove_edge(&self, _id: crate::ids::EdgeId) -> Result<()> {
            Ok(())
        }
        fn recent_embedded_nodes(&self, _limit: usize) -> Result<Vec<Node>> {
            Ok(Vec::new())
        }
        fn update_embedding(&self, _node_id: NodeId, _embedding: crate::types::Embedding) -> Result<()> {
            Ok(())
        }
    }

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

    #[test]
    fn commit_creates_one_thought_step_per_created_node() {
        let store = FakeStore { committed: Mutex::new(Vec::new()) };
        let result = commit(&store, vec![staged("first note"), staged("second note")]).unwrap();
        assert_eq!(result.outcome.created_ids.len(), 2);
        assert_eq!(result.thought_path.len(), 2);
        assert!(result.thought_path.iter().all(|s| s.kind == ThoughtKind::Created));
    }

    #[test]
    fn empty_batch_commits_nothing() {
        let store = FakeStore { committed: Mutex::new(Vec::new()) };
        let result = commit(&store, Vec::new()).unwrap();
        assert!(result.outcome.created_ids.is_empty());
        assert!(result.thought_path.is_empty());
    }
}
