//! SSA Filters (Filters): compile a filter request into a pair
//! of pure node/edge predicates. Grounded on the reference crate's
//! `storage::filters::NodeFilter` fluent builder, generalized so the
//! compiled result is a closure pair consumed by seeding and spreading
//! rather than a storage-side query struct.

use crate::error::{MemoriaError, Result};
use crate::ids::NodeId;
use crate::ports::RerankFields;
use crate::types::{EdgeType, Node, NodeKind};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct DateRange {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterRequest {
    pub date_range: Option<DateRange>,
    pub last_accessed_within_days: Option<u32>,
    pub types: Vec<NodeKind>,
    pub exclude_types: Vec<NodeKind>,
    pub clusters: Vec<String>,
    pub tags: Vec<String>,
    pub tags_any: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub relationships: Vec<EdgeType>,
    pub connected_to: Option<crate::ids::NodeId>,
    pub within_hops: Option<u8>,
}

/// A compiled, pure filter ready to evaluate ("evaluation is
/// pure"). `connected_to`/`within_hops` name a graph-reachability
/// constraint, not a node's own fields, so they can't be evaluated by
/// `compile` alone — the caller resolves `connected_to` into a concrete
/// reachable-node set via a store-backed BFS (`spread::reachable_within`)
/// and attaches it with `with_reachable` before seeding or spreading;
/// `within_hops` bounds the BFS and, via `effective_max_hops`, the
/// spreading activation hop ceiling itself.
pub struct CompiledFilter {
    request: FilterRequest,
    reachable: Option<HashSet<NodeId>>,
}

impl CompiledFilter {
    /// Parse and validate a filter request before any retrieval I/O,
    /// rejecting with a structured `FilterInvalid` error.
    pub fn compile(request: FilterRequest) -> Result<Self> {
        if let Some(range) = &request.date_range {
            if let (Some(after), Some(before)) = (range.after, range.before) {
                if after > before {
                    return Err(MemoriaError::FilterInvalid(
                        "date_range.after must be <= date_range.before".to_string(),
                    ));
                }
            }
        }
        if let Some(days) = request.last_accessed_within_days {
            if days == 0 {
                return Err(MemoriaError::FilterInvalid(
                    "last_accessed.within_days must be > 0".to_string(),
                ));
            }
        }
        if let Some(hops) = request.within_hops {
            if !(1..=10).contains(&hops) {
                return Err(MemoriaError::FilterInvalid(
                    "within_hops must be in [1, 10]".to_string(),
                ));
            }
        }
        Ok(Self { request, reachable: None })
    }

    /// Attach the concrete set of nodes reachable from `connected_to`
    /// (computed by `spread::reachable_within`). Once attached,
    /// `matches_node` rejects anything outside it.
    pub fn with_reachable(mut self, reachable: HashSet<NodeId>) -> Self {
        self.reachable = Some(reachable);
        self
    }

    pub fn relationships(&self) -> &[EdgeType] {
        &self.request.relationships
    }

    pub fn connected_to(&self) -> Option<crate::ids::NodeId> {
        self.request.connected_to
    }

    pub fn within_hops(&self) -> Option<u8> {
        self.request.within_hops
    }

    /// `within_hops`, clamped to the spreading config's own `max_hops`
    /// ceiling — a filter can only narrow the default hop budget, not
    /// widen it.
    pub fn effective_max_hops(&self, default_max_hops: u8) -> u8 {
        self.request.within_hops.map(|h| h.min(default_max_hops)).unwrap_or(default_max_hops)
    }

    /// Evaluate the node predicate.
    pub fn matches_node(&self, node: &Node, now: DateTime<Utc>) -> bool {
        let r = &self.request;

        if let Some(reachable) = &self.reachable {
            if !reachable.contains(&node.id) {
                return false;
            }
        }

        if let Some(range) = &r.date_range {
            if let Some(after) = range.after {
                if node.created_at < after {
                    return false;
                }
            }
            if let Some(before) = range.before {
                if node.created_at > before {
                    return false;
                }
            }
        }

        if let Some(days) = r.last_accessed_within_days {
            let cutoff = now - chrono::Duration::days(days as i64);
            if node.last_accessed_at < cutoff {
                return false;
            }
        }

        if !r.types.is_empty() && !r.types.contains(&node.kind) {
            return false;
        }
        if r.exclude_types.contains(&node.kind) {
            return false;
        }

        if !r.clusters.is_empty() {
            match &node.cluster {
                Some(cluster) if r.clusters.contains(cluster) => {}
                _ => return false,
            }
        }

        if !r.tags.is_empty() && !r.tags.iter().all(|t| node.tags.contains(t)) {
            return false;
        }
        if !r.tags_any.is_empty() && !r.tags_any.iter().any(|t| node.tags.contains(t)) {
            return false;
        }
        if r.exclude_tags.iter().any(|t| node.tags.contains(t)) {
            return false;
        }

        true
    }

    pub fn matches_rerank_fields(&self, fields: &RerankFields, now: DateTime<Utc>) -> bool {
        if let Some(days) = self.request.last_accessed_within_days {
            let cutoff = now - chrono::Duration::days(days as i64);
            if fields.last_accessed < cutoff {
                return false;
            }
        }
        true
    }

    /// Evaluate the edge predicate: an edge is traversable if
    /// `relationships` is empty (no whitelist) or the edge's type is in
    /// the whitelist.
    pub fn matches_edge_type(&self, edge_type: EdgeType) -> bool {
        self.request.relationships.is_empty() || self.request.relationships.contains(&edge_type)
    }
}
