use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use memoria_core::{
    CommitEdge, CommitNode, ContentCategory, EdgeType, NodeKind, Provenance, RedbStore, SourceType,
    StagingId, StagingRecord, StorePort,
};
use std::sync::Arc;
use tempfile::TempDir;

fn staged(body: &str) -> StagingRecord {
    StagingRecord {
        id: StagingId::new(),
        kind: NodeKind::Concept,
        subtype: None,
        title: body.chars().take(100).collect(),
        body: body.to_string(),
        content_category: ContentCategory::General,
        provenance: Provenance {
            source_type: SourceType::Extraction,
            input_id: "inp_bench".to_string(),
            session_id: "sess_bench".to_string(),
            timestamp: chrono::Utc::now(),
        },
        confidence: 0.9,
        suggested_edges: Vec::new(),
        tags: Vec::new(),
    }
}

fn commit_node(body: &str) -> CommitNode {
    let staged = staged(body);
    let node = memoria_core::Node::new(
        staged.kind,
        staged.subtype.clone(),
        staged.body.clone(),
        staged.content_category,
    );
    CommitNode { staged, node }
}

fn bench_single_node_commit(c: &mut Criterion) {
    c.bench_function("single node commit", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let store = RedbStore::open(dir.path().join("bench.redb")).unwrap();
                (store, dir)
            },
            |(store, _dir)| {
                let node = commit_node("Benchmark fact for a single commit round trip.");
                store.commit(&[node], &[]).unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_node_lookup_by_id(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = RedbStore::open(dir.path().join("bench.redb")).unwrap();

    let target = commit_node("Lookup target node body text.");
    let target_id = target.node.id;
    store.commit(&[target], &[]).unwrap();

    let others: Vec<CommitNode> = (0..1000)
        .map(|i| commit_node(&format!("Filler node body number {i}")))
        .collect();
    store.commit(&others, &[]).unwrap();

    c.bench_function("node lookup by id (1k nodes)", |b| {
        b.iter(|| {
            store.get_node(target_id).unwrap();
        });
    });
}

fn bench_batch_commit_1k(c: &mut Criterion) {
    c.bench_function("batch commit 1000 nodes", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let store = RedbStore::open(dir.path().join("bench.redb")).unwrap();
                let nodes: Vec<CommitNode> = (0..1000)
                    .map(|i| commit_node(&format!("Batch node body number {i}")))
                    .collect();
                (store, nodes, dir)
            },
            |(store, nodes, _dir)| {
                store.commit(&nodes, &[]).unwrap();
            },
            BatchSize::LargeInput,
        );
    });
}

fn bench_get_neighbors(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = RedbStore::open(dir.path().join("bench.redb")).unwrap();

    let center = commit_node("Center node with many neighbors.");
    let center_id = center.node.id;
    store.commit(&[center], &[]).unwrap();

    let leaves: Vec<CommitNode> = (0..200)
        .map(|i| commit_node(&format!("Neighbor leaf node {i}")))
        .collect();
    let edges: Vec<CommitEdge> = leaves
        .iter()
        .map(|leaf| CommitEdge {
            from: center_id,
            to: leaf.node.id,
            edge_type: EdgeType::RelatesTo,
            weight: 0.5,
        })
        .collect();
    store.commit(&leaves, &edges).unwrap();

    c.bench_function("get neighbors (200 edges)", |b| {
        b.iter(|| {
            store.get_neighbors(center_id).unwrap();
        });
    });
}

fn bench_vector_search(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RedbStore::open(dir.path().join("bench.redb")).unwrap());

    let nodes: Vec<CommitNode> = (0..500)
        .map(|i| {
            let mut n = commit_node(&format!("Vector candidate node {i}"));
            let mut vector = vec![0.0f32; 512];
            vector[i % 512] = 1.0;
            n.node.embedding = Some(memoria_core::Embedding {
                vector,
                dimensions: 512,
                model: "bench-model".to_string(),
                context_prefix: String::new(),
                context_hash: memoria_core::cee::hash::stable_hash(""),
                created_at: chrono::Utc::now(),
                provisional: false,
                version: 1,
            });
            n
        })
        .collect();
    store.commit(&nodes, &[]).unwrap();

    let mut query = vec![0.0f32; 512];
    query[0] = 1.0;

    c.bench_function("vector search top 15 of 500", |b| {
        b.iter(|| {
            store.vector_search(&query, 15).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_single_node_commit,
    bench_node_lookup_by_id,
    bench_batch_commit_1k,
    bench_get_neighbors,
    bench_vector_search,
);
criterion_main!(benches);
