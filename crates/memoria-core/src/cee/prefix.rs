//! Deterministic context-prefix generation. Grounded on the
//! reference crate's `vector/embedding.rs::embedding_input` free-function
//! style (a single deterministic string-builder), generalized from one
//! fixed template to a per-`(nodeType, sourceType)` table.

use crate::types::{NodeKind, SourceType};
use chrono::{DateTime, Utc};

/// A source episode a chunk/section/concept may be attributed to.
#[derive(Debug, Clone, Default)]
pub struct SourceEpisode {
    pub title: String,
    pub subtype: Option<String>,
}

/// Cluster membership info used by prefix generation and minimum-context
/// expansion.
#[derive(Debug, Clone, Default)]
pub struct ClusterInfo {
    pub name: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

/// Everything `generate_context_prefix` needs about one node.
#[derive(Debug, Clone, Default)]
pub struct PrefixInput {
    pub node_type: Option<NodeKind>,
    pub is_query: bool,
    pub node_subtype: Option<String>,
    pub title: String,
    pub content: String,
    pub source_type: Option<SourceType>,
    pub source_episode: Option<SourceEpisode>,
    pub cluster_info: Option<ClusterInfo>,
    pub chunk_index: Option<usize>,
    pub chunk_total: Option<usize>,
    pub parent_title: Option<String>,
    pub section_title: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    pub event_duration_min: Option<u32>,
    pub participants: Vec<String>,
    pub content_type: Option<String>,
}

fn strip_empty_parens(s: &str) -> String {
    // Remove "()" left behind by an empty interpolated segment.
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '(' && chars.peek() == Some(&')') {
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

fn collapse_ws(s: &str) -> String {
    crate::gate::normalize_whitespace(s)
}

fn fmt_date(d: DateTime<Utc>) -> String {
    d.format("%b %-d %Y").to_string()
}

/// Build the deterministic preamble for one node.
pub fn generate_context_prefix(input: &PrefixInput) -> String {
    if input.is_query {
        let base = format!("[Query] {}", input.content);
        return finalize(&base, input);
    }

    let node_type = match input.node_type {
        Some(t) => t,
        None => return finalize(&input.content, input),
    };

    let subtype_tag = input
        .node_subtype
        .as_deref()
        .map(|s| format!("[{s}]"))
        .unwrap_or_default();

    let base = match (node_type, input.source_type) {
        (NodeKind::Concept, Some(SourceType::Extraction)) => {
            let source = input
                .source_episode
                .as_ref()
                .map(|e| e.title.clone())
                .unwrap_or_default();
            let source_type = input
                .source_episode
                .as_ref()
                .and_then(|e| e.subtype.clone())
                .unwrap_or_default();
            let cluster = input.cluster_info.as_ref().and_then(|c| c.name.clone()).unwrap_or_default();
            format!("{subtype_tag} From {source} ({source_type}). {cluster}.")
        }
        (NodeKind::Concept, _) => {
            let cluster = input.cluster_info.as_ref().and_then(|c| c.name.clone()).unwrap_or_default();
            format!("{subtype_tag} Created by user. {cluster}.")
        }
        (NodeKind::Episode, _) => {
            let date = input.event_date.map(fmt_date).unwrap_or_default();
            let duration = input.event_duration_min.map(|m| m.to_string()).unwrap_or_default();
            let participants = input.participants.join(", ");
            format!("{subtype_tag} {date}, {duration}min. {participants}.")
        }
        (NodeKind::Chunk, _) => {
            let i = input.chunk_index.map(|i| i.to_string()).unwrap_or_default();
            let n = input.chunk_total.map(|n| n.to_string()).unwrap_or_default();
            let parent = input.parent_title.clone().unwrap_or_default();
            let section = input.section_title.clone().unwrap_or_default();
            format!("[Chunk {i}/{n}] {parent}. Section: {section}.")
        }
        (NodeKind::Section, _) => {
            let parent = input.parent_title.clone().unwrap_or_default();
            format!("[Section] {parent}. {}.", input.title)
        }
        (NodeKind::Note, _) => {
            let cluster = input.cluster_info.as_ref().and_then(|c| c.name.clone()).unwrap_or_default();
            format!("[note] {cluster}. {}.", input.title)
        }
        (NodeKind::Raw, _) | (NodeKind::Document, _) => {
            let content_type = input.content_type.clone().unwrap_or_default();
            format!("[archive: {content_type}] {}.", input.title)
        }
    };

    finalize(&base, input)
}

fn finalize(base: &str, input: &PrefixInput) -> String {
    let mut prefix = collapse_ws(&strip_empty_parens(base));

    // Minimum-context expansion.
    if input.content.chars().count() < 10 {
        if let Some(desc) = input.cluster_info.as_ref().and_then(|c| c.description.clone()) {
            prefix = format!("{prefix} Topic: {desc}.");
        }
    }
    if prefix.chars().count() < 50 {
        if let Some(cluster) = &input.cluster_info {
            if !cluster.keywords.is_empty() {
                let kws: Vec<&String> = cluster.keywords.iter().take(5).collect();
                let kw_list = kws.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ");
                prefix = format!("{prefix} Keywords: {kw_list}.");
            }
        }
    }

    collapse_ws(&prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_extraction_prefix_includes_source_episode() {
        let input = PrefixInput {
            node_type: Some(NodeKind::Concept),
            node_subtype: Some("fact".to_string()),
            title: "Fourier".to_string(),
            content: "Fourier transform basics".to_string(),
            source_type: Some(SourceType::Extraction),
            source_episode: Some(SourceEpisode {
                title: "Signals Lecture Week 3".to_string(),
                subtype: Some("lecture".to_string()),
            }),
            cluster_info: Some(ClusterInfo {
                name: Some("Engineering".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let prefix = generate_context_prefix(&input);
        assert!(
            prefix.starts_with("[fact] From Signals Lecture Week 3 (lecture). Engineering."),
            "got: {prefix}"
        );
    }

    #[test]
    fn empty_cluster_strips_parens() {
        let input = PrefixInput {
            node_type: Some(NodeKind::Concept),
            content: "something long enough to skip expansion rules here".to_string(),
            source_type: Some(SourceType::Manual),
            ..Default::default()
        };
        let prefix = generate_context_prefix(&input);
        assert!(!prefix.contains("()"));
    }

    #[test]
    fn short_content_gets_topic_expansion() {
        let input = PrefixInput {
            node_type: Some(NodeKind::Note),
            title: "x".to_string(),
            content: "hi".to_string(),
            cluster_info: Some(ClusterInfo {
                name: Some("misc".to_string()),
                description: Some("assorted short notes".to_string()),
                keywords: vec![],
            }),
            ..Default::default()
        };
        let prefix = generate_context_prefix(&input);
        assert!(prefix.contains("Topic: assorted short notes"));
    }
}
