//! Concrete full-text index ("the concrete full-text index" —
//! an external collaborator). Standard Okapi BM25 over the same
//! tokenizer CEE uses for query term extraction, so seeding's BM25 terms
//! and this index's vocabulary always agree.

use crate::cee::bm25_tokenize;
use crate::ids::NodeId;
use std::collections::HashMap;

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    term_frequencies: HashMap<NodeId, HashMap<String, u32>>,
    doc_lengths: HashMap<NodeId, u32>,
    document_frequency: HashMap<String, u32>,
    total_length: u64,
}

impl Bm25Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(&mut self, id: NodeId, text: &str) {
        self.remove(id);

        let tokens = bm25_tokenize(text);
        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for token in &tokens {
            *term_counts.entry(token.clone()).or_insert(0) += 1;
        }
        for term in term_counts.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        self.doc_lengths.insert(id, tokens.len() as u32);
        self.total_length += tokens.len() as u64;
        self.term_frequencies.insert(id, term_counts);
    }

    pub fn remove(&mut self, id: NodeId) {
        if let Some(terms) = self.term_frequencies.remove(&id) {
            for term in terms.keys() {
                if let Some(df) = self.document_frequency.get_mut(term) {
                    *df = df.saturating_sub(1);
                }
            }
        }
        if let Some(len) = self.doc_lengths.remove(&id) {
            self.total_length = self.total_length.saturating_sub(len as u64);
        }
    }

    fn avg_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_length as f32 / self.doc_lengths.len() as f32
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.doc_lengths.len() as f32;
        let df = *self.document_frequency.get(term).unwrap_or(&0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Unnormalized BM25 scores, descending, top `limit`.
    pub fn search(&self, terms: &[String], limit: usize) -> Vec<(NodeId, f32)> {
        let avg_len = self.avg_doc_length();
        let mut scored: Vec<(NodeId, f32)> = self
            .term_frequencies
            .iter()
            .filter_map(|(&id, term_counts)| {
                let doc_len = *self.doc_lengths.get(&id).unwrap_or(&0) as f32;
                let mut score = 0.0f32;
                for term in terms {
                    let Some(&freq) = term_counts.get(term) else { continue };
                    let freq = freq as f32;
                    let idf = self.idf(term);
                    let denom = freq + K1 * (1.0 - B + B * doc_len / avg_len.max(1.0));
                    score += idf * (freq * (K1 + 1.0)) / denom;
                }
                if score > 0.0 {
                    Some((id, score))
                } else {
                    None
                }
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        scored.truncate(limit);
        scored
    }
}
