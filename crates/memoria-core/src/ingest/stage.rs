//! Stage 5 STAGE : filter invalid staged nodes, then collapse
//! near-duplicates within the same batch by pairwise Jaccard similarity.

use crate::types::StagingRecord;
use std::collections::HashSet;

pub const JACCARD_DEDUP_THRESHOLD: f32 = 0.90;

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_string())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Filter invalid records (empty title/body, body < 3 chars) then drop
/// later duplicates whose lowercased token set overlaps an earlier one
/// at or above `threshold` (Stage 5).
pub fn stage(records: Vec<StagingRecord>, threshold: f32) -> Vec<StagingRecord> {
    let input_len = records.len();
    let valid: Vec<StagingRecord> = records.into_iter().filter(|r| r.is_valid()).collect();

    let mut kept: Vec<StagingRecord> = Vec::new();
    let mut kept_tokens: Vec<HashSet<String>> = Vec::new();

    for record in valid {
        let tokens = tokenize(&record.body);
        let is_duplicate = kept_tokens.iter().any(|prev| jaccard(prev, &tokens) >= threshold);
        if !is_duplicate {
            kept_tokens.push(tokens);
            kept.push(record);
        }
    }

    log::debug!("stage: {} of {} records kept after validation and dedup", kept.len(), input_len);
    kept
}
