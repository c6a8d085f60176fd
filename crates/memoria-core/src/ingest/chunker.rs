//! Stage 4b Chunking : structural + size chunking with overlap,
//! invoked by handlers staging document-scale content.

use crate::ids::ChunkId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitMethod {
    Structural,
    SizeLimit,
    Whole,
}

#[derive(Debug, Clone)]
pub struct ChunkOptions {
    pub target_min: usize,
    pub target_max: usize,
    pub soft_max: usize,
    pub hard_max: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            target_min: 500,
            target_max: 2000,
            soft_max: 3000,
            hard_max: 5000,
            overlap_percent: 0.10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: ChunkId,
    pub sequence: f64,
    pub content: String,
    pub heading: Option<String>,
    pub heading_level: Option<u8>,
    pub split_method: SplitMethod,
    pub overlap_start: String,
}

struct Boundary {
    position: usize,
    heading: String,
    level: u8,
}

fn find_heading_boundaries(text: &str) -> Vec<Boundary> {
    let mut boundaries = Vec::new();
    let mut pos = 0usize;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
        let hashes = trimmed.chars().take_while(|&c| c == '#').count();
        if hashes >= 1 && hashes <= 6 {
            let rest = &trimmed[hashes..];
            if rest.starts_with(' ') && !rest.trim().is_empty() {
                boundaries.push(Boundary {
                    position: pos,
                    heading: rest.trim().to_string(),
                    level: hashes as u8,
                });
            }
        }
        pos += line.len();
    }
    boundaries
}

fn find_paragraph_boundaries(text: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'\n' && bytes[i + 1] == b'\n' {
            positions.push(i + 2);
        }
        i += 1;
    }
    positions
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        if c == '.' || c == '!' || c == '?' {
            while let Some(&next) = chars.peek() {
                if next == '.' || next == '!' || next == '?' {
                    current.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

fn split_oversized(content: &str, hard_max: usize) -> (Vec<String>, SplitMethod) {
    if content.chars().count() <= hard_max {
        return (vec![content.to_string()], SplitMethod::Whole);
    }
    let sentences = split_sentences(content);
    if sentences.iter().all(|s| s.chars().count() <= hard_max) && sentences.len() > 1 {
        let mut parts = Vec::new();
        let mut buf = String::new();
        for sentence in sentences {
            if !buf.is_empty() && buf.chars().count() + sentence.chars().count() > hard_max {
                parts.push(std::mem::take(&mut buf));
            }
            buf.push_str(&sentence);
        }
        if !buf.is_empty() {
            parts.push(buf);
        }
        (parts, SplitMethod::SizeLimit)
    } else {
        let chars: Vec<char> = content.chars().collect();
        let parts = chars
            .chunks(hard_max)
            .map(|c| c.iter().collect::<String>())
            .collect();
        (parts, SplitMethod::SizeLimit)
    }
}

fn overlap_suffix(prev: &str, overlap_percent: f32) -> String {
    let count = prev.chars().count();
    let take = ((count as f32) * overlap_percent).round() as usize;
    if take == 0 {
        return String::new();
    }
    let start = count.saturating_sub(take);
    prev.chars().skip(start).collect()
}

/// Chunk raw text per the structural + size rules (Stage 4b).
pub fn chunk(text: &str, options: &ChunkOptions) -> Vec<DocumentChunk> {
    let mut heading_boundaries = find_heading_boundaries(text);
    heading_boundaries.sort_by_key(|b| b.position);
    let mut boundary_positions: Vec<usize> =
        heading_boundaries.iter().map(|b| b.position).collect();
    boundary_positions.extend(find_paragraph_boundaries(text));
    boundary_positions.sort_unstable();
    boundary_positions.dedup();

    struct RawChunk {
        content: String,
        heading: Option<String>,
        level: Option<u8>,
    }

    let mut raw_chunks: Vec<RawChunk> = Vec::new();

    if boundary_positions.is_empty() {
        raw_chunks.push(RawChunk {
            content: text.to_string(),
            heading: None,
            level: None,
        });
    } else {
        let mut current_heading: Option<String> = None;
        let mut current_level: Option<u8> = None;
        let mut span_start = 0usize;
        let mut accumulated = String::new();

        let heading_at = |pos: usize| -> Option<&Boundary> {
            heading_boundaries.iter().find(|b| b.position == pos)
        };

        for &pos in &boundary_positions {
            if pos <= span_start {
                if let Some(h) = heading_at(pos) {
                    current_heading = Some(h.heading.clone());
                    current_level = Some(h.level);
                }
                continue;
            }
            let span = &text[span_start..pos];
            accumulated.push_str(span);
            if accumulated.chars().count() >= options.target_min {
                raw_chunks.push(RawChunk {
                    content: std::mem::take(&mut accumulated),
                    heading: current_heading.clone(),
                    level: current_level,
                });
            }
            span_start = pos;
            if let Some(h) = heading_at(pos) {
                current_heading = Some(h.heading.clone());
                current_level = Some(h.level);
            }
        }
        let tail = &text[span_start..];
        accumulated.push_str(tail);
        if !accumulated.trim().is_empty() {
            raw_chunks.push(RawChunk {
                content: accumulated,
                heading: current_heading,
                level: current_level,
            });
        }
        if raw_chunks.is_empty() {
            raw_chunks.push(RawChunk {
                content: text.to_string(),
                heading: None,
                level: None,
            });
        }
    }

    let used_structural = !heading_boundaries.is_empty() || boundary_positions.len() > 0;

    let mut final_chunks: Vec<DocumentChunk> = Vec::new();
    let mut sequence = 0f64;

    for raw in raw_chunks {
        let (pieces, split_method) = split_oversized(&raw.content, options.hard_max);
        let multi = pieces.len() > 1;
        for (i, piece) in pieces.into_iter().enumerate() {
            let overlap_start = final_chunks
                .last()
                .map(|prev: &DocumentChunk| overlap_suffix(&prev.content, options.overlap_percent))
                .unwrap_or_default();
            let method = if multi {
                split_method
            } else if used_structural {
                SplitMethod::Structural
            } else {
                SplitMethod::Whole
            };
            final_chunks.push(DocumentChunk {
                id: ChunkId::new(),
                sequence,
                content: piece,
                heading: if i == 0 { raw.heading.clone() } else { None },
                heading_level: if i == 0 { raw.level } else { None },
                split_method: method,
                overlap_start,
            });
            sequence += if multi { 0.1 } else { 1.0 };
        }
        sequence = sequence.ceil();
    }

    final_chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_headings_produce_two_chunks_in_order() {
        let text = "# A\n\nAlpha body.\n\n# B\n\nBeta body.";
        let chunks = chunk(text, &ChunkOptions { target_min: 1, ..ChunkOptions::default() });
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].heading.as_deref(), Some("A"));
        assert_eq!(chunks[0].heading_level, Some(1));
        assert_eq!(chunks[1].heading.as_deref(), Some("B"));
        assert!(chunks[0].sequence < chunks[1].sequence);
    }

    #[test]
    fn no_boundaries_yields_single_chunk() {
        let text = "just plain text with no structure at all";
        let chunks = chunk(text, &ChunkOptions::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].split_method, SplitMethod::Whole);
    }

    #[test]
    fn oversized_chunk_splits_at_sentence_boundaries() {
        let sentence = "This is a sentence. ";
        let text = sentence.repeat(400);
        let chunks = chunk(&text, &ChunkOptions::default());
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= 5000));
    }

    #[test]
    fn later_chunk_has_nonempty_overlap_start() {
        let text = "# A\n\n".to_string() + &"word ".repeat(200) + "\n\n# B\n\n" + &"other ".repeat(200);
        let chunks = chunk(&text, &ChunkOptions { target_min: 10, ..ChunkOptions::default() });
        assert!(chunks.len() >= 2);
        assert!(!chunks[1].overlap_start.is_empty());
    }
}
