//! Query analysis and BM25 tokenization. Tokenization
//! grounded on the reference pack's weighted-retrieval `tokenize()`
//! (split on non-alphanumeric, lowercase, drop stopwords), adapted to the
//! exact whitespace/punctuation split and length-1 drop rule used
//! elsewhere in this crate. Time-reference detection is new hand-rolled
//! matching, same no-`regex` precedent as the gate and classifier.

const GENERIC_WORDS: &[&str] = &[
    "what", "who", "whom", "whose", "which", "the", "a", "an", "is", "are", "was", "were", "do",
    "does", "did", "tell", "me", "about", "show", "find", "i", "my",
];

const TIME_UNITS: &[&str] = &["day", "days", "week", "weeks", "month", "months", "year", "years"];
const WEEKDAYS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];
const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep",
    "oct", "nov", "dec",
];

#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    pub has_time_reference: bool,
    pub has_semantic_content: bool,
    pub expected_types: Vec<String>,
    pub semantic_part: String,
    pub original_query: String,
}

impl QueryAnalysis {
    pub fn should_skip_embedding(&self) -> bool {
        self.has_time_reference && !self.has_semantic_content
    }
}

fn is_year(tok: &str) -> bool {
    tok.len() == 4 && tok.chars().all(|c| c.is_ascii_digit())
}

fn is_date_numeric(tok: &str) -> bool {
    let parts: Vec<&str> = tok.split(['/', '-']).collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn detect_time_reference(lower: &str) -> bool {
    const ABSOLUTE: &[&str] = &["yesterday", "today", "tomorrow"];
    if ABSOLUTE.iter().any(|w| lower.contains(w)) {
        return true;
    }

    let tokens: Vec<&str> = lower.split_whitespace().collect();
    for (i, tok) in tokens.iter().enumerate() {
        let tok = tok.trim_matches(|c: char| !c.is_alphanumeric());
        if matches!(tok, "last" | "this" | "next") {
            if let Some(next) = tokens.get(i + 1) {
                let next = next.trim_matches(|c: char| !c.is_alphanumeric());
                if TIME_UNITS.contains(&next) || WEEKDAYS.contains(&next) {
                    return true;
                }
            }
        }
        if tok == "ago" && i > 0 {
            return true; // "N units ago"
        }
        if is_year(tok) || is_date_numeric(tok) {
            return true;
        }
        if MONTHS.contains(&tok) {
            return true;
        }
    }
    false
}

fn strip_time_references(lower: &str) -> String {
    const ABSOLUTE: &[&str] = &["yesterday", "today", "tomorrow"];
    let mut tokens: Vec<String> = lower.split_whitespace().map(|s| s.to_string()).collect();
    tokens.retain(|t| {
        let clean = t.trim_matches(|c: char| !c.is_alphanumeric());
        !(ABSOLUTE.contains(&clean)
            || TIME_UNITS.contains(&clean)
            || WEEKDAYS.contains(&clean)
            || MONTHS.contains(&clean)
            || clean == "ago"
            || clean == "last"
            || clean == "this"
            || clean == "next"
            || is_year(clean)
            || is_date_numeric(clean))
    });
    tokens.join(" ")
}

fn strip_generic_words(s: &str) -> String {
    s.split_whitespace()
        .filter(|w| {
            let clean = w.trim_matches(|c: char| !c.is_alphanumeric());
            !GENERIC_WORDS.contains(&clean)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn analyze(query: &str) -> QueryAnalysis {
    let lower = query.to_lowercase();
    let has_time_reference = detect_time_reference(&lower);

    let without_time = strip_time_references(&lower);
    let semantic_part = strip_generic_words(&without_time).trim().to_string();
    let has_semantic_content = semantic_part.chars().count() >= 3;

    let mut expected_types = Vec::new();
    if has_time_reference {
        expected_types.push("episode".to_string());
    }
    if has_semantic_content {
        expected_types.push("concept".to_string());
    }

    QueryAnalysis {
        has_time_reference,
        has_semantic_content,
        expected_types,
        semantic_part,
        original_query: query.to_string(),
    }
}

/// BM25 tokenization : lower-case, split on
/// whitespace/punctuation, drop length-1 tokens.
pub fn bm25_tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || "-_.,;:!?'\"()[]{}".contains(c))
        .filter(|t| t.chars().count() > 1)
        .map(|t| t.to_string())
        .collect()
}

/// Combine multiple query vectors per `query_combination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCombination {
    Average,
    MaxPooling,
}

pub fn combine_vectors(vectors: &[Vec<f32>], mode: QueryCombination) -> Vec<f32> {
    if vectors.is_empty() {
        return Vec::new();
    }
    let dim = vectors[0].len();
    match mode {
        QueryCombination::Average => {
            let mut out = vec![0.0f32; dim];
            for v in vectors {
                for (o, x) in out.iter_mut().zip(v.iter()) {
                    *o += x;
                }
            }
            for o in out.iter_mut() {
                *o /= vectors.len() as f32;
            }
            out
        }
        QueryCombination::MaxPooling => {
            let mut out = vec![f32::NEG_INFINITY; dim];
            for v in vectors {
                for (o, x) in out.iter_mut().zip(v.iter()) {
                    *o = o.max(*x);
                }
            }
            out
        }
    }
}

/// Union BM25 terms across multiple queries, deduped (Step 1).
pub fn union_terms(queries: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for q in queries {
        for term in bm25_tokenize(q) {
            if seen.insert(term.clone()) {
                out.push(term);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_relative_time() {
        let a = analyze("what did I do yesterday");
        assert!(a.has_time_reference);
    }

    #[test]
    fn detects_last_weekday() {
        let a = analyze("what happened last tuesday");
        assert!(a.has_time_reference);
    }

    #[test]
    fn skip_embedding_when_only_time_reference() {
        let a = analyze("yesterday");
        assert!(a.should_skip_embedding());
    }

    #[test]
    fn no_skip_when_semantic_content_present() {
        let a = analyze("what did I learn about Fourier transforms yesterday");
        assert!(!a.should_skip_embedding());
        assert!(a.has_semantic_content);
    }

    #[test]
    fn bm25_tokenize_drops_length_one_tokens() {
        let tokens = bm25_tokenize("a cat sat, on-the mat!");
        assert!(!tokens.contains(&"a".to_string()));
        assert!(tokens.contains(&"cat".to_string()));
    }

    #[test]
    fn combine_average() {
        let v = combine_vectors(&[vec![1.0, 2.0], vec![3.0, 4.0]], QueryCombination::Average);
        assert_eq!(v, vec![2.0, 3.0]);
    }

    #[test]
    fn combine_max_pooling() {
        let v = combine_vectors(&[vec![1.0, 5.0], vec![3.0, 4.0]], QueryCombination::MaxPooling);
        assert_eq!(v, vec![3.0, 5.0]);
    }
}
