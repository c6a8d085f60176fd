//! Hand-rolled tiered rule evaluation for the Gate Filter.
//! No `regex` dependency — plain char/word scanning, same as the
//! reference crate's gate helpers (`is_pure_url` et al).

use super::GateConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(rename = "type")]
    pub kind: String,
    pub before: String,
    pub after: String,
}

/// T-001: collapse runs of whitespace to a single space and trim.
pub fn normalize_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for c in s.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
}

/// T-002: collapse runs of `.!?` of length >= 3 down to the first two chars.
fn collapse_punctuation_runs(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if matches!(c, '.' | '!' | '?') {
            let mut j = i;
            while j < chars.len() && chars[j] == c {
                j += 1;
            }
            let run_len = j - i;
            if run_len >= 3 {
                out.push(c);
                out.push(c);
            } else {
                out.extend(std::iter::repeat(c).take(run_len));
            }
            i = j;
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

pub fn cleanup(s: &str) -> Vec<Transformation> {
    let mut transformations = Vec::new();
    let collapsed = collapse_punctuation_runs(s);
    if collapsed != s {
        transformations.push(Transformation {
            kind: "collapse_punctuation".to_string(),
            before: s.to_string(),
            after: collapsed,
        });
    }
    transformations
}

/// Shannon entropy in bits/char over the byte distribution of `s`.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<char, u32> = HashMap::new();
    let mut total = 0u32;
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
        total += 1;
    }
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

fn words(s: &str) -> Vec<&str> {
    s.split_whitespace().collect()
}

fn is_real_word(w: &str, common_words: &[String]) -> bool {
    let cleaned: String = w.chars().filter(|c| c.is_alphanumeric()).collect();
    cleaned.chars().count() > 2 || common_words.iter().any(|cw| cw.eq_ignore_ascii_case(&cleaned))
}

/// R-003 spam patterns: repeated single token (`^(test|asdf|qwerty)+$`),
/// marketing phrases, `(.{1,3})\1{5,}` short-cycle repeats, phone-only,
/// digits-only.
fn is_spam_pattern(s: &str) -> bool {
    let lower = s.to_lowercase();
    let trimmed = lower.trim();

    const REPEATED_TOKENS: &[&str] = &["test", "asdf", "qwerty"];
    for tok in REPEATED_TOKENS {
        if !trimmed.is_empty()
            && trimmed.len() % tok.len() == 0
            && trimmed.as_bytes().chunks(tok.len()).all(|c| c == tok.as_bytes())
        {
            return true;
        }
    }

    const MARKETING_PHRASES: &[&str] = &[
        "click here",
        "buy now",
        "limited time offer",
        "act now",
        "subscribe now",
        "free trial",
        "call now",
        "visit our website",
    ];
    if MARKETING_PHRASES.iter().any(|p| trimmed.contains(p)) {
        return true;
    }

    if has_short_cycle_repeat(trimmed) {
        return true;
    }

    let digits_only = trimmed.chars().filter(|c| !c.is_whitespace()).all(|c| c.is_ascii_digit());
    if digits_only && !trimmed.is_empty() {
        return true;
    }

    let is_phone = {
        let digit_count = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
        let non_digit_non_phone_punct = trimmed
            .chars()
            .filter(|c| !c.is_ascii_digit() && !matches!(c, '-' | '(' | ')' | ' ' | '+'))
            .count();
        digit_count >= 7 && non_digit_non_phone_punct == 0
    };
    if is_phone {
        return true;
    }

    false
}

/// `(.{1,3})\1{5,}` — a group of 1-3 chars repeated at least 6 times total.
fn has_short_cycle_repeat(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    let n = chars.len();
    for group_len in 1..=3 {
        if n < group_len * 6 {
            continue;
        }
        let mut i = 0;
        while i + group_len <= n {
            let group = &chars[i..i + group_len];
            let mut reps = 1;
            let mut j = i + group_len;
            while j + group_len <= n && &chars[j..j + group_len] == group {
                reps += 1;
                j += group_len;
            }
            if reps >= 6 {
                return true;
            }
            i += group_len;
        }
    }
    false
}

/// R-004: any single char repeated >= 11 times consecutively.
fn has_char_run_ge_11(s: &str) -> bool {
    let mut last: Option<char> = None;
    let mut run = 0usize;
    for c in s.chars() {
        if Some(c) == last {
            run += 1;
        } else {
            last = Some(c);
            run = 1;
        }
        if run >= 11 {
            return true;
        }
    }
    false
}

const FILLER_DEFAULT: &[&str] = &[
    "um", "uh", "like", "you know", "basically", "literally", "actually", "just", "well", "so",
    "i mean", "kind of", "sort of",
];

pub fn default_filler_words() -> Vec<String> {
    FILLER_DEFAULT.iter().map(|s| s.to_string()).collect()
}

const COMMON_WORDS_DEFAULT: &[&str] = &[
    "a", "i", "is", "it", "an", "to", "of", "in", "on", "at", "be", "do", "go", "no", "so", "if",
    "or", "up", "we", "he", "me", "my",
];

pub fn default_common_words() -> Vec<String> {
    COMMON_WORDS_DEFAULT.iter().map(|s| s.to_string()).collect()
}

fn filler_ratio(s: &str, filler_words: &[String]) -> f64 {
    let ws = words(s);
    if ws.is_empty() {
        return 0.0;
    }
    let lower = s.to_lowercase();
    let filler_hits: usize = filler_words
        .iter()
        .map(|f| lower.matches(f.as_str()).count())
        .sum();
    filler_hits as f64 / ws.len() as f64
}

/// Tier 1 : first triggering rule returns REJECT immediately.
pub fn tier1(s: &str, config: &GateConfig) -> Option<(f32, &'static str)> {
    if s.chars().count() < 3 {
        return Some((1.0, "too_short"));
    }

    let ws = words(s);
    if !ws.is_empty() {
        let entropy = shannon_entropy(s);
        let real_word_ratio = ws.iter().filter(|w| is_real_word(w, &config.common_words)).count() as f64
            / ws.len() as f64;
        if entropy > 4.5 && real_word_ratio < 0.3 {
            return Some((0.98, "gibberish"));
        }
    }

    if is_spam_pattern(s) {
        return Some((0.97, "spam_pattern"));
    }

    if has_char_run_ge_11(s) {
        return Some((0.96, "char_repetition"));
    }

    if ws.len() >= 5 && filler_ratio(s, &config.filler_words) > 0.9 {
        return Some((0.96, "filler_ratio"));
    }

    None
}

/// Tier 2 : accumulating, caller takes max over all that fire.
pub fn tier2(s: &str, _config: &GateConfig) -> Vec<(f32, &'static str)> {
    let mut hits = Vec::new();

    let stripped: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && !is_punctuation(*c) && !is_emoji(*c))
        .collect();
    if stripped.chars().count() < 2 {
        hits.push((0.88, "semantic_emptiness"));
    }

    let letters: Vec<char> = s.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() >= 5 && s.chars().count() > 10 {
        let all_upper = letters.iter().all(|c| c.is_uppercase());
        if all_upper {
            hits.push((0.85, "all_caps"));
        }
    }

    hits
}

fn is_punctuation(c: char) -> bool {
    matches!(
        c,
        '.' | ',' | '!' | '?' | ';' | ':' | '\'' | '"' | '(' | ')' | '[' | ']' | '{' | '}' | '-' | '_'
    )
}

fn is_emoji(c: char) -> bool {
    let cp = c as u32;
    (0x1F300..=0x1FAFF).contains(&cp) || (0x2600..=0x27BF).contains(&cp)
}

/// Tier 3 : per-language social-only phrase match.
/// Unknown language falls back to `en`.
pub fn tier3(s: &str, language: &str) -> Option<(f32, &'static str)> {
    let phrases: &[&str] = match language {
        "es" => &["hola", "gracias", "adios", "buenos dias", "buenas noches", "de nada"],
        "fr" => &["bonjour", "merci", "au revoir", "salut", "de rien", "bonsoir"],
        "de" => &["hallo", "danke", "tschuss", "guten tag", "bitte schon", "auf wiedersehen"],
        _ => &["hi", "hello", "thanks", "thank you", "bye", "goodbye", "ok", "okay", "yes", "no"],
    };

    let lower = s.to_lowercase();
    let trimmed: String = lower
        .trim()
        .trim_matches(|c: char| is_punctuation(c))
        .to_string();

    if phrases.iter().any(|p| trimmed == *p) {
        return Some((0.70, "social_only"));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_whitespace("  a   b\tc\n"), "a b c");
    }

    #[test]
    fn collapse_punctuation_three_or_more() {
        assert_eq!(collapse_punctuation_runs("wow!!!!"), "wow!!");
        assert_eq!(collapse_punctuation_runs("wait.."), "wait..");
    }

    #[test]
    fn char_run_detection() {
        assert!(has_char_run_ge_11(&"a".repeat(11)));
        assert!(!has_char_run_ge_11(&"a".repeat(10)));
    }

    #[test]
    fn spam_digits_only() {
        assert!(is_spam_pattern("1234567890"));
    }

    #[test]
    fn spam_repeated_token() {
        assert!(is_spam_pattern("testtesttest"));
    }

    #[test]
    fn tier3_social_only_english() {
        assert!(tier3("thanks", "en").is_some());
        assert!(tier3("thanks so much for the detailed help", "en").is_none());
    }
}
