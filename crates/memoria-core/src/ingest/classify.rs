//! Stage 2 CLASSIFY : hybrid fast-rule/action-verb/user-model/
//! LLM cascade. New hand-written rule cascade in the gate's idiom
//! (hand-rolled word/phrase matching, no `regex`), same precedent as
//! `gate::rules`.

use crate::gate::{Gate, GateConfig, GateEnvelope, GateResult};
use crate::ingest::envelope::{InputEnvelope, InputSource};
use crate::ports::LLMPort;
use crate::types::{ContentCategory, UserBehaviorModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Noise,
    Query,
    Content,
    Command,
    Conversation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveSignal {
    None,
    Explicit,
    Implicit,
    Unclear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Atomic,
    Composite,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifiedBy {
    FastRules,
    UserLearning,
    ActionVerbs,
    LlmFallback,
}

#[derive(Debug, Clone)]
pub struct Classification {
    pub intent: Intent,
    pub save_signal: SaveSignal,
    pub confidence: f32,
    pub content_category: ContentCategory,
    pub complexity: Complexity,
    pub action_verb: Option<String>,
    pub thought_path: Vec<String>,
    pub gate_result: Option<GateResult>,
    pub classified_by: ClassifiedBy,
}

/// Adaptive per-category thresholds.
pub struct CategoryThresholds {
    pub rule: f32,
    pub prompt: f32,
}

pub fn base_thresholds(category: ContentCategory) -> CategoryThresholds {
    match category {
        ContentCategory::Identity => CategoryThresholds { rule: 0.60, prompt: 0.50 },
        ContentCategory::Academic => CategoryThresholds { rule: 0.70, prompt: 0.60 },
        ContentCategory::Conversation => CategoryThresholds { rule: 0.75, prompt: 0.65 },
        ContentCategory::Work => CategoryThresholds { rule: 0.70, prompt: 0.60 },
        ContentCategory::Temporal => CategoryThresholds { rule: 0.70, prompt: 0.60 },
        ContentCategory::Document => CategoryThresholds { rule: 0.85, prompt: 0.75 },
        ContentCategory::General => CategoryThresholds { rule: 0.75, prompt: 0.65 },
    }
}

/// `adjusted = clamp(base - 0.2*typicalSaveRate + 0.1*(1-promptResponseRate), 0.4, 0.95)`.
pub fn adjust_threshold(base: f32, behavior: &UserBehaviorModel) -> f32 {
    let adjusted = base - 0.2 * behavior.typical_save_rate + 0.1 * (1.0 - behavior.prompt_response_rate);
    adjusted.clamp(0.4, 0.95)
}

const EXPLICIT_SAVE_VERBS: &[&str] = &["save", "remember", "keep", "store", "note"];
const DONT_FORGET: &[&str] = &["don't forget", "do not forget", "dont forget"];
const WH_WORDS: &[&str] = &["what", "who", "where", "when", "why", "how", "which", "whose"];
const AUX_VERBS: &[&str] = &["is", "are", "was", "were", "do", "does", "did", "can", "could", "will", "would", "should"];
const SOCIAL_WORDS: &[&str] = &[
    "hi", "hello", "hey", "thanks", "thank you", "bye", "goodbye", "ok", "okay", "yes", "no", "sure",
];
const COMMAND_VERBS: &[&str] = &["search", "find", "look up", "query", "show me"];
const CREATE_NODE: &str = "create a node";

const REVIEW_VERBS: &[&str] = &["review", "check", "look over", "go over", "examine"];
const SAVE_VERBS: &[&str] = &["save", "remember", "keep", "store", "record", "log"];
const AMBIGUOUS_VERBS: &[&str] = &["look at", "here's", "heres", "check out", "take a look"];

fn contains_phrase(lower: &str, phrase: &str) -> bool {
    lower.contains(phrase)
}

fn starts_with_word(lower: &str, words: &[&str]) -> bool {
    let first = lower.split_whitespace().next().unwrap_or("");
    let first_clean: String = first.chars().filter(|c| c.is_alphanumeric()).collect();
    words.iter().any(|w| *w == first_clean)
}

/// Step 1: gate (skipped for `api`). REJECT maps to noise/none classification.
fn step_gate(envelope: &InputEnvelope) -> Option<Classification> {
    if envelope.source == InputSource::Api {
        return None;
    }
    let gate_source = match envelope.source {
        InputSource::Chat => crate::gate::Source::Chat,
        InputSource::File => crate::gate::Source::File,
        InputSource::Voice => crate::gate::Source::Voice,
        InputSource::Api => crate::gate::Source::Api,
        InputSource::Stream => crate::gate::Source::Stream,
    };
    let gate_env = GateEnvelope::new(envelope.normalized.text.clone(), gate_source)
        .force_save(envelope.options.force_save);
    let result = Gate::run(&gate_env, &GateConfig::default());
    if result.decision == crate::gate::Decision::Reject {
        log::debug!("classify: gate rejected input, short-circuiting to noise/none");
        return Some(Classification {
            intent: Intent::Noise,
            save_signal: SaveSignal::None,
            confidence: result.confidence,
            content_category: category_from_options(envelope),
            complexity: Complexity::Atomic,
            action_verb: None,
            thought_path: Vec::new(),
            gate_result: Some(result),
            classified_by: ClassifiedBy::FastRules,
        });
    }
    None
}

fn category_from_options(envelope: &InputEnvelope) -> ContentCategory {
    match envelope.options.content_category.as_deref() {
        Some("identity") => ContentCategory::Identity,
        Some("academic") => ContentCategory::Academic,
        Some("conversation") => ContentCategory::Conversation,
        Some("work") => ContentCategory::Work,
        Some("temporal") => ContentCategory::Temporal,
        Some("document") => ContentCategory::Document,
        _ => ContentCategory::General,
    }
}

/// Step 2: fast rule cascade.
fn step_fast_rules(text: &str, category: ContentCategory) -> Option<Classification> {
    let lower = text.to_lowercase();

    let explicit_save = EXPLICIT_SAVE_VERBS.iter().any(|v| contains_phrase(&lower, v))
        || DONT_FORGET.iter().any(|p| contains_phrase(&lower, p));
    if explicit_save {
        return Some(mk(Intent::Content, SaveSignal::Explicit, 0.95, category, ClassifiedBy::FastRules));
    }

    let is_question = starts_with_word(&lower, WH_WORDS)
        || text.trim_end().ends_with('?')
        || starts_with_word(&lower, AUX_VERBS);
    if is_question {
        let c = mk(Intent::Query, SaveSignal::None, 0.90, category, ClassifiedBy::FastRules);
        if c.confidence >= 0.85 {
            return Some(c);
        }
    }

    let is_social = SOCIAL_WORDS.iter().any(|w| contains_phrase(&lower, w));
    if is_social {
        let c = mk(Intent::Conversation, SaveSignal::None, 0.85, category, ClassifiedBy::FastRules);
        if c.confidence >= 0.85 {
            return Some(c);
        }
    }

    let is_command =
        COMMAND_VERBS.iter().any(|v| contains_phrase(&lower, v)) || contains_phrase(&lower, CREATE_NODE);
    if is_command {
        let c = mk(Intent::Command, SaveSignal::None, 0.90, category, ClassifiedBy::FastRules);
        if c.confidence >= 0.85 {
            return Some(c);
        }
    }

    None
}

/// Step 3: user learning (always-save / never-save string lists).
fn step_user_learning(text: &str, behavior: &UserBehaviorModel, category: ContentCategory) -> Option<Classification> {
    let lower = text.to_lowercase();
    if behavior.always_save.iter().any(|s| lower.contains(&s.to_lowercase())) {
        return Some(mk(Intent::Content, SaveSignal::Implicit, 0.85, category, ClassifiedBy::UserLearning));
    }
    if behavior.never_save.iter().any(|s| lower.contains(&s.to_lowercase())) {
        return Some(mk(Intent::Conversation, SaveSignal::None, 0.85, category, ClassifiedBy::UserLearning));
    }
    None
}

/// Step 4: action-verb scan.
fn step_action_verbs(text: &str, category: ContentCategory) -> Option<Classification> {
    let lower = text.to_lowercase();

    let first_match = |verbs: &[&str]| -> Option<&'static str> {
        verbs
            .iter()
            .filter(|v| contains_phrase(&lower, v))
            .min_by_key(|v| lower.find(*v).unwrap_or(usize::MAX))
            .copied()
    };

    if let Some(verb) = first_match(REVIEW_VERBS) {
        let mut c = mk(Intent::Query, SaveSignal::None, 0.9, category, ClassifiedBy::ActionVerbs);
        c.action_verb = Some(verb.to_string());
        return Some(c);
    }
    if let Some(verb) = first_match(SAVE_VERBS) {
        let mut c = mk(Intent::Content, SaveSignal::Explicit, 0.95, category, ClassifiedBy::ActionVerbs);
        c.action_verb = Some(verb.to_string());
        return Some(c);
    }
    if let Some(verb) = first_match(AMBIGUOUS_VERBS) {
        let mut c = mk(Intent::Content, SaveSignal::Unclear, 0.5, category, ClassifiedBy::ActionVerbs);
        c.action_verb = Some(verb.to_string());
        return Some(c);
    }
    None
}

fn complexity_from_word_count(text: &str) -> Complexity {
    let words = text.split_whitespace().count();
    if words <= 50 {
        Complexity::Atomic
    } else if words <= 500 {
        Complexity::Composite
    } else {
        Complexity::Document
    }
}

/// Step 5: LLM fallback, via the stub `LLMPort`.
fn step_llm_fallback(text: &str, category: ContentCategory, llm: &dyn LLMPort) -> Classification {
    let partial = llm.classify_text(text).unwrap_or_default();
    let mut c = mk(
        Intent::Content,
        SaveSignal::Implicit,
        partial.confidence.unwrap_or(0.7),
        category,
        ClassifiedBy::LlmFallback,
    );
    c.complexity = complexity_from_word_count(text);
    c
}

fn mk(intent: Intent, save_signal: SaveSignal, confidence: f32, category: ContentCategory, by: ClassifiedBy) -> Classification {
    Classification {
        intent,
        save_signal,
        confidence,
        content_category: category,
        complexity: Complexity::Atomic,
        action_verb: None,
        thought_path: Vec::new(),
        gate_result: None,
        classified_by: by,
    }
}

/// Run the full classification cascade (Stage 2).
pub fn classify(envelope: &InputEnvelope, llm: &dyn LLMPort) -> Classification {
    let category = category_from_options(envelope);
    let text = &envelope.normalized.text;

    if let Some(c) = step_gate(envelope) {
        return c;
    }

    if let Some(c) = step_fast_rules(text, category) {
        if matches!(c.intent, Intent::Query | Intent::Conversation | Intent::Command)
            || (c.confidence >= 0.9 && c.save_signal == SaveSignal::Explicit)
        {
            log::debug!("classify: fast rules matched {:?}/{:?}", c.intent, c.save_signal);
            return c;
        }
    }

    if let Some(behavior) = &envelope.context.user_behavior {
        if let Some(c) = step_user_learning(text, behavior, category) {
            log::debug!("classify: user-learning list matched {:?}/{:?}", c.intent, c.save_signal);
            return c;
        }
    }

    if let Some(mut c) = step_action_verbs(text, category) {
        c.complexity = complexity_from_word_count(text);
        log::debug!("classify: action verb {:?} matched {:?}/{:?}", c.action_verb, c.intent, c.save_signal);
        return c;
    }

    log::info!("classify: falling back to stub LLM classification");
    step_llm_fallback(text, category, llm)
}
