//! Stage 4 PROCESS. Plain data-in data-out functions per
//! handler, composed by the `Pipeline` in `commit.rs` — in the spirit of
//! the reference crate's `DecayEngine<S: Storage>` (an orchestrating
//! struct wrapping a store handle around otherwise-pure per-item logic).

use crate::ingest::classify::Classification;
use crate::ingest::envelope::InputEnvelope;
use crate::types::{ContentCategory, Provenance, SourceType, StagingRecord};
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Saved,
    Queried,
    Ignored,
    Accumulated,
    Prompted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserResponse {
    Pending,
}

#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub action: Action,
    pub staged: Vec<StagingRecord>,
    pub user_response: Option<UserResponse>,
}

fn first_line_100(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let source = if first_line.is_empty() { text.trim() } else { first_line };
    if source.chars().count() <= 100 {
        source.to_string()
    } else {
        source.chars().take(100).collect()
    }
}

/// DirectSave: exactly one StagedNode (Stage 4).
pub fn direct_save(envelope: &InputEnvelope, classification: &Classification) -> HandlerOutput {
    let text = &envelope.normalized.text;
    let provenance = Provenance {
        source_type: if envelope.options.force_save {
            SourceType::Manual
        } else {
            SourceType::Extraction
        },
        input_id: envelope.id.wire(),
        session_id: envelope.context.session_id.clone(),
        timestamp: Utc::now(),
    };
    let staged = StagingRecord {
        id: crate::ids::StagingId::new(),
        kind: crate::types::NodeKind::Note,
        subtype: None,
        title: first_line_100(text),
        body: text.clone(),
        content_category: classification.content_category,
        provenance,
        confidence: classification.confidence,
        suggested_edges: Vec::new(),
        tags: Vec::new(),
    };
    HandlerOutput {
        action: Action::Saved,
        staged: vec![staged],
        user_response: None,
    }
}

/// Accumulator: record into an external per-session buffer, no staged
/// nodes of its own (Stage 4). The buffer itself lives outside
/// the core ("accumulator buffer reads" is a suspension point);
/// this returns the action only, leaving the actual buffer write to the
/// caller-supplied sink.
pub fn accumulator() -> HandlerOutput {
    HandlerOutput {
        action: Action::Accumulated,
        staged: Vec::new(),
        user_response: None,
    }
}

pub fn query_handler() -> HandlerOutput {
    HandlerOutput {
        action: Action::Queried,
        staged: Vec::new(),
        user_response: None,
    }
}

pub fn command_handler() -> HandlerOutput {
    HandlerOutput {
        action: Action::Queried,
        staged: Vec::new(),
        user_response: None,
    }
}

pub fn response_handler() -> HandlerOutput {
    HandlerOutput {
        action: Action::Ignored,
        staged: Vec::new(),
        user_response: None,
    }
}

pub fn ignore_handler() -> HandlerOutput {
    HandlerOutput {
        action: Action::Ignored,
        staged: Vec::new(),
        user_response: None,
    }
}

/// `shouldPrompt` decision (Stage 4): false unless all of these
/// hold.
pub fn should_prompt(
    classification: &Classification,
    prompt_threshold: f32,
    prompts_shown: u32,
    dismissed_prompts: u32,
    messages_since_prompt: u32,
) -> bool {
    use crate::ingest::classify::{Complexity, SaveSignal};

    if classification.save_signal != SaveSignal::Unclear {
        return false;
    }
    if classification.complexity == Complexity::Atomic {
        return false;
    }
    if classification.confidence >= prompt_threshold {
        return false;
    }
    if !(prompts_shown < 3 || dismissed_prompts < 2) {
        return false;
    }
    if prompts_shown >= 1 && messages_since_prompt < 5 {
        return false;
    }
    true
}

/// Prompt handler (Stage 4).
pub fn prompt_handler(
    classification: &Classification,
    prompt_threshold: f32,
    prompts_shown: u32,
    dismissed_prompts: u32,
    messages_since_prompt: u32,
) -> HandlerOutput {
    let will_prompt = should_prompt(
        classification,
        prompt_threshold,
        prompts_shown,
        dismissed_prompts,
        messages_since_prompt,
    );
    HandlerOutput {
        action: Action::Prompted,
        staged: Vec::new(),
        user_response: if will_prompt { Some(UserResponse::Pending) } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::classify::{ClassifiedBy, Complexity, Intent, SaveSignal};
    use crate::ingest::envelope::{receive, InputContext, InputOptions, Mode, RawInput};
    use crate::ingest::envelope::InputSource;

    fn envelope(text: &str, force_save: bool) -> InputEnvelope {
        let ctx = InputContext {
            session_id: "s".to_string(),
            user_id: "u".to_string(),
            conversation_history: Vec::new(),
            user_behavior: None,
        };
        receive(
            RawInput {
                source: InputSource::Chat,
                mode: Mode::Normal,
                text: text.to_string(),
                file_name: None,
                mime_type: None,
                content: None,
                metadata: Default::default(),
            },
            ctx,
            InputOptions {
                force_save,
                content_category: None,
            },
        )
    }

    fn classification(save_signal: SaveSignal, confidence: f32) -> Classification {
        Classification {
            intent: Intent::Content,
            save_signal,
            confidence,
            content_category: ContentCategory::General,
            complexity: Complexity::Composite,
            action_verb: None,
            thought_path: Vec::new(),
            gate_result: None,
            classified_by: ClassifiedBy::FastRules,
        }
    }

    #[test]
    fn direct_save_produces_exactly_one_staged_node() {
        let env = envelope("Remember that my phone number is 555-1234", false);
        let c = classification(SaveSignal::Explicit, 0.95);
        let out = direct_save(&env, &c);
        assert_eq!(out.staged.len(), 1);
        assert_eq!(out.action, Action::Saved);
    }

    #[test]
    fn direct_save_with_force_save_is_manual_provenance() {
        let env = envelope("keep this", true);
        let c = classification(SaveSignal::Explicit, 0.95);
        let out = direct_save(&env, &c);
        assert_eq!(out.staged[0].provenance.source_type, SourceType::Manual);
    }

    #[test]
    fn should_not_prompt_when_confident() {
        let c = classification(SaveSignal::Unclear, 0.95);
        assert!(!should_prompt(&c, 0.6, 0, 0, 10));
    }

    #[test]
    fn should_prompt_when_unclear_and_low_confidence() {
        let c = classification(SaveSignal::Unclear, 0.3);
        assert!(should_prompt(&c, 0.6, 0, 0, 10));
    }

    #[test]
    fn should_not_prompt_when_too_many_messages_since_last() {
        let c = classification(SaveSignal::Unclear, 0.3);
        assert!(!should_prompt(&c, 0.6, 1, 0, 2));
    }
}
