//! Ingestion Pipeline : a 6-stage classifier/router that turns
//! accepted input into staged graph nodes, with dedup and thought-path
//! tracing. Stages run sequentially and are cancellable between stages
//! ; within a stage work is atomic from the caller's view.

pub mod chunker;
pub mod classify;
pub mod commit;
pub mod envelope;
pub mod handlers;
pub mod route;
pub mod stage;

use crate::ports::{BehaviorPort, LLMPort, StorePort};
use crate::types::StagingRecord;
use envelope::{receive, InputContext, InputOptions, RawInput};
use handlers::Action;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Tunables for the stages that aren't otherwise parameterized by their
/// own per-module config (Stage 5's dedup threshold today).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub jaccard_dedup_threshold: f32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { jaccard_dedup_threshold: stage::JACCARD_DEDUP_THRESHOLD }
    }
}

/// One input's full trip through the pipeline.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub action: Action,
    pub classification: classify::Classification,
    pub handler: route::Handler,
    pub commit: Option<commit::CommitResult>,
    pub prompted: bool,
    pub stage_durations_ms: StageDurations,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StageDurations {
    pub receive_ms: u64,
    pub classify_ms: u64,
    pub route_ms: u64,
    pub process_ms: u64,
    pub stage_ms: u64,
    pub commit_ms: u64,
}

impl StageDurations {
    pub fn total_ms(&self) -> u64 {
        self.receive_ms + self.classify_ms + self.route_ms + self.process_ms + self.stage_ms + self.commit_ms
    }
}

/// Per-session prompt bookkeeping the Prompt handler consults
/// (Stage 4 `shouldPrompt`); owned by the caller, not the core.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptState {
    pub prompts_shown: u32,
    pub dismissed_prompts: u32,
    pub messages_since_prompt: u32,
}

/// Run one input through all six stages. `store` is only touched in
/// Stage 6 and only when the route produces staged nodes — once commit
/// has started it runs to completion rather than honoring a cancel.
pub fn process(
    raw: RawInput,
    context: InputContext,
    options: InputOptions,
    llm: &dyn LLMPort,
    store: &dyn StorePort,
    prompt_state: PromptState,
    config: &IngestConfig,
) -> crate::error::Result<IngestResult> {
    let mut durations = StageDurations::default();

    let t = Instant::now();
    let envelope = receive(raw, context, options);
    durations.receive_ms = t.elapsed().as_millis() as u64;

    if envelope::is_incognito_without_force_save(&envelope) {
        let classification = classify::Classification {
            intent: classify::Intent::Noise,
            save_signal: classify::SaveSignal::None,
            confidence: 1.0,
            content_category: crate::types::ContentCategory::General,
            complexity: classify::Complexity::Atomic,
            action_verb: None,
            thought_path: vec!["incognito_without_force_save".to_string()],
            gate_result: None,
            classified_by: classify::ClassifiedBy::FastRules,
        };
        return Ok(IngestResult {
            action: Action::Ignored,
            classification,
            handler: route::Handler::Ignore,
            commit: None,
            prompted: false,
            stage_durations_ms: durations,
        });
    }

    let t = Instant::now();
    let classification = classify::classify(&envelope, llm);
    durations.classify_ms = t.elapsed().as_millis() as u64;

    let t = Instant::now();
    let handler = route::route(&classification);
    durations.route_ms = t.elapsed().as_millis() as u64;

    let thresholds = classify::base_thresholds(classification.content_category);
    let prompt_threshold = match &envelope.context.user_behavior {
        Some(behavior) => classify::adjust_threshold(thresholds.prompt, behavior),
        None => thresholds.prompt,
    };

    let t = Instant::now();
    let (output, staged_for_chunking) = match handler {
        route::Handler::DirectSave => {
            let out = handlers::direct_save(&envelope, &classification);
            (out, true)
        }
        route::Handler::Accumulator => (handlers::accumulator(), false),
        route::Handler::Query => (handlers::query_handler(), false),
        route::Handler::Command => (handlers::command_handler(), false),
        route::Handler::Response => (handlers::response_handler(), false),
        route::Handler::Ignore => (handlers::ignore_handler(), false),
        route::Handler::Prompt => {
            let out = handlers::prompt_handler(
                &classification,
                prompt_threshold,
                prompt_state.prompts_shown,
                prompt_state.dismissed_prompts,
                prompt_state.messages_since_prompt,
            );
            (out, false)
        }
    };
    durations.process_ms = t.elapsed().as_millis() as u64;

    let prompted = output.user_response.is_some();

    // Stage 4b: document-scale DirectSave content is re-expressed as
    // ordered chunks instead of a single oversized node.
    let mut staged = output.staged;
    if staged_for_chunking && classification.complexity == classify::Complexity::Document {
        staged = chunk_staged_record(staged, &envelope);
    }

    let t = Instant::now();
    let staged = stage::stage(staged, config.jaccard_dedup_threshold);
    durations.stage_ms = t.elapsed().as_millis() as u64;

    let commit_result = if staged.is_empty() {
        None
    } else {
        let t = Instant::now();
        let result = commit::commit(store, staged)?;
        durations.commit_ms = t.elapsed().as_millis() as u64;
        Some(result)
    };

    Ok(IngestResult {
        action: output.action,
        classification,
        handler,
        commit: commit_result,
        prompted,
        stage_durations_ms: durations,
    })
}

fn chunk_staged_record(
    staged: Vec<StagingRecord>,
    _envelope: &envelope::InputEnvelope,
) -> Vec<StagingRecord> {
    let Some(original) = staged.into_iter().next() else {
        return Vec::new();
    };
    let chunks = chunker::chunk(&original.body, &chunker::ChunkOptions::default());
    let total = chunks.len();
    chunks
        .into_iter()
        .map(|c| {
            let mut record = original.clone();
            record.id = crate::ids::StagingId::new();
            record.kind = crate::types::NodeKind::Chunk;
            record.title = format!(
                "[Chunk {}/{}] {}",
                c.sequence,
                total,
                c.heading.clone().unwrap_or_else(|| original.title.clone())
            );
            record.body = format!("{}{}", c.overlap_start, c.content);
            record
        })
        .collect()
}

/// Record a prompt interaction into the behavior port, used by callers
/// after the user responds to a Stage 4 prompt.
pub fn record_prompt_outcome(
    behavior: &dyn BehaviorPort,
    user_id: &str,
    was_shown: bool,
    was_saved: Option<bool>,
) -> crate::error::Result<()> {
    behavior.record_prompt(user_id, was_shown)?;
    if let Some(saved) = was_saved {
        behavior.record_save(user_id, saved)?;
    }
    Ok(())
}
