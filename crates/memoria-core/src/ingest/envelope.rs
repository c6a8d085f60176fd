//! Stage 1 RECEIVE. Grounded on the reference crate's
//! `ingest.rs` `IngestEvent` shape (plain data struct), generalized to
//! per-source normalization rules.

use crate::ids::InputId;
use crate::types::UserBehaviorModel;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    Chat,
    File,
    Voice,
    Api,
    Stream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Incognito,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedInput {
    pub text: String,
    pub metadata: HashMap<String, Value>,
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InputContext {
    pub session_id: String,
    pub user_id: String,
    pub conversation_history: Vec<String>,
    pub user_behavior: Option<UserBehaviorModel>,
}

#[derive(Debug, Clone, Default)]
pub struct InputOptions {
    pub force_save: bool,
    pub content_category: Option<String>,
}

/// Raw input before normalization (what callers hand to `receive`).
#[derive(Debug, Clone)]
pub struct RawInput {
    pub source: InputSource,
    pub mode: Mode,
    pub text: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub content: Option<String>,
    pub metadata: HashMap<String, Value>,
}

/// The full Stage 1 envelope.
#[derive(Debug, Clone)]
pub struct InputEnvelope {
    pub id: InputId,
    pub timestamp: DateTime<Utc>,
    pub source: InputSource,
    pub mode: Mode,
    pub raw: String,
    pub normalized: NormalizedInput,
    pub context: InputContext,
    pub options: InputOptions,
}

/// Build an input envelope, applying per-source normalization rules
/// (Stage 1).
pub fn receive(raw: RawInput, context: InputContext, options: InputOptions) -> InputEnvelope {
    let mut metadata = raw.metadata.clone();
    let mut attachments = Vec::new();

    let text = match raw.source {
        InputSource::Chat => raw.text.trim().to_string(),
        InputSource::File => {
            if let Some(name) = &raw.file_name {
                metadata.insert("fileName".to_string(), Value::String(name.clone()));
            }
            if let Some(mime) = &raw.mime_type {
                metadata.insert("mimeType".to_string(), Value::String(mime.clone()));
            }
            if let Some(name) = &raw.file_name {
                attachments.push(name.clone());
            }
            raw.content.clone().unwrap_or_else(|| raw.text.clone())
        }
        InputSource::Voice => {
            metadata.insert("whisperProcessed".to_string(), Value::Bool(true));
            raw.text.trim().to_string()
        }
        InputSource::Api => raw.content.clone().unwrap_or_else(|| raw.text.clone()),
        InputSource::Stream => {
            metadata.insert("isBuffered".to_string(), Value::Bool(true));
            raw.text.clone()
        }
    };

    InputEnvelope {
        id: InputId::new(),
        timestamp: Utc::now(),
        source: raw.source,
        mode: raw.mode,
        raw: raw.text,
        normalized: NormalizedInput {
            text,
            metadata,
            attachments,
        },
        context,
        options,
    }
}

/// Incognito mode without `forceSave` short-circuits later processing
/// with action `ignored` (Stage 1).
pub fn is_incognito_without_force_save(envelope: &InputEnvelope) -> bool {
    envelope.mode == Mode::Incognito && !envelope.options.force_save
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> InputContext {
        InputContext {
            session_id: "s1".to_string(),
            user_id: "u1".to_string(),
            conversation_history: Vec::new(),
            user_behavior: None,
        }
    }

    #[test]
    fn chat_trims_whitespace() {
        let raw = RawInput {
            source: InputSource::Chat,
            mode: Mode::Normal,
            text: "  hello  ".to_string(),
            file_name: None,
            mime_type: None,
            content: None,
            metadata: HashMap::new(),
        };
        let env = receive(raw, ctx(), InputOptions::default());
        assert_eq!(env.normalized.text, "hello");
    }

    #[test]
    fn voice_marks_whisper_processed() {
        let raw = RawInput {
            source: InputSource::Voice,
            mode: Mode::Normal,
            text: "voice note".to_string(),
            file_name: None,
            mime_type: None,
            content: None,
            metadata: HashMap::new(),
        };
        let env = receive(raw, ctx(), InputOptions::default());
        assert_eq!(env.normalized.metadata.get("whisperProcessed"), Some(&Value::Bool(true)));
    }

    #[test]
    fn incognito_without_force_save_is_flagged() {
        let raw = RawInput {
            source: InputSource::Chat,
            mode: Mode::Incognito,
            text: "secret".to_string(),
            file_name: None,
            mime_type: None,
            content: None,
            metadata: HashMap::new(),
        };
        let env = receive(raw, ctx(), InputOptions::default());
        assert!(is_incognito_without_force_save(&env));
    }
}
