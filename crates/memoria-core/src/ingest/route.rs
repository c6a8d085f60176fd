//! Stage 3 ROUTE : select a handler by `(intent, saveSignal)`.

use crate::ingest::classify::{Classification, Intent, SaveSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Ignore,
    Query,
    DirectSave,
    Accumulator,
    Prompt,
    Command,
    Response,
}

pub fn route(classification: &Classification) -> Handler {
    let handler = match (classification.intent, classification.save_signal) {
        (Intent::Noise, _) => Handler::Ignore,
        (Intent::Query, _) => Handler::Query,
        (Intent::Content, SaveSignal::None) => Handler::Query,
        (Intent::Content, SaveSignal::Explicit) => Handler::DirectSave,
        (Intent::Content, SaveSignal::Implicit) => Handler::Accumulator,
        (Intent::Content, SaveSignal::Unclear) => Handler::Prompt,
        (Intent::Command, _) => Handler::Command,
        (Intent::Conversation, _) => Handler::Response,
    };
    log::debug!(
        "route: {:?}/{:?} -> {:?}",
        classification.intent,
        classification.save_signal,
        handler
    );
    handler
}
