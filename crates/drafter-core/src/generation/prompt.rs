//! Turns a resolved plan into backend messages.

use super::message::ChatMessage;
use crate::plan::{GenerationMode, GenerationPlan};
use crate::template::{Template, build_fim_prompt, extract_messages};

/// Messages for one generation run plus what happened while building them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessages {
    pub messages: Vec<ChatMessage>,
    /// The fill prompt used the generic instruction instead of the template.
    pub fim_fallback: bool,
    /// Text skipped by the message extractor.
    pub discarded: Vec<String>,
}

/// Builds the messages sent to the backend.
///
/// Fill mode always produces a single user message holding the FIM prompt.
/// Otherwise the prefix is split into role messages when chat mode is on and
/// a template is available, or sent verbatim as one user message.
pub fn build_messages(
    plan: &GenerationPlan,
    chat_mode: bool,
    template: Option<&Template>,
) -> PromptMessages {
    if plan.mode == GenerationMode::Fill {
        let fim = build_fim_prompt(template, &plan.prefix, &plan.suffix);
        return PromptMessages {
            messages: vec![ChatMessage::user(fim.prompt)],
            fim_fallback: fim.used_fallback,
            discarded: Vec::new(),
        };
    }

    match (chat_mode, template) {
        (true, Some(template)) => {
            let extraction = extract_messages(&plan.prefix, template);
            PromptMessages {
                messages: extraction.messages,
                fim_fallback: false,
                discarded: extraction.discarded,
            }
        }
        _ => PromptMessages {
            messages: vec![ChatMessage::user(plan.prefix.clone())],
            fim_fallback: false,
            discarded: Vec::new(),
        },
    }
}
