//! Template-aware message extraction.
//!
//! Converts a flat prompt buffer into role-tagged chat messages by scanning
//! for the template's prefix and suffix markers.

use super::model::Template;
use crate::generation::{ChatMessage, ChatRole};

/// Result of splitting a buffer into messages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    pub messages: Vec<ChatMessage>,
    /// Non-blank spans that sat outside any recognizable turn and were skipped.
    pub discarded: Vec<String>,
    /// True when no turn structure was found and the whole buffer became one
    /// user message.
    pub used_fallback: bool,
}

impl Extraction {
    fn fallback(text: &str, discarded: Vec<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(text)],
            discarded,
            used_fallback: true,
        }
    }
}

/// Splits `text` into chat messages using `template`'s markers.
///
/// Roles are tried in priority order (system, user, assistant). A message
/// runs until the nearest other-role prefix or its own suffix, or to the end
/// of the text. Unparsable spans between turns are skipped and reported in
/// [`Extraction::discarded`]. A trailing empty assistant turn is dropped
/// since it only positions the model to continue.
pub fn extract_messages(text: &str, template: &Template) -> Extraction {
    let text = text.trim();
    let prefixes: Vec<(ChatRole, &str)> = ChatRole::ALL
        .iter()
        .map(|role| (*role, template.prefix(*role)))
        .filter(|(_, prefix)| !prefix.is_empty())
        .collect();

    let any_marker = prefixes
        .iter()
        .any(|(_, prefix)| text.contains(prefix) || prefix_len_at(text, 0, prefix).is_some());
    if !any_marker {
        return Extraction::fallback(text, Vec::new());
    }

    let mut messages = Vec::new();
    let mut discarded = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let matched = prefixes
            .iter()
            .find_map(|(role, prefix)| prefix_len_at(text, pos, prefix).map(|len| (*role, len)));

        let Some((role, marker_len)) = matched else {
            let tail = &text[pos..];
            let next = prefixes
                .iter()
                .filter_map(|(_, prefix)| tail.find(prefix))
                .min();
            let skip = next.unwrap_or(tail.len());
            record_discarded(&mut discarded, &tail[..skip], pos);
            if next.is_none() {
                break;
            }
            pos += skip;
            continue;
        };

        let body_start = pos + marker_len;
        let body = &text[body_start..];
        let (content_end, consumed) = find_boundary(body, role, template, &prefixes);
        messages.push(ChatMessage::new(role, body[..content_end].trim()));
        pos = body_start + consumed;
    }

    if messages
        .last()
        .is_some_and(|m| m.role == ChatRole::Assistant && m.content.is_empty())
    {
        messages.pop();
    }

    if messages.is_empty() {
        return Extraction::fallback(text, discarded);
    }

    Extraction {
        messages,
        discarded,
        used_fallback: false,
    }
}

/// Returns the number of bytes `prefix` occupies at `pos`, if it matches there.
///
/// Prefixes at the very start or end of the buffer still match after
/// trimming removed their outer whitespace.
fn prefix_len_at(text: &str, pos: usize, prefix: &str) -> Option<usize> {
    let tail = &text[pos..];
    if tail.starts_with(prefix) {
        return Some(prefix.len());
    }
    let leading = prefix.trim_start();
    if pos == 0 && !leading.is_empty() && leading.len() != prefix.len() && tail.starts_with(leading)
    {
        return Some(leading.len());
    }
    let trailing = prefix.trim_end();
    if !trailing.is_empty() && trailing.len() != prefix.len() && tail == trailing {
        return Some(tail.len());
    }
    None
}

/// Locates the end of a message body.
///
/// Returns `(content_end, consumed)`: the content is `body[..content_end]`
/// and scanning resumes at `body[consumed..]`. A suffix is consumed, a
/// following prefix is not.
fn find_boundary(
    body: &str,
    role: ChatRole,
    template: &Template,
    prefixes: &[(ChatRole, &str)],
) -> (usize, usize) {
    let mut best: Option<(usize, usize)> = None;
    let mut consider = |start: usize, consumed: usize| {
        if best.is_none_or(|(current, _)| start < current) {
            best = Some((start, consumed));
        }
    };

    let suffix = template.suffix(role);
    if !suffix.is_empty() {
        if let Some(idx) = body.find(suffix) {
            consider(idx, idx + suffix.len());
        } else {
            // Trimming the buffer may have cut trailing whitespace off the
            // final suffix.
            let trimmed = suffix.trim_end();
            if !trimmed.is_empty() && body.ends_with(trimmed) {
                consider(body.len() - trimmed.len(), body.len());
            }
        }
    }

    for (other, prefix) in prefixes {
        if *other == role {
            continue;
        }
        if let Some(idx) = body.find(prefix) {
            consider(idx, idx);
        }
    }

    best.unwrap_or((body.len(), body.len()))
}

fn record_discarded(discarded: &mut Vec<String>, span: &str, offset: usize) {
    let span = span.trim();
    if span.is_empty() {
        return;
    }
    tracing::warn!(
        "[MessageExtractor] Skipping {} bytes outside any template turn at offset {}",
        span.len(),
        offset
    );
    discarded.push(span.to_string());
}
