//! Generation plan resolution.
//!
//! The draft may contain a placeholder marker saying where generated text
//! goes. `{predict}` continues the text at that point, `{fill}` asks the
//! model for the gap between what comes before and after it.

use serde::{Deserialize, Serialize};

pub const PREDICT_MARKER: &str = "{predict}";
pub const FILL_MARKER: &str = "{fill}";

/// How generated text is placed in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// No marker: generated text is appended to the whole buffer.
    Append,
    /// Continue the text before `{predict}`.
    Predict,
    /// Fill the gap at `{fill}`.
    Fill,
}

/// Where and how a generation run writes into the buffer.
///
/// Generated tokens are inserted between `prefix` and `suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPlan {
    pub mode: GenerationMode,
    pub prefix: String,
    pub suffix: String,
}

impl GenerationPlan {
    /// True when the buffer contained a placeholder that must be removed
    /// before streaming.
    pub fn has_placeholder(&self) -> bool {
        self.mode != GenerationMode::Append
    }

    /// The buffer with `generated` inserted at the placeholder position.
    pub fn compose(&self, generated: &str) -> String {
        let mut text =
            String::with_capacity(self.prefix.len() + generated.len() + self.suffix.len());
        text.push_str(&self.prefix);
        text.push_str(generated);
        text.push_str(&self.suffix);
        text
    }
}

/// Decides the generation mode for `text`.
///
/// When both markers are present the one at the lower index wins; equal
/// indices resolve to predict.
pub fn resolve_plan(text: &str) -> GenerationPlan {
    let predict = text.find(PREDICT_MARKER);
    let fill = text.find(FILL_MARKER);

    let chosen = match (predict, fill) {
        (Some(p), Some(f)) if f < p => Some((GenerationMode::Fill, f, FILL_MARKER)),
        (Some(p), _) => Some((GenerationMode::Predict, p, PREDICT_MARKER)),
        (None, Some(f)) => Some((GenerationMode::Fill, f, FILL_MARKER)),
        (None, None) => None,
    };

    match chosen {
        Some((mode, idx, marker)) => GenerationPlan {
            mode,
            prefix: text[..idx].to_string(),
            suffix: text[idx + marker.len()..].to_string(),
        },
        None => GenerationPlan {
            mode: GenerationMode::Append,
            prefix: text.to_string(),
            suffix: String::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_marker_appends() {
        let plan = resolve_plan("It was a dark night");
        assert_eq!(plan.mode, GenerationMode::Append);
        assert_eq!(plan.prefix, "It was a dark night");
        assert_eq!(plan.suffix, "");
        assert!(!plan.has_placeholder());
    }

    #[test]
    fn test_lower_index_wins() {
        let text = "abcde{predict}{fill}xyz";
        let plan = resolve_plan(text);
        assert_eq!(plan.mode, GenerationMode::Predict);
        assert_eq!(plan.prefix, "abcde");
        assert_eq!(plan.suffix, "{fill}xyz");

        let plan = resolve_plan("a{fill}b{predict}c");
        assert_eq!(plan.mode, GenerationMode::Fill);
        assert_eq!(plan.prefix, "a");
        assert_eq!(plan.suffix, "b{predict}c");
    }

    #[test]
    fn test_fill_splits_around_marker() {
        let plan = resolve_plan("Hello {fill} world");
        assert_eq!(plan.mode, GenerationMode::Fill);
        assert_eq!(plan.prefix, "Hello ");
        assert_eq!(plan.suffix, " world");
        assert_eq!(plan.compose("big"), "Hello big world");
    }

    #[test]
    fn test_only_first_occurrence_is_used() {
        let plan = resolve_plan("x{predict}y{predict}z");
        assert_eq!(plan.prefix, "x");
        assert_eq!(plan.suffix, "y{predict}z");
    }
}
