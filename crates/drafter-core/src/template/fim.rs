//! Fill-in-the-middle prompt construction.

use super::model::Template;
use crate::error::{DrafterError, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static FIM_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\{\s*(prefix|suffix)\s*\}").expect("FIM marker pattern is valid")
});

/// A prompt asking the model for the text between `prefix` and `suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FimPrompt {
    pub prompt: String,
    /// True when the template had no usable FIM format and the generic
    /// instructional prompt was used instead.
    pub used_fallback: bool,
}

/// Substitutes `prefix` and `suffix` into a FIM format string.
///
/// Markers are matched case-insensitively and may contain whitespace inside
/// the braces (`{ Prefix }`). Substitution is a single pass, so marker-like
/// text inside the draft itself is never expanded.
///
/// # Errors
///
/// Returns `TemplateMalformed` when either marker is missing.
pub fn render_fim_template(name: &str, format: &str, prefix: &str, suffix: &str) -> Result<String> {
    let mut has_prefix = false;
    let mut has_suffix = false;
    for caps in FIM_MARKER.captures_iter(format) {
        if caps[1].eq_ignore_ascii_case("prefix") {
            has_prefix = true;
        } else {
            has_suffix = true;
        }
    }
    if !has_prefix || !has_suffix {
        return Err(DrafterError::template_malformed(
            name,
            "FIM template must contain both {prefix} and {suffix}",
        ));
    }

    let rendered = FIM_MARKER.replace_all(format, |caps: &Captures<'_>| {
        if caps[1].eq_ignore_ascii_case("prefix") {
            prefix.to_string()
        } else {
            suffix.to_string()
        }
    });
    Ok(rendered.into_owned())
}

/// Builds the fill prompt for a gap between `prefix` and `suffix`.
///
/// Uses the template's FIM format when one is configured and well formed,
/// otherwise falls back to a plain instruction embedding both sides verbatim.
pub fn build_fim_prompt(template: Option<&Template>, prefix: &str, suffix: &str) -> FimPrompt {
    if let Some(template) = template {
        if let Some(format) = template.fim_template.as_deref() {
            match render_fim_template(&template.name, format, prefix, suffix) {
                Ok(prompt) => {
                    return FimPrompt {
                        prompt,
                        used_fallback: false,
                    };
                }
                Err(e) => tracing::debug!("[FIM] {}", e),
            }
        }
    }

    FimPrompt {
        prompt: fallback_prompt(prefix, suffix),
        used_fallback: true,
    }
}

fn fallback_prompt(prefix: &str, suffix: &str) -> String {
    format!(
        "Fill in the missing text between PREFIX and SUFFIX. \
         Reply with only the missing text, without repeating either side.\n\n\
         PREFIX:\n{prefix}\n\nSUFFIX:\n{suffix}"
    )
}
