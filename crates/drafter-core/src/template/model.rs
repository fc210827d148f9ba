//! Template domain model.
//!
//! A template describes how role-tagged turns are delimited inside a flat
//! prompt buffer, plus an optional fill-in-the-middle format string.

use crate::generation::ChatRole;
use serde::{Deserialize, Serialize};

/// A normalized prompt template.
///
/// Every marker is a plain string; an empty marker means the template does
/// not delimit that side of that role.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub name: String,
    /// Server-assigned write counter.
    #[serde(default)]
    pub version: u64,
    pub system_prefix: String,
    pub system_suffix: String,
    pub user_prefix: String,
    pub user_suffix: String,
    pub assistant_prefix: String,
    pub assistant_suffix: String,
    /// Format string with `{prefix}` and `{suffix}` substitution points.
    #[serde(default)]
    pub fim_template: Option<String>,
}

impl Template {
    /// Returns the prefix marker for a role.
    pub fn prefix(&self, role: ChatRole) -> &str {
        match role {
            ChatRole::System => &self.system_prefix,
            ChatRole::User => &self.user_prefix,
            ChatRole::Assistant => &self.assistant_prefix,
        }
    }

    /// Returns the suffix marker for a role.
    pub fn suffix(&self, role: ChatRole) -> &str {
        match role {
            ChatRole::System => &self.system_suffix,
            ChatRole::User => &self.user_suffix,
            ChatRole::Assistant => &self.assistant_suffix,
        }
    }

    /// Renders a single turn with this template's markers.
    pub fn wrap(&self, role: ChatRole, content: &str) -> String {
        format!("{}{}{}", self.prefix(role), content, self.suffix(role))
    }

    /// A ChatML template, the default for most instruction-tuned models.
    pub fn chatml() -> Self {
        Self {
            name: "chatml".into(),
            version: 0,
            system_prefix: "<|im_start|>system\n".into(),
            system_suffix: "<|im_end|>\n".into(),
            user_prefix: "<|im_start|>user\n".into(),
            user_suffix: "<|im_end|>\n".into(),
            assistant_prefix: "<|im_start|>assistant\n".into(),
            assistant_suffix: "<|im_end|>\n".into(),
            fim_template: None,
        }
    }
}

/// A template payload as received from the server or a file.
///
/// All fields are optional and accepted in either camelCase or snake_case.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTemplate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default, alias = "system_prefix")]
    pub system_prefix: Option<String>,
    #[serde(default, alias = "system_suffix")]
    pub system_suffix: Option<String>,
    #[serde(default, alias = "user_prefix")]
    pub user_prefix: Option<String>,
    #[serde(default, alias = "user_suffix")]
    pub user_suffix: Option<String>,
    #[serde(default, alias = "assistant_prefix")]
    pub assistant_prefix: Option<String>,
    #[serde(default, alias = "assistant_suffix")]
    pub assistant_suffix: Option<String>,
    #[serde(default, alias = "fim_template", alias = "fim")]
    pub fim_template: Option<String>,
}

impl RawTemplate {
    /// Normalizes the raw payload. `fallback_name` is used when the payload
    /// carries no name of its own.
    pub fn normalize(self, fallback_name: &str) -> Template {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| fallback_name.to_string());

        Template {
            name,
            version: self.version.unwrap_or_default(),
            system_prefix: self.system_prefix.unwrap_or_default(),
            system_suffix: self.system_suffix.unwrap_or_default(),
            user_prefix: self.user_prefix.unwrap_or_default(),
            user_suffix: self.user_suffix.unwrap_or_default(),
            assistant_prefix: self.assistant_prefix.unwrap_or_default(),
            assistant_suffix: self.assistant_suffix.unwrap_or_default(),
            fim_template: self.fim_template.filter(|f| !f.trim().is_empty()),
        }
    }
}

impl From<Template> for RawTemplate {
    fn from(template: Template) -> Self {
        Self {
            name: Some(template.name),
            version: Some(template.version),
            system_prefix: Some(template.system_prefix),
            system_suffix: Some(template.system_suffix),
            user_prefix: Some(template.user_prefix),
            user_suffix: Some(template.user_suffix),
            assistant_prefix: Some(template.assistant_prefix),
            assistant_suffix: Some(template.assistant_suffix),
            fim_template: template.fim_template,
        }
    }
}
