use anyhow::{Context, Result};
use drafter_core::template::{RawTemplate, Template};
use std::io::Read;
use std::path::Path;

/// Reads a draft from `path`, or from stdin when `path` is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read draft from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Loads a template file, or ChatML when no file is given.
///
/// `.json` files are parsed as JSON, anything else as TOML. A template
/// without a `name` is named after the file.
pub fn load_template(path: Option<&Path>) -> Result<Template> {
    let Some(path) = path else {
        return Ok(Template::chatml());
    };

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    let raw: RawTemplate = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON template {}", path.display()))?
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML template {}", path.display()))?
    };

    let fallback_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("template");
    Ok(raw.normalize(fallback_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_toml_template_is_named_after_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alpaca.toml");
        std::fs::write(
            &path,
            "user_prefix = \"### Instruction:\\n\"\nassistant_prefix = \"### Response:\\n\"\n",
        )
        .unwrap();

        let template = load_template(Some(&path)).unwrap();
        assert_eq!(template.name, "alpaca");
        assert_eq!(template.user_prefix, "### Instruction:\n");
        assert!(template.fim_template.is_none());
    }

    #[test]
    fn test_json_template_accepts_camel_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("codellama.json");
        std::fs::write(
            &path,
            r#"{"name":"codellama","fimTemplate":"<PRE> {prefix} <SUF>{suffix} <MID>"}"#,
        )
        .unwrap();

        let template = load_template(Some(&path)).unwrap();
        assert_eq!(template.name, "codellama");
        assert!(template.fim_template.is_some());
    }

    #[test]
    fn test_default_template_is_chatml() {
        assert_eq!(load_template(None).unwrap(), Template::chatml());
    }
}
