use super::utils::{load_template, read_input};
use anyhow::{Result, bail};
use drafter_core::plan::{GenerationMode, resolve_plan};
use drafter_core::template::{build_fim_prompt, extract_messages};
use serde_json::json;
use std::path::Path;

pub fn plan(input: &Path) -> Result<()> {
    let text = read_input(input)?;
    let plan = resolve_plan(&text);
    let output = json!({
        "mode": plan.mode,
        "prefix": plan.prefix,
        "suffix": plan.suffix,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn messages(input: &Path, template: Option<&Path>) -> Result<()> {
    let text = read_input(input)?;
    let template = load_template(template)?;
    let extraction = extract_messages(&text, &template);

    if extraction.used_fallback {
        eprintln!(
            "No '{}' turns found; sending the whole draft as one user message.",
            template.name
        );
    }
    for span in &extraction.discarded {
        eprintln!("Discarded text outside any turn: {span:?}");
    }
    println!("{}", serde_json::to_string_pretty(&extraction.messages)?);
    Ok(())
}

pub fn fim(input: &Path, template: Option<&Path>) -> Result<()> {
    let text = read_input(input)?;
    let plan = resolve_plan(&text);
    if plan.mode != GenerationMode::Fill {
        bail!("Draft has no {{fill}} marker");
    }

    let template = load_template(template)?;
    let prompt = build_fim_prompt(Some(&template), &plan.prefix, &plan.suffix);
    if prompt.used_fallback {
        eprintln!(
            "Template '{}' has no usable FIM format; using the generic fill prompt.",
            template.name
        );
    }
    println!("{}", prompt.prompt);
    Ok(())
}
