use super::utils::{load_template, read_input};
use anyhow::{Context, Result};
use drafter_core::config::DrafterConfig;
use drafter_core::generation::{
    GenerationBackend, GenerationRequest, SamplingParams, build_messages,
};
use drafter_core::plan::resolve_plan;
use drafter_core::session::GenerationSettings;
use drafter_interaction::OpenAIStreamBackend;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub struct GenerateArgs {
    pub input: PathBuf,
    pub model: Option<String>,
    pub template: Option<PathBuf>,
    pub chat: bool,
    pub in_place: bool,
}

pub async fn run(config: &DrafterConfig, args: GenerateArgs) -> Result<()> {
    let text = read_input(&args.input)?;
    let model = args
        .model
        .or_else(|| config.generation.model.clone())
        .filter(|m| !m.trim().is_empty())
        .context("No model configured; pass --model or set generation.model")?;
    let template = match &args.template {
        Some(path) => Some(load_template(Some(path))?),
        None => None,
    };

    let plan = resolve_plan(&text);
    let prompt = build_messages(&plan, args.chat, template.as_ref());
    if prompt.fim_fallback {
        tracing::warn!("No usable FIM format; using the generic fill prompt");
    }

    let backend = OpenAIStreamBackend::from_config(&config.generation)?;
    let request = GenerationRequest {
        model,
        messages: prompt.messages,
        params: SamplingParams::from(&GenerationSettings::default()),
        system_prompt: config.generation.system_prompt.clone(),
    };
    tracing::info!(
        "Generating {:?} with {} message(s) via {}",
        plan.mode,
        request.messages.len(),
        backend.endpoint()
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let mut stream = backend.stream(request, cancel.clone()).await?;
    let mut generated = String::new();
    let mut stdout = std::io::stdout();
    while let Some(item) = stream.next().await {
        match item {
            Ok(token) => {
                if !args.in_place {
                    print!("{token}");
                    stdout.flush()?;
                }
                generated.push_str(&token);
            }
            Err(e) if e.is_aborted() => {
                tracing::info!("Generation cancelled");
                break;
            }
            Err(e) if generated.is_empty() => return Err(e.into()),
            Err(e) => {
                tracing::warn!("Generation stopped early: {}", e);
                break;
            }
        }
    }

    if args.in_place {
        if generated.is_empty() {
            tracing::info!("Nothing generated; {} left unchanged", args.input.display());
        } else {
            std::fs::write(&args.input, plan.compose(&generated))
                .with_context(|| format!("Failed to write {}", args.input.display()))?;
        }
    } else {
        println!();
    }
    Ok(())
}
