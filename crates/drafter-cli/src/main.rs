use anyhow::Result;
use clap::{Parser, Subcommand};
use drafter_infrastructure::ConfigService;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "drafter")]
#[command(about = "Drafter CLI - prompt tooling and streaming generation for long-form drafts", long_about = None)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a draft's placeholder markers resolve
    Plan {
        /// Draft file, or `-` for stdin
        input: PathBuf,
    },
    /// Split a draft into role messages using a template
    Messages {
        input: PathBuf,
        /// Template file (TOML or JSON); defaults to ChatML
        #[arg(long)]
        template: Option<PathBuf>,
    },
    /// Render the fill-in-the-middle prompt for a `{fill}` draft
    Fim {
        input: PathBuf,
        #[arg(long)]
        template: Option<PathBuf>,
    },
    /// Find, and optionally replace, text in a draft
    Search {
        input: PathBuf,
        query: String,
        #[arg(long)]
        regex: bool,
        #[arg(long)]
        match_case: bool,
        /// Replace every match and print the result
        #[arg(long)]
        replace: Option<String>,
    },
    /// Stream a generation for a draft and print the resulting text
    Generate {
        input: PathBuf,
        /// Model name; overrides the config file
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        template: Option<PathBuf>,
        /// Split the draft into role messages with the template
        #[arg(long)]
        chat: bool,
        /// Write the result back to the input file
        #[arg(long)]
        in_place: bool,
    },
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file path
    Path,
    /// Print the effective configuration
    Show,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_service = match cli.config {
        Some(path) => ConfigService::with_path(path),
        None => ConfigService::new()?,
    };
    let config = config_service.get_config()?;
    init_logging(&config.logging.level);
    tracing::debug!("[Bootstrap] Config loaded from {}", config_service.path().display());

    match cli.command {
        Commands::Plan { input } => commands::prompt::plan(&input)?,
        Commands::Messages { input, template } => {
            commands::prompt::messages(&input, template.as_deref())?
        }
        Commands::Fim { input, template } => commands::prompt::fim(&input, template.as_deref())?,
        Commands::Search {
            input,
            query,
            regex,
            match_case,
            replace,
        } => commands::search::run(
            &input,
            commands::search::SearchArgs {
                query,
                regex,
                match_case,
                replace,
                max_matches: config.search.max_matches,
            },
        )?,
        Commands::Generate {
            input,
            model,
            template,
            chat,
            in_place,
        } => {
            commands::generate::run(
                &config,
                commands::generate::GenerateArgs {
                    input,
                    model,
                    template,
                    chat,
                    in_place,
                },
            )
            .await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Path => println!("{}", config_service.path().display()),
            ConfigAction::Show => print!("{}", toml::to_string_pretty(&config)?),
        },
    }

    Ok(())
}
