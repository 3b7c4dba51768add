//! imago CLI - ask questions about images.
//!
//! Serves the web UI or answers questions from the terminal.

#![allow(clippy::print_stdout)] // CLI program intentionally uses stdout

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use imago::config::{self, IssueLevel};
use imago::prelude::*;
use imago_server::error::Result;
use imago_server::web;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// imago - conversational question answering over images
#[derive(Parser)]
#[command(name = "imago")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, env = "IMAGO_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web UI
    Serve(ServeArgs),

    /// Ask one question about an image
    Ask(AskArgs),

    /// Ask questions about an image interactively
    Chat(ChatArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Overrides shared by the commands that run the agent
#[derive(Args)]
struct ModelArgs {
    /// Chat model to use (overrides config)
    #[arg(short, long)]
    model: Option<String>,
}

impl ModelArgs {
    fn apply(self, config: &mut AppConfig) {
        if let Some(model) = self.model {
            config.llm.model = model;
        }
    }
}

/// Arguments for the serve command
#[derive(Args)]
struct ServeArgs {
    /// Listen address (overrides config)
    #[arg(short, long)]
    bind: Option<String>,

    #[command(flatten)]
    model: ModelArgs,
}

/// Arguments for the ask command
#[derive(Args)]
struct AskArgs {
    /// Image to ask about (jpg, jpeg or png)
    #[arg(short, long)]
    image: PathBuf,

    /// The question
    #[arg(short, long)]
    question: String,

    #[command(flatten)]
    model: ModelArgs,
}

/// Arguments for the chat command
#[derive(Args)]
struct ChatArgs {
    /// Image to ask about (jpg, jpeg or png)
    #[arg(short, long)]
    image: PathBuf,

    /// Prompt shown before each question
    #[arg(short, long, default_value = "You: ")]
    prompt: String,

    #[command(flatten)]
    model: ModelArgs,
}

/// Arguments for the config command
#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Show configuration file path
    Path,
    /// Validate configuration
    Validate,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with the given verbosity level.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "imago_server={level},imago={level},{}",
            if verbosity >= 2 { "debug" } else { "warn" }
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve(args) => cmd_serve(args, config_path).await,
        Commands::Ask(args) => cmd_ask(args, config_path).await,
        Commands::Chat(args) => cmd_chat(args, config_path).await,
        Commands::Config(args) => cmd_config(args, config_path).await,
    }
}

/// Load config, apply flag overrides and build the question handler.
async fn build_handler(
    config_path: Option<&Path>,
    overrides: impl FnOnce(&mut AppConfig),
) -> Result<(QuestionHandler, AppConfig)> {
    let config = config::load_config_with(config_path, overrides).await?;

    for issue in config.validate() {
        tracing::warn!("{issue}");
    }

    let session = Arc::new(Session::from_config(&config)?);
    let handler = QuestionHandler::new(session).with_temp_dir(config.server.temp_dir.clone());
    Ok((handler, config))
}

/// Read an image from disk and check its type.
async fn read_upload(path: &Path) -> Result<ImageUpload> {
    let upload = ImageUpload::from_path(path).await?;
    upload.validate()?;
    Ok(upload)
}

/// Start the web UI.
async fn cmd_serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let ServeArgs { bind, model } = args;
    let (handler, config) = build_handler(config_path, |config| {
        model.apply(config);
        if let Some(bind) = bind {
            config.server.bind = bind;
        }
    })
    .await?;

    println!("Serving on http://{}. Press Ctrl+C to stop.", config.server.bind);
    web::serve(handler, &config.server).await
}

/// Answer a single question.
async fn cmd_ask(args: AskArgs, config_path: Option<&Path>) -> Result<()> {
    let upload = read_upload(&args.image).await?;
    let (handler, _) = build_handler(config_path, |config| args.model.apply(config)).await?;

    match handler.handle(&upload, &args.question).await? {
        Some(answer) => {
            tracing::debug!("{}", answer.run.summary());
            println!("{}", answer.text);
        }
        None => tracing::warn!("Empty question, nothing to ask"),
    }
    Ok(())
}

/// Interactive questions about one image.
async fn cmd_chat(args: ChatArgs, config_path: Option<&Path>) -> Result<()> {
    let upload = read_upload(&args.image).await?;
    let (handler, _) = build_handler(config_path, |config| args.model.apply(config)).await?;

    println!("Asking about {} | type 'exit' to quit\n", args.image.display());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", args.prompt);
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }

        match handler.handle(&upload, &line).await {
            Ok(Some(answer)) => println!("{}\n", answer.text),
            Ok(None) => {}
            Err(e) => tracing::error!("{e}"),
        }
    }

    Ok(())
}

/// Configuration management.
async fn cmd_config(args: ConfigArgs, config_path: Option<&Path>) -> Result<()> {
    let config_file = config_path.map_or_else(config::config_path, Path::to_path_buf);

    match args.command {
        ConfigCommands::Path => {
            println!("{}", config_file.display());
        }
        ConfigCommands::Show => {
            let config = config::load_config(config_path).await?;
            print!("{}", config.to_toml()?);
        }
        ConfigCommands::Validate => {
            let config = config::load_config_from(&config_file).await?.with_env();
            let issues = config.validate();
            for issue in &issues {
                println!("{issue}");
            }
            if issues.iter().any(|i| i.level == IssueLevel::Error) {
                return Err(imago::Error::config("configuration has errors").into());
            }
            println!("Configuration is valid");
        }
        ConfigCommands::Init { force } => {
            if config_file.exists() && !force {
                println!("Configuration already exists at: {}", config_file.display());
                println!("Use --force to overwrite.");
                return Ok(());
            }
            config::save_config_to(&AppConfig::default(), &config_file).await?;
            println!("Configuration created: {}", config_file.display());
            println!();
            println!("Next steps:");
            println!("  1. export OPENAI_API_KEY=<key>");
            println!("  2. imago serve");
        }
    }

    Ok(())
}
