//! Print-mode CLI: streams one query's provider messages to stdout.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use glint::types::{AssistantEvent, ResultEvent};
use glint::{ExecuteOptions, GlintProvider, ProviderConfig, ProviderMessage, DEFAULT_MODEL};

#[derive(Parser)]
#[command(name = "glint", version, about = "Sandboxed GLM coding agent")]
struct Cli {
    /// The prompt to send.
    prompt: String,

    /// Model to query.
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Working directory for tool execution.
    #[arg(short = 'C', long = "directory", default_value = ".")]
    directory: PathBuf,

    /// API key; falls back to the GLM_API_KEY environment variable.
    #[arg(long, env = "GLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Maximum model turns before aborting.
    #[arg(long)]
    max_turns: Option<usize>,

    /// Show reasoning deltas and tool output.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "glint=debug" } else { "glint=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ProviderConfig::new(cli.api_key.map(|key| SecretString::new(key.into())));
    let report = config.validate();
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    if !report.valid {
        bail!(report.errors.join("; "));
    }

    let working_dir = cli
        .directory
        .canonicalize()
        .with_context(|| format!("invalid working directory {}", cli.directory.display()))?;

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_cancel.cancel();
        }
    });

    let mut options =
        ExecuteOptions::new(cli.prompt, cli.model, working_dir).with_cancel(cancel);
    if let Some(max_turns) = cli.max_turns {
        options.max_turns = max_turns;
    }

    let provider = GlintProvider::new(config);
    let mut messages = provider.execute_query(options);

    let mut stdout = std::io::stdout();
    while let Some(message) = messages.recv().await {
        match message {
            ProviderMessage::Assistant { event, .. } => match event {
                AssistantEvent::TextDelta { text } => {
                    write!(stdout, "{text}")?;
                    stdout.flush()?;
                }
                AssistantEvent::ReasoningDelta { text } => {
                    if cli.debug {
                        eprint!("{text}");
                    }
                }
                AssistantEvent::ToolUse { name, arguments, .. } => {
                    eprintln!("\n[tool] {name} {arguments}");
                }
            },
            ProviderMessage::Result { event, .. } => match event {
                ResultEvent::ToolOutput { output, .. } => {
                    if cli.debug {
                        eprintln!("[tool output] {output}");
                    }
                }
                ResultEvent::Completed { .. } => {
                    writeln!(stdout)?;
                }
            },
            ProviderMessage::Error {
                message, terminal, ..
            } => {
                if terminal {
                    bail!(message);
                }
                eprintln!("[tool error] {message}");
            }
        }
    }

    Ok(())
}
