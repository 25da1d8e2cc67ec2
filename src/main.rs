//! Property Agent - CLI Entry Point
//!
//! Answers a single prompt, or runs the requirements workflow when no prompt
//! is given.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use property_agent::{
    agent::Agent,
    config::Config,
    workflow::{run_requirements_workflow, WorkflowOptions},
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "property-agent", version, about = "Query the property management API through a tool-calling agent")]
struct Cli {
    /// Prompt to send to the agent; read from stdin when piped
    prompt: Option<String>,

    /// Override the chat model
    #[arg(long)]
    model: Option<String>,

    /// Maximum model turns per run
    #[arg(long)]
    max_turns: Option<usize>,

    /// Requirements file used when no prompt is given
    #[arg(long, default_value = "requirements/property_group_requirements.json")]
    requirements_path: PathBuf,

    /// Property group to audit; falls back to the requirements default
    #[arg(long)]
    property_group_id: Option<i64>,

    /// Directory for per-group result files
    #[arg(long, default_value = "outputs")]
    output_dir: PathBuf,

    /// Only run these requirement groups (repeatable)
    #[arg(long = "group")]
    groups: Vec<String>,
}

fn read_prompt(cli_prompt: Option<String>) -> anyhow::Result<Option<String>> {
    if let Some(prompt) = cli_prompt {
        return Ok(Some(prompt));
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .context("Failed to read prompt from stdin")?;
    let trimmed = buffer.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "property_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    let mut agent = Agent::from_config(&config)?;
    if let Some(model) = &cli.model {
        agent = agent.with_model(model);
    }
    if let Some(max_turns) = cli.max_turns {
        agent = agent.with_max_turns(max_turns);
    }
    info!("Loaded configuration: model={}", agent.model());

    match read_prompt(cli.prompt)? {
        Some(prompt) => {
            let result = agent.run(&prompt).await?;
            println!("{}", result.reply);
        }
        None => {
            let options = WorkflowOptions {
                requirements_path: cli.requirements_path,
                property_group_id: cli.property_group_id,
                output_dir: cli.output_dir,
                group_filters: cli.groups,
            };
            let written = run_requirements_workflow(&agent, &options).await?;
            for path in written {
                println!("Saved {}", path.display());
            }
        }
    }

    Ok(())
}
