use std::sync::Arc;

use clap::{Parser, Subcommand};

use rentbot_core::{
    config::{self, Config},
    model::client::CompletionClient,
};
use rentbot_openai::OpenAiClient;

mod doctor;

/// Telegram rental-group bot: forwards DMs to the owner, chats through GPT on
/// request, and watches groups for keywords.
#[derive(Parser, Debug)]
#[command(name = "rentbot", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Start long polling (default).
    Run,
    /// Validate configuration and probe Telegram / OpenAI connectivity.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::load_env_file();
    rentbot_core::logging::init("rentbot")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run().await,
        Command::Check => check().await,
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration; see .env.example");
            return Err(e.into());
        }
    };
    tracing::debug!(config = ?cfg, "configuration loaded");

    let completion: Option<Arc<dyn CompletionClient>> = match OpenAiClient::from_config(&cfg)? {
        Some(client) => Some(Arc::new(client) as Arc<dyn CompletionClient>),
        None => {
            tracing::warn!("OPENAI_API_KEY not set; chat mode and group summaries are disabled");
            None
        }
    };

    rentbot_telegram::router::run_polling(cfg, completion).await
}

async fn check() -> anyhow::Result<()> {
    println!("rentbot {}", env!("CARGO_PKG_VERSION"));
    let findings = doctor::run_checks().await;
    for f in &findings {
        println!("{}", f.render());
    }
    if findings.iter().all(doctor::Finding::is_ok) {
        Ok(())
    } else {
        anyhow::bail!("{} check(s) failed", findings.iter().filter(|f| !f.is_ok()).count())
    }
}
