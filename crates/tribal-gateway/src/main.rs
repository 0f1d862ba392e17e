use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};

mod app;
mod eviction;

#[derive(Parser)]
#[command(name = "tribal-gateway")]
#[command(author, version, about = "Slack database-assistant bot gateway", long_about = None)]
struct Cli {
    /// Path to tribal.toml. Defaults to `$TRIBAL_CONFIG` or `~/.tribal/tribal.toml`.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load config, start the event dispatcher, and run until signalled to stop.
    Run,
    /// Load and validate config without connecting to Slack, MCP, or the LLM back-ends.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(|| std::env::var("TRIBAL_CONFIG").ok());
    let config = tribal_core::config::TribalConfig::load(config_path.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())))
        .init();

    match cli.command {
        Commands::CheckConfig => {
            info!(
                slack_bot_token_set = !config.slack.bot_token.is_empty(),
                mcp_synth_url = %config.mcp.synth_url,
                mcp_postgres_url = %config.mcp.postgres_url,
                llm_primary_model = %config.llm.primary_model,
                llm_fallback_model = %config.llm.fallback_model,
                cache_enabled = config.cache.enabled,
                "config loaded successfully"
            );
            println!("config OK");
            Ok(())
        }
        Commands::Run => run(config).await,
    }
}

async fn run(config: tribal_core::config::TribalConfig) -> anyhow::Result<()> {
    info!("starting tribal gateway");

    let state = app::build_dispatcher_state(&config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let context_task = tokio::spawn(eviction::run_context_eviction(state.contexts.clone(), shutdown_rx.clone()));
    let cache_task = state.cache.clone().map(|cache| tokio::spawn(eviction::run_cache_eviction(cache, shutdown_rx.clone())));

    let client = state.client.clone();
    let app_token = slack_morphism::prelude::SlackApiToken::new(slack_morphism::prelude::SlackApiTokenValue(config.slack.app_token.clone()));
    let socket_state = state.clone();

    let listener = tokio::spawn(async move { tribal_slack::socket::run(client, app_token, socket_state).await });

    tokio::select! {
        result = listener => {
            match result {
                Ok(Ok(())) => info!("socket-mode listener stopped"),
                Ok(Err(e)) => error!(error = %e, "socket-mode listener failed"),
                Err(e) => error!(error = %e, "socket-mode listener task panicked"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = context_task.await;
    if let Some(cache_task) = cache_task {
        let _ = cache_task.await;
    }

    info!("tribal gateway shut down cleanly");
    Ok(())
}
