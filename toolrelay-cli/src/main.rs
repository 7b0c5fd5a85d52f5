mod builtin;
mod cli;
mod repl;

use clap::Parser;
use cli::Cli;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use toolrelay_core::config::{ConfigError, ServerConfig, load_config};
use toolrelay_core::tooling::{ServerManager, ToolRegistry};
use toolrelay_core::{
    Agent, AgentOptions, AppConfig, Conversation, DynamicModelProvider, TranscriptPolicy,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "toolrelay failed to start");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    info!("Starting toolrelay");
    debug!(
        config = ?cli.config,
        provider = ?cli.provider,
        model = ?cli.model,
        "CLI arguments parsed"
    );

    let mut config = load_config(cli.config.as_deref())?;
    apply_cli_overrides(&cli, &mut config)?;

    let models = DynamicModelProvider::from_configs(&config.providers);

    let mut registry = ToolRegistry::new(config.registry.collision);
    if config.builtin_tools {
        registry.register(Arc::new(builtin::provider())).await?;
    }
    let manager = ServerManager::new(config.servers.clone());
    let skipped = manager.register_all(&mut registry).await?;
    if !skipped.is_empty() {
        warn!(servers = ?skipped, "Some tool servers are unavailable");
    }
    info!(
        tools = registry.len(),
        providers = registry.providers().len(),
        "Tool registry ready"
    );

    let registry = Arc::new(registry);
    let agent = Arc::new(Agent::new(Arc::new(models), AgentOptions::from_config(&config)));
    let policy = TranscriptPolicy::from(config.transcript);
    let conversation = match cli.session {
        Some(id) => Conversation::with_id(id, agent, Arc::clone(&registry), policy),
        None => Conversation::new(agent, Arc::clone(&registry), policy),
    };

    let result = repl::run(conversation).await;
    registry.shutdown().await;
    result?;
    Ok(())
}

fn apply_cli_overrides(cli: &Cli, config: &mut AppConfig) -> Result<(), ConfigError> {
    if let Some(provider) = &cli.provider {
        info!(provider = %provider, "Overriding default provider from CLI flag");
        config.default_provider = provider.clone();
    }
    if let Some(model) = &cli.model {
        info!(model = %model, "Overriding model from CLI flag");
        config.model = model.clone();
    }
    if let Some(system) = &cli.system {
        config.system_prompt = Some(system.clone());
    }

    let default_provider = config.default_provider.clone();
    let model = config.model.clone();
    let provider = config
        .providers
        .iter_mut()
        .find(|provider| provider.id == default_provider)
        .ok_or(ConfigError::ProviderNotFound {
            provider: default_provider,
        })?;
    provider.ensure_model(&model);

    if let Some(url) = &cli.mcp_url {
        if config.servers.iter().any(|server| server.name == "remote") {
            return Err(ConfigError::DuplicateServer {
                server: "remote".to_string(),
            });
        }
        config
            .servers
            .push(ServerConfig::http("remote", url.clone()).mandatory());
    }
    Ok(())
}

/// Logs go to stderr so the conversation on stdout stays readable.
fn init_tracing(quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("off")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}
