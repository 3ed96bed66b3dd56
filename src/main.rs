// Chat relay - main entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::{Arc, Mutex};

use chatrelay::config::{load_config, Config};
use chatrelay::providers::HttpProviderClient;
use chatrelay::server::{RelayServer, ServerConfig};
use chatrelay::store::JsonFileStore;
use chatrelay::{DispatchRequest, Dispatcher};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "chatrelay")]
#[command(about = "Multi-provider LLM chat relay", version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Register the built-in provider templates that are not present yet
    Seed,
    /// Send one message through a provider and print the reply
    Send {
        #[arg(long)]
        conversation: String,
        /// Provider name, e.g. "openai"
        #[arg(long)]
        provider: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        user: String,
        /// Message text
        text: String,
    },
    /// Print the messages of a conversation
    History {
        conversation: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config()?;

    init_tracing(&config)?;

    match args.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => run_server(config, bind).await,
        Command::Seed => {
            let dispatcher = build_dispatcher(&config)?;
            let added = dispatcher.catalog().seed_defaults()?;
            println!("Seeded {} provider template(s)", added);
            Ok(())
        }
        Command::Send {
            conversation,
            provider,
            model,
            user,
            text,
        } => {
            let dispatcher = build_dispatcher(&config)?;
            let request = DispatchRequest::new(conversation, text, provider, model, user);
            request.validate()?;
            let reply = dispatcher.dispatch(&request).await?;
            println!("{}", reply);
            Ok(())
        }
        Command::History { conversation } => {
            let dispatcher = build_dispatcher(&config)?;
            for message in dispatcher.conversations().messages(&conversation)? {
                println!("[{}] {}", message.role, message.content);
            }
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    // Default: INFO level, override with RUST_LOG
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let file_layer = match &config.log_file {
        Some(path) => {
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(log_file))
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    // Bridge log crate → tracing
    tracing_log::LogTracer::init().ok();
    Ok(())
}

fn build_dispatcher(config: &Config) -> Result<Dispatcher> {
    let store = JsonFileStore::open(&config.data_dir)
        .with_context(|| format!("Failed to open data dir: {}", config.data_dir.display()))?;
    let client = HttpProviderClient::new(config.request_timeout())?;

    Ok(Dispatcher::new(Arc::new(store), Arc::new(client)).with_template_mode(config.template_mode))
}

async fn run_server(config: Config, bind: Option<String>) -> Result<()> {
    let dispatcher = build_dispatcher(&config)?;

    let mut server_config = ServerConfig::from(&config);
    if let Some(bind) = bind {
        server_config.bind_address = bind;
    }

    tracing::info!(
        data_dir = %config.data_dir.display(),
        template_mode = ?config.template_mode,
        "Configuration loaded"
    );

    RelayServer::new(dispatcher, server_config).serve().await
}
