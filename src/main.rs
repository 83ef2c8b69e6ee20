//! aio-chat - multi-conversation chat client
//!
#![doc = "aio-chat - multi-conversation chat client"]
#![doc = "Main entry point for the aio-chat application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aio_chat::cli::{Cli, Commands};
use aio_chat::commands;
use aio_chat::config::Config;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        tracing::debug!("Command failed: {:?}", e);
        eprintln!("{}", commands::describe_error(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    let config = Config::load(cli.config_path(), &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chats { command } => {
            tracing::debug!("Running chats command: {:?}", command);
            commands::chats::handle_chats(&config, command)
        }
        Commands::Send { text, model, roles } => {
            if let Some(m) = &model {
                tracing::debug!("Using model override: {}", m);
            }
            commands::send::run_send(&config, text, model, roles).await
        }
        Commands::Chat { model, roles } => {
            if let Some(m) = &model {
                tracing::debug!("Using model override: {}", m);
            }
            commands::chat::run_chat(&config, model, roles).await
        }
        Commands::Serve { bind } => commands::serve::run_serve(&config, bind).await,
        Commands::Check => commands::check::run_check(&config).await,
    }
}

/// Install the tracing subscriber
///
/// Logs go to stderr so streamed replies on stdout stay clean.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "aio_chat=debug"
    } else {
        "aio_chat=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
