use clap::Parser;
use dermoai_client::cli::{AppContext, Cli, handle_command};
use dermoai_client::logger::setup_logging;
use dermoai_client::{ApiClient, KeyringTokenStore, MemoryTokenStore, TokenStore, load_config};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {}", e);
        std::process::exit(1);
    });
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // Keep the guard alive so buffered log lines are flushed on exit
    let _guard = setup_logging(&config).unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });

    tracing::debug!("Using backend at {}", config.api.base_url);

    let tokens: Arc<dyn TokenStore> = if cli.no_keyring {
        Arc::new(MemoryTokenStore::new())
    } else if config.storage.use_keyring {
        Arc::new(KeyringTokenStore::new(config.storage.token_file_path()))
    } else {
        Arc::new(KeyringTokenStore::file_only(config.storage.token_file_path()))
    };

    let client = ApiClient::from_config(&config.api, tokens.clone()).unwrap_or_else(|e| {
        eprintln!("Failed to create HTTP client: {}", e);
        std::process::exit(1);
    });

    let ctx = AppContext {
        config,
        client: Arc::new(client),
        tokens,
    };

    if let Err(e) = handle_command(cli.command, &ctx).await {
        tracing::error!("Command failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
