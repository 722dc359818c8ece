//! Warden: user-account maintenance daemon.
//!
//! Subcommands:
//! - `daemon`: subscribe to the platform invocation stream and dispatch the
//!   registered handlers
//! - `reset-now`: run the daily view-counter reset once and exit

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden::daemon::{self, DaemonConfig};
use warden::handlers;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "User-account maintenance daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the invocation loop (scheduled resets, block watching)
    Daemon {
        /// Document store API base URL
        #[arg(long, env = "WARDEN_STORE_URL")]
        store_url: String,

        /// Invocation stream base URL
        #[arg(long, env = "WARDEN_STREAM_URL")]
        stream_url: String,

        /// Admin key for the store and the stream
        #[arg(long, env = "WARDEN_API_KEY")]
        api_key: String,
    },

    /// Run the daily view-counter reset once and exit
    ResetNow {
        /// Document store API base URL
        #[arg(long, env = "WARDEN_STORE_URL")]
        store_url: String,

        /// Admin key for the store
        #[arg(long, env = "WARDEN_API_KEY")]
        api_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warden=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            store_url,
            stream_url,
            api_key,
        } => {
            daemon::run(DaemonConfig {
                store_url,
                stream_url,
                admin_key: api_key,
            })
            .await
        }

        Commands::ResetNow { store_url, api_key } => {
            let store = warden_store::StoreClient::new(&store_url, &api_key);
            handlers::daily_reset::run(&store).await.into_diagnostic()
        }
    }
}
