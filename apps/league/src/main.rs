//! # League Server
//!
//! The main binary for the weekly league engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  apps/league (THE BINARY)                 │
//! │                                                           │
//! │  ┌─────────┐   ┌──────────────┐   ┌────────────────────┐  │
//! │  │  CLI    │   │   HTTP API   │   │  Weekly scheduler  │  │
//! │  │ (clap)  │   │ (axum + ws)  │   │   (tokio task)     │  │
//! │  └────┬────┘   └──────┬───────┘   └─────────┬──────────┘  │
//! │       └───────────────┼─────────────────────┘             │
//! │                       ▼                                   │
//! │               ┌───────────────┐                           │
//! │               │  league-core  │                           │
//! │               │  (THE LOGIC)  │                           │
//! │               └───────────────┘                           │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! league init
//! league server --host 0.0.0.0 --port 8080
//! league standings --user 42
//! league reset
//! ```

use clap::Parser;
use league::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // LEAGUE_LOG_FORMAT=json enables machine-parseable output
    let log_format = std::env::var("LEAGUE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "league=info,league_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        println!("league v{}", env!("CARGO_PKG_VERSION"));
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!(error = %e, "Command failed");
        std::process::exit(1);
    }
}
