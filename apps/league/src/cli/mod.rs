//! # League CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server and weekly scheduler
//! - `status` - Show league metrics
//! - `init` - Create a database and seed the tier catalog
//! - `reset` - Run the weekly reset now
//! - `standings` - Show one user's standings
//! - `dump` - Write every user's status to a JSON file

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use league_core::LeagueError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Weekly league server.
///
/// Users compete in cohorts of 30 inside ordered tiers; every Monday the
/// top of each cohort moves up and the bottom moves down.
#[derive(Parser, Debug)]
#[command(name = "league")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the league database
    #[arg(short = 'D', long, global = true, default_value = "league.redb")]
    pub database: PathBuf,

    /// Storage backend
    #[arg(short = 'B', long, global = true, value_enum, default_value_t = Backend::Redb)]
    pub backend: Backend,

    /// Path to the TOML configuration (defaults apply if it does not exist)
    #[arg(short, long, global = true, default_value = "league.toml")]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// redb database file (ACID, persistent)
    Redb,
    /// In-memory store (volatile)
    Memory,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Redb => "redb",
            Backend::Memory => "memory",
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show league metrics
    Status,

    /// Initialize a new database and seed the tier catalog
    Init {
        /// Overwrite an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Run the weekly reset for the boundary that just passed
    Reset,

    /// Show a user's standings
    Standings {
        /// User id
        #[arg(short, long)]
        user: u64,
    },

    /// Write the status of every user as JSON
    Dump {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), LeagueError> {
    let ctx = Context {
        database: cli.database,
        backend: cli.backend,
        config: cli.config,
        json_mode: cli.json_mode,
    };

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&ctx, &host, port).await,
        Some(Commands::Status) | None => cmd_status(&ctx),
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Reset) => cmd_reset(&ctx),
        Some(Commands::Standings { user }) => cmd_standings(&ctx, user),
        Some(Commands::Dump { output }) => cmd_dump(&ctx, &output),
    }
}
