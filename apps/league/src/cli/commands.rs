//! # CLI Command Implementations

use super::Backend;
use crate::api::{self, StandingsResponse, StatusResponse};
use crate::config::LeagueConfig;
use chrono::Utc;
use league_core::{LeagueError, Session, UserId};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Global options shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub database: PathBuf,
    pub backend: Backend,
    pub config: PathBuf,
    pub json_mode: bool,
}

impl Context {
    fn load_config(&self) -> Result<LeagueConfig, LeagueError> {
        LeagueConfig::load(Some(&self.config))
    }
}

fn print_json(value: &impl Serialize) -> Result<(), LeagueError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| LeagueError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

/// Validate an output path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, LeagueError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        LeagueError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;
    if !canonical_parent.is_dir() {
        return Err(LeagueError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| LeagueError::IoError("Output path has no filename".to_string()))?;
    Ok(canonical_parent.join(filename))
}

// =============================================================================
// SESSION LOADING
// =============================================================================

/// Open the configured backend and seed the tier catalog if it is empty.
pub fn load_session(ctx: &Context, config: &LeagueConfig) -> Result<Session, LeagueError> {
    let mut session = match ctx.backend {
        Backend::Redb => Session::with_redb(&ctx.database)?,
        Backend::Memory => Session::new(),
    };
    let seeded = session.seed_tiers(&config.tiers())?;
    if seeded > 0 {
        tracing::info!(tiers = seeded, "Seeded tier catalog from configuration");
    }
    Ok(session)
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(ctx: &Context, host: &str, port: u16) -> Result<(), LeagueError> {
    let config = ctx.load_config()?;
    let session = load_session(ctx, &config)?;

    println!("League Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:      {}", host);
    println!("  Port:      {}", port);
    println!("  Backend:   {}", ctx.backend.as_str());
    println!("  Database:  {}", ctx.database.display());
    println!("  Leagues:   {}", config.tiers.len());
    println!(
        "  Scheduler: {}",
        if config.scheduler.enabled { "on" } else { "off" }
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, session, &config).await
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show league metrics.
pub fn cmd_status(ctx: &Context) -> Result<(), LeagueError> {
    let config = ctx.load_config()?;
    let session = load_session(ctx, &config)?;
    let metrics = session.metrics(Utc::now())?;
    let status = StatusResponse::from(&metrics);

    if ctx.json_mode {
        return print_json(&status);
    }

    println!("League Status");
    println!("=============");
    println!("Database: {}", ctx.database.display());
    println!("Backend:  {}", ctx.backend.as_str());
    println!();
    println!("Leagues:          {}", status.league_count);
    println!("Users:            {}", status.user_count);
    println!("  active:         {}", status.active_users);
    println!("  locked out:     {}", status.locked_out_users);
    println!("Current cycle:    {}", status.current_cycle);
    println!("Cohorts:          {}", status.current_cohorts);
    println!("Placements:       {}", status.current_placements);
    println!("Fill:             {} per thousand", status.fill_per_thousand);
    println!(
        "Last reset:       {}",
        status.last_reset.as_deref().unwrap_or("never")
    );

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create a fresh database and seed it.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), LeagueError> {
    if ctx.backend == Backend::Memory {
        return Err(LeagueError::Config(
            "init requires the redb backend".to_string(),
        ));
    }
    if ctx.database.exists() {
        if !force {
            return Err(LeagueError::Config(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(&ctx.database)
            .map_err(|e| LeagueError::IoError(format!("Remove old database: {}", e)))?;
    }

    let config = ctx.load_config()?;
    let session = load_session(ctx, &config)?;
    let catalog = session.catalog()?;

    println!(
        "Initialized league database at {} with {} leagues",
        ctx.database.display(),
        catalog.len()
    );
    Ok(())
}

// =============================================================================
// RESET COMMAND
// =============================================================================

/// Run the weekly reset. Unlike the scheduler, failures are reported.
pub fn cmd_reset(ctx: &Context) -> Result<(), LeagueError> {
    let config = ctx.load_config()?;
    let mut session = load_session(ctx, &config)?;
    let report = session.run_reset(Utc::now())?;

    if ctx.json_mode {
        return print_json(&report);
    }

    println!("Reset of cycle {} complete", report.closing_cycle);
    println!("  Cohorts closed:  {}", report.cohorts_closed);
    println!("  Members:         {}", report.members_processed);
    println!("  Promoted:        {}", report.promoted);
    println!("  Retained:        {}", report.retained);
    println!("  Demoted:         {}", report.demoted);
    println!("  Rewarded:        {}", report.rewarded);
    println!("  Locked out:      {}", report.locked_out);
    println!("  Readmitted:      {}", report.readmitted);
    println!("  Cohorts opened:  {}", report.cohorts_opened);
    Ok(())
}

// =============================================================================
// STANDINGS COMMAND
// =============================================================================

/// Show one user's standings.
pub fn cmd_standings(ctx: &Context, user: u64) -> Result<(), LeagueError> {
    let config = ctx.load_config()?;
    let mut session = load_session(ctx, &config)?;
    let now = Utc::now();
    let standings = session.standings(UserId(user), now)?;
    let response = StandingsResponse::new(&standings, now);

    if ctx.json_mode {
        return print_json(&response);
    }

    if response.locked_out {
        println!("User {} is not in a league this week", user);
        return Ok(());
    }

    println!("League:    {}", response.current_league);
    println!("Countdown: {}s", response.countdown_seconds);
    if response.outcome.finished_rank > 0 {
        println!(
            "Last week: #{} in {} -> {}",
            response.outcome.finished_rank,
            response.outcome.old_league,
            if response.outcome.new_league.is_empty() {
                "locked out"
            } else {
                response.outcome.new_league.as_str()
            }
        );
    }
    println!();
    for row in &response.leaderboard {
        let marker = if row.user_id == user { "*" } else { " " };
        println!(
            "{}{:>3}  {:<24} {:>8}",
            marker, row.rank, row.username, row.exp_earned
        );
    }
    Ok(())
}

// =============================================================================
// DUMP COMMAND
// =============================================================================

/// Write every user's status to `output` as pretty JSON.
pub fn cmd_dump(ctx: &Context, output: &Path) -> Result<(), LeagueError> {
    let path = validate_output_path(output)?;
    let config = ctx.load_config()?;
    let session = load_session(ctx, &config)?;
    let rows = session.status_rows(Utc::now())?;

    let text = serde_json::to_string_pretty(&rows)
        .map_err(|e| LeagueError::SerializationError(e.to_string()))?;
    std::fs::write(&path, text)
        .map_err(|e| LeagueError::IoError(format!("Write {}: {}", path.display(), e)))?;

    tracing::info!(users = rows.len(), path = %path.display(), "Status dump written");
    if !ctx.json_mode {
        println!("Wrote {} users to {}", rows.len(), path.display());
    }
    Ok(())
}
