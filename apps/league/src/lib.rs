//! # league
//!
//! The league server - THE BINARY's library half.
//!
//! Exposes the HTTP API, the live leaderboard registry, the weekly
//! scheduler, configuration and CLI so integration tests can drive them
//! without spawning a process.

pub mod api;
pub mod cli;
pub mod config;
pub mod live;
pub mod scheduler;
