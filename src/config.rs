//! Configuration and CLI argument handling

use std::{path::PathBuf, sync::Arc, time::Duration};
use clap::{Args, Parser, Subcommand};

use crate::{
    persistence::{LocalBlobStore, RemoteStore, RetryPolicy, TimerPersistence},
    state::{FinishPolicy, StoreConfig, DEFAULT_REMOTE_TICK_GUARD},
    tasks::{CONTROL_POLL_INTERVAL, PROJECTION_POLL_INTERVAL},
};

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "countdown-board")]
#[command(about = "Shared countdown timers with control and projection surfaces")]
#[command(version)]
pub struct Config {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// What a running timer does at zero
    #[arg(long, global = true, value_enum, default_value = "strict")]
    pub finish_policy: FinishPolicy,

    /// Directory holding the local timer blob
    #[arg(long, global = true, default_value = "./data")]
    pub data_dir: PathBuf,

    /// Base URL of a host instance to use as remote storage
    #[arg(long, global = true)]
    pub remote: Option<String>,

    /// Attempts per persistence call, including the first
    #[arg(long, global = true, default_value = "3")]
    pub retry_attempts: u32,

    /// Delay before the first retry in milliseconds (doubles per attempt)
    #[arg(long, global = true, default_value = "100")]
    pub retry_base_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Host the timer store with its HTTP control and projection surfaces
    Serve(ServeArgs),
    /// Follow the timers read-only and print the projection
    Project(ProjectArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Refresh poll interval in milliseconds
    #[arg(long, default_value_t = CONTROL_POLL_INTERVAL.as_millis() as u64)]
    pub poll_ms: u64,

    /// Skip local ticks this long after a remote change (remote storage only)
    #[arg(long, default_value_t = DEFAULT_REMOTE_TICK_GUARD.as_millis() as u64)]
    pub remote_tick_guard_ms: u64,
}

impl ServeArgs {
    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Refresh poll interval in milliseconds
    #[arg(long, default_value_t = PROJECTION_POLL_INTERVAL.as_millis() as u64)]
    pub poll_ms: u64,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Refresh cadence of the selected command
    pub fn poll_interval(&self) -> Duration {
        match &self.command {
            Command::Serve(args) => Duration::from_millis(args.poll_ms),
            Command::Project(args) => Duration::from_millis(args.poll_ms),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        let remote_tick_guard = match &self.command {
            Command::Serve(args) => Duration::from_millis(args.remote_tick_guard_ms),
            Command::Project(_) => DEFAULT_REMOTE_TICK_GUARD,
        };

        StoreConfig {
            finish_policy: self.finish_policy,
            remote_tick_guard,
            retry: RetryPolicy::new(self.retry_attempts, Duration::from_millis(self.retry_base_ms)),
        }
    }

    /// Remote host storage if `--remote` is set, else the local blob
    pub fn persistence(&self) -> Arc<dyn TimerPersistence> {
        match &self.remote {
            Some(url) => Arc::new(RemoteStore::new(url.as_str())),
            None => Arc::new(LocalBlobStore::new(&self.data_dir)),
        }
    }
}
