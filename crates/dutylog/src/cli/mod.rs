//! Command-line interface for dutylog.
//!
//! This module provides the CLI structure for the `dutylog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, EndCommand, IncidentCommand, ListCommand, ServeCommand, StartCommand,
    StatusArg, SummaryCommand,
};

use crate::logging::Verbosity;

/// dutylog - Duty and incident log for security posts
///
/// Officers start a duty at a post, report incidents while on duty, and end
/// the duty when their shift is over.
#[derive(Debug, Parser)]
#[command(name = "dutylog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeCommand),

    /// Start a duty
    Start(StartCommand),

    /// End the active duty
    End(EndCommand),

    /// Add or remove incidents on the active duty
    #[command(subcommand)]
    Incident(IncidentCommand),

    /// List duties, newest first
    List(ListCommand),

    /// Show duty and incident counts
    Summary(SummaryCommand),

    /// List the posts a duty can be started at
    Posts,

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
