//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::duty::DutyStatus;
use crate::storage::DutyFilter;

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind_address`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,
}

/// Start command arguments.
#[derive(Debug, Args)]
pub struct StartCommand {
    /// Officer name
    #[arg(short, long)]
    pub name: String,

    /// Badge number
    #[arg(short, long)]
    pub badge: String,

    /// Post to man (see `dutylog posts`)
    #[arg(short, long)]
    pub post: String,
}

/// End command arguments.
#[derive(Debug, Args)]
pub struct EndCommand {
    /// Officer name
    #[arg(short, long)]
    pub name: String,
}

/// Incident management commands.
#[derive(Debug, Subcommand)]
pub enum IncidentCommand {
    /// Report an incident on the officer's active duty
    Add {
        /// Officer name
        #[arg(short, long)]
        name: String,

        /// Incident id, unique within the duty
        #[arg(long)]
        id: String,

        /// What happened
        #[arg(short, long)]
        description: String,

        /// Where it happened
        #[arg(short, long)]
        location: String,

        /// When it happened (local time, e.g. 2024-03-01T10:15)
        #[arg(short, long)]
        time: String,

        /// Action taken
        #[arg(short, long)]
        action: String,
    },

    /// Remove an incident from the officer's active duty
    Remove {
        /// Officer name
        #[arg(short, long)]
        name: String,

        /// Incident id
        #[arg(long)]
        id: String,
    },
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only duties in this state
    #[arg(short, long, value_enum)]
    pub status: Option<StatusArg>,

    /// Match name, badge number or post (case-insensitive)
    #[arg(long)]
    pub search: Option<String>,

    /// First start day to include (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last start day to include (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl ListCommand {
    /// The storage filter these arguments describe.
    #[must_use]
    pub fn filter(&self) -> DutyFilter {
        DutyFilter {
            status: self.status.map(Into::into),
            search: self.search.clone(),
            from: self.from,
            to: self.to,
        }
    }
}

/// Summary command arguments.
#[derive(Debug, Args)]
pub struct SummaryCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Duty status filter for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Duties in progress
    Active,
    /// Duties that have ended
    Completed,
}

impl From<StatusArg> for DutyStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Active => Self::Active,
            StatusArg::Completed => Self::Completed,
        }
    }
}

/// Configuration management commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to configuration file (uses default if not specified)
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_arg_conversion() {
        assert_eq!(DutyStatus::from(StatusArg::Active), DutyStatus::Active);
        assert_eq!(DutyStatus::from(StatusArg::Completed), DutyStatus::Completed);
    }

    #[test]
    fn test_status_arg_value_names() {
        let names: Vec<_> = StatusArg::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(names, vec!["active", "completed"]);
    }

    #[test]
    fn test_list_command_filter() {
        let cmd = ListCommand {
            status: Some(StatusArg::Completed),
            search: Some("gate".to_string()),
            from: NaiveDate::from_ymd_opt(2024, 3, 1),
            to: None,
            json: false,
        };

        let filter = cmd.filter();
        assert_eq!(filter.status, Some(DutyStatus::Completed));
        assert_eq!(filter.search.as_deref(), Some("gate"));
        assert_eq!(filter.from, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert!(filter.to.is_none());
    }

    #[test]
    fn test_list_command_empty_filter() {
        let cmd = ListCommand {
            status: None,
            search: None,
            from: None,
            to: None,
            json: true,
        };
        assert!(cmd.filter().is_empty());
    }
}
