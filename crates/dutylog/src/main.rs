//! `dutylog` - CLI and HTTP server for the duty log
//!
//! This binary serves the duty log API and lets an operator drive the same
//! duty operations against the configured database from the command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;

use anyhow::{bail, Context};
use chrono::Local;
use clap::Parser;

use dutylog::cli::{Cli, Command, ConfigCommand, IncidentCommand, ListCommand};
use dutylog::http::{self, AppState};
use dutylog::{init_logging, Config, DutyLog, DutyService, Incident, Post, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Serve(cmd) => {
            let mut config = load_config(config_path)?;
            if let Some(bind) = cmd.bind {
                config.server.bind_address = bind;
            }
            handle_serve(&config).await
        }
        Command::Start(cmd) => {
            let id = open_service(&load_config(config_path)?)?.start_duty(
                &cmd.name,
                &cmd.badge,
                &cmd.post,
            )?;
            println!("Started duty {id} for {} at {}", cmd.name, cmd.post);
            Ok(())
        }
        Command::End(cmd) => {
            open_service(&load_config(config_path)?)?.end_duty(&cmd.name)?;
            println!("Ended duty for {}", cmd.name);
            Ok(())
        }
        Command::Incident(cmd) => handle_incident(&load_config(config_path)?, cmd),
        Command::List(cmd) => handle_list(&load_config(config_path)?, &cmd),
        Command::Summary(cmd) => handle_summary(&load_config(config_path)?, cmd.json),
        Command::Posts => {
            for post in Post::ALL {
                println!("{post}");
            }
            Ok(())
        }
        Command::Config(cmd) => handle_config(config_path, cmd),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    Config::load_from(path.map(Path::to_path_buf)).context("failed to load configuration")
}

fn open_service(config: &Config) -> anyhow::Result<DutyService<Storage>> {
    let path = config.database_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("failed to open duty database {}", path.display()))?;
    Ok(DutyService::new(storage))
}

async fn handle_serve(config: &Config) -> anyhow::Result<()> {
    let addr = config.bind_address()?;
    let state = AppState::new(open_service(config)?);

    http::serve(state, addr)
        .await
        .context("duty log server error")
}

fn handle_incident(config: &Config, cmd: IncidentCommand) -> anyhow::Result<()> {
    let service = open_service(config)?;

    match cmd {
        IncidentCommand::Add {
            name,
            id,
            description,
            location,
            time,
            action,
        } => {
            let incident = Incident {
                id,
                description,
                time,
                location,
                action,
            };
            service.add_incident(&name, &incident)?;
            println!("Added incident {} to duty of {name}", incident.id);
        }
        IncidentCommand::Remove { name, id } => {
            service.remove_incident(&name, &id)?;
            println!("Removed incident {id} from duty of {name}");
        }
    }
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let duties = open_service(config)?.list_duties_matching(&cmd.filter())?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&duties)?);
        return Ok(());
    }

    if duties.is_empty() {
        println!("No duty logs found.");
        return Ok(());
    }

    println!(
        "{:>5}  {:<20} {:<10} {:<28} {:<16} {:<16} {:<12} {:<10} {:>9}",
        "ID", "Name", "Badge", "Post", "Start", "End", "Duration", "Status", "Incidents"
    );
    for duty in &duties {
        print_duty_row(duty);
    }
    Ok(())
}

fn print_duty_row(duty: &DutyLog) {
    let fmt = |ts: chrono::DateTime<chrono::Utc>| {
        ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
    };

    println!(
        "{:>5}  {:<20} {:<10} {:<28} {:<16} {:<16} {:<12} {:<10} {:>9}",
        duty.id,
        duty.name,
        duty.badge_number,
        duty.post,
        fmt(duty.start_time),
        duty.end_time.map_or_else(|| "-".to_string(), fmt),
        duty.duration_label(),
        duty.status,
        duty.incidents.len()
    );
}

fn handle_summary(config: &Config, json: bool) -> anyhow::Result<()> {
    let summary = open_service(config)?.summary()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Duty summary");
        println!("------------");
        println!("Total duties:     {}", summary.total_duties);
        println!("Active:           {}", summary.active_duties);
        println!("Completed:        {}", summary.completed_duties);
        println!("Incidents:        {}", summary.total_incidents);
    }
    Ok(())
}

/// `config path` and `config validate` never load the active configuration,
/// so a broken config file does not stop them.
fn handle_config(config_path: Option<&Path>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = load_config(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Bind address:       {}", config.server.bind_address);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or_else(|| config_path.map(Path::to_path_buf))
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
