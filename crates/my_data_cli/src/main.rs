//! Setup tool for My Data databases.
//!
//! # Responsibility
//! - Create tables, seed the initial data set and load JSON data files.
//! - Keep output deterministic for scripted use.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use my_data::{DataLoader, JsonDataSource, LoadSummary, MyData, MyDataConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "my-data", about = "My Data database setup tool", version)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, conflicts_with = "config")]
    db: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Absolute directory for log files; logging is off when omitted
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print crate linkage information
    Ping,
    /// Create missing tables
    CreateTables {
        /// Drop every managed table first
        #[arg(long)]
        drop: bool,
    },
    /// Recreate all tables and load the built-in initial data
    InitData,
    /// Load a JSON data set
    Load { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let level = cli
            .log_level
            .as_deref()
            .unwrap_or_else(|| my_data::default_log_level());
        my_data::init_logging(level, log_dir).context("failed to initialize logging")?;
    }

    if let Command::Ping = cli.command {
        println!("my_data ping={}", my_data::ping());
        println!("my_data version={}", my_data::core_version());
        return Ok(());
    }

    let my_data = MyData::new(&load_config(&cli)?).context("failed to open database")?;

    match cli.command {
        Command::Ping => {}
        Command::CreateTables { drop } => {
            my_data.create_tables(drop)?;
            println!("tables ready drop={drop}");
        }
        Command::InitData => {
            let summary = my_data.create_init_data()?;
            print_summary(&summary);
        }
        Command::Load { file } => {
            let summary = DataLoader::new(JsonDataSource::new(&file))
                .load(&my_data)
                .with_context(|| format!("failed to load `{}`", file.display()))?;
            print_summary(&summary);
        }
    }

    info!("event=cli_done module=cli status=ok");
    Ok(())
}

fn load_config(cli: &Cli) -> Result<MyDataConfig> {
    match (&cli.db, &cli.config) {
        (Some(path), None) => Ok(MyDataConfig::file(path)),
        (None, Some(path)) => MyDataConfig::from_json_file(path)
            .with_context(|| format!("failed to read config `{}`", path.display())),
        (None, None) => bail!("either --db or --config is required"),
        (Some(_), Some(_)) => bail!("--db and --config cannot be combined"),
    }
}

fn print_summary(summary: &LoadSummary) {
    println!(
        "loaded api_scopes={} users={} tags={} api_clients={} api_tokens={} user_settings={} api_token_scopes={}",
        summary.api_scopes,
        summary.users,
        summary.tags,
        summary.api_clients,
        summary.api_tokens,
        summary.user_settings,
        summary.api_token_scopes
    );
}

#[cfg(test)]
mod tests {
    use super::{load_config, Cli, Command};
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_db_after_subcommand() {
        let cli = Cli::try_parse_from(["my-data", "create-tables", "--drop", "--db", "/tmp/x.db"])
            .unwrap();
        assert!(matches!(cli.command, Command::CreateTables { drop: true }));
        assert!(load_config(&cli).is_ok());
    }

    #[test]
    fn missing_database_is_an_error() {
        let cli = Cli::try_parse_from(["my-data", "init-data"]).unwrap();
        assert!(load_config(&cli).is_err());
    }
}
