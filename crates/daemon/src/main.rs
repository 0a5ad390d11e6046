use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use pathfs_daemon::{logging, Config};

mod cli;

use cli::op::{Op, OpContext};
use cli::ops::Command;

/// Mount a SQLite table of path-keyed records as a filesystem.
#[derive(Parser, Debug)]
#[command(name = "pathfs", version, about)]
struct Cli {
    /// Config file (defaults to <config dir>/pathfs/config.toml)
    #[arg(long, global = true, env = "PATHFS_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database holding the records; overrides the config file
    #[arg(long, global = true, env = "PATHFS_DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true, env = "PATHFS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Also write daily-rotated log files to this directory
    #[arg(long, global = true, env = "PATHFS_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(dir) = args.log_dir {
        config.log_dir = Some(dir);
    }

    let _guard = logging::init(&config.log_level, config.log_dir.as_deref())
        .context("initializing logging")?;
    tracing::debug!(?config, "configuration loaded");

    let ctx = OpContext::new(config);
    let output = args
        .command
        .execute(&ctx)
        .await
        .with_context(|| format!("{} failed", command_name(&args.command)))?;
    println!("{output}");

    Ok(())
}

fn command_name(command: &Command) -> String {
    match command {
        Command::Mount(op) => op.to_string(),
        Command::Stat(op) => op.to_string(),
        Command::Ls(op) => op.to_string(),
    }
}
