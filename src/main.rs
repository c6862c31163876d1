mod api;
mod config;
mod dispatch;
mod liker;
mod topics;
mod types;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Like the first post of forum topics from every configured account
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// TOML config file; without it, settings come from the environment (and .env)
    #[arg(short, long, global = true)]
    config: Option<String>,
    /// File with one topic id per line
    #[arg(short, long, global = true)]
    topics: Option<PathBuf>,
    /// Number of accounts processed at the same time
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    workers: Option<u16>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Like the first post of every topic with every account
    Run,
    /// Print the topic ids a run would process
    Topics,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(filename) => config::load_config(filename)?,
        None => config::Config::from_env()?,
    };
    if let Some(topics) = cli.topics {
        config.topics_file = topics;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers.into();
    }
    match cli.command {
        Command::Run => liker::run(&config),
        Command::Topics => liker::list_topics(&config),
    }
}
