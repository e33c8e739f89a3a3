//! listfeed - headless list feeder host
//!
//! Runs either feeder against an in-memory list view and prints the rows it
//! ends up showing.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{static_list, timestamps};

#[derive(Parser)]
#[command(name = "listfeed")]
#[command(about = "Keep a list in step with a changing record store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "listfeed.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a fixed sequence of integers
    Static(static_list::StaticArgs),

    /// Show stored timestamps, optionally adding new ones first
    Timestamps(timestamps::TimestampsArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load(&cli.config)?;
    if cli.verbose {
        config.log_level = "debug".to_string();
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with_writer(std::io::stderr)
        .init();

    let lines = match cli.command {
        Commands::Static(args) => static_list::run(config, args)?,
        Commands::Timestamps(args) => timestamps::run(config, args).await?,
    };
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
