mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{
    apply, init, match_urls, replay, validate, ApplyArgs, InitArgs, MatchArgs, ReplayArgs,
    ValidateArgs,
};
use config::Config;
use std::path::PathBuf;
use tracing::Level;

/// abkit CLI - apply and preview A/B test variants on HTML pages
#[derive(Parser, Debug)]
#[command(name = "abkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding abkit.config.json (defaults to the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create abkit.config.json and an example variant
    Init(InitArgs),

    /// Apply variant change sets to a page and print the result
    Apply(ApplyArgs),

    /// Test URLs against a URL filter
    Match(MatchArgs),

    /// Check variant change sets for invalid records
    Validate(ValidateArgs),

    /// Replay a scripted edit session against a page
    Replay(ReplayArgs),
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    if let Err(err) = run(cli) {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let dir = match cli.config {
        Some(dir) => dir,
        None => std::env::current_dir().context("Cannot get current directory")?,
    };

    match cli.command {
        Command::Init(args) => init(args, &dir),
        Command::Match(args) => match_urls(args),
        Command::Validate(args) => validate(args),
        Command::Apply(args) => apply(args, &Config::load(&dir)?),
        Command::Replay(args) => replay(args, &Config::load(&dir)?),
    }
}
