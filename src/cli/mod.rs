//! CLI module - command definitions and handlers

mod chunk;
mod config_cmd;

use clap::{Parser, Subcommand};

pub use chunk::ChunkArgs;
pub use config_cmd::ConfigArgs;

/// chunkwright - token-budget text and code chunking
#[derive(Parser)]
#[command(name = "chunkwright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chunk files and directories into JSONL
    Chunk(ChunkArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

impl Cli {
    /// Default log filter for the chosen verbosity
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "chunkwright=debug,warn"
        } else if self.quiet {
            "warn"
        } else {
            "chunkwright=info,warn"
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Chunk(args) => chunk::run(args, self.quiet).await,
            Commands::Config(args) => config_cmd::run(args).await,
        }
    }
}
