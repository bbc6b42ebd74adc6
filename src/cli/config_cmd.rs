//! Config command - manage chunkwright configuration

use clap::{Args, Subcommand};

use chunkwright::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Initialize config file with defaults
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show config file path
    Path,
}

pub async fn run(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let config = Config::load();
            let path = Config::config_path();

            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("Config file: {} (not found, using defaults)", path.display());
            }
            println!();
            print!("{}", toml::to_string_pretty(&config)?);

            // Surface bad settings here rather than on the next chunk run
            if let Err(e) = config.chunker.build_chunker() {
                println!();
                println!("warning: {}", e);
            }
        }

        ConfigCommands::Init { force } => {
            let path = Config::config_path();

            if force {
                Config::write_example()?;
            } else if !Config::create_example_if_missing()? {
                anyhow::bail!(
                    "Config file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }

            println!("Created config file at {}", path.display());
            println!();
            println!("Edit the file to change the default strategy, tokenizer and chunk size.");
            println!();
            println!("Common configurations:");
            println!();
            println!("  # Markdown notes for an OpenAI embedding model");
            println!("  tokenizer = \"cl100k_base\"");
            println!("  rules = \"markdown\"");
            println!("  chunk_size = 512");
            println!();
            println!("  # Source code, packed along syntax tree boundaries");
            println!("  strategy = \"code\"");
            println!("  chunk_size = 256");
        }

        ConfigCommands::Path => {
            println!("{}", Config::config_path().display());
        }
    }

    Ok(())
}
