use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use skillvault_core::config;
use std::path::PathBuf;

mod skills;

#[derive(Parser)]
#[command(name = "skillvault")]
#[command(about = "skillvault - shared skill catalog for agent fleets", long_about = None)]
struct Cli {
    /// Catalog root directory, overriding the config file
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Writer identity used for attribution, overriding the config file
    #[arg(long, global = true)]
    writer: Option<String>,

    /// Display name recorded next to the writer identity
    #[arg(long, global = true)]
    writer_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init,
    #[command(flatten)]
    Skills(skills::SkillsCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            if config::config_exists() {
                println!(
                    "{} Config already exists at {}",
                    style("!").yellow(),
                    config::get_config_path().display()
                );
                return Ok(());
            }
            config::save_config(&config::Config::default())?;
            println!(
                "{} Wrote {}",
                style("✓").green().bold(),
                config::get_config_path().display()
            );
        }
        Commands::Skills(command) => {
            let mut config = config::Config::load_or_init()?;
            if let Some(root) = cli.root {
                config.catalog.root_dir = root;
            }
            if let Some(writer) = cli.writer {
                config.catalog.writer_id = writer;
            }
            if let Some(name) = cli.writer_name {
                config.catalog.writer_name = name;
            }

            if let Err(e) = skills::handle_command(command, &config).await {
                eprintln!("{} Error: {:#}", style("✗").red().bold(), e);
                return Err(e);
            }
        }
    }

    Ok(())
}
