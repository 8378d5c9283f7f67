use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "typhon")]
#[command(about = "Typhon package pipeline CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Package the project into a .typh archive
    Build {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Output directory for the archive (default: "target")
        #[arg(long)]
        dist: Option<PathBuf>,

        /// Path fragments to exclude from the archive
        #[arg(short, long)]
        ignore: Vec<String>,

        /// Keep test directories in the archive
        #[arg(long)]
        include_tests: bool,
    },

    /// Run a packaged .typh archive
    Run {
        /// Path to the archive
        file: PathBuf,

        /// Project directory (for plugin registration)
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Report phase timings after the run
        #[arg(long)]
        performance: bool,
    },

    /// Plugin authoring helpers
    #[command(subcommand)]
    Plugin(PluginCommands),
}

#[derive(Subcommand)]
enum PluginCommands {
    /// Load the project's declared plugins and send each a test event
    Test {
        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build { project, dist, ignore, include_tests } => {
            commands::build(&project, dist, ignore, include_tests).await?;
        }

        Commands::Run { file, project, performance } => {
            commands::run(&file, &project, performance).await?;
        }

        Commands::Plugin(plugin_cmd) => match plugin_cmd {
            PluginCommands::Test { project } => {
                commands::plugin::test(&project)?;
            }
        },
    }

    Ok(())
}
