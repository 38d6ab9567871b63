use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;
mod prompt;
mod support;

#[derive(Parser)]
#[command(name = "itrust-updater", about = "Secure application updater for artifacts")]
struct Cli {
    #[command(flatten)]
    globals: Globals,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
pub struct Globals {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Use the OS keyring for secrets
    #[arg(long, global = true)]
    use_keyring: bool,

    /// Enable logging to file
    #[arg(long, global = true, env = "ITRUST_LOG_TO_FILE")]
    log_to_file: bool,

    /// Override default log file path
    #[arg(long, global = true, env = "ITRUST_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new profile
    Init(commands::init::InitArgs),
    /// Install or update an application
    Get(commands::get::GetArgs),
    /// Show installation status
    Status(commands::status::StatusArgs),
    /// Publish a new release (publisher mode)
    Push(commands::push::PushArgs),
    /// Manifest utilities
    Manifest {
        #[command(subcommand)]
        command: commands::manifest::ManifestCmd,
    },
    /// Repository management
    Repo {
        #[command(subcommand)]
        command: commands::repo::RepoCmd,
    },
    /// Show application version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_file = if cli.globals.log_to_file {
        Some(
            cli.globals
                .log_file
                .clone()
                .unwrap_or_else(|| updater::paths::default_log_dir().join("itrust-updater.log")),
        )
    } else {
        cli.globals.log_file.clone()
    };
    logging::init(cli.globals.verbose, log_file);

    let globals = cli.globals;
    match cli.command {
        Commands::Init(args) => commands::init::run(args, &globals),
        Commands::Get(args) => commands::get::run(args, &globals).await,
        Commands::Status(args) => commands::status::run(args, &globals).await,
        Commands::Push(args) => commands::push::run(args, &globals).await,
        Commands::Manifest { command } => commands::manifest::run(command, &globals),
        Commands::Repo { command } => commands::repo::run(command, &globals).await,
        Commands::Version => {
            println!("itrust-updater");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
