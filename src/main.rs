use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Parser)]
#[command(name = "devrunner")]
#[command(version, about = "Run and supervise local development services from one shell")]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, env = "DEVRUNNER_CONFIG", default_value = "devrunner.toml")]
    pub config: PathBuf,

    /// Debug-level diagnostics in devrunner.log
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory for service log files (overrides runner.log_dir)
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start every service in dependency order, then open the shell
    Run {
        /// Run each service's rebuild_command before starting it
        #[arg(long)]
        rebuild: bool,

        /// Only show logs from these services (partial names allowed)
        #[arg(short, long, num_args = 1..)]
        filter: Vec<String>,
    },
    /// View, validate or create the config file
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Print the start-up waves computed from depends_on
    Graph,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the resolved configuration
    Show,
    /// Validate the configuration and show any warnings
    Validate,
    /// Write an example devrunner.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Run { rebuild, filter } => cmd::cmd_run(&cli, *rebuild, filter).await,
        Commands::Config { command } => cmd::cmd_config(&cli, command.clone()).map(|_| 0),
        Commands::Graph => cmd::cmd_graph(&cli).map(|_| 0),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(cmd::EXIT_FAILURE)
        }
    }
}
