//! Parallax CLI, the main entry point.
//!
//! Commands:
//! - `ask`    - Answer one question with the concurrent agent
//! - `tools`  - List the tools the current config enables
//! - `config` - Locate, create or validate the config file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "parallax",
    about = "Parallax: an agent loop that runs its tool calls concurrently",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the agent a question
    Ask {
        /// The question to answer
        question: String,

        /// Override agent.max_iterations from the config (at least 1)
        #[arg(
            short,
            long,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        max_iterations: Option<usize>,

        /// Print every action and observation after the answer
        #[arg(long)]
        show_steps: bool,

        /// Don't echo the model's reasoning while it streams
        #[arg(short, long)]
        quiet: bool,
    },

    /// List the tools available to the agent
    Tools,

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: commands::config_cmd::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            question,
            max_iterations,
            show_steps,
            quiet,
        } => {
            commands::ask::run(commands::ask::AskArgs {
                question,
                max_iterations,
                show_steps,
                quiet,
            })
            .await?
        }
        Commands::Tools => commands::tools::run()?,
        Commands::Config { action } => commands::config_cmd::run(action)?,
    }

    Ok(())
}
