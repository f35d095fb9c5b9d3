//! placenet - place/transition workflow engine
//!
//! Command-line front-end: inspects definition files, renders Mermaid
//! diagrams and drives persisted workflow instances.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "placenet")]
#[command(about = "Place/transition workflow engine")]
#[command(version)]
struct Cli {
    /// Path to a YAML config file
    #[arg(short, long, env = "PLACENET_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print a Mermaid state diagram of a definition
    Diagram {
        /// Definition file (YAML or JSON)
        definition: PathBuf,

        /// Render the current places of this workflow
        #[arg(short, long)]
        id: Option<String>,
    },

    /// Validate a definition and print its places and transitions
    Inspect {
        /// Definition file (YAML or JSON)
        definition: PathBuf,
    },

    /// Create a workflow instance
    Create {
        /// Definition file (YAML or JSON)
        definition: PathBuf,

        /// Workflow ID
        id: String,

        /// Initial place (defaults to the definition's initial place)
        #[arg(short, long)]
        initial: Option<String>,

        /// Initial context JSON object
        #[arg(short, long)]
        ctx: Option<String>,
    },

    /// Show a workflow's places, context and enabled transitions
    Status {
        /// Definition file (YAML or JSON)
        definition: PathBuf,

        /// Workflow ID
        id: String,
    },

    /// Move a workflow to the given places
    Apply {
        /// Definition file (YAML or JSON)
        definition: PathBuf,

        /// Workflow ID
        id: String,

        /// Target places, in the transition's declared order
        #[arg(required = true, value_delimiter = ',')]
        to: Vec<String>,

        /// Who applied the transition (recorded in history)
        #[arg(short, long)]
        actor: Option<String>,

        /// Free-form notes (recorded in history)
        #[arg(short, long)]
        notes: Option<String>,

        /// Extra call context JSON object
        #[arg(short, long)]
        ctx: Option<String>,

        /// Only check whether the move is allowed
        #[arg(long)]
        dry_run: bool,
    },

    /// Show a workflow's transition history, newest first
    History {
        /// Workflow ID
        id: String,

        /// Maximum records to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Records to skip
        #[arg(short, long, default_value = "0")]
        offset: usize,

        /// Only records by this actor
        #[arg(short, long)]
        actor: Option<String>,

        /// Only records of this transition
        #[arg(short, long)]
        transition: Option<String>,
    },

    /// Delete a workflow's state and history
    Delete {
        /// Workflow ID
        id: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .init();

    tracing::debug!("Data directory: {}", config.storage.data_dir.display());

    match commands::execute(&config, cli.command) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            match commands::error_code(e.as_ref()) {
                Some(code) => eprintln!("{} [{}]: {}", "Error".red(), code, e),
                None => eprintln!("{}: {}", "Error".red(), e),
            }
            std::process::exit(commands::exit_code(e.as_ref()));
        }
    }
}
