//! examkit CLI: take timed exams from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examkit", version, about = "Timed exam session engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a timed exam
    Take {
        /// Path to a session .toml file
        #[arg(long)]
        session: PathBuf,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory to save the graded session in
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format: text, json, html, all
        #[arg(long, default_value = "text")]
        format: String,

        /// Use built-in sample questions and a local grader instead of the server
        #[arg(long)]
        offline: bool,
    },

    /// Render a saved result
    Score {
        /// Saved session record or raw result JSON
        #[arg(long)]
        result: PathBuf,

        /// Output format: text, json, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a session file
    Validate {
        /// Path to a session .toml file
        #[arg(long)]
        session: PathBuf,
    },

    /// Create starter config and example session
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examkit=info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            session,
            config,
            output,
            format,
            offline,
        } => commands::take::execute(session, config, output, format, offline).await,
        Commands::Score {
            result,
            format,
            output,
        } => commands::score::execute(result, format, output),
        Commands::Validate { session } => commands::validate::execute(session),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
