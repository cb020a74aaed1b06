#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "braid: hybrid dense, full-text and sparse search",
    long_about = None
)]
struct Cli {
    /// Log at debug level unless `BRAID_LOG` says otherwise.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Ingest(cmd::ingest::IngestArgs),
    Search(cmd::search::SearchArgs),
}

/// Default filter when `BRAID_LOG` is unset.
fn default_directives(verbose: bool) -> &'static str {
    if verbose || env::var("DEBUG").is_ok() {
        "braid=debug,info"
    } else {
        "braid=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("BRAID_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    let format = env::var("BRAID_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    // logs go to stderr so stdout stays parseable
    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let output = OutputMode::from_json_flag(cli.json);
    match cli.command {
        Commands::Ingest(ref args) => cmd::ingest::run_ingest(args, output),
        Commands::Search(ref args) => cmd::search::run_search(args, output),
    }
}
