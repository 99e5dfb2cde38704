use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod dump;

use commands::{SessionArgs, SourceArgs};

#[derive(Parser)]
#[command(name = "msgscope")]
#[command(about = "msgscope - inspect session message logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sessions in a log dump
    Sessions {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print a session's messages, oldest first
    Replay {
        #[command(flatten)]
        target: SessionArgs,
    },
    /// Print a session's messages, newest first
    Reverse {
        #[command(flatten)]
        target: SessionArgs,
        /// Oldest record id to include, e.g. 1700000000000-0
        #[arg(long)]
        from: Option<msgscope_core::RecordId>,
        /// Newest record id to include
        #[arg(long)]
        to: Option<msgscope_core::RecordId>,
    },
    /// Count the records of a session
    Count {
        #[command(flatten)]
        target: SessionArgs,
    },
    /// Print a session's last messages and optionally keep following it
    Tail {
        #[command(flatten)]
        target: SessionArgs,
        /// Number of messages to print
        #[arg(short = 'n', long, default_value_t = 10)]
        lines: usize,
        /// Keep reading records appended to the dump
        #[arg(short, long)]
        follow: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Sessions { source } => commands::sessions::run(&source).await?,
        Commands::Replay { target } => commands::replay::run(&target).await?,
        Commands::Reverse { target, from, to } => commands::reverse::run(&target, from, to).await?,
        Commands::Count { target } => commands::count::run(&target).await?,
        Commands::Tail {
            target,
            lines,
            follow,
        } => commands::tail::run(&target, lines, follow).await?,
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` overrides
/// the default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
