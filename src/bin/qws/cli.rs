use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Run browser automation scripts.
#[derive(Debug, Parser)]
#[command(name = "qws", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Execute a script against Chrome (or an in-memory page with --dry-run).
    Run(RunArgs),
    /// Parse a script and print its canonical JSON form.
    Check {
        script: PathBuf,
    },
    /// Convert a script to canonical JSON.
    Convert {
        script: PathBuf,
        /// Output file; prints to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the registered command kinds.
    Commands,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// `.json` scripts use the structured syntax, anything else the line syntax.
    pub script: PathBuf,

    #[arg(long, env = "QWS_HEADLESS")]
    pub headless: bool,

    #[arg(long, env = "QWS_CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Attach to a Chrome started with --remote-debugging-port=<PORT>.
    #[arg(long, env = "QWS_DEBUG_PORT")]
    pub debug_port: Option<u16>,

    /// Halt at the first failing command.
    #[arg(long)]
    pub stop_on_error: bool,

    /// Run against an in-memory surface instead of Chrome.
    #[arg(long)]
    pub dry_run: bool,

    /// Serve the live control dashboard while the script runs.
    #[arg(long)]
    pub serve: bool,

    /// First dashboard port to try.
    #[arg(long, env = "QWS_DASHBOARD_PORT", default_value_t = 3000)]
    pub port: u16,
}
