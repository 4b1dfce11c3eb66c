//! Command-line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "skiff", version, about = "Digests of recent GitHub activity")]
pub struct Cli {
    /// Log more (debug-level tracing).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log less (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the digests defined in a configuration file.
    Run(RunArgs),
    /// Execute one GraphQL document and print the JSON result.
    Adhoc(AdhocArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Configuration file.
    #[arg(default_value = "skiff.toml")]
    pub config: PathBuf,

    /// Digests to build, by title or output name. All of them when empty.
    pub digests: Vec<String>,

    /// Override every selected digest's cutoff.
    #[arg(long)]
    pub since: Option<String>,
}

#[derive(Debug, Args)]
pub struct AdhocArgs {
    /// File holding one GraphQL document.
    pub query_file: PathBuf,

    /// Variables as `name=value`, `name:int=7`, or `name:bool=true`.
    pub vars: Vec<String>,

    /// Paginate the document's collection and print the gathered nodes.
    #[arg(long)]
    pub nodes: bool,
}
