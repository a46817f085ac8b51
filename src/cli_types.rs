use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "docnav", version, about = "Fuzzy search over versioned documentation trees")]
pub struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true, env = "DOCNAV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Version tag to query; defaults to the first configured tag
    #[arg(short, long, global = true)]
    pub tag: Option<String>,

    /// Emit JSON instead of formatted text
    #[arg(long, global = true)]
    pub json: bool,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fuzzy search entry keys (classes, typedefs, methods, members, events)
    Search(SearchArgs),
    /// Fuzzy search known source files
    Files(SearchArgs),
    /// Show one entry by composite key, e.g. `Client#login` or `Client~user`
    Get(GetArgs),
    /// Show corpus metadata and index statistics
    Meta,
    /// Keep every configured tag indexed and log refreshes until interrupted
    Watch,
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    pub query: String,

    /// Maximum number of results
    #[arg(short, long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    pub key: String,
}
