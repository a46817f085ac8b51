use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use docnav::cli_types::{Cli, Commands};
use docnav::{CliApp, NavigatorConfig};

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "docnav=debug" } else { "docnav=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = NavigatorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let app = CliApp::new(config, cli.json, cli.verbose)?;
    let tag = cli.tag.as_deref();

    match cli.command {
        Commands::Search(args) => app.search(tag, args).await,
        Commands::Files(args) => app.files(tag, args).await,
        Commands::Get(args) => app.get(tag, args).await,
        Commands::Meta => app.meta(tag).await,
        Commands::Watch => app.watch().await,
        Commands::Config => app.show_config(),
    }
}
