//! Command-line interface wiring for trial-scout.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Settings;

pub mod ingest;
pub mod search;
pub mod serve;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(author, version, about = "Clinical trial condition matching and site ranking", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Ingest => ingest::run(settings).await,
            Commands::Search(args) => search::run(args, settings).await,
            Commands::Serve(args) => serve::run(args, settings).await,
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Rebuild and publish the condition embedding index snapshot.
    Ingest,
    /// Run one search: condition plus location, optional facet filters.
    Search(search::Args),
    /// Serve the JSON API.
    Serve(serve::Args),
}
