//! CLI module for the Skycast API

pub mod serve;

use clap::{Parser, Subcommand};

/// Skycast API - weather dashboard backend with request governance
#[derive(Parser)]
#[command(name = "skycast-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the API server
    Serve,
}
