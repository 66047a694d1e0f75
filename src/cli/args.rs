use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "huddle")]
#[command(about = "AI meeting assistant service", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the API server and background workers (the default)
    Serve {
        /// Override the database file location
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print version information
    Version,
    /// Show the effective configuration and where it is loaded from
    Config,
}
