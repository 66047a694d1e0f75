pub mod args;

pub use args::{Cli, CliCommand};

use anyhow::Result;

use crate::config::Config;
use crate::global;

/// Print the effective configuration as TOML, with secrets untouched —
/// this is a local admin tool, not a log line.
pub fn handle_config_command() -> Result<()> {
    let path = global::config_file()?;
    let config = Config::load()?;

    println!("Config file: {}", path.display());
    println!();
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
