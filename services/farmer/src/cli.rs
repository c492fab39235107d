//! Command-line parsing
//!
//! `timefarm-farmer [--config <path>] [command]`, where `command` defaults to
//! `run`.

use clap::builder::NonEmptyStringValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "timefarm-farmer")]
#[command(about = "Farm Time Farm rewards for a fleet of accounts", long_about = None)]
pub struct Cli {
    /// Configuration file (default: $CONFIG_PATH or timefarm-farmer.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Farm every stored account (default)
    Run,
    /// Log in through the helper and store the session
    AddAccount {
        #[arg(long, value_parser = NonEmptyStringValueParser::new())]
        phone: String,
        /// Proxy URL for this account's backend traffic
        #[arg(long)]
        proxy: Option<String>,
    },
    /// Show stored accounts
    ListAccounts,
    /// Delete a stored account
    RemoveAccount { id: u64 },
}
