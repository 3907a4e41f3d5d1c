//! Config Commands

use clap::Subcommand;

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration (secrets redacted)
    Show,

    /// Show the tier table
    Tiers,
}
