//! CLI Commands Module
//!
//! Command definitions for the `tw` CLI.

pub mod config;
pub mod execute;
pub mod query;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// TetherWave referral matrix CLI
#[derive(Parser, Debug)]
#[command(name = "tw")]
#[command(version)]
#[command(about = "TetherWave Referral Matrix Command Line Interface")]
#[command(long_about = "A command-line tool for the TetherWave referral matrix.\n\n\
    Use this tool to inspect royalty tiers, income history and the matrix \
    downline, to register and upgrade participants, and to run the \
    automatic tier registration and royalty distribution schedulers.")]
pub struct Cli {
    /// Ledger JSON-RPC gateway URL
    #[arg(long, env = "TW_LEDGER_RPC_URL")]
    pub ledger_url: Option<String>,

    /// Backend profile service URL
    #[arg(long, env = "TW_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Signing service URL for privileged writes
    #[arg(long, env = "TW_SIGNER_URL")]
    pub signer_url: Option<String>,

    /// Signing service bearer token
    #[arg(long, env = "TW_SIGNER_TOKEN", hide_env_values = true)]
    pub signer_token: Option<String>,

    /// Registration cooldown: daily, short or seconds
    #[arg(long, env = "TW_REGISTRATION_COOLDOWN")]
    pub cooldown: Option<String>,

    /// Income strategy: server or client
    #[arg(long, env = "TW_INCOME_STRATEGY")]
    pub income_strategy: Option<String>,

    /// Directory of the persistent cooldown store
    #[arg(long, env = "TW_COOLDOWN_DB")]
    pub cooldown_db: Option<PathBuf>,

    /// Output format (json, table)
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Table format (human-readable)
    #[default]
    Table,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show royalty tier status and leg progress
    Royalty(query::AddressArgs),

    /// Show one page of income history
    Income(query::IncomeArgs),

    /// Show one page of the downline at a depth
    Downline(query::DownlineArgs),

    /// Show one page of direct referrals
    Referrals(query::ReferralsArgs),

    /// Show direct and matrix sponsor
    Sponsors(query::AddressArgs),

    /// Show level, income totals, rank income and referral code
    Stats(query::AddressArgs),

    /// Show income per team level and the direct commission
    RankIncome(query::AddressArgs),

    /// Show the on-chain referral code
    ReferralCode(query::AddressArgs),

    /// Register a participant
    Register(execute::RegisterArgs),

    /// Upgrade a participant to a higher level
    Upgrade(execute::UpgradeArgs),

    /// Run the registration and distribution schedulers until Ctrl-C
    Run(execute::RunArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn test_cli_parse_help() {
        let result = Cli::try_parse_from(["tw", "--help"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_parse_royalty() {
        let cli = Cli::try_parse_from(["tw", "-f", "json", "royalty", USER]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Royalty(_)));
    }

    #[test]
    fn test_rejects_bad_address() {
        assert!(Cli::try_parse_from(["tw", "sponsors", "0x1234"]).is_err());
    }

    #[test]
    fn test_parse_referral_reads() {
        let cli = Cli::try_parse_from(["tw", "rank-income", USER]).unwrap();
        assert!(matches!(cli.command, Commands::RankIncome(_)));
        let cli = Cli::try_parse_from(["tw", "referral-code", USER]).unwrap();
        assert!(matches!(cli.command, Commands::ReferralCode(_)));
        let cli = Cli::try_parse_from(["tw", "referrals", USER]).unwrap();
        assert!(matches!(cli.command, Commands::Referrals(_)));
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::try_parse_from([
            "tw",
            "--ledger-url",
            "http://node:8545",
            "--cooldown",
            "short",
            "stats",
            USER,
        ])
        .unwrap();
        assert_eq!(cli.ledger_url.as_deref(), Some("http://node:8545"));
        assert_eq!(cli.cooldown.as_deref(), Some("short"));
    }
}
