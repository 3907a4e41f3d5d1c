//! TetherWave CLI
//!
//! Command-line client for the TetherWave referral matrix.
//!
//! # Usage
//!
//! ```text
//! tw [OPTIONS] <COMMAND>
//!
//! Commands:
//!   royalty        Show royalty tier status and leg progress
//!   income         Show one page of income history
//!   downline       Show one page of the downline at a depth
//!   referrals      Show one page of direct referrals
//!   sponsors       Show direct and matrix sponsor
//!   stats          Show level, income totals, rank income and referral code
//!   rank-income    Show income per team level and the direct commission
//!   referral-code  Show the on-chain referral code
//!   register       Register a participant
//!   upgrade        Upgrade a participant to a higher level
//!   run            Run the registration and distribution schedulers until Ctrl-C
//!   config         Configuration management
//!
//! Options:
//!   -f, --format <FORMAT>  Output format (json, table) [default: table]
//!   -v, --verbose          Enable verbose output
//! ```
//!
//! # Examples
//!
//! ## Income, bonus events only, with display ids
//! ```text
//! tw income 0x... --filter bonus --ids
//! ```
//!
//! ## Register through a referral code
//! ```text
//! tw register 0x... --code TW00042
//! ```
//!
//! ## Schedulers with the short cooldown
//! ```text
//! TW_SIGNER_TOKEN=... tw --cooldown short run 0x... --interval 30
//! ```

pub mod commands;
pub mod error;
pub mod handler;
pub mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};

/// CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
