//! Execute Commands
//!
//! Commands that submit ledger writes or start the schedulers.

use clap::Args;
use tw_core::Address;

/// Registration arguments
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Address to register
    pub address: Address,

    /// Referrer address
    #[arg(short, long, conflicts_with = "code", required_unless_present = "code")]
    pub referrer: Option<Address>,

    /// Referral code, resolved to the referrer through the backend
    #[arg(short, long)]
    pub code: Option<String>,
}

/// Upgrade arguments
#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Address to upgrade
    pub address: Address,

    /// Target level (2-10)
    #[arg(short, long)]
    pub level: u8,
}

/// Scheduler arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Participant whose tiers are registered and distributed
    pub address: Address,

    /// Poll interval in seconds (env: TW_POLL_INTERVAL_SECS)
    #[arg(short, long, env = "TW_POLL_INTERVAL_SECS")]
    pub interval: Option<u64>,

    /// Distribute these tiers instead of the participant's achieved ones
    #[arg(long, value_delimiter = ',')]
    pub tiers: Vec<usize>,

    /// Only run tier registration
    #[arg(long, conflicts_with = "no_registration")]
    pub no_distribution: bool,

    /// Only run royalty distribution
    #[arg(long)]
    pub no_registration: bool,
}
