//! Query Commands
//!
//! Read-only commands. Display reads never fail on a ledger hiccup; they
//! print empty results instead.

use clap::Args;
use tw_core::{Address, IncomeType, DEFAULT_ITEMS_PER_PAGE};

/// A single participant address
#[derive(Args, Debug)]
pub struct AddressArgs {
    /// Participant address (0x-prefixed hex)
    pub address: Address,
}

/// Income page arguments
#[derive(Args, Debug)]
pub struct IncomeArgs {
    /// Participant address (0x-prefixed hex)
    pub address: Address,

    /// Page number (1-indexed)
    #[arg(short, long, default_value = "1")]
    pub page: u64,

    /// Events per page
    #[arg(short = 's', long, default_value_t = DEFAULT_ITEMS_PER_PAGE)]
    pub per_page: u64,

    /// Only these income types (direct, upgrade, level, bonus or a code)
    #[arg(long = "filter", value_delimiter = ',')]
    pub filter: Vec<IncomeType>,

    /// Resolve addresses to backend display ids
    #[arg(long)]
    pub ids: bool,
}

/// Downline page arguments
#[derive(Args, Debug)]
pub struct DownlineArgs {
    /// Participant address (0x-prefixed hex)
    pub address: Address,

    /// Matrix depth (1 = direct children)
    #[arg(short, long, default_value = "1")]
    pub depth: u32,

    /// Index of the first entry
    #[arg(long, default_value = "0")]
    pub start: u64,

    /// Maximum entries
    #[arg(short, long, default_value = "20")]
    pub limit: u64,

    /// Resolve addresses to backend display ids
    #[arg(long)]
    pub ids: bool,
}

/// Direct referral page arguments
#[derive(Args, Debug)]
pub struct ReferralsArgs {
    /// Participant address (0x-prefixed hex)
    pub address: Address,

    /// Page number (1-indexed)
    #[arg(short, long, default_value = "1")]
    pub page: u64,

    /// Referrals per page
    #[arg(short = 's', long, default_value = "10")]
    pub per_page: u64,

    /// Resolve addresses to backend display ids
    #[arg(long)]
    pub ids: bool,
}
