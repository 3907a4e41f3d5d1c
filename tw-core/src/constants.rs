//! Protocol Constants
//!
//! Centralized constants for the TetherWave client.
//! Chain-defined values (level costs, tier thresholds, revert selectors)
//! and client defaults (cooldowns, page sizes) live here.
//!
//! # Categories
//!
//! - **Units**: Fixed-point scaling
//! - **Matrix**: Tree width, level table
//! - **Royalty**: Tier table, pool sizing
//! - **Scheduling**: Registration cooldowns
//! - **Income**: Aggregation defaults
//! - **Errors**: Revert selectors recognised by the classifier

use std::time::Duration;

// ============================================================================
// Units
// ============================================================================

/// Decimals of the settlement token
pub const TOKEN_DECIMALS: u32 = 18;

/// One whole token in raw chain units (10^18)
pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Raw units lost at most by 2-decimal display truncation (10^16)
pub const DISPLAY_TRUNCATION_UNIT: u128 = 10_000_000_000_000_000;

// ============================================================================
// Matrix
// ============================================================================

/// Direct downline slots per participant
pub const MATRIX_WIDTH: usize = 3;

/// Highest level a participant can reach
pub const MAX_LEVEL: u8 = 10;

/// Level reached by registering
pub const REGISTRATION_LEVEL: u8 = 1;

/// Display name used for level 0
pub const UNREGISTERED_LEVEL_NAME: &str = "Not Registered";

/// Level names indexed by `level - 1`
pub const LEVEL_NAMES: [&str; MAX_LEVEL as usize] = [
    "Newbie",
    "Apprentice",
    "Adventure",
    "Challenger",
    "Warrior",
    "Champion",
    "Master",
    "Grand Master",
    "Immortal",
    "Winner",
];

/// Level costs in whole tokens, indexed by `level - 1`
pub const LEVEL_COSTS_TOKENS: [u128; MAX_LEVEL as usize] =
    [11, 22, 44, 88, 176, 352, 704, 1408, 2816, 5632];

/// Display name for a level, `"Not Registered"` for 0 or out-of-range values
pub fn level_name(level: u8) -> &'static str {
    match level {
        1..=MAX_LEVEL => LEVEL_NAMES[(level - 1) as usize],
        _ => UNREGISTERED_LEVEL_NAME,
    }
}

/// Raw cost of reaching `level`, `None` for 0 or levels above the table
pub fn level_cost(level: u8) -> Option<u128> {
    match level {
        1..=MAX_LEVEL => Some(LEVEL_COSTS_TOKENS[(level - 1) as usize] * ONE_TOKEN),
        _ => None,
    }
}

/// Raw registration cost (level 1)
pub const REGISTRATION_COST: u128 = 11 * ONE_TOKEN;

/// Allowance requested before registering when the current allowance is lower
pub const DEFAULT_REGISTRATION_APPROVE_AMOUNT: u128 = 10_000 * ONE_TOKEN;

// ============================================================================
// Royalty
// ============================================================================

/// Number of royalty tiers
pub const TIER_COUNT: usize = 4;

/// Days a tier pays out once achieved; pool = daily amount x days
pub const ROYALTY_POOL_DAYS: u128 = 500;

/// Tier display names
pub const TIER_NAMES: [&str; TIER_COUNT] = ["FFR1", "FFR2", "FFR3", "FFR4"];

/// Daily royalty per tier in raw units
pub const TIER_DAILY_AMOUNTS: [u128; TIER_COUNT] = [
    15 * ONE_TOKEN,
    40 * ONE_TOKEN,
    80 * ONE_TOKEN,
    200 * ONE_TOKEN,
];

/// Matrix depth whose activations are counted for each tier
pub const TIER_ACTIVATION_DEPTHS: [u32; TIER_COUNT] = [2, 3, 4, 5];

/// Strong-leg threshold per tier (weak legs are measured against the same bar)
pub const TIER_REQUIRED_STRONG: [u64; TIER_COUNT] = [3, 4, 5, 6];

/// Minimum level a downline must hold to count, per tier
pub const TIER_REQUIRED_LEVEL: [u8; TIER_COUNT] = [2, 3, 4, 5];

/// Informational total per tier
pub const TIER_TOTAL: [u64; TIER_COUNT] = [6, 8, 10, 12];

// ============================================================================
// Scheduling
// ============================================================================

/// Registration cooldown observed in the dashboard variant of the client
pub const REGISTRATION_COOLDOWN_DAILY: Duration = Duration::from_secs(24 * 60 * 60);

/// Registration cooldown observed in the polling variant of the client
pub const REGISTRATION_COOLDOWN_SHORT: Duration = Duration::from_secs(2 * 60);

/// Default poll interval for the schedulers
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);

// ============================================================================
// Income
// ============================================================================

/// Events requested in one window by the client-aggregated strategy
pub const DEFAULT_INCOME_WINDOW: u64 = 1000;

/// Default page size of the income list
pub const DEFAULT_ITEMS_PER_PAGE: u64 = 5;

// ============================================================================
// Errors
// ============================================================================

/// `ERC20InsufficientAllowance` custom error selector
pub const INSUFFICIENT_ALLOWANCE_SELECTOR: &str = "0xfb8f41b2";

/// `ERC20InsufficientBalance` custom error selector
pub const INSUFFICIENT_BALANCE_SELECTOR: &str = "0xe450d38c";
