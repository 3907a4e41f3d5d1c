//! TetherWave Core - referral matrix domain logic
//!
//! This crate holds the pure, synchronous part of the TetherWave client:
//! - Fixed-point amount formatting (18-decimal chain units)
//! - Strong/weak leg classification of per-branch activation counts
//! - Royalty tier qualification and progress evaluation
//! - Classification of raw ledger failures into user-facing causes
//!
//! Nothing here performs I/O. The async engine (`tw-engine`) feeds ledger
//! data through these functions and schedules writes around the results.

pub mod amount;
pub mod classify;
pub mod constants;
pub mod error;
pub mod legs;
pub mod tier;
pub mod types;

pub use amount::{to_display, to_display_full, to_display_str, to_raw};
pub use classify::{classify_failure, ClassifiedFailure, FailureCause};
pub use constants::*;
pub use error::{CoreError, CoreResult};
pub use legs::{classify_legs, LegSplit};
pub use tier::{
    is_achieved, is_qualified, strong_leg_progress_pct, weak_leg_progress_pct, TierSpec,
    TierStatus, TierStatusLatch, TierTable, TierView,
};
pub use types::*;
