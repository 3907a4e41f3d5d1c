//! Core type definitions for the TetherWave client
//!
//! Ledger reads arrive as positional tuples of parallel arrays. Every type
//! here is the named-field form of one of those tuples; the engine's
//! decoders do the conversion and check column lengths on the way in.

mod common;
mod downline;
mod income;
mod participant;
mod referral;
mod royalty;

pub use common::*;
pub use downline::*;
pub use income::*;
pub use participant::*;
pub use referral::*;
pub use royalty::*;
