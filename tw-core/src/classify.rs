//! Ledger failure classification
//!
//! Maps raw failure text from a reverted or rejected ledger call to a small
//! closed set of causes. Recognition is by embedded custom-error selector or
//! by well-known revert substrings. Unrecognised failures keep their raw
//! message for display. Nothing here retries.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{INSUFFICIENT_ALLOWANCE_SELECTOR, INSUFFICIENT_BALANCE_SELECTOR};

/// User-facing cause of a failed write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    InsufficientAllowance,
    InsufficientBalance,
    Generic,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::InsufficientAllowance => write!(f, "insufficient allowance"),
            FailureCause::InsufficientBalance => write!(f, "insufficient balance"),
            FailureCause::Generic => write!(f, "transaction failed"),
        }
    }
}

/// A classified failure with the original text preserved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedFailure {
    pub cause: FailureCause,
    pub raw: String,
}

impl ClassifiedFailure {
    /// Message suitable for showing to the participant
    pub fn user_message(&self) -> String {
        match self.cause {
            FailureCause::InsufficientAllowance => {
                "Insufficient token allowance. Please approve token spending first.".to_string()
            }
            FailureCause::InsufficientBalance => {
                "Insufficient token balance. Please check your balance and try again.".to_string()
            }
            FailureCause::Generic if self.raw.trim().is_empty() => "Transaction failed".to_string(),
            FailureCause::Generic => self.raw.clone(),
        }
    }
}

const ALLOWANCE_MARKERS: [&str; 3] = [
    "erc20insufficientallowance",
    "insufficient allowance",
    "transfer amount exceeds allowance",
];

const BALANCE_MARKERS: [&str; 3] = [
    "erc20insufficientbalance",
    "insufficient balance",
    "transfer amount exceeds balance",
];

/// Classify raw failure text
pub fn classify_failure(raw: &str) -> ClassifiedFailure {
    let lower = raw.to_lowercase();

    let cause = if lower.contains(INSUFFICIENT_ALLOWANCE_SELECTOR)
        || ALLOWANCE_MARKERS.iter().any(|m| lower.contains(m))
    {
        FailureCause::InsufficientAllowance
    } else if lower.contains(INSUFFICIENT_BALANCE_SELECTOR)
        || BALANCE_MARKERS.iter().any(|m| lower.contains(m))
    {
        FailureCause::InsufficientBalance
    } else {
        FailureCause::Generic
    };

    ClassifiedFailure {
        cause,
        raw: raw.to_string(),
    }
}
