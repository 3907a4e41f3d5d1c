//! Fixed-point amount formatting
//!
//! Chain amounts are unsigned integers scaled by 10^18. All arithmetic is
//! done on the unscaled integer; floating point never touches an amount.
//!
//! - [`to_display`]: 2-decimal truncation for UI lists (`"12.34"`)
//! - [`to_display_full`]: full precision, trailing zeros trimmed (`"12.345"`)
//! - [`to_raw`]: decimal string back to raw units, extra digits truncated

use crate::constants::{DISPLAY_TRUNCATION_UNIT, ONE_TOKEN, TOKEN_DECIMALS};
use crate::error::{CoreError, CoreResult};

/// Render a raw amount with two decimals, truncating (never rounding)
///
/// Absent input renders as `"0.00"`.
pub fn to_display(raw: Option<u128>) -> String {
    let raw = match raw {
        Some(v) => v,
        None => return "0.00".to_string(),
    };
    let whole = raw / ONE_TOKEN;
    let cents = (raw % ONE_TOKEN) / DISPLAY_TRUNCATION_UNIT;
    format!("{}.{:02}", whole, cents)
}

/// Like [`to_display`] for amounts carried as decimal strings
///
/// Absent or unparseable input renders as `"0.00"`.
pub fn to_display_str(raw: Option<&str>) -> String {
    to_display(raw.and_then(|s| s.trim().parse::<u128>().ok()))
}

/// Render a raw amount at full precision
pub fn to_display_full(raw: u128) -> String {
    let whole = raw / ONE_TOKEN;
    let frac = raw % ONE_TOKEN;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{:0width$}", frac, width = TOKEN_DECIMALS as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Parse a decimal string into raw units
///
/// Fraction digits past the 18th are dropped.
pub fn to_raw(s: &str) -> CoreResult<u128> {
    let s = s.trim();
    let invalid = || CoreError::InvalidAmount(s.to_string());

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };

    let decimals = TOKEN_DECIMALS as usize;
    let kept = &frac[..frac.len().min(decimals)];
    let frac_value: u128 = if kept.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", kept, width = decimals);
        padded.parse().map_err(|_| invalid())?
    };

    whole_value
        .checked_mul(ONE_TOKEN)
        .and_then(|v| v.checked_add(frac_value))
        .ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_display_truncates() {
        assert_eq!(to_display(Some(12_345_678_900_000_000_000)), "12.34");
        assert_eq!(to_display(Some(19_999_999_999_999_999)), "0.01");
        assert_eq!(to_display(Some(9_999_999_999_999_999)), "0.00");
        assert_eq!(to_display(Some(11 * ONE_TOKEN)), "11.00");
    }

    #[test]
    fn test_to_display_absent() {
        assert_eq!(to_display(None), "0.00");
        assert_eq!(to_display_str(None), "0.00");
        assert_eq!(to_display_str(Some("not a number")), "0.00");
        assert_eq!(to_display_str(Some("1500000000000000000")), "1.50");
    }

    #[test]
    fn test_to_display_large_values() {
        // Past f64's exact integer range; integer math keeps every digit
        let raw = 123_456_789_012_345_678_901_234_567_890u128;
        assert_eq!(to_display(Some(raw)), "123456789012.34");
    }

    #[test]
    fn test_to_display_full() {
        assert_eq!(to_display_full(0), "0");
        assert_eq!(to_display_full(5632 * ONE_TOKEN), "5632");
        assert_eq!(to_display_full(12_345_000_000_000_000_000), "12.345");
        assert_eq!(to_display_full(1), "0.000000000000000001");
    }

    #[test]
    fn test_to_raw() {
        assert_eq!(to_raw("11").unwrap(), 11 * ONE_TOKEN);
        assert_eq!(to_raw("0.5").unwrap(), ONE_TOKEN / 2);
        assert_eq!(to_raw(".25").unwrap(), ONE_TOKEN / 4);
        assert_eq!(to_raw("3.").unwrap(), 3 * ONE_TOKEN);
        assert_eq!(to_raw(" 1.000000000000000001 ").unwrap(), ONE_TOKEN + 1);
        // 19th decimal is dropped
        assert_eq!(to_raw("0.0000000000000000019").unwrap(), 1);
    }

    #[test]
    fn test_to_raw_rejects_garbage() {
        assert!(to_raw("").is_err());
        assert!(to_raw(".").is_err());
        assert!(to_raw("-1").is_err());
        assert!(to_raw("1e18").is_err());
        assert!(to_raw("1.2.3").is_err());
        assert!(to_raw("999999999999999999999999999999999999999").is_err());
    }

    #[test]
    fn test_full_precision_roundtrip() {
        let raw = 12_345_678_901_234_567_891u128;
        assert_eq!(to_raw(&to_display_full(raw)).unwrap(), raw);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_display_roundtrip_within_truncation(x in 0u128..=u128::MAX / 2) {
                let back = to_raw(&to_display(Some(x))).unwrap();
                prop_assert!(back <= x);
                prop_assert!(x - back < DISPLAY_TRUNCATION_UNIT);
            }

            #[test]
            fn prop_full_roundtrip_exact(x in any::<u64>(), scale in 0u128..=1_000_000) {
                let raw = x as u128 * scale;
                prop_assert_eq!(to_raw(&to_display_full(raw)).unwrap(), raw);
            }
        }
    }
}
