//! Positional tuple decoding
//!
//! Contract view functions return tuples of parallel arrays. The gateway
//! hands them over as JSON arrays in declaration order:
//!
//! ```text
//! getDownlineByDepthPaginated    [addresses, sponsors, directReferrals, levels, totalCount]
//! getRecentIncomeEventsPaginated [addresses, levels, amounts, timestamps, types, totalCount]
//! getUserRoyaltyInfo             [achieved, paidDays, daysRemaining, nextClaim, earned, qualifiedNew]
//! getUserCompleteStats           [total, referral, level, upgradeReferral, teamSize, magic, directReferrals]
//! getMatrixPosition              [directSponsor, matrixSponsor, ...]
//! getUserStats                   [currentLevel, directReferrals, totalEarnings, directCommission, ...]
//! getUserTeamStats               [levels, incomes]
//! getDirectReferralDataPaginated [referrals, totalCount]
//! ```
//!
//! `getDirectReferralDataPaginated` returns an array of structs; each one may
//! come as a JSON object with the contract's field names or as a positional
//! `[userAddress, activationTime, currentLevel, directReferrals]` array.
//!
//! Integers may arrive as JSON numbers, decimal strings or `0x` hex strings.
//! A field reordering on the contract side cannot be detected here; column
//! lengths can, and a mismatch fails the whole read.

use serde_json::Value;
use tracing::warn;

use tw_core::{
    Address, CoreError, DirectReferral, DownlineEntry, DownlinePage, IncomeEvent, IncomePage,
    IncomeSummary, IncomeType, LevelIncome, ReferralPage, RoyaltyInfo, Sponsors, MATRIX_WIDTH,
};

use crate::error::{EngineError, EngineResult};

/// A positional tuple returned by one contract call
#[derive(Debug, Clone)]
pub struct Tuple<'a> {
    method: &'a str,
    items: &'a [Value],
}

impl<'a> Tuple<'a> {
    pub fn new(method: &'a str, value: &'a Value) -> EngineResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| EngineError::Decode(format!("{}: expected a tuple", method)))?;
        Ok(Self { method, items })
    }

    /// Require at least `n` fields
    pub fn expect_len(self, n: usize) -> EngineResult<Self> {
        if self.items.len() < n {
            return Err(EngineError::Decode(format!(
                "{}: expected {} fields, got {}",
                self.method,
                n,
                self.items.len()
            )));
        }
        Ok(self)
    }

    fn field(&self, i: usize) -> EngineResult<&'a Value> {
        self.items
            .get(i)
            .ok_or_else(|| EngineError::Decode(format!("{}: missing field {}", self.method, i)))
    }

    fn array(&self, i: usize) -> EngineResult<&'a [Value]> {
        self.field(i)?
            .as_array()
            .map(|v| v.as_slice())
            .ok_or_else(|| EngineError::Decode(format!("{}: field {} is not an array", self.method, i)))
    }

    pub fn u128_at(&self, i: usize) -> EngineResult<u128> {
        parse_uint(self.field(i)?).map_err(|e| self.wrap(i, e))
    }

    pub fn u64_at(&self, i: usize) -> EngineResult<u64> {
        self.narrow(i, self.u128_at(i)?)
    }

    pub fn address_at(&self, i: usize) -> EngineResult<Address> {
        parse_address(self.field(i)?).map_err(|e| self.wrap(i, e))
    }

    pub fn bool_vec_at(&self, i: usize) -> EngineResult<Vec<bool>> {
        self.array(i)?
            .iter()
            .map(|v| parse_bool(v).map_err(|e| self.wrap(i, e)))
            .collect()
    }

    pub fn u128_vec_at(&self, i: usize) -> EngineResult<Vec<u128>> {
        self.array(i)?
            .iter()
            .map(|v| parse_uint(v).map_err(|e| self.wrap(i, e)))
            .collect()
    }

    pub fn u64_vec_at(&self, i: usize) -> EngineResult<Vec<u64>> {
        self.u128_vec_at(i)?
            .into_iter()
            .map(|v| self.narrow(i, v))
            .collect()
    }

    pub fn address_vec_at(&self, i: usize) -> EngineResult<Vec<Address>> {
        self.array(i)?
            .iter()
            .map(|v| parse_address(v).map_err(|e| self.wrap(i, e)))
            .collect()
    }

    fn narrow<T: TryFrom<u128>>(&self, i: usize, v: u128) -> EngineResult<T> {
        T::try_from(v).map_err(|_| {
            EngineError::Decode(format!("{}: field {} value {} out of range", self.method, i, v))
        })
    }

    fn wrap(&self, i: usize, e: String) -> EngineError {
        EngineError::Decode(format!("{}: field {}: {}", self.method, i, e))
    }

    fn check_len(&self, field: &'static str, expected: usize, actual: usize) -> EngineResult<()> {
        if expected != actual {
            return Err(CoreError::LengthMismatch {
                field,
                expected,
                actual,
            }
            .into());
        }
        Ok(())
    }
}

fn parse_uint(v: &Value) -> Result<u128, String> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| format!("not an unsigned integer: {}", n)),
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                u128::from_str_radix(hex, 16).map_err(|e| format!("bad hex integer {}: {}", s, e))
            } else {
                s.parse().map_err(|e| format!("bad integer {}: {}", s, e))
            }
        }
        other => Err(format!("expected integer, got {}", other)),
    }
}

fn parse_bool(v: &Value) -> Result<bool, String> {
    match v {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        other => Err(format!("expected bool, got {}", other)),
    }
}

fn parse_address(v: &Value) -> Result<Address, String> {
    v.as_str()
        .ok_or_else(|| format!("expected address string, got {}", v))
        .and_then(|s| Address::from_hex(s).map_err(|e| e.to_string()))
}

fn to_u8(v: u64, what: &str) -> EngineResult<u8> {
    u8::try_from(v).map_err(|_| EngineError::Decode(format!("{} {} out of range", what, v)))
}

// ==================== Record decoders ====================

pub fn decode_current_level(value: &Value) -> EngineResult<u8> {
    let t = Tuple::new("getUserStats", value)?.expect_len(1)?;
    to_u8(t.u64_at(0)?, "level")
}

pub fn decode_direct_commission(value: &Value) -> EngineResult<u128> {
    Tuple::new("getUserStats", value)?.expect_len(4)?.u128_at(3)
}

pub fn decode_sponsors(value: &Value) -> EngineResult<Sponsors> {
    let t = Tuple::new("getMatrixPosition", value)?.expect_len(2)?;
    Ok(Sponsors {
        direct_sponsor: t.address_at(0)?,
        matrix_sponsor: t.address_at(1)?,
    })
}

pub fn decode_complete_stats(value: &Value) -> EngineResult<IncomeSummary> {
    let t = Tuple::new("getUserCompleteStats", value)?.expect_len(7)?;
    Ok(IncomeSummary {
        total_income: t.u128_at(0)?,
        referral_income: t.u128_at(1)?,
        level_income: t.u128_at(2)?,
        upgrade_referral_income: t.u128_at(3)?,
        total_team_size: t.u64_at(4)?,
        bonus_income: t.u128_at(5)?,
        direct_referrals: t.u64_at(6)?,
    })
}

pub fn decode_level_activated_count(value: &Value) -> EngineResult<[u64; MATRIX_WIDTH]> {
    let t = Tuple::new("getLevelActivatedCount", value)?.expect_len(MATRIX_WIDTH)?;
    Ok([t.u64_at(0)?, t.u64_at(1)?, t.u64_at(2)?])
}

pub fn decode_royalty_info(value: &Value) -> EngineResult<RoyaltyInfo> {
    let t = Tuple::new("getUserRoyaltyInfo", value)?.expect_len(6)?;
    Ok(RoyaltyInfo::from_columns(
        t.bool_vec_at(0)?,
        t.u64_vec_at(1)?,
        t.u64_vec_at(2)?,
        t.u64_vec_at(3)?,
        t.u128_vec_at(4)?,
        t.bool_vec_at(5)?,
    )?)
}

pub fn decode_bool_list(method: &str, value: &Value) -> EngineResult<Vec<bool>> {
    // some gateways wrap a single return value in a one-element tuple
    match value {
        Value::Array(items) if items.len() == 1 && items[0].is_array() => {
            Tuple::new(method, value)?.bool_vec_at(0)
        }
        Value::Array(items) => items
            .iter()
            .map(|v| parse_bool(v).map_err(|e| EngineError::Decode(format!("{}: {}", method, e))))
            .collect(),
        other => Err(EngineError::Decode(format!("{}: expected array, got {}", method, other))),
    }
}

pub fn decode_u64_list(method: &str, value: &Value) -> EngineResult<Vec<u64>> {
    match value {
        Value::Array(items) if items.len() == 1 && items[0].is_array() => {
            Tuple::new(method, value)?.u64_vec_at(0)
        }
        Value::Array(items) => items
            .iter()
            .map(|v| {
                parse_uint(v)
                    .and_then(|n| u64::try_from(n).map_err(|_| format!("{} out of range", n)))
                    .map_err(|e| EngineError::Decode(format!("{}: {}", method, e)))
            })
            .collect(),
        other => Err(EngineError::Decode(format!("{}: expected array, got {}", method, other))),
    }
}

pub fn decode_uint(method: &str, value: &Value) -> EngineResult<u128> {
    parse_uint(value).map_err(|e| EngineError::Decode(format!("{}: {}", method, e)))
}

pub fn decode_string(method: &str, value: &Value) -> EngineResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Array(items) if items.len() == 1 => decode_string(method, &items[0]),
        other => Err(EngineError::Decode(format!("{}: expected string, got {}", method, other))),
    }
}

pub fn decode_team_stats(value: &Value) -> EngineResult<Vec<LevelIncome>> {
    let t = Tuple::new("getUserTeamStats", value)?.expect_len(2)?;
    let levels = t.u64_vec_at(0)?;
    let incomes = t.u128_vec_at(1)?;
    t.check_len("incomes", levels.len(), incomes.len())?;

    levels
        .into_iter()
        .zip(incomes)
        .map(|(level, amount)| -> EngineResult<LevelIncome> {
            Ok(LevelIncome {
                level: to_u8(level, "level")?,
                amount,
            })
        })
        .collect()
}

fn decode_referral_row(value: &Value) -> EngineResult<DirectReferral> {
    const METHOD: &str = "getDirectReferralDataPaginated";
    let fields = match value {
        Value::Object(map) => {
            let get = |name: &str| {
                map.get(name)
                    .cloned()
                    .ok_or_else(|| EngineError::Decode(format!("{}: missing {}", METHOD, name)))
            };
            Value::Array(vec![
                get("userAddress")?,
                get("activationTime")?,
                get("currentLevel")?,
                get("directReferrals")?,
            ])
        }
        other => other.clone(),
    };

    let t = Tuple::new(METHOD, &fields)?.expect_len(4)?;
    let direct = t.u64_at(3)?;
    Ok(DirectReferral {
        address: t.address_at(0)?,
        activation_time: t.u64_at(1)?,
        current_level: to_u8(t.u64_at(2)?, "level")?,
        direct_referrals: u32::try_from(direct).map_err(|_| {
            EngineError::Decode(format!("direct referrals {} out of range", direct))
        })?,
    })
}

pub fn decode_direct_referrals(value: &Value) -> EngineResult<ReferralPage> {
    let t = Tuple::new("getDirectReferralDataPaginated", value)?.expect_len(2)?;
    let entries = t
        .array(0)?
        .iter()
        .map(decode_referral_row)
        .collect::<EngineResult<Vec<_>>>()?;
    Ok(ReferralPage {
        entries,
        total_count: t.u64_at(1)?,
    })
}

pub fn decode_downline(value: &Value) -> EngineResult<DownlinePage> {
    let t = Tuple::new("getDownlineByDepthPaginated", value)?.expect_len(5)?;
    let addresses = t.address_vec_at(0)?;
    let sponsors = t.address_vec_at(1)?;
    let direct = t.u64_vec_at(2)?;
    let levels = t.u64_vec_at(3)?;
    let total_count = t.u64_at(4)?;

    let n = addresses.len();
    t.check_len("sponsorAddresses", n, sponsors.len())?;
    t.check_len("directReferralsCount", n, direct.len())?;
    t.check_len("currentLevels", n, levels.len())?;

    let entries = addresses
        .into_iter()
        .zip(sponsors)
        .zip(direct.into_iter().zip(levels))
        .map(|((address, sponsor), (direct_referrals, level))| -> EngineResult<DownlineEntry> {
            Ok(DownlineEntry {
                address,
                sponsor,
                direct_referrals: u32::try_from(direct_referrals).map_err(|_| {
                    EngineError::Decode(format!("direct referrals {} out of range", direct_referrals))
                })?,
                current_level: to_u8(level, "level")?,
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;

    Ok(DownlinePage {
        entries,
        total_count,
    })
}

/// Decode an income page; rows with an unknown income type are dropped
pub fn decode_income_events(value: &Value) -> EngineResult<IncomePage> {
    let t = Tuple::new("getRecentIncomeEventsPaginated", value)?.expect_len(6)?;
    let addresses = t.address_vec_at(0)?;
    let levels = t.u64_vec_at(1)?;
    let amounts = t.u128_vec_at(2)?;
    let timestamps = t.u64_vec_at(3)?;
    let types = t.u64_vec_at(4)?;
    let total_count = t.u64_at(5)?;

    let n = addresses.len();
    t.check_len("levelNumbers", n, levels.len())?;
    t.check_len("amounts", n, amounts.len())?;
    t.check_len("timestamps", n, timestamps.len())?;
    t.check_len("incomeTypes", n, types.len())?;

    let mut events = Vec::with_capacity(n);
    for i in 0..n {
        let income_type = match u8::try_from(types[i])
            .map_err(|_| CoreError::UnknownIncomeType(u8::MAX))
            .and_then(IncomeType::from_code)
        {
            Ok(ty) => ty,
            Err(e) => {
                warn!(row = i, code = types[i], error = %e, "Dropping income event with unknown type");
                continue;
            }
        };
        events.push(IncomeEvent {
            address: addresses[i],
            level_number: to_u8(levels[i], "level")?,
            amount: amounts[i],
            timestamp: timestamps[i],
            income_type,
        });
    }

    Ok(IncomePage {
        events,
        total_count,
    })
}
