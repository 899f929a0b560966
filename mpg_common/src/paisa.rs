use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const BDT_CURRENCY_CODE: &str = "BDT";
pub const PAISA_PER_TAKA: i64 = 100;

//--------------------------------------        Paisa        ---------------------------------------------------------
/// An amount of Bangladeshi Taka, held as a whole number of paisa (1/100 Taka).
///
/// All balances, commissions and transaction amounts in the gateway use this type, so that two-decimal arithmetic is
/// exact. On the wire and in the database, the raw paisa count is used.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Paisa(i64);

op!(binary Paisa, Add, add);
op!(binary Paisa, Sub, sub);
op!(inplace Paisa, AddAssign, add_assign);
op!(inplace Paisa, SubAssign, sub_assign);
op!(unary Paisa, Neg, neg);

impl Sum for Paisa {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Value cannot be represented in paisa: {0}")]
pub struct PaisaConversionError(String);

impl From<i64> for Paisa {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Paisa {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Paisa {}

impl TryFrom<u64> for Paisa {
    type Error = PaisaConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(PaisaConversionError(format!("Value {} is too large to convert to Paisa", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Paisa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_taka = PAISA_PER_TAKA as u64;
        write!(f, "{sign}Tk {}.{:02}", abs / per_taka, abs % per_taka)
    }
}

impl Paisa {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// For amounts known to be in range, such as constants. Use [`Paisa::try_from_taka`] for anything user supplied.
    pub fn from_taka(taka: i64) -> Self {
        Self(taka.saturating_mul(PAISA_PER_TAKA))
    }

    pub fn try_from_taka(taka: i64) -> Result<Self, PaisaConversionError> {
        taka.checked_mul(PAISA_PER_TAKA)
            .map(Self)
            .ok_or_else(|| PaisaConversionError(format!("Tk {taka} is too large to convert to Paisa")))
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parses a Taka amount as it appears in provider notifications, e.g. `500`, `1,500.5` or `10,000.00`.
    ///
    /// Thousands separators are ignored. At most two fractional digits are accepted, since anything finer cannot be
    /// represented in paisa. Negative amounts are rejected.
    pub fn parse_taka(s: &str) -> Result<Self, PaisaConversionError> {
        let cleaned = s.trim().replace(',', "");
        let err = || PaisaConversionError(format!("'{s}' is not a valid Taka amount"));
        let (whole, frac) = match cleaned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (cleaned.as_str(), ""),
        };
        if whole.is_empty() || frac.len() > 2 {
            return Err(err());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(err());
        }
        let whole = whole.parse::<i64>().map_err(|_| err())?;
        let frac = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| err())? * 10,
            _ => frac.parse::<i64>().map_err(|_| err())?,
        };
        whole.checked_mul(PAISA_PER_TAKA).and_then(|p| p.checked_add(frac)).map(Self).ok_or_else(err)
    }
}
