use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Decimal places kept for rates and costs (pico-dollars).
const PRECISION: u32 = 12;

/// A non-negative USD amount.
///
/// Per-token rates are in the 1e-7..1e-4 USD range, so rounding to pico-dollars
/// keeps `tokens * rate` exact for every published Claude price and sums never
/// drift. Convert to `f64` only for presentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Usd(Decimal);

impl Usd {
    pub const ZERO: Usd = Usd(Decimal::ZERO);

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    /// Converts a float dollar value. Negative, NaN and infinite inputs map to zero.
    pub fn from_f64(usd: f64) -> Self {
        if !usd.is_finite() || usd <= 0.0 {
            return Usd::ZERO;
        }
        Decimal::from_f64(usd)
            .map(|d| Usd(d.round_dp(PRECISION)))
            .unwrap_or(Usd(Decimal::MAX))
    }

    /// Dollars per million tokens into a per-token rate.
    pub fn per_million(usd_per_million: f64) -> Self {
        if !usd_per_million.is_finite() || usd_per_million <= 0.0 {
            return Usd::ZERO;
        }
        Decimal::from_f64(usd_per_million)
            .map(|d| Usd((d / Decimal::from(1_000_000)).round_dp(PRECISION)))
            .unwrap_or(Usd(Decimal::MAX))
    }

    pub fn as_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// `self` treated as a per-unit rate, times a unit count.
    pub fn times(self, count: u64) -> Usd {
        Usd(self
            .0
            .checked_mul(Decimal::from(count))
            .unwrap_or(Decimal::MAX))
    }

    /// Scales a rate by a multiplier (e.g. 1.25 for cache writes).
    pub fn scaled(self, factor: f64) -> Usd {
        match Decimal::from_f64(factor) {
            Some(f) if f > Decimal::ZERO => Usd(self
                .0
                .checked_mul(f)
                .unwrap_or(Decimal::MAX)
                .round_dp(PRECISION)),
            _ => Usd::ZERO,
        }
    }
}

impl Add for Usd {
    type Output = Usd;

    fn add(self, rhs: Usd) -> Usd {
        Usd(self.0.checked_add(rhs.0).unwrap_or(Decimal::MAX))
    }
}

impl AddAssign for Usd {
    fn add_assign(&mut self, rhs: Usd) {
        *self = *self + rhs;
    }
}

impl Sum for Usd {
    fn sum<I: Iterator<Item = Usd>>(iter: I) -> Usd {
        iter.fold(Usd::ZERO, |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a Usd> for Usd {
    fn sum<I: Iterator<Item = &'a Usd>>(iter: I) -> Usd {
        iter.copied().sum()
    }
}

impl fmt::Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.6}", self.0)
    }
}

impl Serialize for Usd {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Usd {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = f64::deserialize(deserializer)?;
        Ok(Usd::from_f64(v))
    }
}
