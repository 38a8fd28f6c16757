//! Fixed-point monetary amounts.
//!
//! Amounts are exact decimals held at two minor-unit places. Every operation
//! that can produce sub-minor precision (percentages, halving) rounds once, to
//! the minor unit, so repeated discount and tax steps never drift.
//!
//! Arithmetic saturates at the bounds of `Decimal` instead of panicking;
//! forms are range-checked well below those bounds before pricing runs.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Sub},
    str::FromStr,
};

/// Number of minor-unit decimal places (paise / cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

fn to_minor(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MINOR_UNIT_SCALE);
    rounded
}

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Builds an amount from a decimal, rounding to the minor unit.
    pub fn new(value: Decimal) -> Self {
        Money(to_minor(value))
    }

    /// Builds an amount from an integer count of minor units (e.g. paise).
    pub fn from_minor(minor_units: i64) -> Self {
        Money(Decimal::new(minor_units, MINOR_UNIT_SCALE))
    }

    /// Builds an amount from whole major units.
    pub fn from_major(major_units: i64) -> Self {
        Money::new(Decimal::from(major_units))
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// `self * percent / 100`, rounded half away from zero to the minor unit.
    pub fn percent(&self, percent: Decimal) -> Money {
        Money::new(self.0.saturating_mul(percent) / Decimal::ONE_HUNDRED)
    }

    /// Half of this amount, truncated toward zero at the minor unit.
    ///
    /// `half_floor() + (self - half_floor()) == self` always holds.
    pub fn half_floor(&self) -> Money {
        let mut half = (self.0 / Decimal::TWO)
            .round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::ToZero);
        half.rescale(MINOR_UNIT_SCALE);
        Money(half)
    }

    /// Two-decimal display with thousands separators, e.g. `4,252.50`.
    pub fn format_grouped(&self) -> String {
        let plain = self.to_string();
        let (sign, digits) = match plain.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", plain.as_str()),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

        let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        format!("{}{}.{}", sign, grouped, frac_part)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money::new)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money::new(value)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

/// Unit price times an integer quantity is exact at the minor unit.
impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, rhs: i64) -> Money {
        Money(self.0.saturating_mul(Decimal::from(rhs)))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        <Decimal as Deserialize>::deserialize(deserializer).map(Money::new)
    }
}
