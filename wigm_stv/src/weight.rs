use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::ops::{Add, AddAssign, Sub};

/// Number of decimal places kept internally. Every count uses at most this
/// many, truncating further at the precision set in the rules.
pub const MAX_PRECISION: u32 = 9;

const SCALE: u64 = 10u64.pow(MAX_PRECISION);

/// A fractional vote or ballot weight, stored as fixed-point units of 10^-9.
///
/// All the operations that lose information truncate toward zero, which is
/// what the WIGM rule requires. Nothing here ever rounds.
#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash, Default)]
pub struct Weight(u64);

impl Weight {
    pub const ZERO: Weight = Weight(0);
    pub const ONE: Weight = Weight(SCALE);

    pub fn from_votes(votes: u64) -> Weight {
        Weight(votes * SCALE)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// The smallest positive value representable at the given precision.
    pub fn epsilon(precision: u32) -> Weight {
        Weight(unit(precision))
    }

    /// Drops all the decimals beyond `precision`.
    pub fn truncate(self, precision: u32) -> Weight {
        let u = unit(precision);
        Weight(self.0 - self.0 % u)
    }

    /// `count / divisor`, truncated at `precision`.
    pub fn ratio(count: u64, divisor: u64, precision: u32) -> Weight {
        let raw = (count as u128 * SCALE as u128) / divisor as u128;
        Weight(raw as u64).truncate(precision)
    }

    /// `self * numerator / denominator`, truncated at `precision`.
    ///
    /// A zero denominator yields zero: there is nothing to scale.
    pub fn scale(self, numerator: Weight, denominator: Weight, precision: u32) -> Weight {
        if denominator.is_zero() {
            return Weight::ZERO;
        }
        let raw = (self.0 as u128 * numerator.0 as u128) / denominator.0 as u128;
        Weight(raw as u64).truncate(precision)
    }

    pub fn saturating_sub(self, rhs: Weight) -> Weight {
        Weight(self.0.saturating_sub(rhs.0))
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

fn unit(precision: u32) -> u64 {
    10u64.pow(MAX_PRECISION - precision.min(MAX_PRECISION))
}

impl std::iter::Sum for Weight {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Weight(iter.map(|w| w.0).sum())
    }
}

impl AddAssign for Weight {
    fn add_assign(&mut self, rhs: Weight) {
        self.0 += rhs.0;
    }
}

impl Add for Weight {
    type Output = Weight;
    fn add(self, rhs: Weight) -> Weight {
        Weight(self.0 + rhs.0)
    }
}

impl Sub for Weight {
    type Output = Weight;
    fn sub(self, rhs: Weight) -> Weight {
        Weight(self.0 - rhs.0)
    }
}

impl Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let int = self.0 / SCALE;
        let frac = self.0 % SCALE;
        match f.precision() {
            Some(p) => {
                let p = p.min(MAX_PRECISION as usize);
                let digits = frac / 10u64.pow(MAX_PRECISION - p as u32);
                if p == 0 {
                    write!(f, "{}", int)
                } else {
                    write!(f, "{}.{:0width$}", int, digits, width = p)
                }
            }
            None => {
                let s = format!("{:09}", frac);
                let trimmed = s.trim_end_matches('0');
                if trimmed.is_empty() {
                    write!(f, "{}", int)
                } else {
                    write!(f, "{}.{}", int, trimmed)
                }
            }
        }
    }
}

impl Serialize for Weight {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}
