use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

use crate::error::InvenError;

/// An amount of money in minor units (sen / cents).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub fn value(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, rhs: Cents) -> Result<Cents, InvenError> {
        self.0.checked_add(rhs.0).map(Cents).ok_or_else(out_of_range)
    }

    /// Price of `quantity` units.
    pub fn times(self, quantity: i64) -> Result<Cents, InvenError> {
        self.0.checked_mul(quantity).map(Cents).ok_or_else(out_of_range)
    }

    /// Tax on this amount at `basis_points` (600 = 6 %), rounded half-up to the cent.
    pub fn tax(self, basis_points: i64) -> Result<Cents, InvenError> {
        let scaled = self.0.checked_mul(basis_points).ok_or_else(out_of_range)?;
        let rounded = if scaled >= 0 {
            scaled.checked_add(5_000)
        } else {
            scaled.checked_sub(5_000)
        }
        .ok_or_else(out_of_range)?;
        Ok(Cents(rounded / 10_000))
    }

    /// Integer division rounded half-up; zero when `count` is zero.
    pub fn average(self, count: i64) -> Cents {
        if count <= 0 {
            return Cents::ZERO;
        }
        let (sum, count) = (i128::from(self.0), i128::from(count));
        Cents(((sum * 2 + count) / (count * 2)) as i64)
    }
}

fn out_of_range() -> InvenError {
    InvenError::validation("amount", "amount is out of range")
}

/// Add up amounts, failing instead of wrapping.
pub fn checked_sum<I: IntoIterator<Item = Cents>>(amounts: I) -> Result<Cents, InvenError> {
    amounts
        .into_iter()
        .try_fold(Cents::ZERO, |acc, amount| acc.checked_add(amount))
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Sub for Cents {
    type Output = Cents;
    fn sub(self, rhs: Cents) -> Cents {
        Cents(self.0 - rhs.0)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_percent_tax_rounds_half_up() {
        assert_eq!(Cents(1000).tax(600).unwrap(), Cents(60));
        // 2.50 * 6% = 0.15
        assert_eq!(Cents(250).tax(600).unwrap(), Cents(15));
        // 0.25 * 6% = 0.015 -> 0.02
        assert_eq!(Cents(25).tax(600).unwrap(), Cents(2));
        // 0.24 * 6% = 0.0144 -> 0.01
        assert_eq!(Cents(24).tax(600).unwrap(), Cents(1));
        assert_eq!(Cents::ZERO.tax(600).unwrap(), Cents::ZERO);
    }

    #[test]
    fn overflow_is_an_error_not_a_wrap() {
        let huge = Cents(100_000_000_000_000_000);
        assert!(matches!(huge.tax(600), Err(InvenError::Validation { .. })));
        assert!(huge.times(1_000).is_err());
        assert!(Cents(i64::MAX).checked_add(Cents(1)).is_err());
        assert_eq!(checked_sum([Cents(250), Cents(333)]).unwrap(), Cents(583));
        assert!(checked_sum([Cents(i64::MAX), Cents(1)]).is_err());
        assert_eq!(Cents(i64::MAX).average(2), Cents(i64::MAX / 2 + 1));
    }

    #[test]
    fn display_uses_two_decimals() {
        assert_eq!(Cents(123456).to_string(), "1234.56");
        assert_eq!(Cents(5).to_string(), "0.05");
        assert_eq!(Cents(-150).to_string(), "-1.50");
    }

    #[test]
    fn average_handles_empty_and_rounding() {
        assert_eq!(Cents(1000).average(0), Cents::ZERO);
        assert_eq!(Cents(1000).average(3), Cents(333));
        assert_eq!(Cents(1001).average(2), Cents(501));
    }
}
