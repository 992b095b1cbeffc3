//! Money value object.

use serde::{Deserialize, Serialize};

/// Money amount in the smallest unit of the store currency.
///
/// The store trades in IDR, which has no minor unit in practice, so one unit
/// is one rupiah. Integer arithmetic keeps totals exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    amount: i64,
}

impl Money {
    /// ISO 4217 code of the store currency.
    pub const CURRENCY: &'static str = "IDR";

    /// Creates a new Money amount.
    pub const fn new(amount: i64) -> Self {
        Self { amount }
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self { amount: 0 }
    }

    /// Returns the raw amount.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Multiplies by a quantity. Returns `None` on overflow.
    pub fn checked_multiply(&self, quantity: i32) -> Option<Money> {
        self.amount.checked_mul(i64::from(quantity)).map(Money::new)
    }

    /// Adds two amounts. Returns `None` on overflow.
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.amount.checked_add(other.amount).map(Money::new)
    }

    /// Splits the amount into `parts` shares that sum back to it exactly.
    ///
    /// Every share gets the floor of the even split; the remainder is handed
    /// out one unit at a time to the leading shares. Returns an empty vector
    /// when `parts` is zero.
    pub fn split(&self, parts: usize) -> Vec<Money> {
        if parts == 0 {
            return Vec::new();
        }
        let n = parts as i64;
        let base = self.amount.div_euclid(n);
        let remainder = self.amount.rem_euclid(n);
        (0..n)
            .map(|i| Money::new(base + i64::from(i < remainder)))
            .collect()
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", Self::CURRENCY, self.amount)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            amount: self.amount + rhs.amount,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            amount: self.amount - rhs.amount,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.amount += rhs.amount;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.amount -= rhs.amount;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
