//! Exact decimal money amounts.

use std::iter::Sum;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

const CENT_SCALE: u32 = 2;

/// A money amount in the shop's currency.
///
/// Backed by a [`Decimal`] so that totals such as `19.99 * 3` are exact;
/// no floating point is involved at any stage. Serialized as a string
/// (`"59.97"`) to keep the precision across JSON.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Wraps a decimal amount.
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Creates an amount from minor units, e.g. `from_cents(1999)` is `19.99`.
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Returns zero.
    pub const fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal.
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Whether the amount is expressible in whole cents, the precision
    /// prices are stored with. Trailing zeros do not count: `1.500` fits.
    pub fn is_whole_cents(&self) -> bool {
        self.0.normalize().scale() <= CENT_SCALE
    }

    /// The same amount written with exactly two decimal places. Amounts
    /// finer than a cent are rounded half away from zero.
    pub fn to_cents_scale(self) -> Money {
        let mut amount = self
            .0
            .round_dp_with_strategy(CENT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        amount.rescale(CENT_SCALE);
        Money(amount)
    }

    /// Multiplies by a line quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0 * Decimal::from(quantity))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}
