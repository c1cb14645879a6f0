//! Value objects for the order domain.

use common::ProductId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing a decimal money amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Invalid money amount: {0:?}")]
    Invalid(String),

    /// More than two significant fractional digits.
    #[error("Money amount {0:?} has sub-cent precision")]
    SubCentPrecision(String),

    #[error("Money amount {0:?} is out of range")]
    Overflow(String),
}

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Parses a decimal amount such as `"10"`, `"10.5"` or `"10.00"`.
    ///
    /// Trailing zeros beyond the second fractional digit are accepted;
    /// anything that would need rounding is rejected.
    pub fn parse_decimal(input: &str) -> Result<Money, MoneyError> {
        let raw = input.trim();
        let invalid = || MoneyError::Invalid(input.to_string());

        let (negative, unsigned) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > 2 {
            return Err(MoneyError::SubCentPrecision(input.to_string()));
        }

        let whole_units: i64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| MoneyError::Overflow(input.to_string()))?
        };
        let fraction_cents = fraction
            .bytes()
            .zip([10i64, 1])
            .map(|(digit, scale)| i64::from(digit - b'0') * scale)
            .sum::<i64>();

        let cents = whole_units
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction_cents))
            .ok_or_else(|| MoneyError::Overflow(input.to_string()))?;

        Ok(Money::from_cents(if negative { -cents } else { cents }))
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, failing instead of wrapping on overflow.
    pub fn multiply(&self, quantity: u32) -> Result<Money, MoneyError> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
            .ok_or_else(|| {
                MoneyError::Overflow(format!("{} x {quantity}", self.to_decimal_string()))
            })
    }

    /// Adds two amounts, failing instead of wrapping on overflow.
    pub fn checked_add(&self, rhs: Money) -> Result<Money, MoneyError> {
        self.cents
            .checked_add(rhs.cents)
            .map(Money::from_cents)
            .ok_or_else(|| {
                MoneyError::Overflow(format!(
                    "{} + {}",
                    self.to_decimal_string(),
                    rhs.to_decimal_string()
                ))
            })
    }

    /// Sums amounts, stopping at the first overflow.
    pub fn try_sum<I>(amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = Result<Money, MoneyError>>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |total, amount| total.checked_add(amount?))
    }

    /// Formats as a plain decimal string without currency symbol (`"20.00"`).
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.is_negative() { "-" } else { "" };
        format!("{sign}{}.{:02}", self.dollars().abs(), self.cents_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}

/// Shipping destination captured with the order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// A line item of a persisted order.
///
/// `unit_price` is the price captured at availability-check time; it is
/// never re-read from the catalog afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product identifier.
    pub product_id: ProductId,

    /// Quantity ordered.
    pub quantity: u32,

    /// Price per unit in cents.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the total price for this item (quantity * unit_price).
    pub fn total_price(&self) -> Result<Money, MoneyError> {
        self.unit_price.multiply(self.quantity)
    }
}
