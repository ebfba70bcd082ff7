//! Positive line item quantity.

use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The quantity is zero.
    #[error("quantity must be at least 1")]
    Zero,
    /// The quantity is negative.
    #[error("quantity cannot be negative: {0}")]
    Negative(i64),
    /// The quantity does not fit in 32 bits.
    #[error("quantity must be at most {max}")]
    TooLarge {
        /// Maximum representable quantity.
        max: u32,
    },
    /// The input is not an integer.
    #[error("quantity is not a whole number: {0}")]
    NotANumber(String),
}

/// A line item quantity.
///
/// Always at least 1. A line item whose quantity would drop to zero is
/// removed from the cart instead of being stored, so zero is not a value this
/// type can hold.
///
/// No upper bound is enforced beyond the width of `u32`; addition saturates
/// rather than wrapping.
///
/// ## Examples
///
/// ```
/// use cartsync_core::Quantity;
///
/// let two = Quantity::new(2).unwrap();
/// let three = Quantity::new(3).unwrap();
/// assert_eq!(two.saturating_add(three).get(), 5);
///
/// assert!(Quantity::new(0).is_err());
/// assert!(Quantity::try_from(-1_i64).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A quantity of one.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Create a quantity from a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::Zero`] if `value` is 0.
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        match NonZeroU32::new(value) {
            Some(n) => Ok(Self(n)),
            None => Err(QuantityError::Zero),
        }
    }

    /// Returns the quantity as a `u32`.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Adds two quantities, saturating at `u32::MAX`.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0.get()))
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(QuantityError::Negative(value));
        }
        let value = u32::try_from(value).map_err(|_| QuantityError::TooLarge { max: u32::MAX })?;
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

impl std::str::FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<i64>()
            .map_err(|_| QuantityError::NotANumber(s.to_owned()))?;
        Self::try_from(value)
    }
}
