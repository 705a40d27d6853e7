//! Validated value types shared across the Carebook crates.
//!
//! Each type checks its invariant once, at construction or deserialisation, so
//! that services never see an empty message, an out-of-range rating or a
//! non-positive charge.

/// Errors that can occur when creating validated value types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValueError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    EmptyText,
    /// A rating outside the inclusive 1..=5 range
    #[error(
        "rating must be between {min} and {max}, got {0}",
        min = Rating::MIN,
        max = Rating::MAX
    )]
    RatingOutOfRange(i64),
    /// A monetary amount that is zero, negative or not a finite number
    #[error("amount must be a positive finite number, got {0}")]
    InvalidAmount(f64),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::EmptyText` if the input is empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, ValueError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(ValueError::EmptyText);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A review rating on the inclusive scale 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Creates a rating, rejecting values outside `MIN..=MAX`.
    ///
    /// Accepts any integer so that callers can pass raw request values and
    /// receive a precise error instead of a truncation.
    pub fn new(value: i64) -> Result<Self, ValueError> {
        if value < i64::from(Self::MIN) || value > i64::from(Self::MAX) {
            return Err(ValueError::RatingOutOfRange(value));
        }
        Ok(Self(value as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Rating {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Rating {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = i64::deserialize(deserializer)?;
        Rating::new(value).map_err(serde::de::Error::custom)
    }
}

/// A strictly positive, finite monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Amount(f64);

impl Amount {
    pub fn new(value: f64) -> Result<Self, ValueError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(ValueError::InvalidAmount(value));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl serde::Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Amount::new(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  hello ").expect("should accept padded text");
        assert_eq!(text.as_str(), "hello");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        let err = NonEmptyText::new("   ").expect_err("whitespace should be rejected");
        assert_eq!(err, ValueError::EmptyText);
    }

    #[test]
    fn rating_accepts_bounds_and_rejects_outside() {
        assert_eq!(Rating::new(1).unwrap().get(), 1);
        assert_eq!(Rating::new(5).unwrap().get(), 5);
        assert_eq!(Rating::new(0), Err(ValueError::RatingOutOfRange(0)));
        assert_eq!(Rating::new(6), Err(ValueError::RatingOutOfRange(6)));
    }

    #[test]
    fn rating_deserialise_rejects_out_of_range() {
        let err = serde_json::from_str::<Rating>("9").expect_err("9 is not a valid rating");
        assert!(err.to_string().contains("between 1 and 5"));
    }

    #[test]
    fn amount_rejects_zero_negative_and_nan() {
        assert!(Amount::new(0.0).is_err());
        assert!(Amount::new(-3.5).is_err());
        assert!(Amount::new(f64::NAN).is_err());
        assert_eq!(Amount::new(50.0).unwrap().get(), 50.0);
    }
}
