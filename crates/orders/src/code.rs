//! Sequence-generated order codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::{DomainError, DomainResult, ValueObject};

/// Number of decimal digits in an order code.
pub const CODE_WIDTH: usize = 10;

const MAX_CODE: u64 = 9_999_999_999;

/// Failure deriving the next code of a series.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// A stored code in the series is not a decimal number.
    #[error("stored code {0:?} is not numeric")]
    NonNumeric(String),

    /// The series has no codes left at this width.
    #[error("code series exhausted at {MAX_CODE}")]
    Exhausted,
}

/// Business code of an order header: a zero-padded, fixed-width decimal
/// string such as `"0000000042"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct OrderCode(String);

impl ValueObject for OrderCode {}

impl TryFrom<String> for OrderCode {
    type Error = DomainError;

    fn try_from(raw: String) -> DomainResult<Self> {
        Self::parse(&raw)
    }
}

impl From<OrderCode> for String {
    fn from(code: OrderCode) -> Self {
        code.0
    }
}

impl OrderCode {
    /// Code of the first order in an empty series.
    pub fn first() -> Self {
        Self::format(1)
    }

    /// Build the code for a numeric value.
    pub fn from_value(value: u64) -> Result<Self, SequenceError> {
        if value == 0 || value > MAX_CODE {
            return Err(SequenceError::Exhausted);
        }
        Ok(Self::format(value))
    }

    /// Parse a caller-supplied code (1 to 10 digits, normalized to 10).
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomainError::validation("code is required"));
        }
        if raw.len() > CODE_WIDTH || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::validation(format!(
                "code must be at most {CODE_WIDTH} decimal digits"
            )));
        }
        let value: u64 = raw
            .parse()
            .map_err(|_| DomainError::validation("code must be numeric"))?;
        if value == 0 {
            return Err(DomainError::validation("code must be greater than zero"));
        }
        Ok(Self::format(value))
    }

    /// Next code after the highest numeric code among `existing`.
    ///
    /// An empty series yields [`OrderCode::first`]. Any stored code that is
    /// not a decimal number makes the series corrupt.
    pub fn next_after<'a, I>(existing: I) -> Result<Self, SequenceError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut max = 0u64;
        for code in existing {
            max = max.max(stored_value(code)?);
        }
        Self::from_value(max.checked_add(1).ok_or(SequenceError::Exhausted)?)
    }

    /// Rebuild a code read back from storage.
    pub fn from_stored(raw: &str) -> Result<Self, SequenceError> {
        Self::from_value(stored_value(raw)?)
    }

    pub fn value(&self) -> u64 {
        // Constructed only from validated digits.
        self.0.parse().unwrap_or(0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn format(value: u64) -> Self {
        Self(format!("{value:0width$}", width = CODE_WIDTH))
    }
}

/// Numeric value of a code as persisted (not necessarily padded).
pub fn stored_value(code: &str) -> Result<u64, SequenceError> {
    let trimmed = code.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SequenceError::NonNumeric(code.to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| SequenceError::NonNumeric(code.to_string()))
}

impl core::fmt::Display for OrderCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
