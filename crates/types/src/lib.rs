//! Validated value types shared by the registry core and its command-line front end.
//!
//! Each type checks its invariant once, at construction, so code holding one can rely on it
//! without re-validating.

use chrono::NaiveDate;

/// Number of digits in a national identifier (CI).
pub const NATIONAL_ID_LEN: usize = 8;

/// Exact length of an appointment date in `YYYY-MM-DD` form.
pub const APPOINTMENT_DATE_LEN: usize = 10;

/// Errors that can occur when creating validated types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    Empty,

    /// The identifier is not exactly as long as the storage field
    #[error("identifier must be exactly {expected} digits")]
    WrongLength { expected: usize },

    /// The identifier contains characters other than ASCII digits
    #[error("identifier must contain only digits")]
    NotNumeric,

    /// The date is not a real calendar date written as `YYYY-MM-DD`
    #[error("date must be a valid calendar date in YYYY-MM-DD form: {0:?}")]
    InvalidDate(String),
}

/// A string type that guarantees non-empty content.
///
/// The input is trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// Returns `Err(TypeError::Empty)` if the trimmed input is empty.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TypeError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TypeError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
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

/// A patient's national identifier (CI): exactly eight ASCII digits.
///
/// The value is not trimmed; surrounding whitespace is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NationalId(String);

impl NationalId {
    /// Parses and validates an identifier.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TypeError> {
        let input = input.as_ref();
        if input.is_empty() {
            return Err(TypeError::Empty);
        }
        if input.len() != NATIONAL_ID_LEN {
            return Err(TypeError::WrongLength {
                expected: NATIONAL_ID_LEN,
            });
        }
        if !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::NotNumeric);
        }
        Ok(Self(input.to_owned()))
    }

    /// Returns the identifier as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the identifier, used for hash addressing.
    pub fn numeric(&self) -> u64 {
        // At most eight digits, so this cannot overflow.
        self.0
            .bytes()
            .fold(0u64, |acc, b| acc * 10 + u64::from(b - b'0'))
    }
}

impl std::fmt::Display for NationalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NationalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for NationalId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for NationalId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NationalId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NationalId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A calendar date in `YYYY-MM-DD` form.
///
/// Both the shape and the calendar are checked, so `2024-02-30` is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppointmentDate(NaiveDate);

impl AppointmentDate {
    /// Parses a `YYYY-MM-DD` date.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TypeError> {
        let input = input.as_ref();
        let bytes = input.as_bytes();
        let shaped = bytes.len() == APPOINTMENT_DATE_LEN
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
        if !shaped {
            return Err(TypeError::InvalidDate(input.to_owned()));
        }

        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| TypeError::InvalidDate(input.to_owned()))
    }

    /// Returns the underlying calendar date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl std::fmt::Display for AppointmentDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl std::str::FromStr for AppointmentDate {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
