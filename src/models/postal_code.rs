//! Postal code (CEP) value and its syntactic validation

use std::fmt;
use std::str::FromStr;

use crate::error::ResolveError;

/// Number of digits in a CEP
pub const POSTAL_CODE_LEN: usize = 8;

/// Eight ASCII digits, checked on construction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostalCode(String);

/// Validate a raw postal code.
///
/// No normalization is applied: surrounding whitespace, dashes and
/// non-ASCII digits are all rejected.
pub fn validate(raw: &str) -> Result<PostalCode, ResolveError> {
    if raw.len() == POSTAL_CODE_LEN && raw.bytes().all(|b| b.is_ascii_digit()) {
        Ok(PostalCode(raw.to_string()))
    } else {
        Err(ResolveError::invalid_format(raw))
    }
}

impl PostalCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PostalCode {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate(s)
    }
}

impl AsRef<str> for PostalCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
