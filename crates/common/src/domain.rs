//! DNS name newtype used across frontdoor.
//!
//! A [`Domain`] is always lower-cased, trimmed and free of a trailing root
//! dot, so two spellings of the same host compare equal and sort together.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Prefix stripped by the redirect layer and added for the alternate name.
pub const WWW_PREFIX: &str = "www.";

/// Longest name accepted, per RFC 1035 presentation format.
const MAX_DOMAIN_LEN: usize = 253;

/// Reasons a string is not accepted as a [`Domain`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("domain name is empty")]
    Empty,

    #[error("domain name '{0}' is longer than 253 characters")]
    TooLong(String),

    #[error("domain name '{0}' contains an empty label")]
    EmptyLabel(String),

    #[error("domain name '{name}' contains invalid character '{ch}'")]
    InvalidCharacter { name: String, ch: char },
}

/// A normalized DNS name.
///
/// Serializes as a plain string so it can appear directly in the
/// certificate policy document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Domain(String);

impl Domain {
    /// Parse and normalize a domain name.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(DomainError::Empty);
        }

        let name = trimmed.to_ascii_lowercase();
        if name.len() > MAX_DOMAIN_LEN {
            return Err(DomainError::TooLong(name));
        }

        for label in name.split('.') {
            if label.is_empty() {
                return Err(DomainError::EmptyLabel(name));
            }
            if let Some(ch) = label
                .chars()
                .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
            {
                return Err(DomainError::InvalidCharacter { name, ch });
            }
        }

        Ok(Self(name))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }

    /// Whether this is a `www.`-prefixed name
    pub fn is_www(&self) -> bool {
        self.0.starts_with(WWW_PREFIX) && self.0.len() > WWW_PREFIX.len()
    }

    /// The root form: exactly one leading `www.` removed.
    pub fn root(&self) -> Domain {
        match self.0.strip_prefix(WWW_PREFIX) {
            Some(rest) if !rest.is_empty() => Self(rest.to_string()),
            _ => self.clone(),
        }
    }

    /// The `www.` form of this name.
    pub fn www(&self) -> Domain {
        Self(format!("{}{}", WWW_PREFIX, self.0))
    }

    /// Number of `.` separators in the name.
    ///
    /// `example.com` has one, `blog.example.com` has two.
    pub fn interior_dots(&self) -> usize {
        self.0.matches('.').count()
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Domain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Domain {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

impl AsRef<str> for Domain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Domain {
    fn borrow(&self) -> &str {
        &self.0
    }
}
