//! Poll scopes.
//!
//! A poll result is authoritative for exactly one scope. Keeping scopes
//! distinct lets a date poll and a nearby poll replace their own subset
//! of the feed without clobbering each other.

use crate::error::{CoreError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Query scope of a full poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollScope {
    /// Orders assigned to the driver on a given day.
    Date(NaiveDate),
    /// Nearby unassigned ad-hoc orders.
    Nearby,
    /// Any other query the caller wants to keep separate.
    Named(String),
}

impl PollScope {
    /// Short label for metrics (low cardinality: dates collapse to "date").
    pub fn label(&self) -> &str {
        match self {
            Self::Date(_) => "date",
            Self::Nearby => "nearby",
            Self::Named(name) => name,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date(_))
    }
}

impl fmt::Display for PollScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(date) => write!(f, "date:{}", date.format("%Y-%m-%d")),
            Self::Nearby => write!(f, "nearby"),
            Self::Named(name) => write!(f, "named:{name}"),
        }
    }
}

impl FromStr for PollScope {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        if s == "nearby" {
            return Ok(Self::Nearby);
        }
        if let Some(date) = s.strip_prefix("date:") {
            return Ok(Self::Date(NaiveDate::parse_from_str(date, "%Y-%m-%d")?));
        }
        match s.strip_prefix("named:") {
            Some(name) if !name.is_empty() => Ok(Self::Named(name.to_string())),
            _ => Err(CoreError::InvalidScope(s.to_string())),
        }
    }
}
