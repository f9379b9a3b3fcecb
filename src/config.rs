use chrono::{NaiveDate, Utc};

use crate::shared::PolicyError;

pub const DEFAULT_SET_CACHE_CAPACITY: usize = 10_000;

/// Settings for building a [`PolicyDocument`](crate::document::PolicyDocument).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Date `withdrawn:` attributes are compared against. `None` means today.
    pub reference_date: Option<NaiveDate>,

    /// Number of resolved sets kept in the memo.
    pub set_cache_capacity: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            reference_date: None,
            set_cache_capacity: DEFAULT_SET_CACHE_CAPACITY,
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn with_set_cache_capacity(mut self, capacity: usize) -> Self {
        self.set_cache_capacity = capacity;
        self
    }

    pub fn effective_reference_date(&self) -> NaiveDate {
        self.reference_date.unwrap_or_else(|| Utc::now().date_naive())
    }
}

/// Parse a `YYYYMMDD` date, the format used by `withdrawn:`.
pub fn parse_rpsl_date(value: &str) -> Result<NaiveDate, PolicyError> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d")
        .map_err(|_| PolicyError::InvalidDate(value.to_string()))
}
