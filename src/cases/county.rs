//! County name handling
//!
//! Reference data may store either the short form ("Cecil") or the full form
//! ("Cecil County"). Both sides of every comparison go through
//! [`normalize_county`], and the comparison itself is exact and case-sensitive.

const COUNTY_SUFFIX: &str = " County";

/// Strip surrounding whitespace and a trailing " County"
pub fn normalize_county(name: &str) -> &str {
    let trimmed = name.trim();
    trimmed
        .strip_suffix(COUNTY_SUFFIX)
        .map_or(trimmed, str::trim_end)
}

/// The county this service answers for, held in short form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct County {
    name: String,
}

impl County {
    pub fn new(name: &str) -> Self {
        Self {
            name: normalize_county(name).to_string(),
        }
    }

    pub fn short_name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}{COUNTY_SUFFIX}", self.name)
    }

    /// Whether a county value from the reference table names this county
    pub fn matches(&self, stored: &str) -> bool {
        normalize_county(stored) == self.name
    }
}
