//! Postal addresses and the normalized key used for lead dedup.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LeadflowError, Result};

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<street>[^,]+),\s*(?P<city>[^,]+),\s*(?P<state>[A-Za-z]{2})[\s,]+(?P<zip>\d{5}(?:-\d{4})?)\s*$",
    )
    .expect("address pattern is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
}

impl Address {
    pub fn new(street: &str, city: &str, state: &str, zip: &str) -> Self {
        Self {
            street: clean(street),
            city: clean(city),
            state: clean(state),
            zip: clean(zip),
        }
    }

    /// Parse a one-line address such as `"123 main st, Kansas City, KS 66101"`.
    /// Street and city are title-cased, state upper-cased.
    pub fn parse(full: &str) -> Result<Self> {
        let caps = ADDRESS_RE
            .captures(full)
            .ok_or_else(|| LeadflowError::Source(format!("Unparseable address: {full}")))?;
        Ok(Self {
            street: title_case(&clean(&caps["street"])),
            city: title_case(&clean(&caps["city"])),
            state: caps["state"].to_uppercase(),
            zip: caps["zip"].to_string(),
        })
    }

    /// All four parts present (required before skip-tracing).
    pub fn is_complete(&self) -> bool {
        !self.street.is_empty()
            && !self.city.is_empty()
            && !self.state.is_empty()
            && !self.zip.is_empty()
    }

    /// Dedup identity: lowercase, whitespace-collapsed street/city/state/zip.
    pub fn normalized_key(&self) -> String {
        [&self.street, &self.city, &self.state, &self.zip]
            .iter()
            .map(|part| {
                part.split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            })
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}, {} {}", self.street, self.city, self.state, self.zip)
    }
}

fn clean(part: &str) -> String {
    part.trim().trim_matches(',').trim().to_string()
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_one_line_address() {
        let addr = Address::parse("123 MAIN st, kansas city, ks 66101").unwrap();
        assert_eq!(addr.street, "123 Main St");
        assert_eq!(addr.city, "Kansas City");
        assert_eq!(addr.state, "KS");
        assert_eq!(addr.zip, "66101");
        assert!(addr.is_complete());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Address::parse("somewhere over the rainbow").is_err());
    }

    #[test]
    fn test_normalized_key_ignores_case_and_spacing() {
        let a = Address::new("123  Main St", "Kansas City", "KS", "66101");
        let b = Address::new("123 main st", " kansas city ", "ks", "66101");
        assert_eq!(a.normalized_key(), b.normalized_key());

        let c = Address::new("125 Main St", "Kansas City", "KS", "66101");
        assert_ne!(a.normalized_key(), c.normalized_key());
    }

    #[test]
    fn test_incomplete_address() {
        let addr = Address::new("123 Main St", "Kansas City", "", "66101");
        assert!(!addr.is_complete());
    }
}
