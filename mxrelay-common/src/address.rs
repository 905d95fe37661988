//! Recipient normalisation and grouping by destination domain.
//!
//! Callers may supply each of To/Cc/Bcc as a single address, a comma-joined
//! list of addresses, or a list. Everything is reduced to plain address
//! strings and bucketed per domain so that each domain is resolved once and
//! each unique address is delivered to once.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{Domain, MxRecord};

/// A To/Cc/Bcc value as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecipientField {
    /// Absent, or a value of a shape that carries no addresses.
    #[default]
    Empty,
    /// A single address or several joined with commas.
    Joined(String),
    /// One address per entry.
    List(Vec<String>),
}

impl RecipientField {
    /// The header rendering of this field: normalised addresses joined by `", "`.
    #[must_use]
    pub fn header_value(&self) -> String {
        normalize(self).join(", ")
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl<'de> Deserialize<'de> for RecipientField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Any shape is accepted; unsupported ones simply contribute no recipients.
        Ok(match Value::deserialize(deserializer)? {
            Value::String(joined) => Self::Joined(joined),
            Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(address) => Some(address),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => Self::Empty,
        })
    }
}

impl From<&str> for RecipientField {
    fn from(value: &str) -> Self {
        Self::Joined(value.to_string())
    }
}

impl From<String> for RecipientField {
    fn from(value: String) -> Self {
        Self::Joined(value)
    }
}

impl From<Vec<String>> for RecipientField {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<&str>> for RecipientField {
    fn from(value: Vec<&str>) -> Self {
        Self::List(value.into_iter().map(str::to_string).collect())
    }
}

/// Reduces a recipient field to an ordered list of addresses.
///
/// List entries are trimmed and keep their case. A joined string is split on
/// commas, and each part is trimmed and lower-cased. Entries that are empty
/// after trimming are dropped.
#[must_use]
pub fn normalize(field: &RecipientField) -> Vec<String> {
    match field {
        RecipientField::Empty => Vec::new(),
        RecipientField::Joined(joined) => joined
            .split(',')
            .map(|address| address.trim().to_lowercase())
            .filter(|address| !address.is_empty())
            .collect(),
        RecipientField::List(list) => list
            .iter()
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
            .collect(),
    }
}

/// Everything the relay knows about one destination domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DomainEntry {
    /// Lower-cased, de-duplicated recipient addresses in first-seen order.
    pub addresses: Vec<String>,
    /// Exchangers in ascending priority order; empty until resolved.
    pub hosts: Vec<MxRecord>,
}

impl DomainEntry {
    fn insert(&mut self, address: String) {
        if !self.addresses.contains(&address) {
            self.addresses.push(address);
        }
    }
}

/// Destination domains in first-seen order.
pub type DomainMap = IndexMap<Domain, DomainEntry>;

/// Normalises To, Cc and Bcc and groups the union of their addresses by domain.
///
/// An address that appears several times, in any field and with any casing,
/// is kept once.
#[must_use]
pub fn classify_and_group(
    to: &RecipientField,
    cc: &RecipientField,
    bcc: &RecipientField,
) -> DomainMap {
    let mut domains = DomainMap::default();

    for address in [to, cc, bcc].into_iter().flat_map(normalize) {
        let address = address.to_lowercase();
        domains
            .entry(Domain::from_address(&address))
            .or_default()
            .insert(address);
    }

    domains
}
