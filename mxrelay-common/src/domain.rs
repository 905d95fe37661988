//! Destination domains and their mail exchangers.

use std::{
    borrow::Borrow,
    fmt::{self, Display},
    ops::Deref,
    sync::Arc,
};

use serde::{Deserialize, Serialize};

/// A lower-cased recipient domain.
///
/// Construction always folds case, so two `Domain`s compare equal whenever
/// the underlying names match case-insensitively.
///
/// ```
/// use mxrelay_common::Domain;
///
/// let domain = Domain::from_address("User@Mail.Example.COM");
/// assert_eq!(domain.as_str(), "mail.example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[repr(transparent)]
pub struct Domain(Arc<str>);

impl Domain {
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref().to_lowercase()))
    }

    /// Extracts the domain of an email address: everything after the last `@`.
    ///
    /// A string without any `@` is treated as a bare domain.
    #[must_use]
    pub fn from_address(address: &str) -> Self {
        let domain = address.rsplit_once('@').map_or(address, |(_, domain)| domain);
        Self::new(domain)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
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

impl Deref for Domain {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for Domain {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Domain {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Domain> for String {
    fn from(domain: Domain) -> Self {
        domain.0.to_string()
    }
}

/// A mail exchanger for a domain.
///
/// Lower `priority` values are preferred.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MxRecord {
    pub exchange: String,
    pub priority: u16,
}

impl MxRecord {
    /// Priority assigned to a manually configured exchanger.
    pub const OVERRIDE_PRIORITY: u16 = 10;

    #[must_use]
    pub fn new(exchange: impl Into<String>, priority: u16) -> Self {
        Self {
            exchange: exchange.into(),
            priority,
        }
    }

    /// The synthetic single entry used when a domain's exchanger is configured by hand.
    #[must_use]
    pub fn manual(exchange: impl Into<String>) -> Self {
        Self::new(exchange, Self::OVERRIDE_PRIORITY)
    }
}
