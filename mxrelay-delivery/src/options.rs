//! Per-domain transport options and the layered per-attempt configuration.
//!
//! Options are keyed by destination domain and matched case-insensitively:
//! ```ron
//! {
//!     "test.example.com": (
//!         mx: "localhost",
//!         port: 2525,
//!     ),
//!     "partner.example.org": (
//!         auth: (user: "relay", pass: "secret"),
//!         require_tls: true,
//!     ),
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

/// Port used when neither the domain options nor anything else names one.
pub const DEFAULT_SMTP_PORT: u16 = 25;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMechanism {
    #[default]
    Plain,
    Login,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub user: String,
    #[serde(serialize_with = "redact")]
    pub pass: String,
    #[serde(default)]
    pub mechanism: AuthMechanism,
}

impl Credentials {
    #[must_use]
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
            mechanism: AuthMechanism::default(),
        }
    }
}

fn redact<T: ?Sized, S: Serializer>(_: &T, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str("<redacted>")
}

/// Connection options for one destination domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainOptions {
    /// Deliver to this exchanger instead of the ones published in DNS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mx: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Credentials>,

    /// Fail instead of falling back to plaintext when STARTTLS is unavailable.
    #[serde(default)]
    pub require_tls: bool,

    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Name announced in EHLO.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helo_name: Option<String>,
}

impl DomainOptions {
    #[must_use]
    pub fn mx(mut self, mx: impl Into<String>) -> Self {
        self.mx = Some(mx.into());
        self
    }

    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn auth(mut self, credentials: Credentials) -> Self {
        self.auth = Some(credentials);
        self
    }

    #[must_use]
    pub const fn require_tls(mut self, require: bool) -> Self {
        self.require_tls = require;
        self
    }
}

/// Domain → options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportOptions {
    domains: BTreeMap<String, DomainOptions>,
}

impl TransportOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the options for `domain`.
    #[must_use]
    pub fn with(mut self, domain: impl Into<String>, options: DomainOptions) -> Self {
        self.insert(domain, options);
        self
    }

    pub fn insert(&mut self, domain: impl Into<String>, options: DomainOptions) {
        self.domains.insert(domain.into(), options);
    }

    /// Options for `domain`, ignoring ASCII case on both sides.
    #[must_use]
    pub fn for_domain(&self, domain: &str) -> Option<&DomainOptions> {
        self.domains
            .get(domain)
            .or_else(|| {
                self.domains
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(domain))
                    .map(|(_, options)| options)
            })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// Everything a transport needs for one send to one exchanger.
///
/// Built by layering, lowest precedence first: the built-in defaults, the
/// destination domain's [`DomainOptions`], and finally the exchanger being tried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<Credentials>,
    pub require_tls: bool,
    pub accept_invalid_certs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helo_name: Option<String>,
}

impl TransportConfig {
    #[must_use]
    pub fn layered(options: &DomainOptions, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: options.port.unwrap_or(DEFAULT_SMTP_PORT),
            auth: options.auth.clone(),
            require_tls: options.require_tls,
            accept_invalid_certs: options.accept_invalid_certs,
            helo_name: options.helo_name.clone(),
        }
    }
}
