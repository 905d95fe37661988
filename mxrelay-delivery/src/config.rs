use serde::{Deserialize, Serialize};

use crate::{DnsConfig, SmtpTimeouts, TransportOptions};

/// Everything needed to build a [`Relay`](crate::Relay) with the default
/// resolver and transport.
///
/// ```ron
/// (
///     helo_name: "relay.example.org",
///     dns: (timeout_secs: 3),
///     timeouts: (data_secs: 60),
///     domains: {
///         "test.example.com": (mx: "localhost", port: 2525),
///     },
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub dns: DnsConfig,

    #[serde(default)]
    pub timeouts: SmtpTimeouts,

    /// Name announced in EHLO unless a domain sets its own (default: `localhost`)
    #[serde(default = "default_helo_name")]
    pub helo_name: String,

    /// Transport options used when a relay call doesn't supply any.
    #[serde(default)]
    pub domains: TransportOptions,
}

fn default_helo_name() -> String {
    "localhost".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            dns: DnsConfig::default(),
            timeouts: SmtpTimeouts::default(),
            helo_name: default_helo_name(),
            domains: TransportOptions::default(),
        }
    }
}
