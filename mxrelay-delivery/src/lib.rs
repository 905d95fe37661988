//! Direct-to-MX delivery.
//!
//! - [`MxResolver`] / [`DnsResolver`]: MX lookups with a TTL cache
//! - [`Transport`] / [`SmtpTransport`]: one send to one exchanger
//! - [`attempt`]: ordered failover across a recipient's exchangers
//! - [`Relay`]: the entry point tying it together

mod attempt;
mod config;
mod dns;
mod error;
mod options;
mod relay;
mod smtp_transaction;
mod transport;
mod types;

pub use attempt::{Outcome, attempt};
pub use config::RelayConfig;
pub use dns::{DnsConfig, DnsError, DnsResolver, MxResolver, resolve_all};
pub use error::{RelayError, TransportError};
pub use mxrelay_common::{DomainEntry, DomainMap, Envelope, MailOptions, MxRecord, OutboundMail};
pub use options::{
    AuthMechanism, Credentials, DEFAULT_SMTP_PORT, DomainOptions, TransportConfig,
    TransportOptions,
};
pub use relay::{MailInput, Relay, RelayArgs, RelayCallback, Summary};
pub use smtp_transaction::SmtpTransport;
pub use transport::{DeliveryReceipt, Transport};
pub use types::SmtpTimeouts;
