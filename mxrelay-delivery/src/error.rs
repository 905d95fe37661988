//! Error types for relaying.
//!
//! Only [`RelayError`] ever fails a relay call. A [`TransportError`] is scoped
//! to one recipient and one exchanger, and ends up as data in the summary.

use mxrelay_smtp::ClientError;
use serde::{Serialize, Serializer, ser::SerializeStruct};
use thiserror::Error;

use crate::DnsError;

/// Failures that abort a whole relay call before any delivery is attempted.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The message isn't a key-value record, or lacks what delivery needs.
    #[error("Invalid mail options: {0}")]
    InvalidMailOptions(String),

    /// One destination domain could not be resolved; no domain is attempted.
    #[error("Failed to resolve MX for {domain}: {source}")]
    Resolution {
        domain: String,
        #[source]
        source: DnsError,
    },
}

impl RelayError {
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidMailOptions(_))
    }
}

/// Why a single send to one exchanger failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The exchanger's name has no address. The only failure that moves on to
    /// the next exchanger.
    #[error("Host not found: {0}")]
    HostNotFound(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rejected with {code}: {message}")]
    Rejected { code: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    #[must_use]
    pub const fn is_host_not_found(&self) -> bool {
        matches!(self, Self::HostNotFound(_))
    }

    /// Short machine-readable category, e.g. `ENOTFOUND`.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::HostNotFound(_) => "ENOTFOUND",
            Self::Connection(_) => "ECONNECTION",
            Self::Timeout(_) => "ETIMEDOUT",
            Self::Tls(_) => "ETLS",
            Self::Authentication(_) => "EAUTH",
            Self::Rejected { .. } => "EREJECTED",
            Self::Protocol(_) => "EPROTOCOL",
        }
    }

    /// The SMTP reply code, when the failure was a server reply.
    #[must_use]
    pub const fn response_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl Serialize for TransportError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TransportError", 3)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.serialize_field("responseCode", &self.response_code())?;
        state.end()
    }
}

impl From<ClientError> for TransportError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::HostNotFound(host) => Self::HostNotFound(host),
            ClientError::SmtpError { code, message }
            | ClientError::UnexpectedResponse { code, message } => {
                Self::Rejected { code, message }
            }
            ClientError::Io(e) => Self::Connection(format!("I/O error: {e}")),
            ClientError::ConnectionClosed => {
                Self::Connection("Connection closed unexpectedly".to_string())
            }
            ClientError::TlsError(message) => Self::Tls(message),
            ClientError::ParseError(message) => {
                Self::Protocol(format!("SMTP parse error: {message}"))
            }
            ClientError::Utf8Error(e) => Self::Protocol(format!("UTF-8 decoding error: {e}")),
        }
    }
}
