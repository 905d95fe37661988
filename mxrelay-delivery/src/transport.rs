use async_trait::async_trait;
use mxrelay_common::{Envelope, OutboundMail};
use serde::{Deserialize, Serialize};

use crate::{error::TransportError, options::TransportConfig};

/// What an exchanger told us when it accepted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    /// The exchanger that accepted the message.
    pub host: String,
    pub accepted: Vec<String>,
    pub envelope: Envelope,
    pub message_id: String,
    /// Final reply line, e.g. `250 2.0.0 Ok: queued`.
    pub response: String,
}

/// Sends one message to one exchanger.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns [`TransportError::HostNotFound`] when `config.host` has no
    /// address, and another [`TransportError`] for every other failure.
    async fn send_mail(
        &self,
        config: &TransportConfig,
        mail: &OutboundMail,
    ) -> Result<DeliveryReceipt, TransportError>;
}
