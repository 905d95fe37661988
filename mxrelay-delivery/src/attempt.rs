//! Delivery of one message copy to one recipient.
//!
//! The recipient's exchangers are tried strictly one after another, in the
//! order given. Only [`TransportError::HostNotFound`] moves on to the next
//! exchanger; any other failure ends the attempt on the spot.

use std::collections::VecDeque;

use mxrelay_common::{Diagnostics, MxRecord, OutboundMail, tracing};
use serde::{Serialize, Serializer, ser::SerializeStruct};

use crate::{
    error::TransportError,
    options::{DomainOptions, TransportConfig},
    transport::{DeliveryReceipt, Transport},
};

/// How a recipient's delivery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered { to: String, info: DeliveryReceipt },
    /// A failure other than an unknown host. No further exchangers were tried.
    Failed { to: String, info: TransportError },
    /// Every exchanger turned out to be unknown, or there were none.
    Exhausted { to: String },
}

impl Outcome {
    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::Delivered { to, .. } | Self::Failed { to, .. } | Self::Exhausted { to } => to,
        }
    }

    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Delivered { to, info } => {
                let mut state = serializer.serialize_struct("Outcome", 2)?;
                state.serialize_field("to", to)?;
                state.serialize_field("info", info)?;
                state.end()
            }
            Self::Failed { to, info } => {
                let mut state = serializer.serialize_struct("Outcome", 2)?;
                state.serialize_field("to", to)?;
                state.serialize_field("info", info)?;
                state.end()
            }
            Self::Exhausted { to } => serializer.collect_str(&format_args!("failed to send to: {to}")),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
enum Snapshot<'a> {
    Sending {
        mail: &'a OutboundMail,
        transport_options: &'a TransportConfig,
    },
    SendError(&'a TransportError),
}

/// Delivers `mail` to its single envelope recipient through `hosts`.
///
/// Each exchanger gets the domain's `options` with its own name layered on top.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(to = %mail.recipient(), hosts = hosts.len())
)]
pub async fn attempt(
    transport: &dyn Transport,
    mail: &OutboundMail,
    options: &DomainOptions,
    mut hosts: VecDeque<MxRecord>,
    diagnostics: Diagnostics,
) -> Outcome {
    let to = mail.recipient().to_string();

    while let Some(host) = hosts.pop_front() {
        let config = TransportConfig::layered(options, host.exchange);
        diagnostics.snapshot(&Snapshot::Sending {
            mail,
            transport_options: &config,
        });

        match transport.send_mail(&config, mail).await {
            Ok(info) => {
                tracing::info!(%to, host = %config.host, "Delivered");
                return Outcome::Delivered { to, info };
            }
            Err(error) => {
                diagnostics.snapshot(&Snapshot::SendError(&error));
                tracing::warn!(%to, host = %config.host, %error, "Send failed");

                if !error.is_host_not_found() {
                    return Outcome::Failed { to, info: error };
                }
            }
        }
    }

    tracing::warn!(%to, "No reachable exchanger");
    Outcome::Exhausted { to }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mxrelay_common::{Envelope, MailOptions};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    /// Replies from a fixed script, one entry per call, and records the hosts.
    struct Scripted {
        replies: Mutex<VecDeque<Result<(), TransportError>>>,
        hosts: Mutex<Vec<(String, u16)>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<(), TransportError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                hosts: Mutex::new(Vec::new()),
            }
        }

        fn hosts(&self) -> Vec<String> {
            self.hosts.lock().unwrap().iter().map(|(h, _)| h.clone()).collect()
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send_mail(
            &self,
            config: &TransportConfig,
            mail: &OutboundMail,
        ) -> Result<DeliveryReceipt, TransportError> {
            self.hosts
                .lock()
                .unwrap()
                .push((config.host.clone(), config.port));
            let reply = self.replies.lock().unwrap().pop_front().unwrap();
            reply.map(|()| DeliveryReceipt {
                host: config.host.clone(),
                accepted: vec![mail.recipient().to_string()],
                envelope: mail.envelope.clone(),
                message_id: "<id@test>".to_string(),
                response: "250 OK".to_string(),
            })
        }
    }

    fn mail() -> OutboundMail {
        let template = MailOptions::new("s@example.org").to("r@x.com").header_template();
        OutboundMail::addressed_to(&template, "r@x.com")
    }

    fn hosts(names: &[&str]) -> VecDeque<MxRecord> {
        names
            .iter()
            .zip(1..)
            .map(|(name, priority)| MxRecord::new(*name, priority * 10))
            .collect()
    }

    fn not_found(host: &str) -> Result<(), TransportError> {
        Err(TransportError::HostNotFound(host.to_string()))
    }

    #[tokio::test]
    async fn test_fails_over_on_host_not_found() {
        let transport = Scripted::new(vec![not_found("mx1"), not_found("mx2"), Ok(())]);

        let outcome = attempt(
            &transport,
            &mail(),
            &DomainOptions::default(),
            hosts(&["mx1", "mx2", "mx3"]),
            Diagnostics::default(),
        )
        .await;

        assert!(outcome.is_delivered());
        assert_eq!(transport.hosts(), vec!["mx1", "mx2", "mx3"]);
        let Outcome::Delivered { info, .. } = outcome else {
            unreachable!()
        };
        assert_eq!(info.host, "mx3");
        assert_eq!(info.envelope, Envelope::new("s@example.org", "r@x.com"));
    }

    #[tokio::test]
    async fn test_exhausted_when_every_host_is_unknown() {
        let transport = Scripted::new(vec![not_found("mx1"), not_found("mx2")]);

        let outcome = attempt(
            &transport,
            &mail(),
            &DomainOptions::default(),
            hosts(&["mx1", "mx2"]),
            Diagnostics::default(),
        )
        .await;

        assert_eq!(outcome, Outcome::Exhausted { to: "r@x.com".to_string() });
        assert_eq!(transport.hosts().len(), 2);
    }

    #[tokio::test]
    async fn test_other_failure_stops_immediately() {
        let rejected = TransportError::Rejected {
            code: 550,
            message: "No such user".to_string(),
        };
        let transport = Scripted::new(vec![Err(rejected.clone())]);

        let outcome = attempt(
            &transport,
            &mail(),
            &DomainOptions::default(),
            hosts(&["mx1", "mx2", "mx3"]),
            Diagnostics::default(),
        )
        .await;

        assert_eq!(
            outcome,
            Outcome::Failed {
                to: "r@x.com".to_string(),
                info: rejected
            }
        );
        assert_eq!(transport.hosts(), vec!["mx1"]);
    }

    #[tokio::test]
    async fn test_empty_queue_is_exhausted() {
        let transport = Scripted::new(vec![]);

        let outcome = attempt(
            &transport,
            &mail(),
            &DomainOptions::default(),
            VecDeque::new(),
            Diagnostics::default(),
        )
        .await;

        assert!(matches!(outcome, Outcome::Exhausted { .. }));
        assert!(transport.hosts().is_empty());
    }

    #[tokio::test]
    async fn test_domain_options_reach_the_transport() {
        let transport = Scripted::new(vec![Ok(())]);

        attempt(
            &transport,
            &mail(),
            &DomainOptions::default().port(2525),
            hosts(&["mx1"]),
            Diagnostics::default(),
        )
        .await;

        assert_eq!(
            transport.hosts.lock().unwrap().clone(),
            vec![("mx1".to_string(), 2525)]
        );
    }

    #[test]
    fn test_snapshot_shape() {
        let error = TransportError::HostNotFound("mx1".to_string());
        assert_eq!(
            serde_json::to_value(Snapshot::SendError(&error)).unwrap()["sendError"]["code"],
            json!("ENOTFOUND")
        );

        let mail = mail();
        let config = TransportConfig::layered(&DomainOptions::default(), "mx1");
        let sending = serde_json::to_value(Snapshot::Sending {
            mail: &mail,
            transport_options: &config,
        })
        .unwrap();
        assert_eq!(sending["sending"]["transportOptions"]["port"], json!(25));
        assert_eq!(sending["sending"]["mail"]["envelope"]["to"], json!("r@x.com"));
    }

    #[test]
    fn test_outcome_serialization() {
        let exhausted = Outcome::Exhausted {
            to: "a@x.com".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&exhausted).unwrap(),
            json!("failed to send to: a@x.com")
        );

        let failed = Outcome::Failed {
            to: "b@x.com".to_string(),
            info: TransportError::Authentication("535 Bad credentials".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "to": "b@x.com",
                "info": {
                    "code": "EAUTH",
                    "message": "Authentication failed: 535 Bad credentials",
                    "responseCode": null,
                },
            })
        );
        assert_eq!(failed.recipient(), "b@x.com");
    }
}
