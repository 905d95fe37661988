//! The default [`Transport`]: one SMTP session per send.

use std::{future::Future, time::Duration};

use async_trait::async_trait;
use mxrelay_common::{OutboundMail, RecipientField, tracing};
use mxrelay_smtp::{ClientError, MessageBuilder, Response, SmtpClient};
use ulid::Ulid;

use crate::{
    SmtpTimeouts,
    error::TransportError,
    options::{AuthMechanism, TransportConfig},
    transport::{DeliveryReceipt, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TlsNegotiationOutcome {
    Success,
    /// Server doesn't offer STARTTLS and TLS isn't required.
    Skipped,
    /// Opportunistic STARTTLS failed; start over in plaintext (RFC 3207 §4.1).
    RetryWithoutTls,
}

/// Delivers over SMTP, straight to the exchanger named in the config.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    timeouts: SmtpTimeouts,
    helo_name: String,
}

impl SmtpTransport {
    #[must_use]
    pub fn new(timeouts: SmtpTimeouts, helo_name: impl Into<String>) -> Self {
        Self {
            timeouts,
            helo_name: helo_name.into(),
        }
    }
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self::new(SmtpTimeouts::default(), "localhost")
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send_mail(
        &self,
        config: &TransportConfig,
        mail: &OutboundMail,
    ) -> Result<DeliveryReceipt, TransportError> {
        let helo_name = config.helo_name.as_deref().unwrap_or(&self.helo_name);
        SmtpTransaction::new(config, mail, &self.timeouts, helo_name)
            .execute()
            .await
    }
}

/// Renders the message to send, returning it with its Message-ID.
fn render(mail: &OutboundMail, helo_name: &str) -> (String, String) {
    let message = &mail.message;
    let message_id = message
        .message_id
        .clone()
        .unwrap_or_else(|| format!("<{}@{helo_name}>", Ulid::new()));

    if let Some(raw) = &message.raw {
        return (raw.clone(), message_id);
    }

    let mut builder = MessageBuilder::new()
        .from(&message.from)
        .to(display(&message.to))
        .cc(display(&message.cc))
        .message_id(&message_id)
        .body(message.text.clone().unwrap_or_default());

    if let Some(subject) = &message.subject {
        builder = builder.subject(subject);
    }
    for (name, value) in &message.headers {
        builder = builder.header(name, value);
    }

    (builder.build(), message_id)
}

fn display(field: &RecipientField) -> String {
    match field {
        RecipientField::Joined(joined) => joined.clone(),
        other => other.header_value(),
    }
}

struct SmtpTransaction<'a> {
    config: &'a TransportConfig,
    mail: &'a OutboundMail,
    timeouts: &'a SmtpTimeouts,
    helo_name: &'a str,
}

impl<'a> SmtpTransaction<'a> {
    const fn new(
        config: &'a TransportConfig,
        mail: &'a OutboundMail,
        timeouts: &'a SmtpTimeouts,
        helo_name: &'a str,
    ) -> Self {
        Self {
            config,
            mail,
            timeouts,
            helo_name,
        }
    }

    /// Runs `operation` under `limit`, naming `step` if it runs out.
    async fn step<T>(
        limit: Duration,
        step: &str,
        operation: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, TransportError> {
        tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| TransportError::Timeout(format!("{step} timed out after {limit:?}")))?
            .map_err(TransportError::from)
    }

    fn rejected(step: &str, response: &Response) -> TransportError {
        TransportError::Rejected {
            code: response.code,
            message: format!("{step}: {}", response.message()),
        }
    }

    #[tracing::instrument(
        level = "debug",
        skip(self),
        fields(host = %self.config.host, port = self.config.port, to = %self.mail.recipient())
    )]
    async fn execute(self) -> Result<DeliveryReceipt, TransportError> {
        if self.config.accept_invalid_certs {
            tracing::warn!(
                host = %self.config.host,
                "TLS certificate validation is disabled for this connection"
            );
        }

        let mut client = self.connect_and_greet().await?;

        if self.negotiate_tls(&mut client).await? == TlsNegotiationOutcome::RetryWithoutTls {
            tracing::info!(
                host = %self.config.host,
                "Reconnecting without STARTTLS"
            );
            drop(client);
            client = self.connect_and_greet().await?;
            self.ehlo(&mut client).await?;
        }

        self.authenticate(&mut client).await?;
        self.send_envelope(&mut client).await?;

        let (message, message_id) = render(self.mail, self.helo_name);
        let accepted = self.send_message_data(&mut client, &message).await?;

        if let Err(e) = Self::step(self.timeouts.quit(), "QUIT", client.quit()).await {
            tracing::debug!(host = %self.config.host, error = %e, "QUIT failed after delivery");
        }

        Ok(DeliveryReceipt {
            host: self.config.host.clone(),
            accepted: vec![self.mail.recipient().to_string()],
            envelope: self.mail.envelope.clone(),
            message_id,
            response: accepted.summary(),
        })
    }

    async fn connect_and_greet(&self) -> Result<SmtpClient, TransportError> {
        let limit = self.timeouts.connect();
        let config = self.config;

        let mut client = Self::step(
            limit,
            "Connect",
            SmtpClient::connect(&config.host, config.port),
        )
        .await?
        .accept_invalid_certs(config.accept_invalid_certs);

        let greeting = Self::step(limit, "Greeting", client.read_greeting()).await?;
        if !greeting.is_success() {
            return Err(Self::rejected("Server rejected connection", &greeting));
        }

        Ok(client)
    }

    async fn ehlo(&self, client: &mut SmtpClient) -> Result<Response, TransportError> {
        let limit = self.timeouts.ehlo();
        let response = Self::step(limit, "EHLO", client.ehlo(self.helo_name)).await?;
        if response.is_success() {
            return Ok(response);
        }

        // No ESMTP: fall back to HELO, which advertises no extensions.
        tracing::debug!(
            host = %self.config.host,
            reply = %response.summary(),
            "EHLO rejected, trying HELO"
        );
        let response = Self::step(limit, "HELO", client.helo(self.helo_name)).await?;
        if !response.is_success() {
            return Err(Self::rejected("Server rejected HELO", &response));
        }
        Ok(response)
    }

    async fn negotiate_tls(
        &self,
        client: &mut SmtpClient,
    ) -> Result<TlsNegotiationOutcome, TransportError> {
        let require_tls = self.config.require_tls;
        let ehlo = self.ehlo(client).await?;

        if !ehlo.has_extension("STARTTLS") {
            if require_tls {
                return Err(TransportError::Tls(format!(
                    "{} does not offer STARTTLS",
                    self.config.host
                )));
            }
            return Ok(TlsNegotiationOutcome::Skipped);
        }

        let result = Self::step(self.timeouts.starttls(), "STARTTLS", client.starttls()).await;

        let failure = match result {
            Ok(response) if response.is_success() => None,
            Ok(response) => Some(format!("Server rejected STARTTLS: {}", response.message())),
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = failure {
            if require_tls {
                return Err(TransportError::Tls(reason));
            }
            tracing::info!(
                host = %self.config.host,
                %reason,
                "Opportunistic STARTTLS failed"
            );
            return Ok(TlsNegotiationOutcome::RetryWithoutTls);
        }

        self.ehlo(client).await?;
        tracing::debug!(host = %self.config.host, "TLS negotiated via STARTTLS");
        Ok(TlsNegotiationOutcome::Success)
    }

    async fn authenticate(&self, client: &mut SmtpClient) -> Result<(), TransportError> {
        let Some(credentials) = &self.config.auth else {
            return Ok(());
        };

        let limit = self.timeouts.auth();
        let response = match credentials.mechanism {
            AuthMechanism::Plain => {
                Self::step(
                    limit,
                    "AUTH PLAIN",
                    client.auth_plain(&credentials.user, &credentials.pass),
                )
                .await?
            }
            AuthMechanism::Login => {
                Self::step(
                    limit,
                    "AUTH LOGIN",
                    client.auth_login(&credentials.user, &credentials.pass),
                )
                .await?
            }
        };

        if response.is_success() {
            Ok(())
        } else {
            Err(TransportError::Authentication(response.summary()))
        }
    }

    async fn send_envelope(&self, client: &mut SmtpClient) -> Result<(), TransportError> {
        let envelope = &self.mail.envelope;

        let response = Self::step(
            self.timeouts.mail_from(),
            "MAIL FROM",
            client.mail_from(&envelope.from),
        )
        .await?;
        if !response.is_success() {
            return Err(Self::rejected("Server rejected MAIL FROM", &response));
        }

        let response = Self::step(
            self.timeouts.rcpt_to(),
            "RCPT TO",
            client.rcpt_to(&envelope.to),
        )
        .await?;
        if !response.is_success() {
            return Err(Self::rejected(
                &format!("Server rejected RCPT TO {}", envelope.to),
                &response,
            ));
        }

        Ok(())
    }

    async fn send_message_data(
        &self,
        client: &mut SmtpClient,
        message: &str,
    ) -> Result<Response, TransportError> {
        let limit = self.timeouts.data();

        let response = Self::step(limit, "DATA", client.data()).await?;
        if !response.is_intermediate() {
            return Err(Self::rejected("Server rejected DATA", &response));
        }

        let response = Self::step(limit, "Message data", client.send_data(message)).await?;
        if !response.is_success() {
            return Err(Self::rejected("Server rejected message data", &response));
        }

        Ok(response)
    }
}
