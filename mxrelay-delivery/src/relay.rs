//! The relay entry point.
//!
//! A relay call classifies the recipients by domain, resolves every domain,
//! then fans out one delivery attempt per unique recipient. All attempts run
//! concurrently and the summary lists their outcomes in completion order.

use std::{collections::VecDeque, fmt, ops::Deref, sync::Arc};

use futures_util::{StreamExt, stream::FuturesUnordered};
use mxrelay_common::{
    Diagnostics, MailOptions, MxRecord, OutboundMail, classify_and_group, tracing,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    DnsError, DnsResolver, MxResolver, RelayConfig, SmtpTransport,
    attempt::{Outcome, attempt},
    dns::resolve_all,
    error::RelayError,
    options::{DomainOptions, TransportOptions},
    transport::Transport,
};

/// Every recipient's outcome, in the order the attempts finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Summary(Vec<Outcome>);

impl Summary {
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.0.iter().filter(|outcome| outcome.is_delivered()).count()
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<Outcome> {
        self.0
    }
}

impl Deref for Summary {
    type Target = [Outcome];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Outcome>> for Summary {
    fn from(outcomes: Vec<Outcome>) -> Self {
        Self(outcomes)
    }
}

impl IntoIterator for Summary {
    type Item = Outcome;
    type IntoIter = std::vec::IntoIter<Outcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Told the result of a relay call, whichever way it went.
pub type RelayCallback = Box<dyn FnOnce(Result<&Summary, &RelayError>) + Send>;

/// The message handed to [`Relay::relay`].
///
/// A [`MailInput::Raw`] value is only accepted if it is a JSON object that
/// reads as [`MailOptions`].
#[derive(Debug, Clone)]
pub enum MailInput {
    Typed(MailOptions),
    Raw(Value),
}

impl MailInput {
    fn into_options(self) -> Result<MailOptions, RelayError> {
        let options: MailOptions = match self {
            Self::Typed(options) => options,
            Self::Raw(value @ Value::Object(_)) => serde_json::from_value(value)
                .map_err(|e| RelayError::InvalidMailOptions(e.to_string()))?,
            Self::Raw(other) => {
                return Err(RelayError::InvalidMailOptions(format!(
                    "expected a key-value record, got {}",
                    kind(&other)
                )));
            }
        };

        if options.from.trim().is_empty() {
            return Err(RelayError::InvalidMailOptions(
                "`from` must name a sender".to_string(),
            ));
        }

        Ok(options)
    }
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl From<MailOptions> for MailInput {
    fn from(options: MailOptions) -> Self {
        Self::Typed(options)
    }
}

impl From<Value> for MailInput {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

/// The optional arguments of a relay call.
///
/// Passing only a callback is the same as passing empty options and that callback.
pub enum RelayArgs {
    Options(TransportOptions),
    Callback(RelayCallback),
    OptionsAndCallback(TransportOptions, RelayCallback),
}

impl RelayArgs {
    #[must_use]
    pub fn callback(callback: impl FnOnce(Result<&Summary, &RelayError>) + Send + 'static) -> Self {
        Self::Callback(Box::new(callback))
    }

    #[must_use]
    pub fn with_callback(
        options: TransportOptions,
        callback: impl FnOnce(Result<&Summary, &RelayError>) + Send + 'static,
    ) -> Self {
        Self::OptionsAndCallback(options, Box::new(callback))
    }

    fn into_parts(self) -> (TransportOptions, Option<RelayCallback>) {
        match self {
            Self::Options(options) => (options, None),
            Self::Callback(callback) => (TransportOptions::default(), Some(callback)),
            Self::OptionsAndCallback(options, callback) => (options, Some(callback)),
        }
    }
}

impl Default for RelayArgs {
    fn default() -> Self {
        Self::Options(TransportOptions::default())
    }
}

impl From<TransportOptions> for RelayArgs {
    fn from(options: TransportOptions) -> Self {
        Self::Options(options)
    }
}

impl From<()> for RelayArgs {
    fn from((): ()) -> Self {
        Self::default()
    }
}

impl fmt::Debug for RelayArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Options(options) => f.debug_tuple("Options").field(options).finish(),
            Self::Callback(_) => f.debug_tuple("Callback").finish_non_exhaustive(),
            Self::OptionsAndCallback(options, _) => f
                .debug_tuple("OptionsAndCallback")
                .field(options)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Serialize)]
struct DomainSnapshot<'a> {
    addrs: &'a [String],
    mx: &'a VecDeque<MxRecord>,
    domain: &'a str,
}

/// Direct-to-MX relay.
#[derive(Clone)]
pub struct Relay {
    resolver: Arc<dyn MxResolver>,
    transport: Arc<dyn Transport>,
    diagnostics: Diagnostics,
}

impl Relay {
    /// Snapshots follow the `MXRELAY_DEBUG` environment variable unless
    /// [`Relay::debug_snapshots`] says otherwise.
    #[must_use]
    pub fn new(resolver: Arc<dyn MxResolver>, transport: Arc<dyn Transport>) -> Self {
        Self {
            resolver,
            transport,
            diagnostics: Diagnostics::from_env(),
        }
    }

    /// A relay using the system's DNS and real SMTP sessions.
    ///
    /// # Errors
    ///
    /// Returns an error if the system resolver configuration can't be loaded.
    pub fn with_defaults(config: &RelayConfig) -> Result<Self, DnsError> {
        Ok(Self::new(
            Arc::new(DnsResolver::new(config.dns.clone())?),
            Arc::new(SmtpTransport::new(
                config.timeouts.clone(),
                config.helo_name.clone(),
            )),
        ))
    }

    #[must_use]
    pub const fn debug_snapshots(mut self, enabled: bool) -> Self {
        self.diagnostics = Diagnostics::new(enabled);
        self
    }

    /// Delivers `mail` to every To, Cc and Bcc recipient.
    ///
    /// The callback in `args`, if any, sees the same result that is returned.
    ///
    /// # Errors
    ///
    /// Fails without attempting any delivery if `mail` is not a valid message
    /// or if any recipient domain can't be resolved. Failed deliveries are not
    /// errors; they are reported in the [`Summary`].
    pub async fn relay(
        &self,
        mail: impl Into<MailInput>,
        args: impl Into<RelayArgs>,
    ) -> Result<Summary, RelayError> {
        let (options, callback) = args.into().into_parts();

        let result = self.run(mail.into(), &options).await;
        if let Err(error) = &result {
            tracing::error!(%error, "Relay failed");
        }

        if let Some(callback) = callback {
            callback(result.as_ref());
        }

        result
    }

    async fn run(&self, mail: MailInput, options: &TransportOptions) -> Result<Summary, RelayError> {
        let mail = mail.into_options()?;
        let domains = classify_and_group(&mail.to, &mail.cc, &mail.bcc);
        tracing::debug!(from = %mail.from, domains = domains.len(), "Relaying");

        let domains = resolve_all(self.resolver.as_ref(), domains).await?;

        let template = mail.header_template();
        let no_options = DomainOptions::default();
        let transport = self.transport.as_ref();
        let diagnostics = self.diagnostics;
        let mut pending = FuturesUnordered::new();

        for (domain, entry) in &domains {
            let domain_options = options.for_domain(domain).unwrap_or(&no_options);

            let hosts: VecDeque<MxRecord> = match &domain_options.mx {
                Some(mx) => VecDeque::from([MxRecord::manual(mx.as_str())]),
                None => entry.hosts.iter().cloned().collect(),
            };

            diagnostics.snapshot(&DomainSnapshot {
                addrs: &entry.addresses,
                mx: &hosts,
                domain,
            });

            for address in &entry.addresses {
                let mail = OutboundMail::addressed_to(&template, address.as_str());
                let hosts = hosts.clone();
                pending.push(async move {
                    attempt(transport, &mail, domain_options, hosts, diagnostics).await
                });
            }
        }

        let mut summary = Vec::with_capacity(pending.len());
        while let Some(outcome) = pending.next().await {
            summary.push(outcome);
        }

        tracing::info!(
            recipients = summary.len(),
            delivered = summary.iter().filter(|o| o.is_delivered()).count(),
            "Relay complete"
        );

        Ok(Summary(summary))
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("diagnostics", &self.diagnostics)
            .finish_non_exhaustive()
    }
}
