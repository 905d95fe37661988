//! Shared building blocks for the mxrelay crates.
//!
//! - The caller-facing message model ([`MailOptions`], [`RecipientField`])
//! - Recipient normalisation and grouping by destination domain
//! - Logging initialisation and the `incoming!`/`outgoing!` macros
//! - The opt-in diagnostic snapshot channel

pub mod address;
pub mod diagnostics;
pub mod domain;
pub mod envelope;
pub mod logging;
pub mod message;

pub use address::{DomainEntry, DomainMap, RecipientField, classify_and_group, normalize};
pub use diagnostics::Diagnostics;
pub use domain::{Domain, MxRecord};
pub use envelope::Envelope;
pub use message::{MailOptions, OutboundMail};
pub use tracing;
