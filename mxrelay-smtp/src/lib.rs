//! Outbound SMTP for mxrelay.
//!
//! A small client that speaks just enough SMTP to hand one message to one
//! exchanger: greeting, EHLO, optional STARTTLS and AUTH, a single
//! transaction, QUIT.

pub mod client;

pub use client::{ClientError, MessageBuilder, Response, SmtpClient};
