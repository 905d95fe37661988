//! SMTP client implementation.
//!
//! ```no_run
//! use mxrelay_smtp::client::{MessageBuilder, SmtpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SmtpClient::connect("mx.example.com", 25).await?;
//! client.read_greeting().await?;
//! client.ehlo("relay.example.org").await?;
//! client.mail_from("sender@example.org").await?;
//! client.rcpt_to("recipient@example.com").await?;
//! client.data().await?;
//!
//! let message = MessageBuilder::new()
//!     .from("sender@example.org")
//!     .to("recipient@example.com")
//!     .subject("Hello")
//!     .body("Hello World")
//!     .build();
//! client.send_data(&message).await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod message;
mod response;
mod smtp_client;

pub use error::{ClientError, Result};
pub use message::{MessageBuilder, dot_stuff};
pub use response::Response;
pub use smtp_client::SmtpClient;
