//! Scriptable SMTP server for exercising the SMTP transport.
//!
//! Every connection gets the same configured replies, and every command the
//! server sees is recorded.
//!
//! ```rust,no_run
//! let server = MockSmtpServer::builder()
//!     .with_rcpt_to_response(550, "User unknown")
//!     .build()
//!     .await?;
//! ```
#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    task::JoinHandle,
    time::timeout,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    Helo(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Everything between DATA and the terminating dot, line endings included.
    MessageContent(String),
    StartTls,
    Auth(String),
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
struct Reply {
    code: u16,
    message: String,
}

impl Reply {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Debug, Clone)]
struct Config {
    greeting: Reply,
    ehlo_code: u16,
    capabilities: Vec<String>,
    mail_from: Reply,
    rcpt_to: Reply,
    data: Reply,
    data_end: Reply,
    starttls: Reply,
    auth: Reply,
    quit: Reply,
    response_delay: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            greeting: Reply::new(220, "mock.test ESMTP"),
            ehlo_code: 250,
            capabilities: vec!["mock.test".to_string(), "SIZE 10000".to_string()],
            mail_from: Reply::new(250, "OK"),
            rcpt_to: Reply::new(250, "OK"),
            data: Reply::new(354, "End data with <CR><LF>.<CR><LF>"),
            data_end: Reply::new(250, "2.0.0 Ok: queued"),
            starttls: Reply::new(454, "TLS not available"),
            auth: Reply::new(235, "2.7.0 Authentication successful"),
            quit: Reply::new(221, "Bye"),
            response_delay: None,
        }
    }
}

impl Config {
    fn ehlo_bytes(&self) -> Vec<u8> {
        let last = self.capabilities.len().saturating_sub(1);
        self.capabilities
            .iter()
            .enumerate()
            .map(|(i, capability)| {
                let separator = if i == last { ' ' } else { '-' };
                format!("{}{separator}{capability}\r\n", self.ehlo_code)
            })
            .collect::<String>()
            .into_bytes()
    }
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<SmtpCommand>>>,
    connections: Arc<RwLock<usize>>,
    handle: JoinHandle<()>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            config: Config::default(),
        }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.addr.port()
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands.read().await.clone()
    }

    pub async fn connections(&self) -> usize {
        *self.connections.read().await
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }

    async fn handle_client(
        stream: TcpStream,
        config: Arc<Config>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
    ) -> std::io::Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(&config.greeting.to_bytes()).await?;

        loop {
            line.clear();
            let Ok(read) = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await
            else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }

            let command_line = line.trim_end();
            let (verb, argument) = command_line
                .split_once(' ')
                .unwrap_or((command_line, ""));

            let (command, reply) = match verb.to_ascii_uppercase().as_str() {
                "EHLO" => (SmtpCommand::Ehlo(argument.to_string()), config.ehlo_bytes()),
                "HELO" => (
                    SmtpCommand::Helo(argument.to_string()),
                    Reply::new(250, "Hello").to_bytes(),
                ),
                "MAIL" => (
                    SmtpCommand::MailFrom(argument.to_string()),
                    config.mail_from.to_bytes(),
                ),
                "RCPT" => (
                    SmtpCommand::RcptTo(argument.to_string()),
                    config.rcpt_to.to_bytes(),
                ),
                "DATA" => (SmtpCommand::Data, config.data.to_bytes()),
                "STARTTLS" => (SmtpCommand::StartTls, config.starttls.to_bytes()),
                "AUTH" => (
                    SmtpCommand::Auth(argument.to_string()),
                    config.auth.to_bytes(),
                ),
                "QUIT" => {
                    commands.write().await.push(SmtpCommand::Quit);
                    writer.write_all(&config.quit.to_bytes()).await?;
                    return Ok(());
                }
                _ => (
                    SmtpCommand::Other(command_line.to_string()),
                    Reply::new(500, "Unknown command").to_bytes(),
                ),
            };

            let is_data = command == SmtpCommand::Data && config.data.code == 354;
            commands.write().await.push(command);

            if let Some(delay) = config.response_delay {
                tokio::time::sleep(delay).await;
            }
            writer.write_all(&reply).await?;

            if is_data {
                let mut content = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await? == 0 {
                        return Ok(());
                    }
                    if line == ".\r\n" || line == ".\n" {
                        break;
                    }
                    content.push_str(&line);
                }
                commands
                    .write()
                    .await
                    .push(SmtpCommand::MessageContent(content));
                writer.write_all(&config.data_end.to_bytes()).await?;
            }
        }
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct MockSmtpServerBuilder {
    config: Config,
}

impl MockSmtpServerBuilder {
    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_ehlo_response(mut self, code: u16, capabilities: Vec<&str>) -> Self {
        self.config.ehlo_code = code;
        self.config.capabilities = capabilities.into_iter().map(str::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_starttls_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.starttls = Reply::new(code, message);
        self
    }

    #[must_use]
    pub fn with_auth_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.auth = Reply::new(code, message);
        self
    }

    #[must_use]
    pub const fn with_response_delay(mut self, delay: Duration) -> Self {
        self.config.response_delay = Some(delay);
        self
    }

    /// Binds to an ephemeral port on 127.0.0.1 and starts serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener can't be bound.
    pub async fn build(self) -> std::io::Result<MockSmtpServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let connections = Arc::new(RwLock::new(0));

        let handle = {
            let commands = Arc::clone(&commands);
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    *connections.write().await += 1;
                    let config = Arc::clone(&config);
                    let commands = Arc::clone(&commands);
                    tokio::spawn(async move {
                        let _ = MockSmtpServer::handle_client(stream, config, commands).await;
                    });
                }
            })
        };

        Ok(MockSmtpServer {
            addr,
            commands,
            connections,
            handle,
        })
    }
}
