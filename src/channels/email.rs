//! Email transport — SMTP via lettre for outbound, raw IMAP over rustls for
//! the watched inbox.

use std::io::{Read, Write as IoWrite};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::channels::{MailTransport, Mailbox};
use crate::config::EmailConfig;
use crate::error::ChannelError;

/// Domain part of the Message-ID on every mail the bridge sends.
pub const OUTBOUND_MESSAGE_ID_DOMAIN: &str = "relay-bridge.local";

/// Whether a (bracket-less) Message-ID was generated by this bridge.
pub fn is_own_outbound(message_id: &str) -> bool {
    message_id
        .trim_end_matches('>')
        .ends_with(&format!("@{OUTBOUND_MESSAGE_ID_DOMAIN}"))
}

// ── Transport ───────────────────────────────────────────────────────

/// SMTP + IMAP transport for one mail account.
#[derive(Debug, Clone)]
pub struct EmailTransport {
    config: EmailConfig,
}

impl EmailTransport {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

fn send_failed(reason: String) -> ChannelError {
    ChannelError::SendFailed {
        name: "email".into(),
        reason,
    }
}

/// Build the outbound message with a bridge-owned Message-ID.
pub fn build_email(
    from: &str,
    to: &str,
    subject: &str,
    body: &str,
) -> Result<Message, ChannelError> {
    Message::builder()
        .from(
            from.parse()
                .map_err(|e| send_failed(format!("Invalid from address: {e}")))?,
        )
        .to(to
            .parse()
            .map_err(|e| send_failed(format!("Invalid to address: {e}")))?)
        .subject(subject)
        .message_id(Some(format!(
            "<{}@{OUTBOUND_MESSAGE_ID_DOMAIN}>",
            Uuid::new_v4()
        )))
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| send_failed(format!("Failed to build email: {e}")))
}

#[async_trait]
impl MailTransport for EmailTransport {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), ChannelError> {
        let email = build_email(&self.config.from_address, recipient, subject, body)?;
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || {
            let creds = Credentials::new(
                config.username.clone(),
                config.password.expose_secret().to_string(),
            );
            let transport = SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
                .port(config.smtp_port)
                .credentials(creds)
                .build();

            transport
                .send(&email)
                .map_err(|e| send_failed(format!("SMTP send failed: {e}")))?;
            Ok::<(), ChannelError>(())
        })
        .await
        .map_err(|e| send_failed(format!("SMTP task panicked: {e}")))??;

        tracing::debug!(subject, "Email sent to {recipient}");
        Ok(())
    }

    async fn open_mailbox(&self) -> Result<Box<dyn Mailbox>, ChannelError> {
        let config = self.config.clone();
        let conn = tokio::task::spawn_blocking(move || ImapConnection::open(&config))
            .await
            .map_err(|e| ChannelError::ConnectFailed {
                name: "imap".into(),
                reason: format!("IMAP connect task panicked: {e}"),
            })??;

        Ok(Box::new(ImapSession {
            conn: Arc::new(Mutex::new(conn)),
        }))
    }
}

// ── IMAP ────────────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Untagged lines and literals collected for one tagged command.
#[derive(Debug, Default)]
struct ImapResponse {
    lines: Vec<String>,
    literals: Vec<Vec<u8>>,
}

/// A blocking, logged-in IMAP connection with INBOX selected.
struct ImapConnection {
    tls: TlsStream,
    tag: u32,
}

impl ImapConnection {
    fn open(config: &EmailConfig) -> Result<Self, ChannelError> {
        let connect_failed = |reason: String| ChannelError::ConnectFailed {
            name: "imap".into(),
            reason,
        };

        let tcp = TcpStream::connect((&*config.imap_host, config.imap_port))?;
        tcp.set_read_timeout(Some(Duration::from_secs(30)))?;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );
        let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())
            .map_err(|e| connect_failed(format!("Invalid IMAP host: {e}")))?;
        let client = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| connect_failed(format!("TLS setup failed: {e}")))?;

        let mut conn = Self {
            tls: rustls::StreamOwned::new(client, tcp),
            tag: 0,
        };

        let greeting = conn.read_line()?;
        if !greeting.starts_with("* OK") {
            return Err(connect_failed(format!(
                "Unexpected greeting: {}",
                greeting.trim_end()
            )));
        }

        conn.command(&format!(
            "LOGIN {} {}",
            quote(&config.username),
            quote(config.password.expose_secret())
        ))
        .map_err(|e| ChannelError::AuthFailed {
            name: "imap".into(),
            reason: e.to_string(),
        })?;
        conn.command("SELECT \"INBOX\"")?;
        Ok(conn)
    }

    fn read_line(&mut self) -> Result<String, ChannelError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.tls.read(&mut byte)? {
                0 => {
                    return Err(ChannelError::Protocol {
                        command: "read".into(),
                        reason: "IMAP connection closed".into(),
                    });
                }
                _ => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).into_owned());
                    }
                }
            }
        }
    }

    /// Send one tagged command and collect its response.
    fn command(&mut self, cmd: &str) -> Result<ImapResponse, ChannelError> {
        self.tag += 1;
        let tag = format!("A{}", self.tag);
        self.tls.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.tls.flush()?;

        // Never echo arguments back: LOGIN carries the password.
        let verb = cmd.split_whitespace().take(2).collect::<Vec<_>>().join(" ");
        let tagged = format!("{tag} ");
        let mut response = ImapResponse::default();
        loop {
            let line = self.read_line()?;
            if let Some(len) = literal_len(&line) {
                let mut literal = vec![0u8; len];
                self.tls.read_exact(&mut literal)?;
                response.literals.push(literal);
            }
            if let Some(status) = line.strip_prefix(&tagged) {
                if status.starts_with("OK") {
                    return Ok(response);
                }
                return Err(ChannelError::Protocol {
                    command: verb,
                    reason: status.trim_end().to_string(),
                });
            }
            response.lines.push(line);
        }
    }

    fn search_unseen(&mut self, marker: &str) -> Result<Vec<String>, ChannelError> {
        let response = self.command(&format!("UID SEARCH UNSEEN SUBJECT {}", quote(marker)))?;
        Ok(parse_search(&response.lines))
    }

    fn fetch(&mut self, uid: &str) -> Result<Vec<u8>, ChannelError> {
        let mut response = self.command(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
        if response.literals.is_empty() {
            return Err(ChannelError::Protocol {
                command: "UID FETCH".into(),
                reason: format!("no message body returned for {uid}"),
            });
        }
        Ok(response.literals.swap_remove(0))
    }

    fn mark_seen(&mut self, uid: &str) -> Result<(), ChannelError> {
        self.command(&format!("UID STORE {uid} +FLAGS (\\Seen)"))?;
        Ok(())
    }

    fn logout(&mut self) {
        if let Err(e) = self.command("LOGOUT") {
            tracing::debug!("IMAP logout: {e}");
        }
        self.tls.conn.send_close_notify();
        let _ = self.tls.flush();
    }
}

/// `Mailbox` over a blocking IMAP connection; each call runs on the
/// blocking pool.
struct ImapSession {
    conn: Arc<Mutex<ImapConnection>>,
}

impl ImapSession {
    async fn blocking<T, F>(&self, op: F) -> Result<T, ChannelError>
    where
        T: Send + 'static,
        F: FnOnce(&mut ImapConnection) -> Result<T, ChannelError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| ChannelError::Protocol {
                command: "session".into(),
                reason: "IMAP session lock poisoned".into(),
            })?;
            op(&mut guard)
        })
        .await
        .map_err(|e| ChannelError::Protocol {
            command: "session".into(),
            reason: format!("IMAP task panicked: {e}"),
        })?
    }
}

#[async_trait]
impl Mailbox for ImapSession {
    async fn search_unseen(&mut self, marker: &str) -> Result<Vec<String>, ChannelError> {
        let marker = marker.to_string();
        self.blocking(move |conn| conn.search_unseen(&marker)).await
    }

    async fn fetch(&mut self, id: &str) -> Result<Vec<u8>, ChannelError> {
        let id = id.to_string();
        self.blocking(move |conn| conn.fetch(&id)).await
    }

    async fn mark_seen(&mut self, id: &str) -> Result<(), ChannelError> {
        let id = id.to_string();
        self.blocking(move |conn| conn.mark_seen(&id)).await
    }

    async fn logout(&mut self) {
        let _ = self
            .blocking(|conn| {
                conn.logout();
                Ok(())
            })
            .await;
    }
}

// ── Helpers (public for testing) ────────────────────────────────────

/// Quote a string as an IMAP quoted-string.
pub fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Size of a `{N}` literal announced at the end of a response line.
pub fn literal_len(line: &str) -> Option<usize> {
    let line = line.trim_end_matches("\r\n");
    let open = line.rfind('{')?;
    line.strip_suffix('}')?[open + 1..].parse().ok()
}

/// Ids from `* SEARCH` lines, in server order.
pub fn parse_search(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|line| line.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().map(str::to_string))
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────
