//! Transport traits the relay engine is written against.

use async_trait::async_trait;

use crate::error::ChannelError;

/// Outbound mail plus access to the watched inbox.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send one plain-text message.
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), ChannelError>;

    /// Open a logged-in session on the inbox. The caller must `logout()` it.
    async fn open_mailbox(&self) -> Result<Box<dyn Mailbox>, ChannelError>;
}

/// One logged-in inbox session.
///
/// Message ids are only meaningful within the session that returned them.
#[async_trait]
pub trait Mailbox: Send {
    /// Ids of unseen messages whose subject contains `marker`
    /// (case-insensitive), oldest first.
    async fn search_unseen(&mut self, marker: &str) -> Result<Vec<String>, ChannelError>;

    /// Raw RFC 822 bytes of a message. Does not change its seen flag.
    async fn fetch(&mut self, id: &str) -> Result<Vec<u8>, ChannelError>;

    /// Flag a message as seen so it is not matched again.
    async fn mark_seen(&mut self, id: &str) -> Result<(), ChannelError>;

    /// End the session. Errors are swallowed; the connection is gone either way.
    async fn logout(&mut self);
}

/// The remote-messaging side: delivers text to a handle.
#[async_trait]
pub trait MessagingSink: Send + Sync {
    async fn send_text(&self, handle: &str, text: &str) -> Result<(), ChannelError>;
}
