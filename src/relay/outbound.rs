//! Outbound relay — forwards new log messages as tagged email.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::channels::MailTransport;
use crate::relay::ledger::Ledger;
use crate::relay::pending::PendingRelay;
use crate::store::{Message, MessageSource};

/// Subject and body of the email for one message.
pub fn compose(token: &str, message: &Message) -> (String, String) {
    (
        format!("[{token}] {}", message.sender),
        format!("Incoming from {}\n\n{}", message.sender, message.text),
    )
}

pub struct OutboundRelay {
    source: Arc<dyn MessageSource>,
    mail: Arc<dyn MailTransport>,
    recipient: String,
}

impl OutboundRelay {
    pub fn new(
        source: Arc<dyn MessageSource>,
        mail: Arc<dyn MailTransport>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            source,
            mail,
            recipient: recipient.into(),
        }
    }

    /// Forward every message past the ledger's cursor, oldest first.
    ///
    /// A failed send skips only that message. Each successful send is
    /// recorded in the ledger before the next message is attempted.
    /// Returns the relays created in this pass.
    pub async fn relay_new(&self, ledger: &mut Ledger) -> Vec<PendingRelay> {
        let messages = match self.source.read_since(ledger.cursor()).await {
            Ok(messages) => messages,
            Err(e) => {
                error!("Failed to read new messages: {e}");
                return Vec::new();
            }
        };

        let mut relayed = Vec::new();
        for message in messages {
            if message.id <= ledger.cursor() {
                debug!(id = message.id, "Skipping already forwarded message");
                continue;
            }

            let relay = PendingRelay::new(message.id, &message.sender);
            let (subject, body) = compose(&relay.token, &message);

            if let Err(e) = self.mail.send(&subject, &body, &self.recipient).await {
                error!(id = message.id, "Failed to forward message: {e}");
                continue;
            }

            info!(token = %relay.token, sender = %message.sender, "Forwarded message");
            ledger.record_forward(relay.clone());
            relayed.push(relay);
        }
        relayed
    }
}
