//! Operator commands delivered as specially-subjected mail.

use tracing::{debug, info};

use crate::channels::Mailbox;
use crate::channels::email_types::parse_mail;
use crate::error::ChannelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Status,
    Pause,
    Resume,
    Stop,
}

impl Command {
    /// Every command, in dispatch priority order.
    pub const ALL: [Command; 4] = [
        Command::Status,
        Command::Pause,
        Command::Resume,
        Command::Stop,
    ];

    /// Subject-line marker that triggers the command.
    pub fn marker(self) -> &'static str {
        match self {
            Command::Status => "!status",
            Command::Pause => "!pause",
            Command::Resume => "!resume",
            Command::Stop => "!stop",
        }
    }

    /// Subject and body of the acknowledgement, given the state after the
    /// command has been applied.
    pub fn acknowledgement(self, paused: bool, pending: usize) -> (String, String) {
        let (subject, body) = match self {
            Command::Status => {
                let status = if paused { "paused" } else { "running" };
                return (
                    "Bridge Status".to_string(),
                    format!("Bridge is currently {status}. Pending messages: {pending}"),
                );
            }
            Command::Pause => ("Bridge Paused", "Forwarding has been paused"),
            Command::Resume => ("Bridge Resumed", "Forwarding has been resumed"),
            Command::Stop => ("Bridge Stopping", "Bridge is stopping"),
        };
        (subject.to_string(), body.to_string())
    }
}

/// What the controller loop does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Find the highest-priority pending command and consume it.
///
/// The first marker with any unseen match wins; later markers are not looked
/// at in the same pass. Among several matches the newest is taken. Search
/// hits are re-checked against the fetched subject, since some servers match
/// words rather than substrings.
pub async fn scan_commands(mailbox: &mut dyn Mailbox) -> Result<Option<Command>, ChannelError> {
    for command in Command::ALL {
        let ids = mailbox.search_unseen(command.marker()).await?;
        for id in ids.iter().rev() {
            let subject = parse_mail(&mailbox.fetch(id).await?).subject;
            if !subject.to_lowercase().contains(command.marker()) {
                debug!(id = %id, subject = %subject, "Search hit without command marker");
                continue;
            }
            mailbox.mark_seen(id).await?;
            info!(command = command.marker(), "Processing command");
            return Ok(Some(command));
        }
    }
    Ok(None)
}
