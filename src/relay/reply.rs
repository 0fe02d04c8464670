//! Reply watcher — matches inbound mail to a pending relay's token.

use tracing::debug;

use crate::channels::Mailbox;
use crate::channels::email::is_own_outbound;
use crate::channels::email_types::{parse_mail, strip_quoted_text};
use crate::error::ChannelError;

/// Whether `subject` carries exactly `token` (so `MSGID:1` does not match a
/// reply to `MSGID:12`).
pub fn subject_has_token(subject: &str, token: &str) -> bool {
    let subject = subject.to_ascii_lowercase();
    let token = token.to_ascii_lowercase();
    subject.match_indices(&token).any(|(at, _)| {
        !subject[at + token.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit())
    })
}

/// One non-blocking look for a reply to `token` on an open session.
///
/// The newest matching unseen mail wins. On a match the mail is marked seen
/// and its quote-stripped, trimmed body is returned; the body may be empty.
/// The bridge's own outbound copies and mail for other tokens are left
/// untouched.
pub async fn check_reply(
    mailbox: &mut dyn Mailbox,
    token: &str,
) -> Result<Option<String>, ChannelError> {
    let ids = mailbox.search_unseen(token).await?;

    for id in ids.iter().rev() {
        let raw = mailbox.fetch(id).await?;
        let mail = parse_mail(&raw);

        if mail.message_id.as_deref().is_some_and(is_own_outbound) {
            debug!(token, id = %id, "Skipping own outbound mail");
            continue;
        }
        if !subject_has_token(&mail.subject, token) {
            debug!(token, subject = %mail.subject, "Subject matched a different token");
            continue;
        }

        mailbox.mark_seen(id).await?;
        debug!(token, id = %id, "Received reply");
        return Ok(Some(strip_quoted_text(&mail.body).trim().to_string()));
    }

    Ok(None)
}
