//! Parsed inbound mail and the text clean-up applied to replies.

use mail_parser::MessageParser;

/// The parts of an inbound mail the bridge cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMail {
    /// Message-ID without angle brackets, if present.
    pub message_id: Option<String>,
    pub subject: String,
    /// Decoded plain-text body; empty when nothing readable was found.
    pub body: String,
}

/// Parse raw RFC 822 bytes.
///
/// The body is the first inline text part (HTML converted to text when no
/// plain part exists), decoded with its declared charset. Anything that
/// cannot be parsed degrades to an empty body.
pub fn parse_mail(raw: &[u8]) -> ParsedMail {
    let Some(parsed) = MessageParser::default().parse(raw) else {
        return ParsedMail::default();
    };

    let body = match parsed.body_text(0) {
        Some(text) => text.into_owned(),
        None => parsed
            .body_html(0)
            .map(|html| strip_html(html.as_ref()))
            .unwrap_or_default(),
    };

    ParsedMail {
        message_id: parsed.message_id().map(str::to_string),
        subject: parsed.subject().unwrap_or_default().to_string(),
        body,
    }
}

/// Strip quoted text from an email body.
///
/// Removes lines starting with `>` and everything from an
/// "On ... wrote:" attribution or "Original Message" separator onwards.
pub fn strip_quoted_text(body: &str) -> String {
    let mut result = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with('>') {
            continue;
        }
        if trimmed.starts_with("On ") && trimmed.ends_with("wrote:") {
            break;
        }
        if trimmed.starts_with("---") && trimmed.contains("Original Message") {
            break;
        }

        result.push(line);
    }

    while result.last().is_some_and(|l| l.trim().is_empty()) {
        result.pop();
    }

    result.join("\n")
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_mail tests ────────────────────────────────────────────

    #[test]
    fn parse_simple_plain_mail() {
        let raw = b"From: me@example.com\r\n\
Subject: Re: [MSGID:1] +1555\r\n\
Message-ID: <abc@mail.example.com>\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
hello back\r\n";
        let mail = parse_mail(raw);
        assert_eq!(mail.subject, "Re: [MSGID:1] +1555");
        assert_eq!(mail.message_id.as_deref(), Some("abc@mail.example.com"));
        assert_eq!(mail.body.trim(), "hello back");
    }

    #[test]
    fn parse_multipart_prefers_plain_part() {
        let raw = b"From: me@example.com\r\n\
Subject: Re: [MSGID:2] x\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
plain reply\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>html reply</p>\r\n\
--b1--\r\n";
        assert_eq!(parse_mail(raw).body.trim(), "plain reply");
    }

    #[test]
    fn parse_decodes_declared_charset() {
        let raw = b"Subject: Re: [MSGID:3] x\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
caf=E9\r\n";
        assert_eq!(parse_mail(raw).body.trim(), "caf\u{e9}");
    }

    #[test]
    fn parse_garbage_degrades_to_empty() {
        assert_eq!(parse_mail(b"").body, "");
    }

    // ── strip_quoted_text tests ─────────────────────────────────────

    #[test]
    fn strip_basic_quoted_lines() {
        let body = "Hello!\n\n> This is quoted\n> Another quoted line\nThanks";
        assert_eq!(strip_quoted_text(body), "Hello!\n\nThanks");
    }

    #[test]
    fn strip_attribution_and_rest() {
        let body = "Sounds good\n\nOn Mon, Jan 1, 2026 at 10:00 AM Bridge <b@x.com> wrote:\nIncoming from +1555";
        assert_eq!(strip_quoted_text(body), "Sounds good");
    }

    #[test]
    fn strip_original_message_separator() {
        let body = "Yes\n--- Original Message ---\nold stuff";
        assert_eq!(strip_quoted_text(body), "Yes");
    }

    #[test]
    fn strip_only_quotes_is_empty() {
        assert_eq!(strip_quoted_text("> a\n> b\n"), "");
    }

    // ── strip_html tests ────────────────────────────────────────────

    #[test]
    fn strip_html_nested_tags() {
        assert_eq!(
            strip_html("<div><b>Bold</b> and <i>italic</i></div>"),
            "Bold and italic"
        );
    }

    #[test]
    fn strip_html_plain_text_passthrough() {
        assert_eq!(strip_html("No HTML here"), "No HTML here");
    }
}
