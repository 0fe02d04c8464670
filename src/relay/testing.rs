//! In-memory collaborators for relay engine tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::channels::email::OUTBOUND_MESSAGE_ID_DOMAIN;
use crate::channels::{MailTransport, Mailbox, MessagingSink};
use crate::error::{ChannelError, DatabaseError};
use crate::store::{Message, MessageSource};

// ── Message source ──────────────────────────────────────────────────

pub struct FakeSource {
    messages: Mutex<Vec<Message>>,
    fail: bool,
}

impl FakeSource {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn push(&self, message: Message) {
        self.messages.lock().unwrap().push(message);
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn read_since(&self, cursor: i64) -> Result<Vec<Message>, DatabaseError> {
        if self.fail {
            return Err(DatabaseError::Query("source unavailable".into()));
        }
        let mut out: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.id > cursor)
            .cloned()
            .collect();
        out.sort_by_key(|m| m.id);
        Ok(out)
    }
}

// ── Mail ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

#[derive(Debug, Clone)]
struct StoredMail {
    id: String,
    subject: String,
    raw: Vec<u8>,
    seen: bool,
}

#[derive(Default)]
struct Inbox {
    mails: Vec<StoredMail>,
    sent: Vec<SentMail>,
    fail_send: Vec<String>,
    fail_open: bool,
    fail_search: bool,
    word_search: bool,
    loopback: bool,
    next_id: u32,
    opened: usize,
    logged_out: usize,
}

impl Inbox {
    fn store(&mut self, subject: &str, body: &str, message_id: &str) -> String {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let raw = format!(
            "From: operator@example.com\r\n\
             To: bridge@example.com\r\n\
             Subject: {subject}\r\n\
             Message-ID: <{message_id}>\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             \r\n\
             {body}\r\n"
        );
        self.mails.push(StoredMail {
            id: id.clone(),
            subject: subject.to_string(),
            raw: raw.into_bytes(),
            seen: false,
        });
        id
    }
}

/// Shared fake mailbox; clones see the same inbox.
#[derive(Clone, Default)]
pub struct FakeMailer {
    inbox: Arc<Mutex<Inbox>>,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also drop every sent mail into the inbox, as a self-addressed account does.
    pub fn with_loopback(self) -> Self {
        self.inbox.lock().unwrap().loopback = true;
        self
    }

    /// Search on words stripped of punctuation, as some IMAP servers do.
    pub fn with_word_search(self) -> Self {
        self.inbox.lock().unwrap().word_search = true;
        self
    }

    /// Put an unseen mail from the operator in the inbox; returns its id.
    pub fn deliver(&self, subject: &str, body: &str) -> String {
        let mut inbox = self.inbox.lock().unwrap();
        let message_id = format!("op{}@mail.example.com", inbox.next_id + 1);
        inbox.store(subject, body, &message_id)
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.inbox.lock().unwrap().sent.clone()
    }

    pub fn sent_with_subject(&self, subject: &str) -> Vec<SentMail> {
        self.sent()
            .into_iter()
            .filter(|m| m.subject == subject)
            .collect()
    }

    pub fn is_seen(&self, id: &str) -> bool {
        self.inbox
            .lock()
            .unwrap()
            .mails
            .iter()
            .any(|m| m.id == id && m.seen)
    }

    pub fn unseen_count(&self) -> usize {
        self.inbox
            .lock()
            .unwrap()
            .mails
            .iter()
            .filter(|m| !m.seen)
            .count()
    }

    pub fn fail_sends_containing(&self, needle: &str) {
        self.inbox.lock().unwrap().fail_send.push(needle.to_string());
    }

    pub fn clear_send_failures(&self) {
        self.inbox.lock().unwrap().fail_send.clear();
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.inbox.lock().unwrap().fail_open = fail;
    }

    pub fn set_fail_search(&self, fail: bool) {
        self.inbox.lock().unwrap().fail_search = fail;
    }

    /// (sessions opened, sessions logged out)
    pub fn session_counts(&self) -> (usize, usize) {
        let inbox = self.inbox.lock().unwrap();
        (inbox.opened, inbox.logged_out)
    }
}

#[async_trait]
impl MailTransport for FakeMailer {
    async fn send(&self, subject: &str, body: &str, recipient: &str) -> Result<(), ChannelError> {
        let mut inbox = self.inbox.lock().unwrap();
        if inbox.fail_send.iter().any(|n| subject.contains(n.as_str())) {
            return Err(ChannelError::SendFailed {
                name: "email".into(),
                reason: "fake send failure".into(),
            });
        }
        inbox.sent.push(SentMail {
            subject: subject.to_string(),
            body: body.to_string(),
            recipient: recipient.to_string(),
        });
        if inbox.loopback {
            let message_id = format!("out{}@{OUTBOUND_MESSAGE_ID_DOMAIN}", inbox.sent.len());
            inbox.store(subject, body, &message_id);
        }
        Ok(())
    }

    async fn open_mailbox(&self) -> Result<Box<dyn Mailbox>, ChannelError> {
        let mut inbox = self.inbox.lock().unwrap();
        if inbox.fail_open {
            return Err(ChannelError::ConnectFailed {
                name: "imap".into(),
                reason: "fake connect failure".into(),
            });
        }
        inbox.opened += 1;
        Ok(Box::new(FakeSession {
            inbox: Arc::clone(&self.inbox),
        }))
    }
}

struct FakeSession {
    inbox: Arc<Mutex<Inbox>>,
}

#[async_trait]
impl Mailbox for FakeSession {
    async fn search_unseen(&mut self, marker: &str) -> Result<Vec<String>, ChannelError> {
        let inbox = self.inbox.lock().unwrap();
        if inbox.fail_search {
            return Err(ChannelError::Protocol {
                command: "UID SEARCH".into(),
                reason: "fake search failure".into(),
            });
        }
        let marker = marker.to_lowercase();
        let word = marker.trim_matches(|c: char| !c.is_alphanumeric()).to_string();
        let word_search = inbox.word_search;
        let hit = |subject: &str| {
            let subject = subject.to_lowercase();
            if word_search {
                subject
                    .split(|c: char| !c.is_alphanumeric() && c != ':')
                    .any(|w| w == word)
            } else {
                subject.contains(&marker)
            }
        };
        Ok(inbox
            .mails
            .iter()
            .filter(|m| !m.seen && hit(&m.subject))
            .map(|m| m.id.clone())
            .collect())
    }

    async fn fetch(&mut self, id: &str) -> Result<Vec<u8>, ChannelError> {
        self.inbox
            .lock()
            .unwrap()
            .mails
            .iter()
            .find(|m| m.id == id)
            .map(|m| m.raw.clone())
            .ok_or_else(|| ChannelError::Protocol {
                command: "UID FETCH".into(),
                reason: format!("no message {id}"),
            })
    }

    async fn mark_seen(&mut self, id: &str) -> Result<(), ChannelError> {
        if let Some(mail) = self
            .inbox
            .lock()
            .unwrap()
            .mails
            .iter_mut()
            .find(|m| m.id == id)
        {
            mail.seen = true;
        }
        Ok(())
    }

    async fn logout(&mut self) {
        self.inbox.lock().unwrap().logged_out += 1;
    }
}

// ── Messaging sink ──────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct FakeSink {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    fail: Arc<Mutex<bool>>,
}

impl FakeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingSink for FakeSink {
    async fn send_text(&self, handle: &str, text: &str) -> Result<(), ChannelError> {
        if *self.fail.lock().unwrap() {
            return Err(ChannelError::SendFailed {
                name: "imessage".into(),
                reason: "fake sink failure".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((handle.to_string(), text.to_string()));
        Ok(())
    }
}
