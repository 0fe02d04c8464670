//! Bridge controller — the top-level relay loop.
//!
//! One task drives everything: gate check, command dispatch, outbound
//! relaying, then reply watching, then sleep. The controller is the only
//! owner of the ledger and the pause flag, so nothing here is locked.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, error, info, warn};

use crate::channels::{MailTransport, Mailbox, MessagingSink};
use crate::config::BridgeConfig;
use crate::relay::commands::{Command, Flow, scan_commands};
use crate::relay::ledger::Ledger;
use crate::relay::outbound::OutboundRelay;
use crate::relay::reply::check_reply;
use crate::store::{MessageSource, StateStore};

/// Where the controller is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgePhase {
    GatedClosed,
    Idle,
    Relaying,
    AwaitingReplies,
    Paused,
    Stopped,
}

/// Result of waiting on one token.
#[derive(Debug)]
enum ReplyOutcome {
    Reply(String),
    /// Mailbox trouble; the relay stays pending for a later cycle.
    Failed,
    /// A stop command arrived while waiting.
    Stopped,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct BridgeController {
    config: BridgeConfig,
    mail: Arc<dyn MailTransport>,
    sink: Arc<dyn MessagingSink>,
    outbound: OutboundRelay,
    ledger: Ledger,
    paused: bool,
    phase: BridgePhase,
    clock: fn() -> NaiveDateTime,
}

impl BridgeController {
    /// Build a controller, restoring cursor and pending relays from the
    /// configured state file.
    pub fn new(
        config: BridgeConfig,
        source: Arc<dyn MessageSource>,
        mail: Arc<dyn MailTransport>,
        sink: Arc<dyn MessagingSink>,
    ) -> Self {
        let ledger = Ledger::load(StateStore::new(&config.state_path));
        let outbound = OutboundRelay::new(
            source,
            Arc::clone(&mail),
            config.operator_address.clone(),
        );
        Self {
            config,
            mail,
            sink,
            outbound,
            ledger,
            paused: false,
            phase: BridgePhase::Idle,
            clock: local_now,
        }
    }

    /// Replace the wall clock used by the schedule gate.
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn phase(&self) -> BridgePhase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Loop until a stop command. Collaborator failures never end the loop.
    pub async fn run(&mut self) {
        info!(
            windows = self.config.schedule.windows().len(),
            cursor = self.ledger.cursor(),
            pending = self.ledger.pending().len(),
            "Bridge started"
        );

        while self.run_cycle().await == Flow::Continue {
            let pause = match self.phase {
                BridgePhase::GatedClosed => self.config.gated_interval,
                _ => self.config.cycle_interval,
            };
            tokio::time::sleep(pause).await;
        }
        info!("Bridge loop finished");
    }

    /// Run until a stop command or until `signal` resolves, then save state.
    pub async fn run_until<F>(&mut self, signal: F)
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = self.run() => {}
            _ = signal => info!("Shutdown signal received"),
        }
        self.shutdown().await;
    }

    /// One pass of the state machine.
    pub async fn run_cycle(&mut self) -> Flow {
        if !self.config.schedule.in_window((self.clock)()) {
            self.enter(BridgePhase::GatedClosed);
            return Flow::Continue;
        }
        self.enter(BridgePhase::Idle);

        // While replies are awaited, commands are serviced from the reply
        // wait instead. A paused bridge watches nothing, so it checks here.
        let dispatch = self.paused || self.ledger.pending().is_empty();
        if dispatch && self.check_commands().await == Flow::Stop {
            return Flow::Stop;
        }

        if self.paused {
            self.enter(BridgePhase::Paused);
            return Flow::Continue;
        }

        self.enter(BridgePhase::Relaying);
        self.outbound.relay_new(&mut self.ledger).await;

        self.enter(BridgePhase::AwaitingReplies);
        self.watch_replies().await
    }

    /// Persist state and mark the bridge stopped. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        if self.ledger.save() {
            info!(cursor = self.ledger.cursor(), "State saved on shutdown");
        }
        self.enter(BridgePhase::Stopped);
    }

    fn enter(&mut self, phase: BridgePhase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "Phase change");
            self.phase = phase;
        }
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Open a session, look for one command, handle it.
    async fn check_commands(&mut self) -> Flow {
        let mut mailbox = match self.mail.open_mailbox().await {
            Ok(mailbox) => mailbox,
            Err(e) => {
                error!("Command check error: {e}");
                return Flow::Continue;
            }
        };
        let found = scan_commands(&mut *mailbox).await;
        mailbox.logout().await;

        match found {
            Ok(Some(command)) => self.handle_command(command).await,
            Ok(None) => Flow::Continue,
            Err(e) => {
                error!("Command check error: {e}");
                Flow::Continue
            }
        }
    }

    async fn handle_command(&mut self, command: Command) -> Flow {
        match command {
            Command::Pause => {
                self.paused = true;
                info!("Forwarding paused");
            }
            Command::Resume => {
                self.paused = false;
                info!("Forwarding resumed");
            }
            Command::Status | Command::Stop => {}
        }

        let (subject, body) = command.acknowledgement(self.paused, self.ledger.pending().len());
        if let Err(e) = self
            .mail
            .send(&subject, &body, &self.config.operator_address)
            .await
        {
            error!(command = command.marker(), "Failed to acknowledge command: {e}");
        }

        if command == Command::Stop {
            info!("Stop requested");
            self.shutdown().await;
            return Flow::Stop;
        }
        Flow::Continue
    }

    // ── Replies ─────────────────────────────────────────────────────

    /// Wait on each pending relay in insertion order.
    async fn watch_replies(&mut self) -> Flow {
        for relay in self.ledger.pending().awaiting() {
            match self.await_reply(&relay.token).await {
                ReplyOutcome::Reply(text) => self.deliver_reply(&relay.token, &text).await,
                ReplyOutcome::Failed => {}
                ReplyOutcome::Stopped => return Flow::Stop,
            }
        }
        Flow::Continue
    }

    /// Block on one token until its reply arrives, the mailbox fails, or a
    /// stop command comes in. Commands are serviced between polls.
    async fn await_reply(&mut self, token: &str) -> ReplyOutcome {
        let mut mailbox = match self.mail.open_mailbox().await {
            Ok(mailbox) => mailbox,
            Err(e) => {
                error!(token, "Mailbox error while awaiting reply: {e}");
                return ReplyOutcome::Failed;
            }
        };
        let outcome = self.poll_until_reply(&mut *mailbox, token).await;
        mailbox.logout().await;
        outcome
    }

    async fn poll_until_reply(&mut self, mailbox: &mut dyn Mailbox, token: &str) -> ReplyOutcome {
        loop {
            match check_reply(mailbox, token).await {
                Ok(Some(text)) => return ReplyOutcome::Reply(text),
                Ok(None) => {}
                Err(e) => {
                    error!(token, "Mailbox error while awaiting reply: {e}");
                    return ReplyOutcome::Failed;
                }
            }

            match scan_commands(mailbox).await {
                Ok(Some(command)) => {
                    if self.handle_command(command).await == Flow::Stop {
                        return ReplyOutcome::Stopped;
                    }
                }
                Ok(None) => {}
                Err(e) => error!("Command check error: {e}"),
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Retire the relay, then hand the reply to the messaging sink.
    ///
    /// The reply mail is already consumed, so the relay is retired even if
    /// delivery fails; that failure is only logged.
    async fn deliver_reply(&mut self, token: &str, text: &str) {
        let Some(relay) = self.ledger.resolve(token) else {
            return;
        };

        if text.is_empty() {
            info!(token, "Empty reply, nothing to relay");
            return;
        }

        match self.sink.send_text(&relay.sender, text).await {
            Ok(()) => info!(token, handle = %relay.sender, "Relayed reply"),
            Err(e) => warn!(token, handle = %relay.sender, "Reply dropped, delivery failed: {e}"),
        }
    }
}
