//! Lobby actor.
//!
//! Owns one [`Lobby`] and applies its mailbox messages in order, delivering
//! the resulting notifications before each reply.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, warn};

use super::ingress::{Mailbox, Message};
use crate::config::TournamentConfig;
use crate::state::{Lobby, Outbound, Outbox};

/// Sole owner of one lobby's state.
///
/// Messages are applied one at a time in arrival order, so a lobby never sees
/// two actions interleave. Different lobbies run in different actors.
pub struct Actor {
    lobby: Lobby,
    mailbox: mpsc::Receiver<Message>,
    /// Used by advancement timers; does not keep the actor alive
    timer: mpsc::WeakSender<Message>,
    outbound: mpsc::UnboundedSender<Outbound>,
    advance_delay: Duration,
}

impl Actor {
    pub fn new(
        lobby: Lobby,
        config: &TournamentConfig,
        outbound: mpsc::UnboundedSender<Outbound>,
    ) -> (Self, Mailbox) {
        let (sender, mailbox) = mpsc::channel(config.mailbox_capacity);
        let actor = Self {
            lobby,
            mailbox,
            timer: sender.downgrade(),
            outbound,
            advance_delay: config.advance_delay,
        };
        (actor, Mailbox::new(sender))
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut out = Outbox::new();
        self.lobby.broadcast(&mut out);
        self.flush(&mut out);

        while let Some(message) = self.mailbox.recv().await {
            match message {
                Message::Action {
                    channel,
                    action,
                    response,
                } => {
                    let name = action.name();
                    let result = self.lobby.apply(channel, action, &mut out);
                    if let Err(err) = &result {
                        debug!(code = %self.lobby.code, channel, action = name, %err, "action rejected");
                        out.error(channel, err.to_string());
                    }
                    // Deliver before replying so callers observe the effects.
                    self.flush(&mut out);
                    let _ = response.send(result);
                }
                Message::AdvanceCheck { round } => {
                    self.lobby.advance_check(round, &mut out);
                    self.flush(&mut out);
                }
                Message::Snapshot { response } => {
                    let _ = response.send(self.lobby.host_view());
                }
                Message::Close { reason } => {
                    self.lobby.close(&reason, &mut out);
                    self.flush(&mut out);
                    break;
                }
            }
        }

        debug!(code = %self.lobby.code, "lobby actor stopped");
    }

    fn flush(&self, out: &mut Outbox) {
        if let Some(round) = out.take_scheduled_advance() {
            self.schedule_advance(round);
        }
        for message in out.drain() {
            if self.outbound.send(message).is_err() {
                warn!(code = %self.lobby.code, "outbound channel closed; notifications dropped");
                break;
            }
        }
    }

    /// Post an advancement check back into this actor's queue after the
    /// presentation delay. Nothing cancels it; a stale check is ignored by
    /// the lobby.
    fn schedule_advance(&self, round: u32) {
        let timer = self.timer.clone();
        let delay = self.advance_delay;
        debug!(code = %self.lobby.code, round, ?delay, "advancement scheduled");
        tokio::spawn(async move {
            time::sleep(delay).await;
            if let Some(sender) = timer.upgrade() {
                let _ = sender.send(Message::AdvanceCheck { round }).await;
            }
        });
    }
}
