//! Messages and the handle used to reach a lobby actor.

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::state::{Action, ChannelId, HostView, LobbyError};

/// Messages sent to a lobby actor.
#[derive(Debug)]
pub enum Message {
    /// An inbound action from a channel
    Action {
        channel: ChannelId,
        action: Action,
        response: oneshot::Sender<Result<(), LobbyError>>,
    },
    /// Deferred round advancement, posted by the actor's own timer
    AdvanceCheck { round: u32 },
    /// Read the host projection
    Snapshot { response: oneshot::Sender<HostView> },
    /// Notify every player and stop
    Close { reason: String },
}

/// Mailbox for a lobby actor.
#[derive(Clone, Debug)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    pub(super) fn new(sender: mpsc::Sender<Message>) -> Self {
        Self { sender }
    }

    /// Apply `action` and wait for its result.
    ///
    /// A lobby whose actor has already stopped reports `LobbyNotFound`.
    pub async fn act(&self, channel: ChannelId, action: Action) -> Result<(), LobbyError> {
        let (response, receiver) = oneshot::channel();
        if self
            .sender
            .send(Message::Action {
                channel,
                action,
                response,
            })
            .await
            .is_err()
        {
            warn!(channel, "lobby mailbox closed; action dropped");
            return Err(LobbyError::LobbyNotFound);
        }
        receiver.await.unwrap_or(Err(LobbyError::LobbyNotFound))
    }

    pub async fn snapshot(&self) -> Option<HostView> {
        let (response, receiver) = oneshot::channel();
        self.sender.send(Message::Snapshot { response }).await.ok()?;
        receiver.await.ok()
    }

    pub async fn close(&self, reason: impl Into<String>) {
        let reason = reason.into();
        if self.sender.send(Message::Close { reason }).await.is_err() {
            warn!("lobby mailbox closed; close dropped");
        }
    }
}
