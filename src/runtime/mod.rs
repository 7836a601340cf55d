//! Concurrent lobby runtime.
//!
//! Each lobby lives in its own [`actor::Actor`] task and is reached through a
//! [`Mailbox`]. The [`Hub`] maps codes to mailboxes and channels to lobbies;
//! its lock covers only those two tables and is never held across an await,
//! so lobbies make progress independently of one another.
//!
//! Notifications from every lobby are delivered on one unbounded channel of
//! [`Outbound`] messages, which the transport drains.

pub mod actor;
pub mod ingress;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::TournamentConfig;
use crate::state::{
    canonical_code, Action, ChannelId, ConnectionManager, HostView, Lobby, LobbyError,
    LobbyRegistry, Membership, Notification, Outbound, Role,
};

pub use actor::Actor;
pub use ingress::{Mailbox, Message};

/// Sent to players when their host leaves.
pub const HOST_LEFT: &str = "Host disconnected. Lobby closed.";

#[derive(Debug, Default)]
struct Directory {
    lobbies: LobbyRegistry<Mailbox>,
    connections: ConnectionManager,
}

/// Entry point for inbound actions.
///
/// Cheap to clone; clones share the same lobbies.
#[derive(Clone, Debug)]
pub struct Hub {
    directory: Arc<Mutex<Directory>>,
    config: TournamentConfig,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Hub {
    pub fn new(config: TournamentConfig, outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self::with_rng(config, outbound, StdRng::from_entropy())
    }

    /// Create a hub whose codes and brackets derive from `rng`.
    pub fn with_rng(
        config: TournamentConfig,
        outbound: mpsc::UnboundedSender<Outbound>,
        rng: StdRng,
    ) -> Self {
        let directory = Directory {
            lobbies: LobbyRegistry::with_rng(rng),
            connections: ConnectionManager::new(),
        };
        Self {
            directory: Arc::new(Mutex::new(directory)),
            config,
            outbound,
        }
    }

    fn directory(&self) -> MutexGuard<'_, Directory> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mailbox(&self, code: &str) -> Option<Mailbox> {
        self.directory().lobbies.get(code).cloned()
    }

    fn reject<T>(&self, channel: ChannelId, err: LobbyError) -> Result<T, LobbyError> {
        let _ = self.outbound.send(Outbound {
            to: channel,
            notification: Notification::Error(err.to_string()),
        });
        Err(err)
    }

    /// Create a lobby hosted by `host` and start its actor. Must be called
    /// from within a tokio runtime.
    pub fn create_lobby(&self, host: ChannelId) -> Result<String, LobbyError> {
        let mut directory = self.directory();
        if directory.connections.contains(host) {
            drop(directory);
            return self.reject(host, LobbyError::AlreadyInLobby);
        }

        let rng = directory.lobbies.fork_rng();
        let code = directory.lobbies.create_with(|code| {
            let lobby = Lobby::with_rng(code.to_string(), host, rng);
            let (actor, mailbox) = Actor::new(lobby, &self.config, self.outbound.clone());
            actor.start();
            mailbox
        });
        let _ = directory
            .connections
            .add(host, Membership::new(&code, Role::Host));

        info!(%code, host, "lobby created");
        Ok(code)
    }

    /// Start the tournament in `code`. Only its host may.
    pub async fn start(&self, channel: ChannelId, code: &str) -> Result<(), LobbyError> {
        self.dispatch(channel, code, Action::Start).await
    }

    /// Join lobby `code` as `name`.
    ///
    /// The membership is reserved before the join is queued, so a disconnect
    /// that arrives while the join is in flight is routed to the lobby and
    /// applied after it.
    pub async fn join(&self, channel: ChannelId, code: &str, name: &str) -> Result<(), LobbyError> {
        {
            let mut directory = self.directory();
            if !directory.lobbies.contains(code) {
                drop(directory);
                return self.reject(channel, LobbyError::LobbyNotFound);
            }
            let reserved = directory
                .connections
                .add(channel, Membership::new(code, Role::Player))
                .is_ok();
            if !reserved {
                drop(directory);
                return self.reject(channel, LobbyError::AlreadyInLobby);
            }
        }

        let action = Action::Join {
            name: name.to_string(),
        };
        let result = self.dispatch(channel, code, action).await;
        if result.is_err() {
            let mut directory = self.directory();
            let still_reserved = directory
                .connections
                .get(channel)
                .map_or(false, |m| m.code == canonical_code(code));
            if still_reserved {
                directory.connections.remove(channel);
            }
        }
        result
    }

    /// Submit a move in lobby `code`.
    pub async fn submit_move(
        &self,
        channel: ChannelId,
        code: &str,
        choice: &str,
    ) -> Result<(), LobbyError> {
        let action = Action::SubmitMove {
            choice: choice.to_string(),
        };
        self.dispatch(channel, code, action).await
    }

    /// The transport lost `channel`.
    ///
    /// A host takes its lobby down with it; a player forfeits (or simply
    /// leaves, before the start).
    pub async fn disconnect(&self, channel: ChannelId) {
        let (membership, closing) = {
            let mut directory = self.directory();
            let Some(membership) = directory.connections.remove(channel) else {
                return;
            };
            let closing = if membership.is_host() {
                let players = directory.connections.remove_lobby(&membership.code);
                debug!(code = %membership.code, players = players.len(), "memberships dropped");
                directory.lobbies.remove(&membership.code)
            } else {
                None
            };
            (membership, closing)
        };

        if membership.is_host() {
            if let Some(mailbox) = closing {
                info!(code = %membership.code, "host left; closing lobby");
                mailbox.close(HOST_LEFT).await;
            }
            return;
        }

        if let Some(mailbox) = self.mailbox(&membership.code) {
            let _ = mailbox.act(channel, Action::Disconnect).await;
        }
    }

    /// Current host projection of `code`.
    pub async fn snapshot(&self, code: &str) -> Option<HostView> {
        let mailbox = self.mailbox(code)?;
        mailbox.snapshot().await
    }

    pub fn lobby_count(&self) -> usize {
        self.directory().lobbies.len()
    }

    /// Lobby `channel` belongs to, if any.
    pub fn membership(&self, channel: ChannelId) -> Option<Membership> {
        self.directory().connections.get(channel).cloned()
    }

    async fn dispatch(
        &self,
        channel: ChannelId,
        code: &str,
        action: Action,
    ) -> Result<(), LobbyError> {
        match self.mailbox(code) {
            Some(mailbox) => mailbox.act(channel, action).await,
            None => self.reject(channel, LobbyError::LobbyNotFound),
        }
    }
}
