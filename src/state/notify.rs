//! Outbound notifications.
//!
//! Lobby operations never talk to the transport. They push [`Outbound`]
//! messages into an [`Outbox`], and whoever drove the operation delivers them.
//! The host and per-player views are immutable snapshots built from lobby
//! state at the moment they are queued.

use serde::Serialize;

use super::game::{Move, Score};
use super::lobby::Phase;
use super::player::ChannelId;

/// Host projection of a lobby.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostView {
    pub code: String,
    pub phase: Phase,
    pub round: u32,
    pub champion: Option<String>,
    pub players: Vec<PlayerSummary>,
    pub matches: Vec<MatchSummary>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    pub name: String,
    pub eliminated: bool,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub id: String,
    pub round: u32,
    pub p1: String,
    pub p2: String,
    pub score: Score,
    pub completed: bool,
    pub winner: Option<String>,
}

/// What one player sees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    pub code: String,
    pub phase: Phase,
    pub round: u32,
    pub you: YouView,
    pub champion: Option<String>,
    /// The player's unfinished match, if any
    #[serde(rename = "match")]
    pub current_match: Option<MatchView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YouView {
    pub name: String,
    pub eliminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchView {
    pub id: String,
    pub opponent: String,
    pub your_score: u8,
    pub opponent_score: u8,
    pub you_locked: bool,
    pub opponent_locked: bool,
}

/// One resolved exchange, framed for a single contestant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub your_move: Move,
    pub opponent_move: Move,
    pub your_score: u8,
    pub opponent_score: u8,
}

/// A message for one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Notification {
    /// Host snapshot, sent after every mutation
    LobbyState(HostView),
    /// Per-player snapshot
    Status(PlayerView),
    RoundResult(RoundResult),
    /// Join accepted
    Joined { code: String, name: String },
    /// Informational text (bye, match start, elimination, forfeit)
    Message(String),
    /// Validation failure for the channel's own action
    Error(String),
    /// The lobby went away
    Closed(String),
}

/// A notification addressed to a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: ChannelId,
    pub notification: Notification,
}

impl Outbound {
    /// Wire form: `{"event": ..., "data": ...}` without the recipient.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.notification).unwrap_or(serde_json::Value::Null)
    }
}

/// Collects the effects of one lobby operation.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<Outbound>,
    /// Round whose advancement check should run after the presentation delay
    advance_round: Option<u32>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, to: ChannelId, notification: Notification) {
        self.messages.push(Outbound { to, notification });
    }

    pub fn message(&mut self, to: ChannelId, text: impl Into<String>) {
        self.send(to, Notification::Message(text.into()));
    }

    pub fn error(&mut self, to: ChannelId, text: impl Into<String>) {
        self.send(to, Notification::Error(text.into()));
    }

    /// Request a deferred advancement check for `round`.
    pub fn schedule_advance(&mut self, round: u32) {
        self.advance_round = Some(round);
    }

    /// Take the pending advancement request, if any.
    pub fn take_scheduled_advance(&mut self) -> Option<u32> {
        self.advance_round.take()
    }

    pub fn messages(&self) -> &[Outbound] {
        &self.messages
    }

    /// Notifications queued for one channel, in order.
    pub fn for_channel(&self, channel: ChannelId) -> impl Iterator<Item = &Notification> {
        self.messages
            .iter()
            .filter(move |m| m.to == channel)
            .map(|m| &m.notification)
    }

    pub fn drain(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.messages)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.advance_round.is_none()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}
