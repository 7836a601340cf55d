//! Tournament state.
//!
//! - `player` - Participants and display names
//! - `game` - Moves, exchange resolution, matches
//! - `bracket` - Round pairing
//! - `lobby` - Lobby phase machine, round controller, registry
//! - `notify` - Outbound notifications and projections
//! - `connection` - Channel to lobby membership
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      LobbyRegistry                                │
//! │   code → Lobby                                                    │
//! │                                                                   │
//! │   ┌────────────────────────────────────────────────────────┐     │
//! │   │ Lobby                                                   │     │
//! │   │   phase: waiting ──▶ in_progress ──▶ finished           │     │
//! │   │   players: channel → Player                             │     │
//! │   │   matches: current round only ◀── bracket::pair         │     │
//! │   │                                                         │     │
//! │   │   join / start / submit_move / disconnect               │     │
//! │   │        │                                                │     │
//! │   │        ▼                                                │     │
//! │   │     Outbox  (notifications + deferred advance)          │     │
//! │   └────────────────────────────────────────────────────────┘     │
//! │                                                                   │
//! │   ConnectionManager: channel → (code, role)                       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod bracket;
pub mod connection;
pub mod game;
pub mod lobby;
pub mod notify;
pub mod player;

// Re-export commonly used types
pub use bracket::{pair, Bracket};
pub use connection::{ConnectionManager, Membership, Role};
pub use game::{resolve, Match, MatchError, Move, Outcome, Score, Side, Submission, WIN_TARGET};
pub use lobby::{
    canonical_code, generate_code, Action, Lobby, LobbyError, LobbyRegistry, Phase, CODE_LENGTH,
};
pub use notify::{HostView, Notification, Outbound, Outbox, PlayerView, RoundResult};
pub use player::{normalize_name, ChannelId, Player, MAX_NAME_LEN};
